// app/src/config.rs

use crate::errors::{AppError, Result};
use crate::razorpay::{RazorpaySettings, DEFAULT_API_BASE};
use dotenvy::dotenv;
use std::env;
use std::time::Duration;
use storefront::StoreConfig;

#[derive(Debug, Clone)]
pub struct AppConfig {
  /// No URL means the in-memory backend.
  pub database_url: Option<String>,
  pub seed_db: bool,
  /// Account created at startup with the admin role, when both are set.
  pub admin_email: Option<String>,
  pub admin_password: Option<String>,
  /// Prefix of public URLs for uploaded objects.
  pub image_base_url: String,
  /// Live payments; without keys checkout uses the simulated gateway.
  pub razorpay: Option<RazorpaySettings>,
  pub store: StoreConfig,
}

impl AppConfig {
  pub fn from_env() -> Result<Self> {
    dotenv().ok();

    let get_env = |var_name: &str| env::var(var_name).ok().filter(|v| !v.trim().is_empty());

    let database_url = get_env("DATABASE_URL");
    let seed_db = get_env("SEED_DB")
      .unwrap_or_else(|| "false".to_string())
      .parse::<bool>()
      .map_err(|e| AppError::Config(format!("Invalid SEED_DB value: {}", e)))?;
    let admin_email = get_env("ADMIN_EMAIL");
    let admin_password = get_env("ADMIN_PASSWORD");
    if admin_email.is_some() != admin_password.is_some() {
      return Err(AppError::Config(
        "ADMIN_EMAIL and ADMIN_PASSWORD must be set together".to_string(),
      ));
    }
    let image_base_url = get_env("IMAGE_BASE_URL")
      .unwrap_or_else(|| "http://localhost:8080/storage".to_string())
      .trim_end_matches('/')
      .to_string();

    let razorpay = match (get_env("RAZORPAY_KEY_ID"), get_env("RAZORPAY_KEY_SECRET")) {
      (Some(key_id), Some(key_secret)) => Some(RazorpaySettings {
        key_id,
        key_secret,
        api_base: get_env("RAZORPAY_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
        poll_interval: Duration::from_secs(parse_secs(get_env("RAZORPAY_POLL_SECS"), 3, "RAZORPAY_POLL_SECS")?),
        checkout_timeout: Duration::from_secs(parse_secs(
          get_env("RAZORPAY_CHECKOUT_TIMEOUT_SECS"),
          900,
          "RAZORPAY_CHECKOUT_TIMEOUT_SECS",
        )?),
      }),
      (None, None) => None,
      _ => {
        return Err(AppError::Config(
          "RAZORPAY_KEY_ID and RAZORPAY_KEY_SECRET must be set together".to_string(),
        ))
      }
    };

    let mut store = StoreConfig::from_env()?;
    // The checkout key is the account's public key id.
    if let Some(settings) = &razorpay {
      store.payment_key_id = settings.key_id.clone();
    }

    tracing::info!(
      in_memory = database_url.is_none(),
      seed_db,
      admin_bootstrap = admin_email.is_some(),
      live_payments = razorpay.is_some(),
      "Application configuration loaded."
    );

    Ok(Self {
      database_url,
      seed_db,
      admin_email,
      admin_password,
      image_base_url,
      razorpay,
      store,
    })
  }
}

fn parse_secs(value: Option<String>, default: u64, name: &str) -> Result<u64> {
  match value {
    None => Ok(default),
    Some(v) => match v.trim().parse::<u64>() {
      Ok(secs) if secs > 0 => Ok(secs),
      _ => Err(AppError::Config(format!("Invalid {} value: {}", name, v))),
    },
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn seconds_default_and_reject_zero() {
    assert_eq!(parse_secs(None, 900, "T").unwrap(), 900);
    assert_eq!(parse_secs(Some(" 5 ".into()), 900, "T").unwrap(), 5);
    assert!(parse_secs(Some("0".into()), 900, "T").is_err());
    let err = parse_secs(Some("soon".into()), 900, "RAZORPAY_POLL_SECS").unwrap_err();
    assert!(err.to_string().contains("RAZORPAY_POLL_SECS"));
  }
}
