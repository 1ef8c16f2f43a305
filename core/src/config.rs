// core/src/config.rs

use crate::error::{Result, StoreError};
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Settings the storefront core needs at runtime.
#[derive(Debug, Clone)]
pub struct StoreConfig {
  pub order_number_prefix: String,
  pub currency: String,
  /// Upper bound on the profile lookup after sign-in.
  pub profile_timeout: Duration,
  /// How long an admin auth check may hang before the troubleshooting hint shows.
  pub admin_auth_hint: Duration,
  pub require_login_for_checkout: bool,
  /// Attempt backend order pre-creation before opening the hosted checkout.
  pub precreate_gateway_orders: bool,
  pub cache_dir: Option<PathBuf>,

  // Hosted checkout presentation
  pub merchant_name: String,
  pub merchant_description: String,
  pub theme_color: String,
  pub payment_key_id: String,
}

impl Default for StoreConfig {
  fn default() -> Self {
    Self {
      order_number_prefix: "ANS".to_string(),
      currency: "INR".to_string(),
      profile_timeout: Duration::from_millis(5000),
      admin_auth_hint: Duration::from_millis(3000),
      require_login_for_checkout: true,
      precreate_gateway_orders: true,
      cache_dir: None,
      merchant_name: "Ansar Tools".to_string(),
      merchant_description: "Industrial Power Tools".to_string(),
      theme_color: "#0f172a".to_string(),
      payment_key_id: "rzp_test_placeholder".to_string(),
    }
  }
}

impl StoreConfig {
  pub fn from_env() -> Result<Self> {
    dotenv().ok();

    let get_env = |var_name: &str| env::var(var_name).ok().filter(|v| !v.trim().is_empty());
    let defaults = Self::default();

    let parse_millis = |var_name: &str, default: Duration| -> Result<Duration> {
      match get_env(var_name) {
        Some(raw) => raw
          .trim()
          .parse::<u64>()
          .map(Duration::from_millis)
          .map_err(|e| StoreError::Config(format!("Invalid {}: {}", var_name, e))),
        None => Ok(default),
      }
    };
    let parse_flag = |var_name: &str, default: bool| -> Result<bool> {
      match get_env(var_name) {
        Some(raw) => raw
          .trim()
          .parse::<bool>()
          .map_err(|e| StoreError::Config(format!("Invalid {} value: {}", var_name, e))),
        None => Ok(default),
      }
    };

    let config = Self {
      order_number_prefix: get_env("ORDER_NUMBER_PREFIX").unwrap_or(defaults.order_number_prefix),
      currency: get_env("STORE_CURRENCY").unwrap_or(defaults.currency),
      profile_timeout: parse_millis("PROFILE_TIMEOUT_MS", defaults.profile_timeout)?,
      admin_auth_hint: parse_millis("ADMIN_AUTH_HINT_MS", defaults.admin_auth_hint)?,
      require_login_for_checkout: parse_flag("REQUIRE_LOGIN_FOR_CHECKOUT", defaults.require_login_for_checkout)?,
      precreate_gateway_orders: parse_flag("PRECREATE_GATEWAY_ORDERS", defaults.precreate_gateway_orders)?,
      cache_dir: get_env("CACHE_DIR").map(PathBuf::from),
      merchant_name: get_env("MERCHANT_NAME").unwrap_or(defaults.merchant_name),
      merchant_description: get_env("MERCHANT_DESCRIPTION").unwrap_or(defaults.merchant_description),
      theme_color: get_env("THEME_COLOR").unwrap_or(defaults.theme_color),
      payment_key_id: get_env("PAYMENT_KEY_ID").unwrap_or(defaults.payment_key_id),
    };

    tracing::info!(
      currency = %config.currency,
      require_login = config.require_login_for_checkout,
      "Storefront configuration loaded."
    );
    Ok(config)
  }
}
