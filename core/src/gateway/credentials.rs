// core/src/gateway/credentials.rs

//! Password hashing and the single active session shared by the auth
//! providers. Whatever stores the accounts, sign-in looks the same.

use super::{AuthEvent, AuthEventKind, AuthSession, GatewayResult, Identity};
use crate::error::GatewayError;
use argon2::{
  password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
  Argon2,
};
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, error};
use uuid::Uuid;

pub const MIN_PASSWORD_LEN: usize = 6;

pub fn normalize_email(email: &str) -> String {
  email.trim().to_ascii_lowercase()
}

pub fn invalid_credentials() -> GatewayError {
  GatewayError::new(Some("invalid_credentials"), "Invalid login credentials")
}

pub fn already_registered() -> GatewayError {
  GatewayError::new(Some("user_already_exists"), "User already registered")
}

/// Signup rule; operator-created accounts skip it.
pub fn check_password_strength(password: &str) -> GatewayResult<()> {
  if password.len() < MIN_PASSWORD_LEN {
    return Err(GatewayError::new(
      Some("weak_password"),
      "Password should be at least 6 characters.",
    ));
  }
  Ok(())
}

pub fn hash_password(password: &str) -> GatewayResult<String> {
  if password.is_empty() {
    return Err(GatewayError::new(Some("weak_password"), "Password cannot be empty."));
  }
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|hash| hash.to_string())
    .map_err(|e| {
      error!(error = %e, "Argon2 password hashing failed.");
      GatewayError::message(format!("Password hashing failed: {}", e))
    })
}

pub fn verify_password(stored_hash: &str, provided: &str) -> GatewayResult<bool> {
  let parsed = PasswordHash::new(stored_hash).map_err(|e| {
    error!(error = %e, "Stored password hash is malformed.");
    GatewayError::message(format!("Invalid stored password hash: {}", e))
  })?;
  match Argon2::default().verify_password(provided.as_bytes(), &parsed) {
    Ok(()) => Ok(true),
    Err(argon2::password_hash::Error::Password) => {
      debug!("Password mismatch.");
      Ok(false)
    }
    Err(e) => Err(GatewayError::message(format!("Password verification failed: {}", e))),
  }
}

/// The signed-in session of this process plus the feed announcing changes to it.
pub struct SessionSlot {
  token_prefix: &'static str,
  current: RwLock<Option<AuthSession>>,
  events: broadcast::Sender<AuthEvent>,
}

impl SessionSlot {
  pub fn new(token_prefix: &'static str) -> Self {
    let (events, _) = broadcast::channel(32);
    Self {
      token_prefix,
      current: RwLock::new(None),
      events,
    }
  }

  pub fn current(&self) -> Option<AuthSession> {
    self.current.read().clone()
  }

  /// Replaces the active session and announces `SignedIn`.
  pub fn open(&self, identity: Identity) -> AuthSession {
    let session = AuthSession {
      identity,
      access_token: self.new_token(),
    };
    *self.current.write() = Some(session.clone());
    self.emit(AuthEventKind::SignedIn, Some(session.clone()));
    session
  }

  /// Ends the active session; `SignedOut` only goes out if there was one.
  pub fn close(&self) {
    let previous = self.current.write().take();
    if previous.is_some() {
      self.emit(AuthEventKind::SignedOut, None);
    }
  }

  /// Rotates the access token of the active session and announces it.
  pub fn refresh(&self) -> Option<AuthSession> {
    let refreshed = {
      let mut current = self.current.write();
      let session = current.as_mut()?;
      session.access_token = self.new_token();
      session.clone()
    }; // guard dropped
    self.emit(AuthEventKind::TokenRefreshed, Some(refreshed.clone()));
    Some(refreshed)
  }

  pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
    self.events.subscribe()
  }

  fn new_token(&self) -> String {
    format!("{}_{}", self.token_prefix, Uuid::new_v4().simple())
  }

  fn emit(&self, kind: AuthEventKind, session: Option<AuthSession>) {
    // Nobody listening is fine.
    let _ = self.events.send(AuthEvent { kind, session });
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::gateway::IdentityMetadata;

  fn identity() -> Identity {
    Identity {
      id: "u-1".into(),
      email: "asha@example.com".into(),
      user_metadata: IdentityMetadata::default(),
      app_metadata: IdentityMetadata::default(),
    }
  }

  #[test]
  fn hashes_verify_only_the_original_password() {
    let hash = hash_password("hunter22").unwrap();
    assert!(hash.starts_with("$argon2"));
    assert!(verify_password(&hash, "hunter22").unwrap());
    assert!(!verify_password(&hash, "hunter23").unwrap());
    assert!(verify_password("not-a-hash", "hunter22").is_err());
    assert!(hash_password("").is_err());
    assert!(check_password_strength("12345").is_err());
    assert!(check_password_strength("123456").is_ok());
  }

  #[test]
  fn slot_announces_open_refresh_and_close() {
    let slot = SessionSlot::new("test");
    let mut events = slot.subscribe();

    let opened = slot.open(identity());
    assert!(opened.access_token.starts_with("test_"));
    let refreshed = slot.refresh().unwrap();
    assert_ne!(refreshed.access_token, opened.access_token);
    slot.close();
    slot.close();
    assert!(slot.current().is_none());
    assert!(slot.refresh().is_none());

    let kinds: Vec<AuthEventKind> = std::iter::from_fn(|| events.try_recv().ok()).map(|e| e.kind).collect();
    assert_eq!(
      kinds,
      vec![AuthEventKind::SignedIn, AuthEventKind::TokenRefreshed, AuthEventKind::SignedOut]
    );
  }
}
