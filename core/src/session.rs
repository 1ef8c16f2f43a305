// core/src/session.rs

//! Who is signed in. Resolves the auth identity into a `User` by way of the
//! `profiles` row, falling back to identity metadata when the row is slow,
//! missing or unreadable.

use crate::boundary::ProfileRow;
use crate::config::StoreConfig;
use crate::error::{GatewayError, Result, StoreError};
use crate::gateway::{AuthEvent, AuthEventKind, AuthProvider, Identity, IdentityMetadata, PersistenceGateway};
use crate::model::{User, UserRole};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

pub const ADMIN_ONLY_MESSAGE: &str = "Unauthorized: This area is for Admins only.";

/// Maps raw auth-provider messages to what the login form shows.
pub fn friendly_auth_message(raw: &str) -> String {
  if raw.contains("Database error saving new user") {
    "System Setup: Database tables are missing. Run SQL script.".to_string()
  } else if raw.contains("Invalid login credentials") {
    "Invalid email or password. Please try again.".to_string()
  } else if raw.to_ascii_lowercase().contains("email not confirmed") {
    "Please verify your email address.".to_string()
  } else if raw.is_empty() {
    "An error occurred during authentication".to_string()
  } else {
    raw.to_string()
  }
}

fn auth_error(err: GatewayError) -> StoreError {
  StoreError::Auth(friendly_auth_message(&err.message))
}

/// The user derived from identity metadata alone.
pub fn user_from_identity(identity: &Identity) -> User {
  let name = identity
    .user_metadata
    .name
    .clone()
    .filter(|n| !n.trim().is_empty())
    .unwrap_or_else(|| email_local_part(&identity.email));
  let role = [&identity.app_metadata.role, &identity.user_metadata.role]
    .into_iter()
    .flatten()
    .find_map(|raw| raw.parse::<UserRole>().ok())
    .unwrap_or_default();
  User {
    id: identity.id.clone(),
    email: identity.email.clone(),
    name,
    role,
  }
}

/// The user derived from a profile row, with metadata filling the gaps.
pub fn user_from_profile(identity: &Identity, profile: &ProfileRow) -> User {
  let fallback = user_from_identity(identity);
  User {
    id: identity.id.clone(),
    email: profile
      .email
      .clone()
      .filter(|e| !e.is_empty())
      .unwrap_or(fallback.email),
    name: profile
      .full_name
      .clone()
      .filter(|n| !n.trim().is_empty())
      .unwrap_or(fallback.name),
    role: profile
      .role
      .as_deref()
      .and_then(|r| r.parse::<UserRole>().ok())
      .unwrap_or(fallback.role),
  }
}

fn email_local_part(email: &str) -> String {
  email.split('@').next().unwrap_or_default().to_string()
}

#[derive(Debug)]
struct SessionState {
  user: Option<User>,
  loading: bool,
}

pub struct SessionManager {
  auth: Arc<dyn AuthProvider>,
  db: Arc<dyn PersistenceGateway>,
  profile_timeout: Duration,
  state: RwLock<SessionState>,
}

impl SessionManager {
  pub fn new(auth: Arc<dyn AuthProvider>, db: Arc<dyn PersistenceGateway>, config: &StoreConfig) -> Self {
    Self {
      auth,
      db,
      profile_timeout: config.profile_timeout,
      state: RwLock::new(SessionState {
        user: None,
        loading: true,
      }),
    }
  }

  pub fn user(&self) -> Option<User> {
    self.state.read().user.clone()
  }

  pub fn is_authenticated(&self) -> bool {
    self.state.read().user.is_some()
  }

  pub fn is_admin(&self) -> bool {
    self.state.read().user.as_ref().is_some_and(User::is_admin)
  }

  pub fn is_loading(&self) -> bool {
    self.state.read().loading
  }

  fn set_user(&self, user: Option<User>) {
    let mut state = self.state.write();
    state.user = user;
    state.loading = false;
  }

  /// Resolves the session present at startup.
  pub async fn init(&self) -> Option<User> {
    let user = self.current_user().await;
    self.set_user(user.clone());
    user
  }

  /// The user behind the provider's current session, if any. Never fails once a session exists.
  pub async fn current_user(&self) -> Option<User> {
    match self.auth.session().await {
      Ok(Some(session)) => Some(self.resolve_profile(&session.identity).await),
      Ok(None) => None,
      Err(e) => {
        warn!(error = %e, "Could not read the auth session.");
        None
      }
    }
  }

  /// Reads the profile row within the configured timeout.
  async fn fetch_profile(&self, user_id: &str) -> Option<ProfileRow> {
    match tokio::time::timeout(self.profile_timeout, self.db.fetch_profile(user_id)).await {
      Ok(Ok(Some(profile))) => Some(profile),
      Ok(Ok(None)) => {
        debug!(%user_id, "No profile row yet.");
        None
      }
      Ok(Err(e)) => {
        warn!(%user_id, error = %e, "Profile fetch failed, using identity metadata.");
        None
      }
      Err(_) => {
        warn!(%user_id, timeout_ms = self.profile_timeout.as_millis() as u64, "Profile fetch timed out, using identity metadata.");
        None
      }
    }
  }

  pub async fn resolve_profile(&self, identity: &Identity) -> User {
    match self.fetch_profile(&identity.id).await {
      Some(profile) => user_from_profile(identity, &profile),
      None => user_from_identity(identity),
    }
  }

  /// Signs in and resolves the profile before returning, so the caller sees the right role.
  #[instrument(skip(self, password), err(Display))]
  pub async fn login(&self, email: &str, password: &str) -> Result<User> {
    let session = self.auth.sign_in(email, password).await.map_err(auth_error)?;
    let user = self.resolve_profile(&session.identity).await;
    info!(user_id = %user.id, role = %user.role, "User logged in.");
    self.set_user(Some(user.clone()));
    Ok(user)
  }

  /// Login for the admin area. Only a profile row carrying the admin role is accepted.
  #[instrument(skip(self, password), err(Display))]
  pub async fn login_as_admin(&self, email: &str, password: &str) -> Result<User> {
    let user = self.login(email, password).await?;
    let profile_role = self
      .fetch_profile(&user.id)
      .await
      .and_then(|p| p.role)
      .and_then(|r| r.parse::<UserRole>().ok());
    if profile_role != Some(UserRole::Admin) {
      warn!(user_id = %user.id, "Non-admin attempted admin login.");
      self.logout().await;
      return Err(StoreError::Auth(ADMIN_ONLY_MESSAGE.to_string()));
    }
    Ok(user)
  }

  /// Creates the identity with `{name, role}` metadata. The profile row is the backend's job.
  #[instrument(skip(self, password), err(Display))]
  pub async fn signup(&self, email: &str, password: &str, name: &str, role: UserRole) -> Result<()> {
    if email.trim().is_empty() || !email.contains('@') {
      return Err(StoreError::Validation("Please enter a valid email address".to_string()));
    }
    if name.trim().is_empty() {
      return Err(StoreError::Validation("Name is required".to_string()));
    }
    let metadata = IdentityMetadata {
      name: Some(name.trim().to_string()),
      role: Some(role.as_str().to_string()),
    };
    self.auth.sign_up(email, password, metadata).await.map_err(auth_error)?;
    Ok(())
  }

  pub async fn logout(&self) {
    if let Err(e) = self.auth.sign_out().await {
      warn!(error = %e, "Sign-out failed; clearing the local session anyway.");
    }
    self.set_user(None);
  }

  pub async fn handle_event(&self, event: AuthEvent) {
    match (event.kind, event.session) {
      (AuthEventKind::SignedOut, _) => {
        debug!("Session ended.");
        self.set_user(None);
      }
      (
        AuthEventKind::SignedIn
        | AuthEventKind::TokenRefreshed
        | AuthEventKind::InitialSession
        | AuthEventKind::UserUpdated,
        Some(session),
      ) => {
        let user = self.resolve_profile(&session.identity).await;
        self.set_user(Some(user));
      }
      // Only a sign-out ends the session.
      (kind, None) => debug!(?kind, "Session event without a session, keeping the current user."),
    }
  }

  /// Follows the provider's session events until the feed closes.
  pub fn spawn_auth_listener(self: &Arc<Self>) -> JoinHandle<()> {
    let mut events = self.auth.subscribe();
    let manager = Arc::clone(self);
    tokio::spawn(async move {
      loop {
        match events.recv().await {
          Ok(event) => manager.handle_event(event).await,
          Err(RecvError::Lagged(skipped)) => {
            warn!(skipped, "Auth events lagged, re-reading the session.");
            let user = manager.current_user().await;
            manager.set_user(user);
          }
          Err(RecvError::Closed) => break,
        }
      }
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn identity(user_role: Option<&str>, app_role: Option<&str>, name: Option<&str>) -> Identity {
    Identity {
      id: "u-1".into(),
      email: "karan.mehta@example.com".into(),
      user_metadata: IdentityMetadata {
        name: name.map(str::to_string),
        role: user_role.map(str::to_string),
      },
      app_metadata: IdentityMetadata {
        name: None,
        role: app_role.map(str::to_string),
      },
    }
  }

  #[test]
  fn metadata_fallback_order() {
    let user = user_from_identity(&identity(Some("CUSTOMER"), Some("ADMIN"), None));
    assert_eq!(user.role, UserRole::Admin);
    assert_eq!(user.name, "karan.mehta");

    let user = user_from_identity(&identity(Some("ADMIN"), None, Some("Karan")));
    assert_eq!(user.role, UserRole::Admin);
    assert_eq!(user.name, "Karan");

    assert_eq!(user_from_identity(&identity(None, None, None)).role, UserRole::Customer);
  }

  #[test]
  fn profile_wins_over_metadata() {
    let profile = ProfileRow {
      id: "u-1".into(),
      email: None,
      full_name: Some("Karan Mehta".into()),
      role: Some("ADMIN".into()),
    };
    let user = user_from_profile(&identity(Some("CUSTOMER"), None, Some("K")), &profile);
    assert_eq!(user.name, "Karan Mehta");
    assert_eq!(user.role, UserRole::Admin);
    assert_eq!(user.email, "karan.mehta@example.com");
  }

  #[test]
  fn login_messages_are_translated() {
    assert_eq!(
      friendly_auth_message("Invalid login credentials"),
      "Invalid email or password. Please try again."
    );
    assert_eq!(friendly_auth_message("Email not confirmed"), "Please verify your email address.");
    assert_eq!(friendly_auth_message("rate limited"), "rate limited");
  }
}
