// core/src/gateway/auth_local.rs

//! A self-contained auth provider: argon2 password hashes in memory, one
//! active session, and a broadcast feed of session events.

use super::credentials::{
  already_registered, check_password_strength, hash_password, invalid_credentials, normalize_email, verify_password,
  SessionSlot,
};
use super::{AuthEvent, AuthProvider, AuthSession, GatewayResult, Identity, IdentityMetadata};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, instrument};
use uuid::Uuid;

/// Called with every identity created by `sign_up` or a first `register`.
pub type SignupHook = Arc<dyn Fn(&Identity) + Send + Sync>;

struct Account {
  identity: Identity,
  password_hash: String,
}

pub struct LocalAuthProvider {
  accounts: RwLock<HashMap<String, Account>>,
  slot: SessionSlot,
  signup_hook: RwLock<Option<SignupHook>>,
}

impl Default for LocalAuthProvider {
  fn default() -> Self {
    Self::new()
  }
}

impl LocalAuthProvider {
  pub fn new() -> Self {
    Self {
      accounts: RwLock::new(HashMap::new()),
      slot: SessionSlot::new("local"),
      signup_hook: RwLock::new(None),
    }
  }

  /// Runs `hook` for every new account, e.g. to create its profile row.
  pub fn set_signup_hook(&self, hook: SignupHook) {
    *self.signup_hook.write() = Some(hook);
  }

  /// Creates or refreshes an operator-managed account. `app_role` lands in
  /// operator metadata. An existing email keeps its id and gets the new
  /// password, name and role.
  pub fn register(&self, email: &str, password: &str, name: &str, app_role: Option<&str>) -> GatewayResult<Identity> {
    let email = normalize_email(email);
    let password_hash = hash_password(password)?;
    let (identity, created) = {
      let mut accounts = self.accounts.write();
      match accounts.get_mut(&email) {
        Some(account) => {
          account.password_hash = password_hash;
          account.identity.user_metadata.name = Some(name.to_string());
          account.identity.app_metadata.role = app_role.map(str::to_string);
          (account.identity.clone(), false)
        }
        None => {
          let identity = Identity {
            id: Uuid::new_v4().to_string(),
            email: email.clone(),
            user_metadata: IdentityMetadata {
              name: Some(name.to_string()),
              role: None,
            },
            app_metadata: IdentityMetadata {
              name: None,
              role: app_role.map(str::to_string),
            },
          };
          accounts.insert(
            email,
            Account {
              identity: identity.clone(),
              password_hash,
            },
          );
          (identity, true)
        }
      }
    }; // guard dropped
    if created {
      self.run_signup_hook(&identity);
    }
    Ok(identity)
  }

  /// Rotates the access token of the active session and announces it.
  pub fn refresh_token(&self) -> Option<AuthSession> {
    self.slot.refresh()
  }

  fn run_signup_hook(&self, identity: &Identity) {
    let hook = self.signup_hook.read().clone();
    if let Some(hook) = hook {
      hook(identity);
    }
  }
}

#[async_trait]
impl AuthProvider for LocalAuthProvider {
  async fn session(&self) -> GatewayResult<Option<AuthSession>> {
    Ok(self.slot.current())
  }

  #[instrument(skip(self, password), err(Display))]
  async fn sign_in(&self, email: &str, password: &str) -> GatewayResult<AuthSession> {
    let email = normalize_email(email);
    let (identity, stored_hash) = {
      let accounts = self.accounts.read();
      match accounts.get(&email) {
        Some(account) => (account.identity.clone(), account.password_hash.clone()),
        None => return Err(invalid_credentials()),
      }
    };
    if !verify_password(&stored_hash, password)? {
      return Err(invalid_credentials());
    }

    let session = self.slot.open(identity);
    info!(user_id = %session.identity.id, "Signed in.");
    Ok(session)
  }

  #[instrument(skip(self, password, metadata), err(Display))]
  async fn sign_up(&self, email: &str, password: &str, metadata: IdentityMetadata) -> GatewayResult<Identity> {
    check_password_strength(password)?;
    let password_hash = hash_password(password)?;
    let identity = Identity {
      id: Uuid::new_v4().to_string(),
      email: normalize_email(email),
      user_metadata: metadata,
      app_metadata: IdentityMetadata::default(),
    };
    {
      let mut accounts = self.accounts.write();
      if accounts.contains_key(&identity.email) {
        return Err(already_registered());
      }
      accounts.insert(
        identity.email.clone(),
        Account {
          identity: identity.clone(),
          password_hash,
        },
      );
    }
    self.run_signup_hook(&identity);

    // Accounts are confirmed immediately, so signup also opens a session.
    self.slot.open(identity.clone());
    Ok(identity)
  }

  async fn sign_out(&self) -> GatewayResult<()> {
    self.slot.close();
    Ok(())
  }

  fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
    self.slot.subscribe()
  }
}
