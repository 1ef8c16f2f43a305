// app/src/pg_auth.rs

//! Accounts kept in the `users` table. Creating an account writes its
//! profile row in the same transaction.

use crate::errors::gateway_error;
use async_trait::async_trait;
use sqlx::postgres::{PgConnection, PgPool, PgRow};
use sqlx::Row;
use storefront::boundary::ProfileRow;
use storefront::gateway::credentials::{
  already_registered, check_password_strength, hash_password, invalid_credentials, normalize_email, verify_password,
};
use storefront::gateway::{AuthEvent, AuthProvider, AuthSession, GatewayResult, Identity, IdentityMetadata, SessionSlot};
use storefront::GatewayError;
use tokio::sync::broadcast;
use tracing::{info, instrument};
use uuid::Uuid;

const UNIQUE_VIOLATION: &str = "23505";

const IDENTITY_COLUMNS: &str = "id, email, full_name, user_role, app_role";

pub struct PgAuthProvider {
  pool: PgPool,
  slot: SessionSlot,
}

impl PgAuthProvider {
  pub fn new(pool: PgPool) -> Self {
    Self {
      pool,
      slot: SessionSlot::new("pg"),
    }
  }

  /// Creates or refreshes an operator-managed account, keyed by email. A
  /// second call keeps the id and replaces password, name and role.
  #[instrument(skip(self, password), err(Display))]
  pub async fn ensure_account(
    &self,
    email: &str,
    password: &str,
    name: &str,
    app_role: Option<&str>,
  ) -> GatewayResult<Identity> {
    let password_hash = hash_password(password)?;
    let mut tx = self.pool.begin().await.map_err(gateway_error)?;
    let row = sqlx::query(&format!(
      "INSERT INTO users (id, email, password_hash, full_name, app_role) VALUES ($1, $2, $3, $4, $5) \
       ON CONFLICT (email) DO UPDATE SET password_hash = EXCLUDED.password_hash, full_name = EXCLUDED.full_name, \
         app_role = EXCLUDED.app_role, updated_at = now() \
       RETURNING {}",
      IDENTITY_COLUMNS
    ))
    .bind(Uuid::new_v4().to_string())
    .bind(normalize_email(email))
    .bind(&password_hash)
    .bind(name)
    .bind(app_role)
    .fetch_one(&mut *tx)
    .await
    .map_err(gateway_error)?;
    let identity = identity_from_row(&row).map_err(gateway_error)?;

    write_profile(&mut *tx, &crate::profile_for(&identity))
      .await
      .map_err(gateway_error)?;
    tx.commit().await.map_err(gateway_error)?;
    info!(user_id = %identity.id, "Account ensured.");
    Ok(identity)
  }
}

#[async_trait]
impl AuthProvider for PgAuthProvider {
  async fn session(&self) -> GatewayResult<Option<AuthSession>> {
    Ok(self.slot.current())
  }

  #[instrument(skip(self, password), err(Display))]
  async fn sign_in(&self, email: &str, password: &str) -> GatewayResult<AuthSession> {
    let row = sqlx::query(&format!(
      "SELECT {}, password_hash FROM users WHERE email = $1",
      IDENTITY_COLUMNS
    ))
    .bind(normalize_email(email))
    .fetch_optional(&self.pool)
    .await
    .map_err(gateway_error)?;
    let Some(row) = row else {
      return Err(invalid_credentials());
    };
    let stored_hash: String = row.try_get("password_hash").map_err(gateway_error)?;
    if !verify_password(&stored_hash, password)? {
      return Err(invalid_credentials());
    }

    let identity = identity_from_row(&row).map_err(gateway_error)?;
    let session = self.slot.open(identity);
    info!(user_id = %session.identity.id, "Signed in.");
    Ok(session)
  }

  #[instrument(skip(self, password, metadata), err(Display))]
  async fn sign_up(&self, email: &str, password: &str, metadata: IdentityMetadata) -> GatewayResult<Identity> {
    check_password_strength(password)?;
    let password_hash = hash_password(password)?;
    let mut tx = self.pool.begin().await.map_err(gateway_error)?;
    let row = sqlx::query(&format!(
      "INSERT INTO users (id, email, password_hash, full_name, user_role) VALUES ($1, $2, $3, $4, $5) RETURNING {}",
      IDENTITY_COLUMNS
    ))
    .bind(Uuid::new_v4().to_string())
    .bind(normalize_email(email))
    .bind(&password_hash)
    .bind(&metadata.name)
    .bind(&metadata.role)
    .fetch_one(&mut *tx)
    .await
    .map_err(signup_error)?;
    let identity = identity_from_row(&row).map_err(gateway_error)?;

    write_profile(&mut *tx, &crate::profile_for(&identity))
      .await
      .map_err(gateway_error)?;
    tx.commit().await.map_err(gateway_error)?;

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

fn signup_error(err: sqlx::Error) -> GatewayError {
  let err = gateway_error(err);
  if err.code.as_deref() == Some(UNIQUE_VIOLATION) {
    already_registered()
  } else {
    err
  }
}

fn identity_from_row(row: &PgRow) -> std::result::Result<Identity, sqlx::Error> {
  Ok(Identity {
    id: row.try_get("id")?,
    email: row.try_get("email")?,
    user_metadata: IdentityMetadata {
      name: row.try_get("full_name")?,
      role: row.try_get("user_role")?,
    },
    app_metadata: IdentityMetadata {
      name: None,
      role: row.try_get("app_role")?,
    },
  })
}

async fn write_profile(conn: &mut PgConnection, row: &ProfileRow) -> std::result::Result<(), sqlx::Error> {
  sqlx::query(
    "INSERT INTO profiles (id, email, full_name, role) VALUES ($1, $2, $3, COALESCE($4, 'CUSTOMER')) \
     ON CONFLICT (id) DO UPDATE SET email = EXCLUDED.email, full_name = EXCLUDED.full_name, role = EXCLUDED.role",
  )
  .bind(&row.id)
  .bind(&row.email)
  .bind(&row.full_name)
  .bind(&row.role)
  .execute(conn)
  .await?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use serial_test::serial;
  use storefront::diagnostics::SETUP_SQL;

  /// Runs only when `TEST_DATABASE_URL` points at a scratch database.
  async fn test_pool() -> Option<PgPool> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;
    let pool = PgPool::connect(&url).await.ok()?;
    sqlx::raw_sql(SETUP_SQL).execute(&pool).await.ok()?;
    Some(pool)
  }

  #[test]
  fn other_signup_failures_pass_through() {
    let err = signup_error(sqlx::Error::RowNotFound);
    assert_eq!(err.code, None);
    assert_eq!(err.message, "No rows returned");
  }

  #[tokio::test]
  #[serial]
  async fn accounts_round_trip_through_postgres() {
    let Some(pool) = test_pool().await else {
      return;
    };
    let auth = PgAuthProvider::new(pool.clone());
    let email = format!("ops-{}@ansartools.test", Uuid::new_v4().simple());

    let first = auth.ensure_account(&email, "old-pass-1", "Ops", Some("ADMIN")).await.unwrap();
    let second = auth
      .ensure_account(&email.to_uppercase(), "new-pass-1", "Store Admin", Some("ADMIN"))
      .await
      .unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(second.user_metadata.name.as_deref(), Some("Store Admin"));

    assert!(auth.sign_in(&email, "old-pass-1").await.is_err());
    let session = auth.sign_in(&email, "new-pass-1").await.unwrap();
    assert_eq!(session.identity.app_metadata.role.as_deref(), Some("ADMIN"));

    let role: String = sqlx::query_scalar("SELECT role FROM profiles WHERE id = $1")
      .bind(&first.id)
      .fetch_one(&pool)
      .await
      .unwrap();
    assert_eq!(role, "ADMIN");

    let err = auth
      .sign_up(&email, "another-pass", IdentityMetadata::default())
      .await
      .unwrap_err();
    assert_eq!(err.code.as_deref(), Some("user_already_exists"));

    sqlx::query("DELETE FROM profiles WHERE id = $1").bind(&first.id).execute(&pool).await.unwrap();
    sqlx::query("DELETE FROM users WHERE id = $1").bind(&first.id).execute(&pool).await.unwrap();
  }
}
