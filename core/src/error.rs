// core/src/error.rs
use crate::diagnostics::SETUP_SQL;
use crate::flow::FlowError;
use thiserror::Error;

/// Postgres code for an undefined table.
pub const UNDEFINED_TABLE: &str = "42P01";
/// Postgres code for a foreign-key violation.
pub const FOREIGN_KEY_VIOLATION: &str = "23503";

/// A failure reported by one of the external collaborators (database, auth, storage, payments).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct GatewayError {
  pub code: Option<String>,
  pub message: String,
}

impl GatewayError {
  pub fn new(code: Option<&str>, message: impl Into<String>) -> Self {
    Self {
      code: code.map(str::to_string),
      message: message.into(),
    }
  }

  pub fn message(message: impl Into<String>) -> Self {
    Self::new(None, message)
  }

  /// The backing table has not been created yet.
  pub fn is_table_missing(&self) -> bool {
    if self.code.as_deref() == Some(UNDEFINED_TABLE) {
      return true;
    }
    let msg = self.message.as_str();
    msg.contains("Could not find the table")
      || msg.contains("schema cache")
      || (msg.contains("relation") && msg.contains("does not exist"))
  }

  pub fn is_foreign_key_violation(&self) -> bool {
    self.code.as_deref() == Some(FOREIGN_KEY_VIOLATION)
  }
}

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("{0}")]
  Validation(String),

  #[error("{0}")]
  Auth(String),

  #[error("Not found: {0}")]
  NotFound(String),

  #[error("{0}")]
  PermissionDenied(String),

  #[error("Cannot delete: Product is part of an existing order history.")]
  ReferencedByOrders,

  #[error("Database setup required: table '{table}' is missing")]
  SetupRequired { table: String, script: &'static str },

  #[error("Payment failed: {description}")]
  Payment { description: String },

  #[error("Payment method '{0}' is not accepted")]
  PaymentMethodUnsupported(String),

  #[error("Gateway error: {0}")]
  Gateway(#[from] GatewayError),

  #[error("Cache error: {0}")]
  Cache(String),

  #[error("Configuration error: {0}")]
  Config(String),

  #[error("Workflow error: {0}")]
  Workflow(#[from] FlowError),

  #[error("Internal error: {0}")]
  Internal(String),
}

impl StoreError {
  /// Maps a gateway failure on `table` to the most specific variant.
  pub fn classify(table: &str, err: GatewayError) -> Self {
    if err.is_table_missing() {
      StoreError::SetupRequired {
        table: table.to_string(),
        script: SETUP_SQL,
      }
    } else if err.is_foreign_key_violation() {
      StoreError::ReferencedByOrders
    } else {
      StoreError::Gateway(err)
    }
  }

  /// The text shown to the shopper or admin.
  pub fn user_message(&self) -> String {
    match self {
      StoreError::Gateway(e) => e.message.clone(),
      StoreError::Payment { description } => description.clone(),
      StoreError::SetupRequired { table, .. } => {
        format!("Database setup required. The '{}' table is missing; run the setup script.", table)
      }
      other => other.to_string(),
    }
  }

  /// The setup script attached to a missing-table error, if any.
  pub fn setup_script(&self) -> Option<&'static str> {
    match self {
      StoreError::SetupRequired { script, .. } => Some(script),
      _ => None,
    }
  }
}

impl From<anyhow::Error> for StoreError {
  fn from(err: anyhow::Error) -> Self {
    match err.downcast::<StoreError>() {
      Ok(store_err) => store_err,
      Err(other) => StoreError::Internal(format!("{:#}", other)),
    }
  }
}

impl From<serde_json::Error> for StoreError {
  fn from(err: serde_json::Error) -> Self {
    StoreError::Cache(err.to_string())
  }
}

pub type Result<T, E = StoreError> = std::result::Result<T, E>;
