// app/src/errors.rs

use storefront::{GatewayError, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Database Error: {0}")]
  Sqlx(#[from] sqlx::Error),

  #[error("{source}")]
  Store {
    #[from]
    source: StoreError,
  },

  #[error("I/O Error: {0}")]
  Io(#[from] std::io::Error),

  #[error("Internal Error: {0}")]
  Internal(String),
}

impl From<anyhow::Error> for AppError {
  fn from(err: anyhow::Error) -> Self {
    let err = match err.downcast::<StoreError>() {
      Ok(store_err) => return AppError::Store { source: store_err },
      Err(other) => other,
    };
    match err.downcast::<sqlx::Error>() {
      Ok(db_err) => AppError::Sqlx(db_err),
      Err(other) => AppError::Internal(format!("{:#}", other)),
    }
  }
}

/// Maps a driver error onto the gateway error the stores classify.
///
/// Database errors keep their SQLSTATE so missing tables and foreign-key
/// violations are recognised upstream.
pub fn gateway_error(err: sqlx::Error) -> GatewayError {
  match &err {
    sqlx::Error::Database(db_err) => GatewayError::new(db_err.code().as_deref(), db_err.message()),
    sqlx::Error::RowNotFound => GatewayError::message("No rows returned"),
    _ => GatewayError::message(err.to_string()),
  }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;
