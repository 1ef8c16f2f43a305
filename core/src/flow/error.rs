// core/src/flow/error.rs
use thiserror::Error;

/// Errors raised by the pipeline machinery itself, as opposed to its handlers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FlowError {
  #[error("Step not found: {step_name}")]
  StepNotFound { step_name: String },

  #[error("Handler missing for non-optional step: {step_name}")]
  HandlerMissing { step_name: String },

  #[error("Step '{step_name}' already exists")]
  DuplicateStep { step_name: String },
}
