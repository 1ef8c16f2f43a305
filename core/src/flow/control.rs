// core/src/flow/control.rs

//! Signals for controlling pipeline flow and the outcome of a run.

/// Returned by a handler to say whether the pipeline should keep going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineControl {
  Continue,
  /// Halt immediately. No further handlers in this step or later steps run.
  Stop,
}

/// Outcome of a full pipeline execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineResult {
  /// Every non-skipped step ran to the end.
  Completed,
  /// A handler returned `PipelineControl::Stop`.
  Stopped,
}
