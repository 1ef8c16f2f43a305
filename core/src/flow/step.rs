// core/src/flow/step.rs

//! One named slot in a pipeline.

use super::ContextData;
use std::fmt;
use std::sync::Arc;

/// Evaluated right before a step runs; `true` skips the step.
pub type SkipCondition<TData> = Arc<dyn Fn(ContextData<TData>) -> bool + Send + Sync + 'static>;

#[derive(Clone)]
pub struct StepDef<T: 'static + Send + Sync> {
  pub name: String,
  /// Optional steps may have no handlers, and their handler errors are logged
  /// and swallowed instead of failing the run.
  pub optional: bool,
  pub skip_if: Option<SkipCondition<T>>,
}

impl<T: 'static + Send + Sync> StepDef<T> {
  pub fn new(name: impl Into<String>, optional: bool, skip_if: Option<SkipCondition<T>>) -> Self {
    Self {
      name: name.into(),
      optional,
      skip_if,
    }
  }

  pub fn is_skipped(&self, ctx: &ContextData<T>) -> bool {
    self.skip_if.as_ref().is_some_and(|skip| skip(ctx.clone()))
  }
}

// Renders as `StepDef(precreate_order, optional, conditional)`.
impl<T: 'static + Send + Sync> fmt::Debug for StepDef<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let kind = if self.optional { "optional" } else { "required" };
    write!(f, "StepDef({}, {}", self.name, kind)?;
    if self.skip_if.is_some() {
      f.write_str(", conditional")?;
    }
    f.write_str(")")
  }
}
