// core/src/flow/definition.rs

//! The `Pipeline<TData, Err>` struct and its structural operations.

use super::context_data::ContextData;
use super::control::PipelineControl;
use super::error::FlowError;
use super::step::{SkipCondition, StepDef};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

/// A boxed async handler operating on the pipeline's root context.
pub type Handler<TData, Err> = Box<
  dyn Fn(ContextData<TData>) -> Pin<Box<dyn Future<Output = Result<PipelineControl, Err>> + Send>>
    + Send
    + Sync,
>;

/// An ordered list of named steps with their handlers.
///
/// `Err` is whatever the handlers return; it must absorb `FlowError` so the
/// engine can report configuration problems through the same channel.
pub struct Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  pub(crate) steps: Vec<StepDef<TData>>,
  pub(crate) before: HashMap<String, Vec<Handler<TData, Err>>>,
  pub(crate) on: HashMap<String, Vec<Handler<TData, Err>>>,
  pub(crate) after: HashMap<String, Vec<Handler<TData, Err>>>,
}

impl<TData, Err> Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  /// Creates a pipeline from `(name, optional, skip_if)` triples.
  pub fn new(step_defs: &[(&str, bool, Option<SkipCondition<TData>>)]) -> Self {
    let steps = step_defs
      .iter()
      .map(|(name, optional, skip_if)| StepDef::new(*name, *optional, skip_if.clone()))
      .collect();

    Self {
      steps,
      before: HashMap::new(),
      on: HashMap::new(),
      after: HashMap::new(),
    }
  }

  /// Panics on an unknown step name. This is a wiring mistake, not a runtime condition.
  pub(crate) fn ensure_step_exists(&self, step_name: &str) {
    if !self.has_step(step_name) {
      panic!("pipeline setup error: step '{}' not found", step_name);
    }
  }

  pub fn has_step(&self, step_name: &str) -> bool {
    self.steps.iter().any(|s| s.name == step_name)
  }

  pub fn step_names(&self) -> Vec<&str> {
    self.steps.iter().map(|s| s.name.as_str()).collect()
  }

  pub fn insert_after_step<S: Into<String>>(
    &mut self,
    existing_step_name: &str,
    new_step_name: S,
    optional: bool,
    skip_if: Option<SkipCondition<TData>>,
  ) -> Result<(), FlowError> {
    let idx = self
      .steps
      .iter()
      .position(|s| s.name == existing_step_name)
      .ok_or_else(|| FlowError::StepNotFound {
        step_name: existing_step_name.to_string(),
      })?;
    let name: String = new_step_name.into();
    if self.has_step(&name) {
      return Err(FlowError::DuplicateStep { step_name: name });
    }
    self.steps.insert(idx + 1, StepDef::new(name, optional, skip_if));
    Ok(())
  }

  pub fn set_skip_condition(&mut self, step_name: &str, skip_if: Option<SkipCondition<TData>>) -> Result<(), FlowError> {
    let step = self
      .steps
      .iter_mut()
      .find(|s| s.name == step_name)
      .ok_or_else(|| FlowError::StepNotFound {
        step_name: step_name.to_string(),
      })?;
    step.skip_if = skip_if;
    Ok(())
  }
}
