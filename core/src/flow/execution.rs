// core/src/flow/execution.rs

//! `Pipeline::run()`.

use super::context_data::ContextData;
use super::control::{PipelineControl, PipelineResult};
use super::definition::{Handler, Pipeline};
use super::error::FlowError;
use tracing::{event, instrument, span, Instrument, Level};

/// What happened while running the handlers of one phase.
enum PhaseOutcome<Err> {
  Continue,
  Stopped,
  Failed(Err),
}

impl<TData, Err> Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  /// Executes every step in order against `ctx_data`.
  ///
  /// A handler error on a non-optional step aborts the run and is returned.
  /// On an optional step the error is logged and the run moves on to the next step.
  #[instrument(
    name = "Pipeline::run",
    skip_all,
    fields(
      context_type = %std::any::type_name::<TData>(),
      num_steps = self.steps.len(),
    ),
    err(Display)
  )]
  pub async fn run(&self, ctx_data: ContextData<TData>) -> Result<PipelineResult, Err> {
    event!(Level::DEBUG, "Pipeline execution starting.");

    for (step_idx, step_def) in self.steps.iter().enumerate() {
      let step_name = step_def.name.as_str();
      let step_span = span!(
        Level::INFO,
        "pipeline_step",
        step_name = step_name,
        step_index = step_idx,
        optional = step_def.optional
      );

      if step_def.is_skipped(&ctx_data) {
        event!(parent: &step_span, Level::INFO, "Step skipped by its skip condition.");
        continue;
      }

      let has_handlers = [&self.before, &self.on, &self.after]
        .iter()
        .any(|phase| phase.get(step_name).is_some_and(|v| !v.is_empty()));

      if !has_handlers {
        if step_def.optional {
          event!(parent: &step_span, Level::DEBUG, "Optional step has no handlers, skipping.");
          continue;
        }
        event!(parent: &step_span, Level::ERROR, "Non-optional step has no handlers.");
        return Err(Err::from(FlowError::HandlerMissing {
          step_name: step_def.name.clone(),
        }));
      }

      for (phase_name, phase) in [("before", &self.before), ("on", &self.on), ("after", &self.after)] {
        let Some(handlers) = phase.get(step_name) else {
          continue;
        };
        let outcome = run_phase(handlers, &ctx_data, phase_name)
          .instrument(step_span.clone())
          .await;

        match outcome {
          PhaseOutcome::Continue => {}
          PhaseOutcome::Stopped => {
            event!(parent: &step_span, Level::INFO, phase = phase_name, "Pipeline stopped by a handler.");
            return Ok(PipelineResult::Stopped);
          }
          PhaseOutcome::Failed(e) if step_def.optional => {
            event!(
              parent: &step_span,
              Level::WARN,
              phase = phase_name,
              error = %e,
              "Optional step failed, continuing."
            );
            break;
          }
          PhaseOutcome::Failed(e) => {
            event!(parent: &step_span, Level::ERROR, phase = phase_name, error = %e, "Handler failed.");
            return Err(e);
          }
        }
      }
    }

    event!(Level::DEBUG, "Pipeline execution completed.");
    Ok(PipelineResult::Completed)
  }
}

async fn run_phase<TData, Err>(
  handlers: &[Handler<TData, Err>],
  ctx_data: &ContextData<TData>,
  phase_name: &'static str,
) -> PhaseOutcome<Err>
where
  TData: 'static + Send + Sync,
{
  for (handler_idx, handler_fn) in handlers.iter().enumerate() {
    let handler_span = span!(Level::DEBUG, "handler", phase = phase_name, handler_index = handler_idx);
    match handler_fn(ctx_data.clone()).instrument(handler_span).await {
      Ok(PipelineControl::Continue) => {}
      Ok(PipelineControl::Stop) => return PhaseOutcome::Stopped,
      Err(e) => return PhaseOutcome::Failed(e),
    }
  }
  PhaseOutcome::Continue
}
