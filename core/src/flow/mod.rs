// core/src/flow/mod.rs

//! A small async step pipeline.
//!
//! A `Pipeline<TData, Err>` is an ordered list of named steps. Each step
//! carries `before`, `on` and `after` handlers that receive the shared
//! `ContextData<TData>` and return a `PipelineControl`. The checkout workflow
//! is expressed as one of these pipelines.

pub mod context_data;
pub mod control;
pub mod error;
pub mod step;

mod definition;
mod execution;
mod hooks;

pub use context_data::ContextData;
pub use control::{PipelineControl, PipelineResult};
pub use definition::{Handler, Pipeline};
pub use error::FlowError;
pub use step::{SkipCondition, StepDef};
