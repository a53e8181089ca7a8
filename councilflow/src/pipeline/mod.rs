//! Pipeline definitions and the orchestrator that executes them.

mod builder;
mod definition;
mod orchestrator;
mod retry;


pub use builder::PipelineBuilder;
pub use definition::{PipelineDefinition, StageBinding};
pub use orchestrator::{CancelHandle, Orchestrator, RunReport};
pub use retry::{BackoffStrategy, JitterStrategy, RetryPolicy};
