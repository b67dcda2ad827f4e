//! Run execution

pub mod discovery;
pub mod engine;
pub mod executor;

pub use engine::{EventHandler, ExecutionEvent, PipelineRunner};
pub use executor::{StepExecution, StepExecutor};
