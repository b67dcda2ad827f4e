//! workflow-runner - a linear CI workflow runner

pub mod cli;
pub mod core;
pub mod execution;
pub mod host;

// Re-export commonly used types
pub use core::{
    RunResult, RunStatus, Step, StepAction, StepError, StepOutcome, TriggerEvent, Workflow,
};
pub use execution::{ExecutionEvent, PipelineRunner};
pub use host::{HostConfig, HostExecutor, ProcessHost};
