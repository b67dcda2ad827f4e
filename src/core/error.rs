//! Error types for workflow configuration and step execution

use serde::Serialize;
use thiserror::Error;

/// A workflow definition that cannot be turned into a runnable step list.
///
/// Configuration errors are reported before any Run is created.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse workflow: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Workflow has no steps")]
    EmptySteps,

    #[error("Workflow has no trigger (`on`) section")]
    NoTriggers,

    #[error("Workflow defines {0} jobs; only a single job is supported")]
    MultipleJobs(usize),

    #[error("Workflow defines both top-level steps and jobs")]
    StepsAndJobs,

    #[error("Duplicate step name: {0}")]
    DuplicateStep(String),

    #[error("Step {index} ({name}): {message}")]
    InvalidStep {
        index: usize,
        name: String,
        message: String,
    },

    #[error("Invalid branch pattern '{0}'")]
    BranchPattern(String),
}

/// Failure raised by a single step.
///
/// Whether the failure aborts the Run is decided by the step's
/// `continue_on_failure` flag, not by the variant.
#[derive(Debug, Clone, Error, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "detail")]
pub enum StepError {
    #[error("checkout failed: {0}")]
    Checkout(String),

    #[error("runtime provisioning failed: {0}")]
    Provisioning(String),

    #[error("dependency installation failed: {0}")]
    DependencyInstall(String),

    #[error("could not write environment: {0}")]
    EnvironmentWrite(String),

    #[error("test discovery: {0}")]
    TestDiscovery(String),

    #[error("{failed} failed and {errors} errored out of {total} test cases")]
    TestExecution {
        total: usize,
        failed: usize,
        errors: usize,
    },

    #[error("command exited with status {code}: {command}")]
    CommandFailed { command: String, code: i32 },

    #[error("step timed out after {0} seconds")]
    Timeout(u64),
}

impl StepError {
    /// Name of the error condition as it appears in run reports
    pub fn kind(&self) -> &'static str {
        match self {
            StepError::Checkout(_) => "CheckoutError",
            StepError::Provisioning(_) => "ProvisioningError",
            StepError::DependencyInstall(_) => "DependencyInstallWarning",
            StepError::EnvironmentWrite(_) => "EnvironmentWriteError",
            StepError::TestDiscovery(_) => "TestDiscoveryError",
            StepError::TestExecution { .. } => "TestExecutionFailure",
            StepError::CommandFailed { .. } => "CommandFailed",
            StepError::Timeout(_) => "StepTimeout",
        }
    }
}

/// Error preventing a Run from being created or started
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to create run workspace: {0}")]
    Workspace(#[from] std::io::Error),
}
