//! Run status and step outcomes

use crate::core::{error::StepError, report::TestReport};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Overall run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Run created, no step started
    Pending,
    /// A step is executing
    Running,
    /// Every step succeeded or failed tolerably
    Succeeded,
    /// A step failed fatally
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Succeeded | RunStatus::Failed)
    }
}

/// Tagged result of one step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    Success,
    /// Logged; the Run continues
    ToleratedFailure(StepError),
    /// Aborts the Run
    FatalFailure(StepError),
}

impl StepOutcome {
    /// Fold a step result with the step's failure tolerance
    pub fn from_result(result: Result<(), StepError>, continue_on_failure: bool) -> Self {
        match result {
            Ok(()) => StepOutcome::Success,
            Err(error) if continue_on_failure => StepOutcome::ToleratedFailure(error),
            Err(error) => StepOutcome::FatalFailure(error),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, StepOutcome::FatalFailure(_))
    }

    pub fn error(&self) -> Option<&StepError> {
        match self {
            StepOutcome::Success => None,
            StepOutcome::ToleratedFailure(error) | StepOutcome::FatalFailure(error) => Some(error),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StepOutcome::Success => "success",
            StepOutcome::ToleratedFailure(_) => "tolerated failure",
            StepOutcome::FatalFailure(_) => "fatal failure",
        }
    }
}

/// Final status of a run from its step outcomes.
///
/// Succeeded iff no outcome is fatal.
pub fn fold_status<'a, I>(outcomes: I) -> RunStatus
where
    I: IntoIterator<Item = &'a StepOutcome>,
{
    if outcomes.into_iter().any(StepOutcome::is_fatal) {
        RunStatus::Failed
    } else {
        RunStatus::Succeeded
    }
}

/// Record of one executed step
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub name: String,
    pub action: String,
    pub outcome: StepOutcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// Aggregated counts for test steps
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_report: Option<TestReport>,
}
