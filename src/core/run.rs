//! Run lifecycle state and the final run result

use crate::core::{
    context::EnvEntry,
    error::StepError,
    report::TestReport,
    state::{RunStatus, StepOutcome, StepRecord},
    trigger::TriggerEvent,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Lifecycle state of one Run
#[derive(Debug, Clone, Serialize)]
pub struct RunState {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub total_steps: usize,
    pub completed_steps: usize,
}

impl RunState {
    pub fn new(total_steps: usize) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            status: RunStatus::Pending,
            started_at: None,
            finished_at: None,
            total_steps,
            completed_steps: 0,
        }
    }

    /// pending -> running
    pub fn start(&mut self) {
        self.status = RunStatus::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn step_finished(&mut self) {
        self.completed_steps += 1;
    }

    /// running -> succeeded | failed
    pub fn finish(&mut self, status: RunStatus) {
        debug_assert!(status.is_terminal());
        self.status = status;
        self.finished_at = Some(Utc::now());
    }

    /// Fraction of steps that ran (0.0 to 1.0)
    pub fn progress(&self) -> f64 {
        if self.total_steps == 0 {
            return 0.0;
        }
        self.completed_steps as f64 / self.total_steps as f64
    }
}

/// A warning recorded during a Run; never affects its status
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunWarning {
    pub step: String,
    pub warning: StepError,
}

/// Outcome of one Run
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub run_id: Uuid,
    pub trigger: TriggerEvent,
    pub status: RunStatus,

    /// Executed steps in order
    pub steps: Vec<StepRecord>,

    /// Steps never invoked because an earlier step failed fatally
    pub skipped_steps: Vec<String>,

    pub warnings: Vec<RunWarning>,

    /// Environment writes made during the Run
    pub environment: Vec<EnvEntry>,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunResult {
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Succeeded
    }

    /// Process exit code for the Run: 0 succeeded, 1 failed
    pub fn exit_code(&self) -> i32 {
        match self.status {
            RunStatus::Succeeded => 0,
            _ => 1,
        }
    }

    pub fn step(&self, name: &str) -> Option<&StepRecord> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// The first fatal step, if any
    pub fn failed_step(&self) -> Option<&StepRecord> {
        self.steps.iter().find(|s| s.outcome.is_fatal())
    }

    pub fn tolerated_failures(&self) -> impl Iterator<Item = &StepRecord> {
        self.steps
            .iter()
            .filter(|s| matches!(s.outcome, StepOutcome::ToleratedFailure(_)))
    }

    /// Report of the first test step that produced one
    pub fn test_report(&self) -> Option<&TestReport> {
        self.steps.iter().find_map(|s| s.test_report.as_ref())
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at.signed_duration_since(self.started_at)
    }
}
