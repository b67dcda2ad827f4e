//! Workflow domain model

use crate::core::{
    config::WorkflowConfig,
    error::ConfigError,
    step::Step,
    trigger::{BranchFilter, EventKind, TriggerEvent, TriggerSet},
};
use std::collections::BTreeMap;

/// An immutable, validated workflow definition.
///
/// Shared read-only between concurrent Runs.
#[derive(Debug, Clone)]
pub struct Workflow {
    pub name: String,

    /// Host platform label (informational)
    pub runs_on: Option<String>,

    pub triggers: TriggerSet,

    /// Variables layered onto each Run's host environment
    pub env: BTreeMap<String, String>,

    /// Steps in execution order
    pub steps: Vec<Step>,
}

impl Workflow {
    /// Create a workflow from configuration
    pub fn from_config(config: &WorkflowConfig) -> Result<Self, ConfigError> {
        let mut triggers = TriggerSet::new();
        if let Some(push) = &config.on.push {
            triggers = triggers.on(EventKind::Push, BranchFilter::from_patterns(&push.branches)?);
        }
        if let Some(pull_request) = &config.on.pull_request {
            triggers = triggers.on(
                EventKind::PullRequest,
                BranchFilter::from_patterns(&pull_request.branches)?,
            );
        }

        let (step_configs, job) = config.job()?;
        if step_configs.is_empty() {
            return Err(ConfigError::EmptySteps);
        }

        let steps = step_configs
            .iter()
            .enumerate()
            .map(|(index, step)| Step::from_config(step, index))
            .collect::<Result<Vec<_>, _>>()?;

        let mut env = config.env.clone();
        let mut runs_on = config.runs_on.clone();
        if let Some(job) = job {
            env.extend(job.env.clone());
            runs_on = job.runs_on.clone().or(runs_on);
        }

        Ok(Workflow {
            name: config.name.clone(),
            runs_on,
            triggers,
            env,
            steps,
        })
    }

    /// Whether the event starts a Run of this workflow
    pub fn should_run(&self, event: &TriggerEvent) -> bool {
        self.triggers.matches(event)
    }

    /// Get a step by name
    pub fn step(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.name == name)
    }
}
