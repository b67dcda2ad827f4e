//! Workflow configuration from YAML

use crate::core::{error::ConfigError, Workflow};
use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::Value;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Top-level workflow definition loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Workflow name
    #[serde(default = "default_workflow_name")]
    pub name: String,

    /// Events that start a Run
    #[serde(default)]
    pub on: TriggerConfig,

    /// Host platform label (informational)
    #[serde(rename = "runs-on", default)]
    pub runs_on: Option<String>,

    /// Variables layered onto the host environment when a Run is created
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Steps of a job-less workflow
    #[serde(default)]
    pub steps: Vec<StepConfig>,

    /// GitHub-style jobs; at most one is accepted
    #[serde(default)]
    pub jobs: BTreeMap<String, JobConfig>,
}

/// `on:` section. A listed event with no body (`push:`) reacts to every branch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriggerConfig {
    #[serde(default, deserialize_with = "present_event")]
    pub push: Option<EventFilterConfig>,

    #[serde(default, deserialize_with = "present_event")]
    pub pull_request: Option<EventFilterConfig>,
}

/// A key that is present configures the event, even when its value is null
fn present_event<'de, D>(deserializer: D) -> Result<Option<EventFilterConfig>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<EventFilterConfig>::deserialize(deserializer)
        .map(|filter| Some(filter.unwrap_or_default()))
}

/// Branch filter for one event kind
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventFilterConfig {
    /// Branch glob patterns; empty matches every branch
    #[serde(default)]
    pub branches: Vec<String>,
}

/// A single job in the GitHub-style layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    #[serde(rename = "runs-on", default)]
    pub runs_on: Option<String>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,

    #[serde(default)]
    pub steps: Vec<StepConfig>,
}

/// Step configuration as defined in YAML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepConfig {
    /// Human-readable step name
    #[serde(default)]
    pub name: Option<String>,

    /// Reusable action reference, e.g. `actions/checkout@v4`
    #[serde(default)]
    pub uses: Option<String>,

    /// Literal shell command
    #[serde(default)]
    pub run: Option<String>,

    /// Action inputs
    #[serde(default)]
    pub with: BTreeMap<String, Value>,

    /// Tolerate failure of this step (defaults per action)
    #[serde(rename = "continue-on-error", default)]
    pub continue_on_error: Option<bool>,

    /// Fatal timeout for this step
    #[serde(rename = "timeout-minutes", default)]
    pub timeout_minutes: Option<u64>,
}

impl StepConfig {
    /// Display name: explicit name, else the action reference or first command line
    pub fn display_name(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        if let Some(uses) = &self.uses {
            return uses.clone();
        }
        self.run
            .as_deref()
            .and_then(|run| run.lines().map(str::trim).find(|l| !l.is_empty()))
            .map(|line| format!("Run {}", line))
            .unwrap_or_else(|| "unnamed step".to_string())
    }

    /// Read a `with` input as a string; scalars are stringified
    pub fn input(&self, key: &str) -> Option<String> {
        match self.with.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

fn default_workflow_name() -> String {
    "workflow".to_string()
}

impl WorkflowConfig {
    /// Load workflow configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read workflow file {}", path.display()))?;
        Ok(Self::from_yaml(&content)?)
    }

    /// Parse and validate workflow configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: WorkflowConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the workflow configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.on.push.is_none() && self.on.pull_request.is_none() {
            return Err(ConfigError::NoTriggers);
        }

        let (steps, _) = self.job()?;
        if steps.is_empty() {
            return Err(ConfigError::EmptySteps);
        }

        let mut seen = HashSet::new();
        for step in steps {
            let name = step.display_name();
            if !seen.insert(name.clone()) {
                return Err(ConfigError::DuplicateStep(name));
            }
        }

        // Building the domain model checks action references and inputs
        self.to_workflow().map(|_| ())
    }

    /// Steps and job-level settings, whichever layout the file uses
    pub fn job(&self) -> Result<(&[StepConfig], Option<&JobConfig>), ConfigError> {
        match self.jobs.len() {
            0 => Ok((&self.steps, None)),
            1 if !self.steps.is_empty() => Err(ConfigError::StepsAndJobs),
            1 => {
                let job = self.jobs.values().next().ok_or(ConfigError::EmptySteps)?;
                Ok((&job.steps, Some(job)))
            }
            n => Err(ConfigError::MultipleJobs(n)),
        }
    }

    /// Number of steps, whichever layout the file uses
    pub fn step_count(&self) -> usize {
        self.job().map(|(steps, _)| steps.len()).unwrap_or(0)
    }

    /// Convert config to the immutable workflow domain model
    pub fn to_workflow(&self) -> Result<Workflow, ConfigError> {
        Workflow::from_config(self)
    }
}
