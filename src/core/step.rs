//! Step domain model

use crate::core::{config::StepConfig, error::ConfigError};
use serde::Serialize;

const DEFAULT_MANIFEST: &str = "requirements.txt";
const DEFAULT_TEST_ROOT: &str = "tests";
const DEFAULT_TEST_PATTERN: &str = "test_*.py";

/// A single named unit of pipeline work
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Step {
    /// Step name, unique within a workflow
    pub name: String,

    /// What the step does
    pub action: StepAction,

    /// Whether a failure of this step is tolerated instead of aborting the Run
    pub continue_on_failure: bool,

    /// Fatal timeout in seconds
    pub timeout_secs: Option<u64>,
}

/// Action performed by a step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum StepAction {
    /// Materialize the triggering commit into the working directory
    Checkout { reference: Option<String> },

    /// Select an interpreter of the given version
    ProvisionRuntime { version: String },

    /// Upgrade the package manager and install from a manifest
    InstallDependencies { manifest: String },

    /// Append one entry to the Run's environment
    SetEnv { name: String, value: EnvValue },

    /// Discover test files and run every case
    DiscoverTests {
        start_directory: String,
        pattern: String,
    },

    /// Literal shell command
    RunCommand { command: String },
}

/// How a set-env step computes the new value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnvValue {
    /// Replace with the rendered template
    Value(String),
    /// Join the current value and the rendered entry with the path separator
    AppendPath(String),
}

impl StepAction {
    /// Short action name used in logs and reports
    pub fn kind(&self) -> &'static str {
        match self {
            StepAction::Checkout { .. } => "checkout",
            StepAction::ProvisionRuntime { .. } => "provision-runtime",
            StepAction::InstallDependencies { .. } => "install-dependencies",
            StepAction::SetEnv { .. } => "set-env",
            StepAction::DiscoverTests { .. } => "discover-tests",
            StepAction::RunCommand { .. } => "run-command",
        }
    }

    /// Dependency installation is lenient unless configured otherwise
    pub fn tolerates_failure_by_default(&self) -> bool {
        matches!(self, StepAction::InstallDependencies { .. })
    }
}

impl Step {
    pub fn new(name: impl Into<String>, action: StepAction) -> Self {
        let continue_on_failure = action.tolerates_failure_by_default();
        Self {
            name: name.into(),
            action,
            continue_on_failure,
            timeout_secs: None,
        }
    }

    pub fn checkout() -> Self {
        Self::new("Checkout", StepAction::Checkout { reference: None })
    }

    pub fn setup_python(version: impl Into<String>) -> Self {
        Self::new(
            "Set up Python",
            StepAction::ProvisionRuntime { version: version.into() },
        )
    }

    pub fn install_dependencies(manifest: impl Into<String>) -> Self {
        Self::new(
            "Install dependencies",
            StepAction::InstallDependencies { manifest: manifest.into() },
        )
    }

    pub fn append_path(name: impl Into<String>, entry: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(
            format!("Set {}", name),
            StepAction::SetEnv {
                name,
                value: EnvValue::AppendPath(entry.into()),
            },
        )
    }

    pub fn discover_tests(start_directory: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::new(
            "Run tests",
            StepAction::DiscoverTests {
                start_directory: start_directory.into(),
                pattern: pattern.into(),
            },
        )
    }

    pub fn run(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self::new(name, StepAction::RunCommand { command: command.into() })
    }

    pub fn with_continue_on_failure(mut self, tolerate: bool) -> Self {
        self.continue_on_failure = tolerate;
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = Some(timeout_secs);
        self
    }

    /// Create a step from a step config
    pub fn from_config(config: &StepConfig, index: usize) -> Result<Self, ConfigError> {
        let name = config.display_name();
        let invalid = |message: String| ConfigError::InvalidStep {
            index,
            name: name.clone(),
            message,
        };

        let action = match (&config.uses, &config.run) {
            (Some(_), Some(_)) => {
                return Err(invalid("step has both `uses` and `run`".to_string()))
            }
            (None, None) => return Err(invalid("step needs `uses` or `run`".to_string())),
            (None, Some(command)) => StepAction::RunCommand { command: command.clone() },
            (Some(uses), None) => Self::resolve_action(uses, config).map_err(invalid)?,
        };

        let mut step = Step::new(name.clone(), action);
        if let Some(tolerate) = config.continue_on_error {
            step.continue_on_failure = tolerate;
        }
        step.timeout_secs = config
            .timeout_minutes
            .map(|minutes| {
                minutes
                    .checked_mul(60)
                    .ok_or_else(|| invalid(format!("timeout-minutes {} is too large", minutes)))
            })
            .transpose()?;
        Ok(step)
    }

    /// Map an action reference (version suffix ignored) to a built-in action
    fn resolve_action(uses: &str, config: &StepConfig) -> Result<StepAction, String> {
        let action_name = uses.split('@').next().unwrap_or(uses).trim();

        match action_name {
            "actions/checkout" | "checkout" => Ok(StepAction::Checkout {
                reference: config.input("ref"),
            }),
            "actions/setup-python" | "setup-python" => {
                let version = config
                    .input("python-version")
                    .filter(|v| !v.trim().is_empty())
                    .ok_or_else(|| format!("`{}` requires `with.python-version`", action_name))?;
                Ok(StepAction::ProvisionRuntime { version })
            }
            "runner/install-dependencies" => Ok(StepAction::InstallDependencies {
                manifest: config
                    .input("manifest")
                    .unwrap_or_else(|| DEFAULT_MANIFEST.to_string()),
            }),
            "runner/set-env" => {
                let name = config
                    .input("name")
                    .ok_or_else(|| "`runner/set-env` requires `with.name`".to_string())?;
                let value = match (config.input("value"), config.input("append-path")) {
                    (Some(value), None) => EnvValue::Value(value),
                    (None, Some(entry)) => EnvValue::AppendPath(entry),
                    _ => {
                        return Err(
                            "`runner/set-env` requires exactly one of `with.value` or `with.append-path`"
                                .to_string(),
                        )
                    }
                };
                Ok(StepAction::SetEnv { name, value })
            }
            "runner/discover-tests" => Ok(StepAction::DiscoverTests {
                start_directory: config
                    .input("start-directory")
                    .unwrap_or_else(|| DEFAULT_TEST_ROOT.to_string()),
                pattern: config
                    .input("pattern")
                    .unwrap_or_else(|| DEFAULT_TEST_PATTERN.to_string()),
            }),
            other => Err(format!("unknown action `{}`", other)),
        }
    }
}
