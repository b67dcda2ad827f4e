//! Test utility functions for workflow scenarios

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use workflow_runner::core::config::WorkflowConfig;
use workflow_runner::core::{RunResult, RunStatus, StepOutcome, TriggerEvent, Workflow};
use workflow_runner::execution::PipelineRunner;
use workflow_runner::host::{CommandOutput, CommandSpec, HostConfig, HostError, HostExecutor};

/// The workflow most scenarios run: checkout, provision, install, PYTHONPATH, tests
pub const PYTHON_CI: &str = r#"
name: Python CI
on:
  push:
    branches: [main]
  pull_request:
    branches: [main]
runs-on: ubuntu-latest
steps:
  - name: Checkout
    uses: actions/checkout@v4
  - name: Set up Python
    uses: actions/setup-python@v5
    with:
      python-version: "3.13"
  - name: Install dependencies
    uses: runner/install-dependencies
    with:
      manifest: requirements.txt
  - name: Configure PYTHONPATH
    uses: runner/set-env
    with:
      name: PYTHONPATH
      append-path: "{{ workspace }}"
  - name: Run tests
    uses: runner/discover-tests
    with:
      start-directory: tests
      pattern: "test_*.py"
"#;

pub const STEP_NAMES: [&str; 5] = [
    "Checkout",
    "Set up Python",
    "Install dependencies",
    "Configure PYTHONPATH",
    "Run tests",
];

/// unittest stderr for a fully passing module
pub fn passing_output(tests: usize) -> String {
    let mut out = String::new();
    for i in 0..tests {
        out.push_str(&format!("test_case_{} (tests.test_app.AppTest.test_case_{}) ... ok\n", i, i));
    }
    out.push_str(&format!(
        "\n----------------------------------------------------------------------\nRan {} tests in 0.003s\n\nOK\n",
        tests
    ));
    out
}

/// unittest stderr for a module with assertion failures
pub fn failing_output(tests: usize, failures: usize) -> String {
    let mut out = String::new();
    for i in 0..tests {
        let verdict = if i < failures { "FAIL" } else { "ok" };
        out.push_str(&format!("test_case_{} (tests.test_app.AppTest.test_case_{}) ... {}\n", i, i, verdict));
    }
    for i in 0..failures {
        out.push_str(&format!(
            "\n======================================================================\n\
             FAIL: test_case_{} (tests.test_app.AppTest.test_case_{})\n\
             ----------------------------------------------------------------------\n\
             AssertionError: 2 != 3\n",
            i, i
        ));
    }
    out.push_str(&format!(
        "\n----------------------------------------------------------------------\nRan {} tests in 0.004s\n\nFAILED (failures={})\n",
        tests, failures
    ));
    out
}

/// A repository with a manifest, a module and one passing test file
pub fn python_project() -> Vec<(String, String)> {
    vec![
        ("requirements.txt".to_string(), "requests==2.32.3\n".to_string()),
        ("app.py".to_string(), "def add(a, b):\n    return a + b\n".to_string()),
        (
            "tests/test_app.py".to_string(),
            "import unittest\nfrom app import add\n\nclass AppTest(unittest.TestCase):\n    def test_add(self):\n        self.assertEqual(add(1, 2), 3)\n".to_string(),
        ),
    ]
}

/// Scripted host standing in for git, python and sh
pub struct MockHost {
    repository: Vec<(String, String)>,
    python_version: Option<String>,
    fail_checkout: bool,
    fail_pip_upgrade: bool,
    fail_pip_install: bool,
    test_results: HashMap<String, (i32, String)>,
    command_status: Vec<(String, i32)>,
    delay: Option<Duration>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl MockHost {
    /// Host with git, python 3.13.1 and pip all working
    pub fn new() -> Self {
        Self {
            repository: python_project(),
            python_version: Some("3.13.1".to_string()),
            fail_checkout: false,
            fail_pip_upgrade: false,
            fail_pip_install: false,
            test_results: HashMap::new(),
            command_status: Vec::new(),
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Files the clone materializes (path relative to the working directory, content)
    pub fn with_repository(mut self, files: &[(&str, &str)]) -> Self {
        self.repository = files
            .iter()
            .map(|(path, content)| (path.to_string(), content.to_string()))
            .collect();
        self
    }

    pub fn with_python(mut self, version: Option<&str>) -> Self {
        self.python_version = version.map(str::to_string);
        self
    }

    pub fn fail_checkout(mut self) -> Self {
        self.fail_checkout = true;
        self
    }

    pub fn fail_pip_upgrade(mut self) -> Self {
        self.fail_pip_upgrade = true;
        self
    }

    pub fn fail_pip_install(mut self) -> Self {
        self.fail_pip_install = true;
        self
    }

    /// Result of `python -m unittest -v <module>`; passing with one test by default
    pub fn with_test_result(mut self, module: &str, exit_code: i32, output: impl Into<String>) -> Self {
        self.test_results.insert(module.to_string(), (exit_code, output.into()));
        self
    }

    /// Exit status of `sh -c` commands containing `needle`
    pub fn with_command_status(mut self, needle: &str, status: i32) -> Self {
        self.command_status.push((needle.to_string(), status));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    /// Whether any command line contains `needle`
    pub fn invoked(&self, needle: &str) -> bool {
        self.calls().iter().any(|c| c.display().contains(needle))
    }

    fn clone_repository(&self, destination: &str) -> CommandOutput {
        if self.fail_checkout {
            return CommandOutput {
                status: 128,
                stdout: String::new(),
                stderr: "fatal: repository 'https://example.com/missing.git/' not found\n".to_string(),
            };
        }

        for (path, content) in &self.repository {
            let target = Path::new(destination).join(path);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(target, content).unwrap();
        }
        ok()
    }

    fn python(&self, command: &CommandSpec) -> Result<CommandOutput, HostError> {
        let Some(version) = &self.python_version else {
            return Err(HostError::Spawn {
                program: command.program.clone(),
                message: "No such file or directory (os error 2)".to_string(),
            });
        };

        let args: Vec<&str> = command.args.iter().map(String::as_str).collect();
        let output = match args.as_slice() {
            ["--version"] => CommandOutput {
                status: 0,
                stdout: format!("Python {}\n", version),
                stderr: String::new(),
            },
            ["-m", "pip", "install", "--upgrade", "pip"] if self.fail_pip_upgrade => failed(
                1,
                "ERROR: Could not install packages due to an OSError: [Errno 13] Permission denied\n",
            ),
            ["-m", "pip", "install", "-r", _] if self.fail_pip_install => failed(
                1,
                "ERROR: Could not find a version that satisfies the requirement nonexistent-pkg==9.9\n",
            ),
            ["-m", "pip", ..] => ok(),
            ["-m", "unittest", "-v", module] => match self.test_results.get(*module) {
                Some((status, stderr)) => failed(*status, stderr),
                None => CommandOutput {
                    status: 0,
                    stdout: String::new(),
                    stderr: passing_output(1),
                },
            },
            _ => failed(2, "unexpected python invocation\n"),
        };
        Ok(output)
    }
}

impl Default for MockHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HostExecutor for MockHost {
    async fn run(&self, command: &CommandSpec) -> Result<CommandOutput, HostError> {
        self.calls.lock().unwrap().push(command.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match command.program.as_str() {
            "git" => match command.args.first().map(String::as_str) {
                Some("clone") => {
                    let destination = command.args.last().cloned().unwrap_or_default();
                    Ok(self.clone_repository(&destination))
                }
                _ => Ok(ok()),
            },
            "sh" => {
                let script = command.args.last().cloned().unwrap_or_default();
                let status = self
                    .command_status
                    .iter()
                    .find(|(needle, _)| script.contains(needle.as_str()))
                    .map(|(_, status)| *status)
                    .unwrap_or(0);
                Ok(CommandOutput {
                    status,
                    ..Default::default()
                })
            }
            program if program.starts_with("python") => self.python(command),
            program => Err(HostError::Spawn {
                program: program.to_string(),
                message: "not available in mock host".to_string(),
            }),
        }
    }
}

fn ok() -> CommandOutput {
    CommandOutput::default()
}

fn failed(status: i32, stderr: &str) -> CommandOutput {
    CommandOutput {
        status,
        stdout: String::new(),
        stderr: stderr.to_string(),
    }
}

pub fn workflow(yaml: &str) -> Workflow {
    WorkflowConfig::from_yaml(yaml)
        .expect("workflow should parse")
        .to_workflow()
        .expect("workflow should build")
}

pub fn runner(host: MockHost) -> PipelineRunner<MockHost> {
    PipelineRunner::new(host, HostConfig::default()).with_base_env(BTreeMap::from([(
        "PATH".to_string(),
        "/usr/local/bin:/usr/bin:/bin".to_string(),
    )]))
}

pub fn push(branch: &str) -> TriggerEvent {
    TriggerEvent::push("https://example.com/acme/app.git", branch)
}

pub fn pull_request(base: &str) -> TriggerEvent {
    TriggerEvent::pull_request("https://example.com/acme/app.git", base)
}

/// Dispatch `yaml` for `event` on a runner around `host`
pub async fn dispatch(
    yaml: &str,
    host: MockHost,
    event: TriggerEvent,
) -> (Option<RunResult>, PipelineRunner<MockHost>) {
    let runner = runner(host);
    let result = runner
        .dispatch(&workflow(yaml), &event)
        .await
        .expect("run should start");
    (result, runner)
}

/// Dispatch the standard Python workflow for a push to main
pub async fn run_python_ci(host: MockHost) -> (RunResult, PipelineRunner<MockHost>) {
    let (result, runner) = dispatch(PYTHON_CI, host, push("main")).await;
    (result.expect("push to main should create a run"), runner)
}

pub fn assert_run_succeeded(result: &RunResult) {
    assert_eq!(
        result.status,
        RunStatus::Succeeded,
        "Expected run to succeed, failed at {:?}",
        result.failed_step().map(|s| (&s.name, &s.outcome))
    );
    assert_eq!(result.exit_code(), 0);
}

pub fn assert_run_failed(result: &RunResult) {
    assert_eq!(result.status, RunStatus::Failed, "Expected run to fail");
    assert_ne!(result.exit_code(), 0);
}

/// Assert the outcome label ("success", "tolerated failure", "fatal failure")
/// and, for failures, the error kind
pub fn assert_step_outcome(result: &RunResult, name: &str, label: &str, kind: Option<&str>) {
    let step = result
        .step(name)
        .unwrap_or_else(|| panic!("Step {} was not executed", name));
    assert_eq!(step.outcome.label(), label, "Unexpected outcome for {}", name);
    assert_eq!(
        step.outcome.error().map(|e| e.kind()),
        kind,
        "Unexpected error kind for {}",
        name
    );
}

pub fn assert_execution_order(result: &RunResult, expected: &[&str]) {
    let executed: Vec<&str> = result.steps.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(executed, expected, "Execution order mismatch");
}

pub fn assert_skipped(result: &RunResult, expected: &[&str]) {
    assert_eq!(result.skipped_steps, expected, "Skipped steps mismatch");
}

pub fn is_success(outcome: &StepOutcome) -> bool {
    matches!(outcome, StepOutcome::Success)
}
