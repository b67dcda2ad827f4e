//! Step executor - runs individual steps against the host

use crate::{
    core::{
        report::TestReport,
        step::{EnvValue, Step, StepAction},
        Runtime, RunContext, StepError,
    },
    execution::discovery,
    host::{CommandOutput, CommandSpec, HostConfig, HostError, HostExecutor},
};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tokio::time::{timeout, Duration};
use tracing::{debug, error, info, warn};

/// Result of executing one step, before failure tolerance is applied
#[derive(Debug, Clone)]
pub struct StepExecution {
    pub result: Result<(), StepError>,

    /// Non-fatal conditions to record on the Run
    pub warnings: Vec<StepError>,

    pub test_report: Option<TestReport>,
}

impl StepExecution {
    fn ok() -> Self {
        Self {
            result: Ok(()),
            warnings: Vec::new(),
            test_report: None,
        }
    }

    fn failed(error: StepError) -> Self {
        Self {
            result: Err(error),
            warnings: Vec::new(),
            test_report: None,
        }
    }

    fn from_result(result: Result<(), StepError>) -> Self {
        Self {
            result,
            warnings: Vec::new(),
            test_report: None,
        }
    }
}

/// Executes a single step
pub struct StepExecutor<H> {
    host: Arc<H>,
    config: HostConfig,
}

impl<H: HostExecutor> StepExecutor<H> {
    pub fn new(host: Arc<H>, config: HostConfig) -> Self {
        Self { host, config }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    /// Execute a step, applying its timeout if it has one
    pub async fn execute(&self, step: &Step, ctx: &mut RunContext) -> StepExecution {
        info!("Executing step: {} ({})", step.name, step.action.kind());

        match step.timeout_secs {
            Some(secs) => match timeout(Duration::from_secs(secs), self.dispatch(step, ctx)).await {
                Ok(execution) => execution,
                Err(_) => {
                    error!("Timeout for step {} after {}s", step.name, secs);
                    StepExecution::failed(StepError::Timeout(secs))
                }
            },
            None => self.dispatch(step, ctx).await,
        }
    }

    async fn dispatch(&self, step: &Step, ctx: &mut RunContext) -> StepExecution {
        match &step.action {
            StepAction::Checkout { reference } => {
                StepExecution::from_result(self.checkout(reference.as_deref(), ctx).await)
            }
            StepAction::ProvisionRuntime { version } => {
                StepExecution::from_result(self.provision_runtime(version, ctx).await)
            }
            StepAction::InstallDependencies { manifest } => {
                StepExecution::from_result(self.install_dependencies(manifest, ctx).await)
            }
            StepAction::SetEnv { name, value } => {
                StepExecution::from_result(Self::set_env(&step.name, name, value, ctx))
            }
            StepAction::DiscoverTests { start_directory, pattern } => {
                self.discover_and_run_tests(start_directory, pattern, ctx).await
            }
            StepAction::RunCommand { command } => {
                StepExecution::from_result(self.run_command(command, ctx).await)
            }
        }
    }

    async fn run_host(&self, spec: CommandSpec) -> Result<CommandOutput, HostError> {
        let spec = if spec.timeout.is_none() {
            spec.timeout(self.config.command_timeout())
        } else {
            spec
        };
        debug!("Running: {}", spec.display());
        let output = self.host.run(&spec).await?;
        if !output.stdout.is_empty() {
            debug!("stdout of {}:\n{}", spec.program, output.stdout.trim_end());
        }
        if !output.stderr.is_empty() {
            debug!("stderr of {}:\n{}", spec.program, output.stderr.trim_end());
        }
        Ok(output)
    }

    /// Command in the workspace with the Run's environment
    fn workspace_command(&self, program: &str, ctx: &RunContext) -> CommandSpec {
        CommandSpec::new(program)
            .current_dir(&ctx.workspace)
            .envs(ctx.env.vars())
    }

    async fn checkout(&self, reference: Option<&str>, ctx: &RunContext) -> Result<(), StepError> {
        let workspace = ctx.workspace.display().to_string();
        let clone = CommandSpec::new(&self.config.git)
            .args(["clone", "--quiet"])
            .arg(&ctx.trigger.repository)
            .arg(&workspace);

        let output = self
            .run_host(clone)
            .await
            .map_err(|e| StepError::Checkout(e.to_string()))?;
        if !output.success() {
            return Err(StepError::Checkout(failure_message("git clone", &output)));
        }

        // Explicit ref, else the triggering commit, else the pushed branch
        let target = reference
            .map(|r| ctx.render(r))
            .or_else(|| ctx.trigger.sha.clone())
            .or_else(|| match ctx.trigger.event {
                crate::core::EventKind::Push => Some(ctx.trigger.branch.clone()),
                crate::core::EventKind::PullRequest => None,
            });

        match target {
            Some(target) => {
                let checkout = CommandSpec::new(&self.config.git)
                    .args(["-C", workspace.as_str(), "checkout", "--quiet"])
                    .arg(&target);
                let output = self
                    .run_host(checkout)
                    .await
                    .map_err(|e| StepError::Checkout(e.to_string()))?;
                if !output.success() {
                    return Err(StepError::Checkout(failure_message(
                        &format!("git checkout {}", target),
                        &output,
                    )));
                }
            }
            None => warn!(
                "No commit given for the pull request into {}; testing the default HEAD of {}",
                ctx.trigger.branch, ctx.trigger.repository
            ),
        }

        info!("Checked out {} into {}", ctx.trigger.repository, workspace);
        Ok(())
    }

    /// Select the first interpreter on the host that reports the requested version
    async fn provision_runtime(&self, version: &str, ctx: &mut RunContext) -> Result<(), StepError> {
        let candidates = [format!("python{}", version), "python3".to_string(), "python".to_string()];
        let mut rejected = Vec::new();

        for candidate in candidates {
            let probe = CommandSpec::new(&candidate)
                .arg("--version")
                .envs(ctx.env.vars());
            let output = match self.run_host(probe).await {
                Ok(output) if output.success() => output,
                Ok(output) => {
                    rejected.push(format!("{}: exited with {}", candidate, output.status));
                    continue;
                }
                Err(e) if e.is_spawn_failure() => {
                    rejected.push(format!("{}: not installed", candidate));
                    continue;
                }
                Err(e) => {
                    rejected.push(format!("{}: {}", candidate, e));
                    continue;
                }
            };

            match parse_python_version(&output) {
                Some(found) if version_matches(&found, version) => {
                    info!("Using {} ({})", candidate, found);
                    ctx.runtime = Some(Runtime {
                        requested: version.to_string(),
                        version: found,
                        interpreter: candidate,
                    });
                    return Ok(());
                }
                Some(found) => rejected.push(format!("{}: found {}", candidate, found)),
                None => rejected.push(format!("{}: unrecognized version output", candidate)),
            }
        }

        Err(StepError::Provisioning(format!(
            "no interpreter matching {} ({})",
            version,
            rejected.join("; ")
        )))
    }

    fn runtime<'a>(ctx: &'a RunContext, needed_by: &str) -> Result<&'a Runtime, StepError> {
        ctx.runtime.as_ref().ok_or_else(|| {
            StepError::Provisioning(format!("{} requires a provisioned runtime", needed_by))
        })
    }

    async fn install_dependencies(&self, manifest: &str, ctx: &RunContext) -> Result<(), StepError> {
        let python = Self::runtime(ctx, "dependency installation")?.interpreter.clone();

        let upgrade = self
            .workspace_command(&python, ctx)
            .args(["-m", "pip", "install", "--upgrade", "pip"]);
        let output = self
            .run_host(upgrade)
            .await
            .map_err(|e| StepError::DependencyInstall(e.to_string()))?;
        if !output.success() {
            return Err(StepError::DependencyInstall(failure_message(
                "pip upgrade",
                &output,
            )));
        }

        if !ctx.workspace.join(manifest).is_file() {
            return Err(StepError::DependencyInstall(format!(
                "manifest {} not found",
                manifest
            )));
        }

        let install = self
            .workspace_command(&python, ctx)
            .args(["-m", "pip", "install", "-r", manifest]);
        let output = self
            .run_host(install)
            .await
            .map_err(|e| StepError::DependencyInstall(e.to_string()))?;
        if !output.success() {
            return Err(StepError::DependencyInstall(failure_message(
                &format!("pip install -r {}", manifest),
                &output,
            )));
        }

        info!("Installed dependencies from {}", manifest);
        Ok(())
    }

    fn set_env(step_name: &str, name: &str, value: &EnvValue, ctx: &mut RunContext) -> Result<(), StepError> {
        let new_value = match value {
            EnvValue::Value(template) => ctx.render(template),
            EnvValue::AppendPath(template) => {
                let entry = ctx.render(template);
                let mut paths: Vec<_> = ctx
                    .env
                    .get(name)
                    .filter(|current| !current.is_empty())
                    .map(|current| std::env::split_paths(current).collect())
                    .unwrap_or_default();
                paths.push(entry.into());

                let joined = std::env::join_paths(paths)
                    .map_err(|e| StepError::EnvironmentWrite(format!("{}: {}", name, e)))?;
                joined.into_string().map_err(|_| {
                    StepError::EnvironmentWrite(format!("{} is not valid UTF-8", name))
                })?
            }
        };

        info!("Setting {}={}", name, new_value);
        ctx.env.append(name, new_value, step_name)
    }

    async fn discover_and_run_tests(
        &self,
        start_directory: &str,
        pattern: &str,
        ctx: &RunContext,
    ) -> StepExecution {
        let files = match discovery::discover_test_files(&ctx.workspace, start_directory, pattern) {
            Ok(Some(files)) => files,
            Ok(None) => {
                return Self::vacuous(format!("start directory {} does not exist", start_directory))
            }
            Err(e) => {
                return StepExecution::failed(StepError::TestDiscovery(format!(
                    "failed to scan {}: {}",
                    start_directory, e
                )))
            }
        };

        if files.is_empty() {
            return Self::vacuous(format!(
                "no files matching {} under {}",
                pattern, start_directory
            ));
        }

        let python = match Self::runtime(ctx, "test execution") {
            Ok(runtime) => runtime.interpreter.clone(),
            Err(e) => return StepExecution::failed(e),
        };

        let env = match unittest_environment(&ctx.workspace.join(start_directory), ctx) {
            Ok(env) => env,
            Err(e) => return StepExecution::failed(e),
        };

        info!("Discovered {} test files under {}", files.len(), start_directory);

        let mut report = TestReport::new();
        for file in &files {
            let relative = path_arg(file);
            let Some(module) = discovery::module_name(start_directory, file) else {
                error!("{} is outside {}", relative, start_directory);
                report.add(discovery::file_report(&relative, -1, ""));
                continue;
            };
            let spec = CommandSpec::new(&python)
                .current_dir(&ctx.workspace)
                .envs(env.clone())
                .args(["-m", "unittest", "-v"])
                .arg(&module);

            let file_report = match self.run_host(spec).await {
                Ok(output) => discovery::file_report(
                    &relative,
                    output.status,
                    &format!("{}{}", output.stdout, output.stderr),
                ),
                Err(e) => {
                    error!("Could not run {}: {}", relative, e);
                    discovery::file_report(&relative, -1, "")
                }
            };

            if file_report.is_clean() {
                info!("{}: {} passed", relative, file_report.passed);
            } else {
                warn!(
                    "{}: {} failed, {} errors",
                    relative, file_report.failed, file_report.errors
                );
            }
            report.add(file_report);
        }

        info!("Test summary: {}", report.summary());

        let mut execution = StepExecution::ok();
        if report.total == 0 {
            execution.warnings.push(StepError::TestDiscovery(format!(
                "{} files discovered but no test cases ran",
                report.files.len()
            )));
        }
        if report.has_failures() {
            execution.result = Err(StepError::TestExecution {
                total: report.total,
                failed: report.failed,
                errors: report.errors,
            });
        }
        execution.test_report = Some(report);
        execution
    }

    /// Nothing to run: success with a discovery warning
    fn vacuous(reason: String) -> StepExecution {
        warn!("No tests discovered: {}", reason);
        let mut execution = StepExecution::ok();
        execution.warnings.push(StepError::TestDiscovery(reason));
        execution.test_report = Some(TestReport::new());
        execution
    }

    async fn run_command(&self, command: &str, ctx: &RunContext) -> Result<(), StepError> {
        let rendered = ctx.render(command);
        let spec = self
            .workspace_command(&self.config.shell, ctx)
            .arg("-c")
            .arg(&rendered);

        let output = self.run_host(spec).await.map_err(|e| StepError::CommandFailed {
            command: format!("{} ({})", rendered.trim(), e),
            code: -1,
        })?;

        if !output.success() {
            return Err(StepError::CommandFailed {
                command: rendered.trim().to_string(),
                code: output.status,
            });
        }
        Ok(())
    }
}

fn failure_message(what: &str, output: &CommandOutput) -> String {
    match output.last_line() {
        Some(line) => format!("{} exited with {}: {}", what, output.status, line),
        None => format!("{} exited with {}", what, output.status),
    }
}

/// Extract "3.13.1" from "Python 3.13.1" (stdout, or stderr for old interpreters)
fn parse_python_version(output: &CommandOutput) -> Option<String> {
    [&output.stdout, &output.stderr]
        .iter()
        .flat_map(|text| text.lines())
        .find_map(|line| line.trim().strip_prefix("Python "))
        .map(|v| v.trim().to_string())
}

/// "3.13.1" satisfies "3.13" and "3.13.1", not "3.1"
fn version_matches(found: &str, requested: &str) -> bool {
    found == requested || found.starts_with(&format!("{}.", requested))
}

/// Run environment with the start directory first on PYTHONPATH
fn unittest_environment(start_root: &Path, ctx: &RunContext) -> Result<BTreeMap<String, String>, StepError> {
    let mut vars = ctx.env.vars();
    let mut paths = vec![start_root.to_path_buf()];
    if let Some(current) = vars.get("PYTHONPATH").filter(|current| !current.is_empty()) {
        paths.extend(std::env::split_paths(current));
    }

    let joined = std::env::join_paths(paths)
        .map_err(|e| StepError::TestDiscovery(format!("cannot extend PYTHONPATH: {}", e)))?;
    vars.insert("PYTHONPATH".to_string(), joined.to_string_lossy().into_owned());
    Ok(vars)
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
