//! Pipeline runner - drives a Run through its steps

use crate::{
    core::{
        fold_status, ConfigError, RunContext, RunEnvironment, RunError, RunResult, RunState,
        RunStatus, RunWarning, Step, StepError, StepOutcome, StepRecord, TriggerEvent, Workflow,
    },
    execution::StepExecutor,
    host::{HostConfig, HostExecutor},
};
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Events that can occur during a Run
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    RunStarted {
        run_id: Uuid,
        trigger: TriggerEvent,
        total_steps: usize,
    },
    StepStarted {
        run_id: Uuid,
        index: usize,
        total: usize,
        name: String,
    },
    StepFinished {
        run_id: Uuid,
        index: usize,
        name: String,
        outcome: StepOutcome,
    },
    Warning {
        run_id: Uuid,
        step: String,
        warning: StepError,
    },
    RunFinished {
        run_id: Uuid,
        status: RunStatus,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(&ExecutionEvent) + Send + Sync>;

/// Working directory of one Run
enum Workspace {
    /// Removed when the Run ends
    Temporary(TempDir),
    /// Caller-supplied, left in place
    Kept(PathBuf),
}

impl Workspace {
    fn path(&self) -> &Path {
        match self {
            Workspace::Temporary(dir) => dir.path(),
            Workspace::Kept(path) => path,
        }
    }
}

/// Executes step sequences for trigger events.
///
/// A runner holds no per-Run state, so one instance can serve several
/// concurrent Runs; each gets its own working directory and Environment.
pub struct PipelineRunner<H> {
    executor: StepExecutor<H>,
    event_handlers: Vec<EventHandler>,

    /// Environment seed; the host process environment when unset
    base_env: Option<BTreeMap<String, String>>,

    /// Parent for kept working directories
    workspace_root: Option<PathBuf>,
}

impl<H: HostExecutor + 'static> PipelineRunner<H> {
    pub fn new(host: H, config: HostConfig) -> Self {
        Self {
            executor: StepExecutor::new(Arc::new(host), config),
            event_handlers: Vec::new(),
            base_env: None,
            workspace_root: None,
        }
    }

    /// Add an event handler
    pub fn with_event_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&ExecutionEvent) + Send + Sync + 'static,
    {
        self.event_handlers.push(Arc::new(handler));
        self
    }

    pub fn with_base_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.base_env = Some(env);
        self
    }

    /// Create working directories as `<root>/run-<id>` and keep them afterwards
    pub fn with_workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_root = Some(root.into());
        self
    }

    pub fn host(&self) -> &H {
        self.executor.host()
    }

    fn emit_event(&self, event: ExecutionEvent) {
        for handler in &self.event_handlers {
            handler(&event);
        }
    }

    /// Start a Run for `event` if the workflow is triggered by it.
    ///
    /// Returns `Ok(None)` when no Run is created.
    pub async fn dispatch(
        &self,
        workflow: &Workflow,
        event: &TriggerEvent,
    ) -> Result<Option<RunResult>, RunError> {
        if !workflow.should_run(event) {
            info!(
                "Workflow {} not triggered by {} on {}",
                workflow.name, event.event, event.branch
            );
            return Ok(None);
        }

        let result = self
            .run_steps(event, &workflow.steps, workflow.env.clone())
            .await?;
        Ok(Some(result))
    }

    /// Execute `steps` in order for `event`
    pub async fn execute(&self, event: &TriggerEvent, steps: &[Step]) -> Result<RunResult, RunError> {
        self.run_steps(event, steps, BTreeMap::new()).await
    }

    async fn run_steps(
        &self,
        event: &TriggerEvent,
        steps: &[Step],
        workflow_env: BTreeMap<String, String>,
    ) -> Result<RunResult, RunError> {
        if steps.is_empty() {
            return Err(ConfigError::EmptySteps.into());
        }

        let mut state = RunState::new(steps.len());
        let run_id = state.run_id;
        let workspace = self.create_workspace(run_id)?;
        let workspace_path = std::fs::canonicalize(workspace.path())?;

        let mut env = match &self.base_env {
            Some(vars) => RunEnvironment::from_vars(vars.clone()),
            None => RunEnvironment::from_host(),
        };
        env.seed(workflow_env);

        let mut ctx = RunContext::new(run_id, event.clone(), workspace_path, env);

        info!(
            "Starting run {} for {} on {} in {}",
            run_id,
            event.event,
            event.branch,
            ctx.workspace.display()
        );
        state.start();
        self.emit_event(ExecutionEvent::RunStarted {
            run_id,
            trigger: event.clone(),
            total_steps: steps.len(),
        });

        let mut records = Vec::with_capacity(steps.len());
        let mut warnings = Vec::new();
        let mut skipped_steps = Vec::new();

        for (index, step) in steps.iter().enumerate() {
            if records.last().is_some_and(|r: &StepRecord| r.outcome.is_fatal()) {
                skipped_steps.extend(steps[index..].iter().map(|s| s.name.clone()));
                break;
            }

            self.emit_event(ExecutionEvent::StepStarted {
                run_id,
                index,
                total: steps.len(),
                name: step.name.clone(),
            });

            let started_at = Utc::now();
            let execution = self.executor.execute(step, &mut ctx).await;
            let finished_at = Utc::now();

            for warning in execution.warnings {
                warn!("{}: {}", step.name, warning);
                self.emit_event(ExecutionEvent::Warning {
                    run_id,
                    step: step.name.clone(),
                    warning: warning.clone(),
                });
                warnings.push(RunWarning {
                    step: step.name.clone(),
                    warning,
                });
            }

            let outcome = StepOutcome::from_result(execution.result, step.continue_on_failure);
            match &outcome {
                StepOutcome::Success => info!("Step {} succeeded", step.name),
                StepOutcome::ToleratedFailure(e) => {
                    warn!("Step {} failed, continuing: {}", step.name, e)
                }
                StepOutcome::FatalFailure(e) => error!("Step {} failed: {}", step.name, e),
            }

            self.emit_event(ExecutionEvent::StepFinished {
                run_id,
                index,
                name: step.name.clone(),
                outcome: outcome.clone(),
            });

            state.step_finished();
            debug!(
                "Run {}: {}/{} steps done ({:.0}%)",
                run_id,
                state.completed_steps,
                state.total_steps,
                state.progress() * 100.0
            );
            records.push(StepRecord {
                name: step.name.clone(),
                action: step.action.kind().to_string(),
                outcome,
                started_at,
                finished_at,
                test_report: execution.test_report,
            });
        }

        let status = fold_status(records.iter().map(|r| &r.outcome));
        state.finish(status);
        if !skipped_steps.is_empty() {
            info!("Skipped steps: {}", skipped_steps.join(", "));
        }
        info!("Run {} finished: {:?}", run_id, status);
        self.emit_event(ExecutionEvent::RunFinished { run_id, status });

        // Reclaim the working directory
        drop(workspace);

        let finished_at = state.finished_at.unwrap_or_else(Utc::now);
        Ok(RunResult {
            run_id,
            trigger: ctx.trigger,
            status,
            steps: records,
            skipped_steps,
            warnings,
            environment: ctx.env.entries().to_vec(),
            started_at: state.started_at.unwrap_or(finished_at),
            finished_at,
        })
    }

    fn create_workspace(&self, run_id: Uuid) -> Result<Workspace, RunError> {
        match &self.workspace_root {
            Some(root) => {
                let path = root.join(format!("run-{}", run_id));
                std::fs::create_dir_all(&path)?;
                Ok(Workspace::Kept(path))
            }
            None => {
                let dir = tempfile::Builder::new().prefix("run-").tempdir()?;
                Ok(Workspace::Temporary(dir))
            }
        }
    }
}
