//! Subprocess host - runs commands with tokio::process

use crate::host::{CommandOutput, CommandSpec, HostError, HostExecutor};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Runs commands as child processes of the runner
#[derive(Debug, Clone, Default)]
pub struct ProcessHost;

impl ProcessHost {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl HostExecutor for ProcessHost {
    /// Spawn the command, wait for it and capture stdout/stderr.
    ///
    /// # Errors
    /// Returns `HostError` if:
    /// - The program cannot be spawned
    /// - The command exceeds its timeout (the child is killed)
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, HostError> {
        debug!("Spawning: {}", spec.display());

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &spec.cwd {
            command.current_dir(dir);
        }
        if let Some(env) = &spec.env {
            command.env_clear().envs(env);
        }

        let spawn_error = |e: std::io::Error| HostError::Spawn {
            program: spec.program.clone(),
            message: e.to_string(),
        };

        let output = match spec.timeout {
            Some(limit) => timeout(limit, command.output())
                .await
                .map_err(|_| {
                    warn!("{} timed out after {}s", spec.program, limit.as_secs());
                    HostError::Timeout(limit.as_secs())
                })?
                .map_err(spawn_error)?,
            None => command.output().await.map_err(spawn_error)?,
        };

        let status = output.status.code().unwrap_or(-1);
        debug!("{} exited with code {}", spec.program, status);

        Ok(CommandOutput {
            status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
