//! Host tool configuration

use std::time::Duration;

/// Programs and limits used when steps run commands on the host
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Path to the git executable
    pub git: String,

    /// Shell used for `run:` steps (invoked as `<shell> -c <command>`)
    pub shell: String,

    /// Default timeout for each host command, in seconds
    pub command_timeout_secs: Option<u64>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            git: "git".to_string(),
            shell: "sh".to_string(),
            command_timeout_secs: None,
        }
    }
}

impl HostConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_git(mut self, git: impl Into<String>) -> Self {
        self.git = git.into();
        self
    }

    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    pub fn with_command_timeout(mut self, timeout_secs: u64) -> Self {
        self.command_timeout_secs = Some(timeout_secs);
        self
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout_secs.map(Duration::from_secs)
    }
}
