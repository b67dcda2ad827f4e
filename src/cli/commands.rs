//! CLI command definitions

use crate::core::TriggerEvent;
use clap::Args;
use std::path::PathBuf;

/// Run a workflow
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to workflow YAML file
    #[arg(short, long)]
    pub file: String,

    /// Trigger event kind
    #[arg(long, value_enum, default_value_t = EventArg::Push)]
    pub event: EventArg,

    /// Pushed branch, or the base branch of a pull request
    #[arg(short, long)]
    pub branch: String,

    /// Repository to check out (path or URL)
    #[arg(short, long, default_value = ".")]
    pub repository: String,

    /// Commit to check out
    #[arg(long)]
    pub sha: Option<String>,

    /// Keep run directories under this path instead of a temporary one
    #[arg(long)]
    pub workdir: Option<PathBuf>,

    /// Extra environment for the run (KEY=VALUE)
    #[arg(short, long = "env", value_parser = parse_key_value)]
    pub env: Vec<(String, String)>,

    /// Default timeout for each host command, in seconds
    #[arg(long)]
    pub command_timeout: Option<u64>,

    /// Print the run result as JSON
    #[arg(long)]
    pub json: bool,
}

impl RunCommand {
    /// Trigger event described by the arguments
    pub fn trigger_event(&self) -> TriggerEvent {
        let event = match self.event {
            EventArg::Push => TriggerEvent::push(&self.repository, &self.branch),
            EventArg::PullRequest => TriggerEvent::pull_request(&self.repository, &self.branch),
        };
        match &self.sha {
            Some(sha) => event.with_sha(sha),
            None => event,
        }
    }
}

/// Validate a workflow file
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to workflow YAML file
    #[arg(short, long)]
    pub file: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Trigger event argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum EventArg {
    Push,
    PullRequest,
}

/// Parse key=value pairs
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("Invalid key=value pair: {}", s)),
    }
}
