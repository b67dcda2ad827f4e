//! Host command execution
//!
//! Every side effect a step has on the host (cloning, probing interpreters,
//! installing packages, running tests) goes through [`HostExecutor`].

pub mod command;
pub mod config;
pub mod error;
pub mod process;

use async_trait::async_trait;
pub use command::{CommandOutput, CommandSpec};
pub use config::HostConfig;
pub use error::HostError;
pub use process::ProcessHost;

/// Trait for running commands on the host - allows for different implementations
#[async_trait]
pub trait HostExecutor: Send + Sync {
    /// Run a command to completion and capture its output
    async fn run(&self, command: &CommandSpec) -> Result<CommandOutput, HostError>;
}
