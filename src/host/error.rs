//! Host command errors

use thiserror::Error;

/// Error types for host command execution
#[derive(Debug, Error)]
pub enum HostError {
    #[error("failed to spawn {program}: {message}")]
    Spawn { program: String, message: String },

    #[error("timeout after {0} seconds")]
    Timeout(u64),
}

impl HostError {
    /// The program could not be started at all (e.g. not on PATH)
    pub fn is_spawn_failure(&self) -> bool {
        matches!(self, HostError::Spawn { .. })
    }
}
