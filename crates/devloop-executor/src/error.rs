//! Executor error types

use devloop_process::ProcessError;
use thiserror::Error;

/// Reason recorded when the stop protocol runs out of attempts
pub const TIMEOUT_EXPIRED: &str = "timeout expired";

/// Executor result type
pub type Result<T> = std::result::Result<T, ExecutorError>;

/// Executor errors
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The project process could not be started
    #[error("Failed to start {project}: {source}")]
    LaunchFailure {
        project: String,
        #[source]
        source: ProcessError,
    },

    /// Termination was not confirmed; the process may still be running
    #[error("Failed to stop {project} (pid {pid}): {reason}")]
    StopFailure {
        project: String,
        pid: u32,
        reason: String,
    },

    /// Settings could not be loaded or failed validation
    #[error("Invalid settings: {0}")]
    Settings(String),

    /// No usable runtime toolchain was found
    #[error("Toolchain not found: {0}")]
    Toolchain(String),
}

impl ExecutorError {
    /// Whether this is a stop failure caused by exhausting the retry budget
    pub fn is_stop_timeout(&self) -> bool {
        matches!(self, ExecutorError::StopFailure { reason, .. } if reason == TIMEOUT_EXPIRED)
    }
}

impl From<config::ConfigError> for ExecutorError {
    fn from(err: config::ConfigError) -> Self {
        ExecutorError::Settings(err.to_string())
    }
}
