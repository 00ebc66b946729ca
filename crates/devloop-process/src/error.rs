//! Error types for the process primitive

use std::io;
use thiserror::Error;

/// Process primitive errors
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The OS refused to start the child (missing executable, permissions, bad directory)
    #[error("Failed to spawn process: {0}")]
    SpawnFailed(#[from] io::Error),

    /// The child started but the OS did not report a process id
    #[error("Spawned process has no process id")]
    MissingPid,

    /// Spawning needs a tokio runtime to drive the child and its line pumps
    #[error("No tokio runtime available to supervise the process")]
    NoRuntime,

    /// The environment overlay could not be applied
    #[error("Invalid process environment: {0}")]
    InvalidEnvironment(String),

    /// A termination signal could not be delivered
    #[error("Failed to signal process (PID: {pid}): {reason}")]
    Signal { pid: u32, reason: String },

    /// The OS could not report whether the child is still running
    #[error("Failed to query process status (PID: {pid}): {source}")]
    Status {
        pid: u32,
        #[source]
        source: io::Error,
    },

    /// Waiting for the child to exit failed for a reason other than a timeout
    #[error("Failed waiting for process: {0}")]
    Wait(io::Error),
}

/// Result type for process operations
pub type Result<T> = std::result::Result<T, ProcessError>;
