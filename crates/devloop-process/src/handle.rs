//! Seams between the supervisor and the operating system

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::config::LaunchDescriptor;
use crate::error::{ProcessError, Result};

/// Callback invoked once per line produced on a stream
pub type LineCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Line callbacks for the two output streams
#[derive(Clone)]
pub struct OutputHandlers {
    pub stdout: LineCallback,
    pub stderr: LineCallback,
}

impl OutputHandlers {
    pub fn new<O, E>(stdout: O, stderr: E) -> Self
    where
        O: Fn(&str) + Send + Sync + 'static,
        E: Fn(&str) + Send + Sync + 'static,
    {
        Self {
            stdout: Arc::new(stdout),
            stderr: Arc::new(stderr),
        }
    }

    /// Handlers that drop every line
    pub fn discard() -> Self {
        Self::new(|_| {}, |_| {})
    }
}

impl fmt::Debug for OutputHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputHandlers").finish_non_exhaustive()
    }
}

/// Result of a bounded wait for process exit
#[derive(Debug)]
pub enum WaitOutcome {
    /// The process is confirmed gone
    Exited,
    /// The timeout elapsed and the process may still be alive
    TimedOut,
    /// The wait itself failed
    Failed(ProcessError),
}

impl WaitOutcome {
    pub fn is_exited(&self) -> bool {
        matches!(self, WaitOutcome::Exited)
    }
}

/// A live child process owned by exactly one supervisor
#[async_trait]
pub trait ProcessHandle: Send {
    /// OS process id
    fn pid(&self) -> u32;

    /// Whether the OS still reports the process alive, or why it could not tell
    fn try_is_alive(&mut self) -> Result<bool>;

    /// Whether the OS still reports the process alive; a failed query reads as not alive
    fn is_alive(&mut self) -> bool {
        match self.try_is_alive() {
            Ok(alive) => alive,
            Err(e) => {
                warn!(pid = %self.pid(), error = %e, "Failed to query process status");
                false
            }
        }
    }

    /// Send a graceful (`force == false`) or forceful termination request.
    ///
    /// Does not wait. Requesting termination of an exited process succeeds.
    fn request_termination(&mut self, force: bool) -> Result<()>;

    /// Wait up to `timeout` for the process to exit
    async fn wait_for_exit(&mut self, timeout: Duration) -> WaitOutcome;
}

/// Starts child processes
pub trait ProcessLauncher: Send + Sync {
    type Handle: ProcessHandle;

    /// Spawn `descriptor`, delivering each output line to `output`.
    ///
    /// Lines of one stream arrive in order on a task distinct from the caller;
    /// no ordering holds between the two streams.
    fn spawn(&self, descriptor: &LaunchDescriptor, output: OutputHandlers) -> Result<Self::Handle>;
}
