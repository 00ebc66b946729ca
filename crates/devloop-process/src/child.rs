//! Managed child process wrapper

use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Child;
use tracing::debug;

use crate::{
    error::{ProcessError, Result},
    handle::{ProcessHandle, WaitOutcome},
};

/// Wrapper around tokio::process::Child with signal-based termination
pub struct ManagedChild {
    /// Underlying tokio child process
    child: Child,
    /// Process ID, captured at spawn so it survives reaping
    pid: u32,
}

impl ManagedChild {
    pub(crate) fn new(child: Child, pid: u32) -> Self {
        Self { child, pid }
    }

    /// Whether the child has been reaped already
    fn has_exited(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(Some(_)))
    }

    #[cfg(unix)]
    fn send_signal(&mut self, force: bool) -> Result<()> {
        use nix::errno::Errno;
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let signal = if force {
            Signal::SIGKILL
        } else {
            Signal::SIGTERM
        };

        match kill(Pid::from_raw(self.pid as i32), signal) {
            Ok(()) => {
                debug!(pid = %self.pid, signal = ?signal, "Sent termination signal");
                Ok(())
            }
            // Exited between the liveness check and the signal
            Err(Errno::ESRCH) => Ok(()),
            Err(e) => Err(ProcessError::Signal {
                pid: self.pid,
                reason: e.desc().to_string(),
            }),
        }
    }

    #[cfg(not(unix))]
    fn send_signal(&mut self, force: bool) -> Result<()> {
        // No graceful equivalent: both requests terminate the process
        debug!(pid = %self.pid, force, "Terminating process");
        self.child.start_kill().map_err(|e| ProcessError::Signal {
            pid: self.pid,
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl ProcessHandle for ManagedChild {
    fn pid(&self) -> u32 {
        self.pid
    }

    fn try_is_alive(&mut self) -> Result<bool> {
        match self.child.try_wait() {
            Ok(status) => Ok(status.is_none()),
            Err(source) => Err(ProcessError::Status {
                pid: self.pid,
                source,
            }),
        }
    }

    fn request_termination(&mut self, force: bool) -> Result<()> {
        // Never signal a reaped pid: the OS may have handed it to someone else
        if self.has_exited() {
            return Ok(());
        }
        self.send_signal(force)
    }

    async fn wait_for_exit(&mut self, timeout: Duration) -> WaitOutcome {
        match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(Ok(status)) => {
                debug!(pid = %self.pid, status = %status, "Process exited");
                WaitOutcome::Exited
            }
            Ok(Err(e)) => WaitOutcome::Failed(ProcessError::Wait(e)),
            Err(_) => WaitOutcome::TimedOut,
        }
    }
}
