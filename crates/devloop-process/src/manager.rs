//! Tokio-backed process launcher

use std::env;
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info};

use crate::{
    child::ManagedChild,
    config::{LaunchDescriptor, PATH_VAR},
    error::{ProcessError, Result},
    handle::{OutputHandlers, ProcessLauncher},
    output::{pump_lines, Stream},
};

/// Spawns real OS processes with piped, line-pumped output
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLauncher;

impl SystemLauncher {
    /// Create new launcher
    pub fn new() -> Self {
        Self
    }

    fn command(descriptor: &LaunchDescriptor) -> Result<Command> {
        let mut cmd = Command::new(&descriptor.program);
        cmd.args(&descriptor.args).current_dir(&descriptor.working_dir);

        // Overlay on top of the inherited environment
        for (key, value) in &descriptor.env.vars {
            cmd.env(key, value);
        }
        let inherited = env::var_os(PATH_VAR);
        if let Some(path) = descriptor.env.search_path(inherited.as_deref())? {
            cmd.env(PATH_VAR, path);
        }

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        Ok(cmd)
    }
}

impl ProcessLauncher for SystemLauncher {
    type Handle = ManagedChild;

    /// Spawn a process described by `descriptor`
    ///
    /// # Examples
    /// ```no_run
    /// use devloop_process::{LaunchDescriptor, OutputHandlers, ProcessLauncher, SystemLauncher};
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let descriptor = LaunchDescriptor::new("echo", ".").arg("hello");
    /// let output = OutputHandlers::new(|line| println!("{line}"), |line| eprintln!("{line}"));
    /// let child = SystemLauncher::new().spawn(&descriptor, output)?;
    /// # Ok(())
    /// # }
    /// ```
    fn spawn(&self, descriptor: &LaunchDescriptor, output: OutputHandlers) -> Result<ManagedChild> {
        debug!(
            command = %descriptor.display_command(),
            working_dir = %descriptor.working_dir.display(),
            "Spawning process"
        );

        // The child reaper and the line pumps both need a runtime
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(ProcessError::NoRuntime);
        }

        let mut child = Self::command(descriptor)?.spawn()?;
        let pid = match child.id() {
            Some(pid) => pid,
            None => {
                let _ = child.start_kill();
                return Err(ProcessError::MissingPid);
            }
        };

        // Pumps run detached and end at EOF, which may outlive the handle
        if let Some(stdout) = child.stdout.take() {
            pump_lines(pid, Stream::Stdout, stdout, output.stdout);
        }
        if let Some(stderr) = child.stderr.take() {
            pump_lines(pid, Stream::Stderr, stderr, output.stderr);
        }

        info!(pid = %pid, program = %descriptor.program.display(), "Process spawned");

        Ok(ManagedChild::new(child, pid))
    }
}
