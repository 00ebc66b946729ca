//! State-change notifications

use std::fmt;

use colored::Colorize;
use tracing::info;

/// Lifecycle transitions reported to listeners
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateChange {
    Starting,
    Stopping,
    Stopped,
}

impl StateChange {
    pub fn message(&self) -> &'static str {
        match self {
            StateChange::Starting => "starting",
            StateChange::Stopping => "stopping",
            StateChange::Stopped => "stopped",
        }
    }
}

impl fmt::Display for StateChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Receives lifecycle transitions for a project
pub trait StateListener: Send + Sync {
    fn state_changed(&self, change: StateChange, project: &str);
}

impl<F> StateListener for F
where
    F: Fn(StateChange, &str) + Send + Sync,
{
    fn state_changed(&self, change: StateChange, project: &str) {
        self(change, project)
    }
}

/// Writes transitions to the log, styled for a terminal
#[derive(Debug, Clone)]
pub struct LoggingListener {
    prefix: Option<String>,
    use_colors: bool,
}

impl LoggingListener {
    pub fn new(prefix: Option<String>) -> Self {
        Self {
            prefix,
            use_colors: atty::is(atty::Stream::Stdout),
        }
    }

    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }

    /// Render a transition the way it appears in the log
    pub fn format(&self, change: StateChange, project: &str) -> String {
        let prefix = self.prefix.as_deref().unwrap_or("");
        if !self.use_colors {
            return format!("{prefix}{project} {change}");
        }

        let state = match change {
            StateChange::Starting => change.message().bright_green().bold(),
            StateChange::Stopping => change.message().yellow().bold(),
            StateChange::Stopped => change.message().bright_red().bold(),
        };
        format!("{prefix}{} {state}", project.bright_cyan().bold())
    }
}

impl Default for LoggingListener {
    fn default() -> Self {
        Self::new(None)
    }
}

impl StateListener for LoggingListener {
    fn state_changed(&self, change: StateChange, project: &str) {
        info!("{}", self.format(change, project));
    }
}
