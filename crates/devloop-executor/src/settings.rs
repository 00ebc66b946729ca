//! Executor settings
//!
//! Loaded from an optional TOML file layered under `DEVLOOP_*` environment
//! variables, e.g. `DEVLOOP_STOP__WAIT_MS=250`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use tracing::debug;

use crate::error::{ExecutorError, Result};
use crate::resolver::ExecutionMode;
use crate::toolchain::Toolchain;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "DEVLOOP";

/// Escalation parameters for stopping a process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StopPolicy {
    /// Total termination attempts before giving up
    pub max_attempts: u32,
    /// First attempt that uses a forceful signal
    pub force_step: u32,
    /// Attempt at which a quiet stop announces itself
    pub log_step: u32,
    /// Per-attempt wait for exit, in milliseconds
    pub wait_ms: u64,
}

impl StopPolicy {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
    pub const DEFAULT_FORCE_STEP: u32 = 3;
    pub const DEFAULT_LOG_STEP: u32 = 1;
    pub const DEFAULT_WAIT: Duration = Duration::from_secs(1);

    /// Set the per-attempt wait
    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait_ms = wait.as_millis() as u64;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_force_step(mut self, force_step: u32) -> Self {
        self.force_step = force_step;
        self
    }

    pub fn wait(&self) -> Duration {
        Duration::from_millis(self.wait_ms)
    }

    /// Whether attempt `step` sends a forceful signal
    pub fn is_forceful(&self, step: u32) -> bool {
        step >= self.force_step
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(ExecutorError::Settings(
                "stop.max_attempts must be greater than 0".to_string(),
            ));
        }
        if self.wait_ms == 0 {
            return Err(ExecutorError::Settings(
                "stop.wait_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for StopPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
            force_step: Self::DEFAULT_FORCE_STEP,
            log_step: Self::DEFAULT_LOG_STEP,
            wait_ms: Self::DEFAULT_WAIT.as_millis() as u64,
        }
    }
}

/// Settings for running a project in the dev loop
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RunnerSettings {
    /// Stop escalation
    pub stop: StopPolicy,
    /// Launch mode
    pub mode: ExecutionMode,
    /// Toolchain home; detected when absent
    pub java_home: Option<PathBuf>,
    /// Build tool executable; defaults to the one found on `PATH`
    pub build_tool: Option<PathBuf>,
    /// Prefix for state-change log lines
    pub log_prefix: Option<String>,
}

impl RunnerSettings {
    /// Load settings from `path` (if given and present) and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(false));
        }
        let settings: RunnerSettings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        debug!(?settings, "Loaded runner settings");
        Ok(settings)
    }

    /// Parse settings from TOML text, ignoring the environment
    pub fn from_toml(text: &str) -> Result<Self> {
        let settings: RunnerSettings = Config::builder()
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        self.stop.validate()
    }

    /// Toolchain from the configured home, or detected when none is set
    pub fn toolchain(&self) -> Result<Toolchain> {
        let toolchain = match &self.java_home {
            Some(home) => Toolchain::new(home),
            None => Toolchain::detect()?,
        };
        Ok(match &self.build_tool {
            Some(build_tool) => toolchain.with_build_tool(build_tool),
            None => toolchain,
        })
    }
}
