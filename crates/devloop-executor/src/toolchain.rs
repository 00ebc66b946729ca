//! Runtime toolchain locations
//!
//! Resolved once by the caller and handed to the resolver, so command
//! construction never consults the process environment.

use std::env;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{ExecutorError, Result};

/// Variable naming the toolchain home
pub const HOME_VAR: &str = "JAVA_HOME";

#[cfg(windows)]
const RUNTIME_EXECUTABLE: &str = "java.exe";
#[cfg(not(windows))]
const RUNTIME_EXECUTABLE: &str = "java";

#[cfg(windows)]
const BUILD_TOOL_EXECUTABLE: &str = "mvn.cmd";
#[cfg(not(windows))]
const BUILD_TOOL_EXECUTABLE: &str = "mvn";

/// Locations of the runtime and build tool used to launch projects
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    home: PathBuf,
    runtime: PathBuf,
    build_tool: PathBuf,
}

impl Toolchain {
    /// Toolchain installed at `home`, with the build tool looked up on `PATH` at spawn time
    pub fn new(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        Self {
            runtime: home.join("bin").join(RUNTIME_EXECUTABLE),
            build_tool: PathBuf::from(BUILD_TOOL_EXECUTABLE),
            home,
        }
    }

    /// Override the runtime executable
    pub fn with_runtime(mut self, runtime: impl Into<PathBuf>) -> Self {
        self.runtime = runtime.into();
        self
    }

    /// Override the build tool executable
    pub fn with_build_tool(mut self, build_tool: impl Into<PathBuf>) -> Self {
        self.build_tool = build_tool.into();
        self
    }

    /// Locate the toolchain from `JAVA_HOME`, falling back to the runtime found on `PATH`
    pub fn detect() -> Result<Self> {
        let home = match env::var_os(HOME_VAR).filter(|v| !v.is_empty()) {
            Some(home) => PathBuf::from(home),
            None => home_from_path()?,
        };

        let mut toolchain = Self::new(home);
        if let Ok(build_tool) = which::which(BUILD_TOOL_EXECUTABLE) {
            toolchain.build_tool = build_tool;
        }

        debug!(
            home = %toolchain.home.display(),
            build_tool = %toolchain.build_tool.display(),
            "Detected toolchain"
        );
        Ok(toolchain)
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.home.join("bin")
    }

    pub fn runtime(&self) -> &Path {
        &self.runtime
    }

    pub fn build_tool(&self) -> &Path {
        &self.build_tool
    }
}

/// `<home>/bin/java` resolved through symlinks such as `/usr/bin/java`
fn home_from_path() -> Result<PathBuf> {
    let runtime = which::which(RUNTIME_EXECUTABLE)
        .map_err(|e| ExecutorError::Toolchain(format!("{HOME_VAR} not set and {RUNTIME_EXECUTABLE}: {e}")))?;
    let runtime = runtime.canonicalize().unwrap_or(runtime);

    runtime
        .parent()
        .and_then(Path::parent)
        .map(Path::to_path_buf)
        .ok_or_else(|| {
            ExecutorError::Toolchain(format!(
                "cannot derive toolchain home from {}",
                runtime.display()
            ))
        })
}
