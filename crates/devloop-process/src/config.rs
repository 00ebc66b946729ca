//! Launch descriptor and environment overlay

use std::collections::BTreeMap;
use std::env;
use std::ffi::{OsStr, OsString};
use std::path::PathBuf;

use crate::error::{ProcessError, Result};

/// Name of the search path variable the overlay prepends to
pub const PATH_VAR: &str = "PATH";

/// Environment changes applied on top of the inherited environment.
///
/// Variables not mentioned here pass through to the child unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverlay {
    /// Directories placed in front of the inherited `PATH`, in order
    pub path_prefix: Vec<PathBuf>,
    /// Variables set (or replaced) in the child environment
    pub vars: BTreeMap<String, OsString>,
}

impl EnvOverlay {
    /// Create an empty overlay
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepend a directory to the search path
    pub fn prepend_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.path_prefix.push(dir.into());
        self
    }

    /// Set an environment variable
    pub fn var(mut self, key: impl Into<String>, value: impl Into<OsString>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    /// Compute the child's `PATH` from the inherited value.
    ///
    /// Returns `None` when the overlay leaves the search path alone.
    pub fn search_path(&self, inherited: Option<&OsStr>) -> Result<Option<OsString>> {
        if self.path_prefix.is_empty() {
            return Ok(None);
        }

        let inherited = inherited.map(env::split_paths).into_iter().flatten();
        let joined = env::join_paths(self.path_prefix.iter().cloned().chain(inherited))
            .map_err(|e| ProcessError::InvalidEnvironment(e.to_string()))?;
        Ok(Some(joined))
    }
}

/// Fully resolved command ready to spawn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchDescriptor {
    /// Executable path or name
    pub program: PathBuf,
    /// Command arguments
    pub args: Vec<OsString>,
    /// Working directory of the child
    pub working_dir: PathBuf,
    /// Environment overlay
    pub env: EnvOverlay,
}

impl LaunchDescriptor {
    /// Create a descriptor running `program` in `working_dir`
    pub fn new(program: impl Into<PathBuf>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: vec![],
            working_dir: working_dir.into(),
            env: EnvOverlay::default(),
        }
    }

    /// Append a single argument
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Replace the environment overlay
    pub fn env(mut self, env: EnvOverlay) -> Self {
        self.env = env;
        self
    }

    /// Program and arguments joined for log output
    pub fn display_command(&self) -> String {
        std::iter::once(self.program.as_os_str())
            .chain(self.args.iter().map(OsString::as_os_str))
            .map(|part| part.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }
}
