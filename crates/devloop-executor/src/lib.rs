//! # devloop-executor
//!
//! **Purpose**: Runs a project under supervision for the development loop
//!
//! A [`ProjectExecutor`] owns at most one child process per project. It
//! resolves the launch command through a [`LaunchResolver`], forwards the
//! child's output line by line, remembers whether each stream has produced
//! anything since the last start, and stops the child with a bounded
//! graceful-then-forceful escalation.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use devloop_executor::{LaunchResolver, Project, ProjectExecutor, Toolchain};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let project = Arc::new(
//!     Project::new("quickstart", "/work/quickstart", "io.example.Main")
//!         .classpath_entry("target/classes"),
//! );
//! let resolver = LaunchResolver::new(Toolchain::detect()?);
//! let mut executor = ProjectExecutor::new(project, resolver);
//!
//! executor.start()?;
//! // ... rebuild ...
//! executor.stop(false).await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod events;
pub mod executor;
pub mod project;
pub mod resolver;
pub mod settings;
pub mod sink;
pub mod toolchain;

pub use error::{ExecutorError, Result, TIMEOUT_EXPIRED};
pub use events::{LoggingListener, StateChange, StateListener};
pub use executor::{ExecutorState, ProjectExecutor};
pub use project::Project;
pub use resolver::{ExecutionMode, LaunchResolver};
pub use settings::{RunnerSettings, StopPolicy};
pub use sink::{ConsoleSink, NullSink, OutputSink};
pub use toolchain::Toolchain;
