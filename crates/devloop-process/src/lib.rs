//! # devloop-process
//!
//! **Purpose**: Child process primitive used by the dev-loop executor
//!
//! Spawns a fully resolved [`LaunchDescriptor`], streams its stdout and stderr
//! line by line to caller callbacks, and exposes the small set of operations a
//! supervisor needs to terminate it: liveness, graceful or forceful
//! termination requests, and a bounded wait that reports a tagged
//! [`WaitOutcome`] instead of an error for timeouts.
//!
//! The [`ProcessLauncher`] and [`ProcessHandle`] traits are the seam between
//! supervision logic and the operating system; [`SystemLauncher`] is the
//! tokio-backed implementation.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use devloop_process::{
//!     LaunchDescriptor, OutputHandlers, ProcessHandle, ProcessLauncher, SystemLauncher,
//! };
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let descriptor = LaunchDescriptor::new("sleep", ".").arg("1000");
//! let mut child = SystemLauncher::new().spawn(&descriptor, OutputHandlers::discard())?;
//!
//! child.request_termination(false)?;
//! let outcome = child.wait_for_exit(Duration::from_secs(1)).await;
//! assert!(outcome.is_exited());
//! # Ok(())
//! # }
//! ```

pub mod child;
pub mod config;
pub mod error;
pub mod handle;
pub mod manager;
pub mod output;

pub use child::ManagedChild;
pub use config::{EnvOverlay, LaunchDescriptor, PATH_VAR};
pub use error::{ProcessError, Result};
pub use handle::{LineCallback, OutputHandlers, ProcessHandle, ProcessLauncher, WaitOutcome};
pub use manager::SystemLauncher;
pub use output::Stream;
