//! Launch command resolution

use std::ffi::OsString;
use std::path::Path;

use devloop_process::{EnvOverlay, LaunchDescriptor};
use serde::Deserialize;

use crate::project::Project;
use crate::toolchain::{Toolchain, HOME_VAR};

/// Trade peak throughput for faster startup
pub const JIT_LEVEL_ONE: &str = "-XX:TieredStopAtLevel=1";
pub const JIT_TWO_COMPILER_THREADS: &str = "-XX:CICompilerCount=2";
pub const CLASSPATH_FLAG: &str = "-cp";

/// Build tool goal that runs the project with its own resolved classpath
pub const BUILD_TOOL_RUN_GOAL: &str = "exec:java";

#[cfg(windows)]
const CLASSPATH_SEPARATOR: &str = ";";
#[cfg(not(windows))]
const CLASSPATH_SEPARATOR: &str = ":";

/// How a project is launched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionMode {
    /// Run the runtime directly with an explicit classpath and main class
    #[default]
    Direct,
    /// Delegate to the build tool's run goal
    BuildTool,
}

/// Turns a project and execution mode into a spawnable command
#[derive(Debug, Clone)]
pub struct LaunchResolver {
    toolchain: Toolchain,
}

impl LaunchResolver {
    pub fn new(toolchain: Toolchain) -> Self {
        Self { toolchain }
    }

    pub fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }

    /// Resolve the launch descriptor for `project`.
    ///
    /// Pure: depends only on the toolchain, the project and the mode.
    pub fn resolve(&self, project: &Project, mode: ExecutionMode) -> LaunchDescriptor {
        let descriptor = match mode {
            ExecutionMode::Direct => {
                LaunchDescriptor::new(self.toolchain.runtime(), project.root())
                    .arg(JIT_LEVEL_ONE)
                    .arg(JIT_TWO_COMPILER_THREADS)
                    .arg(CLASSPATH_FLAG)
                    .arg(classpath_arg(project))
                    .arg(project.main_class())
            }
            ExecutionMode::BuildTool => {
                LaunchDescriptor::new(self.toolchain.build_tool(), project.root())
                    .arg(BUILD_TOOL_RUN_GOAL)
            }
        };

        descriptor.env(
            EnvOverlay::new()
                .prepend_path(self.toolchain.bin_dir())
                .var(HOME_VAR, self.toolchain.home()),
        )
    }
}

/// Classpath entries made absolute against the project root, in order
fn classpath_arg(project: &Project) -> OsString {
    let mut joined = OsString::new();
    for (i, entry) in project.classpath_entries().iter().enumerate() {
        if i > 0 {
            joined.push(CLASSPATH_SEPARATOR);
        }
        joined.push(absolute(project.root(), entry));
    }
    joined
}

fn absolute(root: &Path, entry: &Path) -> OsString {
    if entry.is_absolute() {
        entry.as_os_str().to_owned()
    } else {
        root.join(entry).into_os_string()
    }
}
