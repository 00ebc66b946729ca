//! Project executor - supervised start and escalating stop

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use devloop_process::{OutputHandlers, ProcessHandle, ProcessLauncher, SystemLauncher, WaitOutcome};
use tracing::{debug, error, info, warn};

use crate::{
    error::{ExecutorError, Result, TIMEOUT_EXPIRED},
    events::{LoggingListener, StateChange, StateListener},
    project::Project,
    resolver::{ExecutionMode, LaunchResolver},
    settings::{RunnerSettings, StopPolicy},
    sink::{ConsoleSink, OutputSink},
};

/// Lifecycle of the supervised process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorState {
    /// Nothing has been started
    Idle,
    /// Spawned and presumed alive
    Running,
    /// Stop protocol in progress
    Stopping,
    /// Last run confirmed dead
    Stopped,
    /// Last run could not be confirmed dead; it may still be running
    StopFailed,
}

/// Per-run output flags, written by the pump tasks
#[derive(Debug, Default)]
struct OutputActivity {
    stdout: AtomicBool,
    stderr: AtomicBool,
}

/// Runs a project as a child process and shuts it down on request.
///
/// Holds at most one child at a time. `start` and `stop` must not be called
/// concurrently on the same executor; callers serialize them.
pub struct ProjectExecutor<L: ProcessLauncher = SystemLauncher> {
    project: Arc<Project>,
    mode: ExecutionMode,
    resolver: LaunchResolver,
    launcher: L,
    policy: StopPolicy,
    listener: Arc<dyn StateListener>,
    sink: Arc<dyn OutputSink>,
    process: Option<L::Handle>,
    pid: Option<u32>,
    activity: Arc<OutputActivity>,
    state: ExecutorState,
}

impl ProjectExecutor<SystemLauncher> {
    /// Executor launching real processes in direct mode
    pub fn new(project: Arc<Project>, resolver: LaunchResolver) -> Self {
        Self::with_launcher(project, resolver, SystemLauncher::new())
    }

    /// Executor configured from loaded settings
    pub fn from_settings(project: Arc<Project>, settings: &RunnerSettings) -> Result<Self> {
        settings.validate()?;
        let resolver = LaunchResolver::new(settings.toolchain()?);
        Ok(Self::new(project, resolver)
            .with_mode(settings.mode)
            .with_stop_policy(settings.stop)
            .with_listener(LoggingListener::new(settings.log_prefix.clone())))
    }
}

impl<L: ProcessLauncher> ProjectExecutor<L> {
    /// Executor spawning through a custom launcher
    pub fn with_launcher(project: Arc<Project>, resolver: LaunchResolver, launcher: L) -> Self {
        Self {
            project,
            mode: ExecutionMode::default(),
            resolver,
            launcher,
            policy: StopPolicy::default(),
            listener: Arc::new(LoggingListener::default()),
            sink: Arc::new(ConsoleSink),
            process: None,
            pid: None,
            activity: Arc::new(OutputActivity::default()),
            state: ExecutorState::Idle,
        }
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_stop_policy(mut self, policy: StopPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_listener(mut self, listener: impl StateListener + 'static) -> Self {
        self.listener = Arc::new(listener);
        self
    }

    pub fn with_output_sink(mut self, sink: impl OutputSink + 'static) -> Self {
        self.sink = Arc::new(sink);
        self
    }

    pub fn project(&self) -> &Arc<Project> {
        &self.project
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn stop_policy(&self) -> &StopPolicy {
        &self.policy
    }

    pub fn state(&self) -> ExecutorState {
        self.state
    }

    /// Process id of the most recent successful start
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Start the project and return its process id.
    ///
    /// Starting while a process is still supervised abandons that process
    /// without stopping it; callers are expected to `stop` first.
    pub fn start(&mut self) -> Result<u32> {
        if let Some(previous) = self.process.take() {
            warn!(
                project = %self.project.name(),
                pid = %previous.pid(),
                "Starting while a process is supervised; previous process abandoned"
            );
        }
        self.pid = None;

        // Fresh flags: late lines from an earlier run land on the old ones
        let activity = Arc::new(OutputActivity::default());
        self.activity = activity.clone();

        self.notify(StateChange::Starting);
        let descriptor = self.resolver.resolve(&self.project, self.mode);
        debug!(
            project = %self.project.name(),
            mode = ?self.mode,
            command = %descriptor.display_command(),
            "Launching project"
        );

        match self.launcher.spawn(&descriptor, self.output_handlers(activity)) {
            Ok(process) => {
                let pid = process.pid();
                info!(project = %self.project.name(), pid = %pid, "Project started");
                self.pid = Some(pid);
                self.process = Some(process);
                self.state = ExecutorState::Running;
                Ok(pid)
            }
            Err(source) => {
                error!(project = %self.project.name(), error = %source, "Failed to start project");
                self.state = ExecutorState::Idle;
                Err(ExecutorError::LaunchFailure {
                    project: self.project.name().to_string(),
                    source,
                })
            }
        }
    }

    /// Stop the project, escalating from graceful to forceful termination.
    ///
    /// Without `verbose`, the "stopping" notice is only emitted when the
    /// process does not exit within the first wait. The process is no longer
    /// supervised once this returns, whether or not it succeeded; a
    /// `StopFailure` means it may still be running.
    pub async fn stop(&mut self, verbose: bool) -> Result<()> {
        let Some(mut process) = self.process.take() else {
            return Ok(());
        };
        let pid = process.pid();
        self.state = ExecutorState::Stopping;
        if verbose {
            self.notify(StateChange::Stopping);
        }

        let listener = self.listener.clone();
        let project = self.project.clone();
        let announce = move || listener.state_changed(StateChange::Stopping, project.name());
        let outcome = escalate(&mut process, &self.policy, verbose, announce).await;
        drop(process);

        match outcome {
            Ok(()) => {
                info!(project = %self.project.name(), pid = %pid, "Project stopped");
                self.state = ExecutorState::Stopped;
                if verbose {
                    self.notify(StateChange::Stopped);
                }
                Ok(())
            }
            Err(reason) => {
                warn!(project = %self.project.name(), pid = %pid, reason = %reason, "Failed to stop project");
                self.state = ExecutorState::StopFailed;
                Err(ExecutorError::StopFailure {
                    project: self.project.name().to_string(),
                    pid,
                    reason,
                })
            }
        }
    }

    /// Whether a supervised process exists and the OS reports it alive
    pub fn is_running(&mut self) -> bool {
        self.process.as_mut().is_some_and(|process| process.is_alive())
    }

    /// Whether the current run has written at least one stdout line
    pub fn has_stdout_activity(&self) -> bool {
        self.activity.stdout.load(Ordering::Acquire)
    }

    /// Whether the current run has written at least one stderr line
    pub fn has_stderr_activity(&self) -> bool {
        self.activity.stderr.load(Ordering::Acquire)
    }

    fn notify(&self, change: StateChange) {
        self.listener.state_changed(change, self.project.name());
    }

    fn output_handlers(&self, activity: Arc<OutputActivity>) -> OutputHandlers {
        let (out_activity, out_sink) = (activity.clone(), self.sink.clone());
        let (err_activity, err_sink) = (activity, self.sink.clone());
        OutputHandlers::new(
            move |line| {
                out_activity.stdout.store(true, Ordering::Release);
                out_sink.stdout_line(line);
            },
            move |line| {
                err_activity.stderr.store(true, Ordering::Release);
                err_sink.stderr_line(line);
            },
        )
    }
}

/// Run the bounded termination protocol against `process`.
///
/// Returns the failure reason when death could not be confirmed.
async fn escalate<H, F>(
    process: &mut H,
    policy: &StopPolicy,
    verbose: bool,
    announce: F,
) -> std::result::Result<(), String>
where
    H: ProcessHandle,
    F: Fn(),
{
    let pid = process.pid();
    for step in 0..policy.max_attempts {
        if !verbose && step == policy.log_step {
            announce();
        }

        let force = policy.is_forceful(step);
        process
            .request_termination(force)
            .map_err(|e| e.to_string())?;

        match process.wait_for_exit(policy.wait()).await {
            WaitOutcome::Exited => {
                debug!(pid = %pid, step, force, "Process exit confirmed");
                return Ok(());
            }
            WaitOutcome::TimedOut => match process.try_is_alive() {
                Ok(true) => debug!(pid = %pid, step, force, "Process still alive"),
                // Died after the wait gave up
                Ok(false) => {
                    debug!(pid = %pid, step, force, "Process exited after wait timeout");
                    return Ok(());
                }
                Err(e) => return Err(e.to_string()),
            },
            WaitOutcome::Failed(e) => return Err(e.to_string()),
        }
    }
    Err(TIMEOUT_EXPIRED.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolchain::Toolchain;
    use async_trait::async_trait;
    use devloop_process::{LaunchDescriptor, ProcessError};
    use parking_lot::Mutex;
    use std::io;
    use std::time::Duration;

    /// How the scripted process reacts to the protocol
    #[derive(Debug, Default, Clone)]
    struct Script {
        /// Exit once this many graceful requests have arrived
        exit_after_graceful: Option<usize>,
        exit_on_force: bool,
        /// Exit on its own during this wait (reported as a timeout)
        exit_during_wait: Option<usize>,
        fail_wait: Option<usize>,
        fail_signal: bool,
        /// Liveness queries fail once the process has been signalled
        fail_liveness: bool,
        fail_spawn: bool,
    }

    #[derive(Default)]
    struct Shared {
        script: Script,
        alive: bool,
        signals: Vec<bool>,
        waits: usize,
        spawns: usize,
        descriptors: Vec<LaunchDescriptor>,
        output: Option<OutputHandlers>,
    }

    #[derive(Clone, Default)]
    struct ScriptedLauncher {
        shared: Arc<Mutex<Shared>>,
    }

    impl ScriptedLauncher {
        fn new(script: Script) -> Self {
            let launcher = Self::default();
            launcher.shared.lock().script = script;
            launcher
        }

        fn signals(&self) -> Vec<bool> {
            self.shared.lock().signals.clone()
        }

        fn emit_stdout(&self, line: &str) {
            let output = self.shared.lock().output.clone().unwrap();
            (output.stdout)(line);
        }

        fn emit_stderr(&self, line: &str) {
            let output = self.shared.lock().output.clone().unwrap();
            (output.stderr)(line);
        }

        /// Handlers of the current run, kept so a test can replay stale output
        fn current_output(&self) -> OutputHandlers {
            self.shared.lock().output.clone().unwrap()
        }
    }

    struct ScriptedHandle {
        shared: Arc<Mutex<Shared>>,
        pid: u32,
    }

    impl ProcessLauncher for ScriptedLauncher {
        type Handle = ScriptedHandle;

        fn spawn(
            &self,
            descriptor: &LaunchDescriptor,
            output: OutputHandlers,
        ) -> devloop_process::Result<ScriptedHandle> {
            let mut shared = self.shared.lock();
            if shared.script.fail_spawn {
                return Err(ProcessError::SpawnFailed(io::Error::new(
                    io::ErrorKind::NotFound,
                    "no such file",
                )));
            }
            shared.spawns += 1;
            shared.alive = true;
            shared.signals.clear();
            shared.waits = 0;
            shared.descriptors.push(descriptor.clone());
            shared.output = Some(output);
            Ok(ScriptedHandle {
                shared: self.shared.clone(),
                pid: 1000 + shared.spawns as u32,
            })
        }
    }

    #[async_trait]
    impl ProcessHandle for ScriptedHandle {
        fn pid(&self) -> u32 {
            self.pid
        }

        fn try_is_alive(&mut self) -> devloop_process::Result<bool> {
            let shared = self.shared.lock();
            if shared.script.fail_liveness && !shared.signals.is_empty() {
                return Err(ProcessError::Status {
                    pid: self.pid,
                    source: io::Error::from_raw_os_error(10),
                });
            }
            Ok(shared.alive)
        }

        fn request_termination(&mut self, force: bool) -> devloop_process::Result<()> {
            let mut shared = self.shared.lock();
            if shared.script.fail_signal {
                return Err(ProcessError::Signal {
                    pid: self.pid,
                    reason: "Operation not permitted".to_string(),
                });
            }
            shared.signals.push(force);
            let graceful = shared.signals.iter().filter(|f| !**f).count();
            if force && shared.script.exit_on_force {
                shared.alive = false;
            }
            if !force && shared.script.exit_after_graceful.is_some_and(|n| graceful >= n) {
                shared.alive = false;
            }
            Ok(())
        }

        async fn wait_for_exit(&mut self, _timeout: Duration) -> WaitOutcome {
            let mut shared = self.shared.lock();
            let index = shared.waits;
            shared.waits += 1;
            if shared.script.fail_wait == Some(index) {
                return WaitOutcome::Failed(ProcessError::Wait(io::Error::new(
                    io::ErrorKind::Other,
                    "wait interrupted",
                )));
            }
            if shared.script.exit_during_wait == Some(index) {
                shared.alive = false;
                return WaitOutcome::TimedOut;
            }
            if shared.alive {
                WaitOutcome::TimedOut
            } else {
                WaitOutcome::Exited
            }
        }
    }

    struct Fixture {
        executor: ProjectExecutor<ScriptedLauncher>,
        launcher: ScriptedLauncher,
        events: Arc<Mutex<Vec<StateChange>>>,
        lines: Arc<Mutex<Vec<String>>>,
    }

    struct RecordingSink(Arc<Mutex<Vec<String>>>);

    impl OutputSink for RecordingSink {
        fn stdout_line(&self, line: &str) {
            self.0.lock().push(format!("out:{line}"));
        }

        fn stderr_line(&self, line: &str) {
            self.0.lock().push(format!("err:{line}"));
        }
    }

    fn fixture(script: Script) -> Fixture {
        let launcher = ScriptedLauncher::new(script);
        let events = Arc::new(Mutex::new(Vec::new()));
        let lines = Arc::new(Mutex::new(Vec::new()));
        let recorded = events.clone();

        let project = Arc::new(
            Project::new("quickstart", "/work/quickstart", "io.example.Main")
                .classpath_entry("target/classes"),
        );
        let executor = ProjectExecutor::with_launcher(
            project,
            LaunchResolver::new(Toolchain::new("/opt/jdk")),
            launcher.clone(),
        )
        .with_stop_policy(StopPolicy::default().with_wait(Duration::from_millis(10)))
        .with_listener(move |change: StateChange, _project: &str| recorded.lock().push(change))
        .with_output_sink(RecordingSink(lines.clone()));

        Fixture {
            executor,
            launcher,
            events,
            lines,
        }
    }

    #[tokio::test]
    async fn test_stop_when_idle_is_noop() {
        let mut f = fixture(Script::default());
        f.executor.stop(true).await.unwrap();
        f.executor.stop(false).await.unwrap();

        assert_eq!(f.executor.state(), ExecutorState::Idle);
        assert!(f.events.lock().is_empty());
        assert!(!f.executor.is_running());
    }

    #[tokio::test]
    async fn test_start_records_pid_and_runs() {
        let mut f = fixture(Script::default());
        let pid = f.executor.start().unwrap();

        assert_eq!(f.executor.pid(), Some(pid));
        assert!(f.executor.is_running());
        assert_eq!(f.executor.state(), ExecutorState::Running);
        assert_eq!(*f.events.lock(), vec![StateChange::Starting]);
        assert!(!f.executor.has_stdout_activity());
        assert!(!f.executor.has_stderr_activity());

        let descriptor = f.launcher.shared.lock().descriptors[0].clone();
        assert_eq!(descriptor.program, Toolchain::new("/opt/jdk").runtime());
    }

    #[tokio::test]
    async fn test_prompt_exit_is_quiet() {
        let mut f = fixture(Script {
            exit_after_graceful: Some(1),
            ..Script::default()
        });
        f.executor.start().unwrap();
        f.executor.stop(false).await.unwrap();

        assert_eq!(f.launcher.signals(), vec![false]);
        assert_eq!(*f.events.lock(), vec![StateChange::Starting]);
        assert_eq!(f.executor.state(), ExecutorState::Stopped);
        assert!(!f.executor.is_running());
    }

    #[tokio::test]
    async fn test_verbose_stop_reports_every_transition() {
        let mut f = fixture(Script {
            exit_after_graceful: Some(1),
            ..Script::default()
        });
        f.executor.start().unwrap();
        f.executor.stop(true).await.unwrap();

        assert_eq!(
            *f.events.lock(),
            vec![
                StateChange::Starting,
                StateChange::Stopping,
                StateChange::Stopped
            ]
        );
    }

    #[tokio::test]
    async fn test_slow_exit_announces_stopping_once() {
        let mut f = fixture(Script {
            exit_after_graceful: Some(3),
            ..Script::default()
        });
        f.executor.start().unwrap();
        f.executor.stop(false).await.unwrap();

        assert_eq!(f.launcher.signals(), vec![false, false, false]);
        assert_eq!(
            *f.events.lock(),
            vec![StateChange::Starting, StateChange::Stopping]
        );
    }

    #[tokio::test]
    async fn test_ignores_graceful_but_dies_on_force() {
        let mut f = fixture(Script {
            exit_on_force: true,
            ..Script::default()
        });
        f.executor.start().unwrap();
        f.executor.stop(false).await.unwrap();

        assert_eq!(f.launcher.signals(), vec![false, false, false, true]);
        assert_eq!(f.executor.state(), ExecutorState::Stopped);
    }

    #[tokio::test]
    async fn test_exit_before_force_step_never_forces() {
        let mut f = fixture(Script {
            exit_on_force: true,
            exit_during_wait: Some(1),
            ..Script::default()
        });
        f.executor.start().unwrap();
        f.executor.stop(false).await.unwrap();

        let signals = f.launcher.signals();
        assert_eq!(signals, vec![false, false]);
        assert!(signals.iter().all(|force| !force));
    }

    #[tokio::test]
    async fn test_never_exits_fails_after_budget() {
        let mut f = fixture(Script::default());
        let pid = f.executor.start().unwrap();
        let err = f.executor.stop(false).await.unwrap_err();

        assert!(err.is_stop_timeout());
        assert_eq!(
            err.to_string(),
            format!("Failed to stop quickstart (pid {pid}): timeout expired")
        );
        assert_eq!(f.launcher.signals(), vec![false, false, false, true, true]);
        assert_eq!(f.executor.state(), ExecutorState::StopFailed);

        // No longer supervised, though the scripted process is still alive
        assert!(f.launcher.shared.lock().alive);
        assert!(!f.executor.is_running());
        f.executor.stop(true).await.unwrap();
    }

    #[tokio::test]
    async fn test_wait_failure_aborts_protocol() {
        let mut f = fixture(Script {
            fail_wait: Some(0),
            ..Script::default()
        });
        f.executor.start().unwrap();
        let err = f.executor.stop(true).await.unwrap_err();

        match &err {
            ExecutorError::StopFailure { reason, .. } => assert!(reason.contains("wait interrupted")),
            other => panic!("unexpected error: {other}"),
        }
        assert!(!err.is_stop_timeout());
        assert_eq!(f.launcher.signals(), vec![false]);
        assert!(!f.executor.is_running());
        assert_eq!(
            *f.events.lock(),
            vec![StateChange::Starting, StateChange::Stopping]
        );
    }

    #[tokio::test]
    async fn test_signal_failure_is_stop_failure() {
        let mut f = fixture(Script {
            fail_signal: true,
            ..Script::default()
        });
        f.executor.start().unwrap();
        let err = f.executor.stop(false).await.unwrap_err();

        assert!(matches!(err, ExecutorError::StopFailure { .. }));
        assert!(err.to_string().contains("Operation not permitted"));
        assert_eq!(f.executor.state(), ExecutorState::StopFailed);
    }

    #[tokio::test]
    async fn test_liveness_failure_is_stop_failure() {
        let mut f = fixture(Script {
            fail_liveness: true,
            ..Script::default()
        });
        f.executor.start().unwrap();
        assert!(f.executor.is_running());
        let err = f.executor.stop(true).await.unwrap_err();

        match &err {
            ExecutorError::StopFailure { reason, .. } => {
                assert!(reason.contains("Failed to query process status"))
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!err.is_stop_timeout());
        assert_eq!(f.launcher.signals(), vec![false]);
        assert_eq!(f.executor.state(), ExecutorState::StopFailed);
        assert_eq!(
            *f.events.lock(),
            vec![StateChange::Starting, StateChange::Stopping]
        );
    }

    #[test]
    fn test_start_outside_runtime_is_launch_failure() {
        let project = Arc::new(Project::new("quickstart", "/", "io.example.Main"));
        let mut executor =
            ProjectExecutor::new(project, LaunchResolver::new(Toolchain::new("/opt/jdk")))
                .with_listener(|_: StateChange, _: &str| {});

        let err = executor.start().unwrap_err();
        match err {
            ExecutorError::LaunchFailure { source, .. } => {
                assert!(matches!(source, ProcessError::NoRuntime))
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(executor.state(), ExecutorState::Idle);
        assert_eq!(executor.pid(), None);
    }

    #[tokio::test]
    async fn test_launch_failure_leaves_idle() {
        let mut f = fixture(Script {
            fail_spawn: true,
            ..Script::default()
        });
        let err = f.executor.start().unwrap_err();

        assert!(matches!(err, ExecutorError::LaunchFailure { .. }));
        assert_eq!(f.executor.state(), ExecutorState::Idle);
        assert_eq!(f.executor.pid(), None);
        assert!(!f.executor.is_running());
        f.executor.stop(false).await.unwrap();
    }

    #[tokio::test]
    async fn test_activity_flags_are_independent() {
        let mut f = fixture(Script::default());
        f.executor.start().unwrap();

        f.launcher.emit_stdout("listening on 8080");
        assert!(f.executor.has_stdout_activity());
        assert!(!f.executor.has_stderr_activity());

        f.launcher.emit_stderr("warning: deprecated");
        f.launcher.emit_stdout("ready");
        assert!(f.executor.has_stdout_activity());
        assert!(f.executor.has_stderr_activity());

        assert_eq!(
            *f.lines.lock(),
            vec![
                "out:listening on 8080",
                "err:warning: deprecated",
                "out:ready"
            ]
        );
    }

    #[tokio::test]
    async fn test_restart_resets_flags_and_handle() {
        let mut f = fixture(Script {
            exit_after_graceful: Some(1),
            ..Script::default()
        });
        let first = f.executor.start().unwrap();
        f.launcher.emit_stdout("first run");
        f.launcher.emit_stderr("first run");
        let stale = f.launcher.current_output();
        f.executor.stop(false).await.unwrap();
        assert!(!f.executor.is_running());

        let second = f.executor.start().unwrap();
        assert_ne!(first, second);
        assert!(!f.executor.has_stdout_activity());
        assert!(!f.executor.has_stderr_activity());

        // Late output from the previous run must not mark the new one
        (stale.stdout)("late line");
        assert!(!f.executor.has_stdout_activity());

        assert!(f.executor.is_running());
        f.executor.stop(false).await.unwrap();
        assert_eq!(f.launcher.shared.lock().spawns, 2);
    }

    #[tokio::test]
    async fn test_custom_policy() {
        let mut f = fixture(Script::default());
        f.executor = f.executor.with_stop_policy(
            StopPolicy::default()
                .with_max_attempts(2)
                .with_force_step(0)
                .with_wait(Duration::from_millis(5)),
        );
        f.executor.start().unwrap();
        let err = f.executor.stop(true).await.unwrap_err();

        assert!(err.is_stop_timeout());
        assert_eq!(f.launcher.signals(), vec![true, true]);
    }

    #[tokio::test]
    async fn test_build_tool_mode_descriptor() {
        let mut f = fixture(Script::default());
        f.executor = f.executor.with_mode(ExecutionMode::BuildTool);
        f.executor.start().unwrap();

        let descriptor = f.launcher.shared.lock().descriptors[0].clone();
        assert_eq!(descriptor.args, vec![std::ffi::OsString::from("exec:java")]);
        assert_eq!(f.executor.mode(), ExecutionMode::BuildTool);
    }
}
