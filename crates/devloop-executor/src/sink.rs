//! Destinations for captured project output

/// Receives every line the project writes
pub trait OutputSink: Send + Sync {
    fn stdout_line(&self, line: &str);
    fn stderr_line(&self, line: &str);
}

/// Echoes project output to this process's own stdout and stderr
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSink;

impl OutputSink for ConsoleSink {
    fn stdout_line(&self, line: &str) {
        println!("{line}");
    }

    fn stderr_line(&self, line: &str) {
        eprintln!("{line}");
    }
}

/// Drops all output; only the activity flags are kept
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl OutputSink for NullSink {
    fn stdout_line(&self, _line: &str) {}

    fn stderr_line(&self, _line: &str) {}
}
