//! Project handle

use std::path::{Path, PathBuf};

/// A runnable project as seen by the executor.
///
/// Owned by the caller and shared read-only with executors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    name: String,
    root: PathBuf,
    classpath: Vec<PathBuf>,
    main_class: String,
}

impl Project {
    /// Create a project rooted at `root` whose entry point is `main_class`
    pub fn new(
        name: impl Into<String>,
        root: impl Into<PathBuf>,
        main_class: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            classpath: vec![],
            main_class: main_class.into(),
        }
    }

    /// Append a classpath entry
    pub fn classpath_entry(mut self, entry: impl Into<PathBuf>) -> Self {
        self.classpath.push(entry.into());
        self
    }

    /// Replace the classpath
    pub fn classpath<I, P>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.classpath = entries.into_iter().map(Into::into).collect();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn classpath_entries(&self) -> &[PathBuf] {
        &self.classpath
    }

    pub fn main_class(&self) -> &str {
        &self.main_class
    }
}
