//! Timing samples and the run report.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Operation names used in report keys.
pub mod op {
    pub const CREATE_TABLE: &str = "createTable";
    pub const ADD_RECORDS: &str = "addRecords";
    pub const SELECT: &str = "select";
    pub const ALL_QUERIES: &str = "allQueries";
    pub const DROP_TABLE: &str = "dropTable";
}

/// Report key for a backend operation.
pub fn key(backend: &str, operation: &str) -> String {
    format!("{}.{}", backend, operation)
}

/// Elapsed time per `<backend>.<operation>` key, iterated in key order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timings(BTreeMap<String, Duration>);

impl Timings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `elapsed` to the running total for `key`.
    pub fn add(&mut self, key: impl Into<String>, elapsed: Duration) {
        *self.0.entry(key.into()).or_default() += elapsed;
    }

    pub fn get(&self, key: &str) -> Option<Duration> {
        self.0.get(key).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Duration)> {
        self.0.iter().map(|(k, d)| (k.as_str(), *d))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Timings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, elapsed) in self.iter() {
            writeln!(f, "{} in {:.3} s", key, elapsed.as_secs_f64())?;
        }
        Ok(())
    }
}

/// One group of report lines, optionally headed by a title line.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub title: Option<String>,
    pub timings: Timings,
}

/// A cleanup step that failed after the workload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupFailure {
    pub backend: String,
    pub error: String,
}

/// Everything measured during one run, in phase order.
///
/// A failed run still yields the sections completed before the failure.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Report {
    sections: Vec<Section>,
    cleanup_failures: Vec<CleanupFailure>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, title: Option<String>, timings: Timings) {
        self.sections.push(Section { title, timings });
    }

    /// Open an empty section and return its timings for filling in.
    pub fn begin(&mut self, title: Option<String>) -> &mut Timings {
        self.sections.push(Section {
            title,
            timings: Timings::new(),
        });
        let last = self.sections.len() - 1;
        &mut self.sections[last].timings
    }

    pub fn push_cleanup_failure(&mut self, backend: impl Into<String>, error: impl ToString) {
        self.cleanup_failures.push(CleanupFailure {
            backend: backend.into(),
            error: error.to_string(),
        });
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn cleanup_failures(&self) -> &[CleanupFailure] {
        &self.cleanup_failures
    }

    /// First section holding `key`.
    pub fn find(&self, key: &str) -> Option<Duration> {
        self.sections.iter().find_map(|s| s.timings.get(key))
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for section in &self.sections {
            if let Some(title) = &section.title {
                writeln!(f, "{}", title)?;
            }
            write!(f, "{}", section.timings)?;
            writeln!(f)?;
        }
        for failure in &self.cleanup_failures {
            writeln!(f, "cleanup failed: {}: {}", failure.backend, failure.error)?;
        }
        Ok(())
    }
}
