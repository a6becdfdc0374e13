//! Run configuration: connection settings, query templates, batch sizing.

use std::collections::BTreeMap;
use std::path::Path;

use crate::backends::BackendKind;
use crate::error::{Error, Result};
use crate::sql::QueryTemplate;

/// Default records per insert call.
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// Default records per run (1 000 batches of the default size).
pub const DEFAULT_TOTAL_SIZE: usize = 10_000_000;

/// Connection settings per backend, as read from the connection file.
///
/// The settings object of each backend is kept opaque here and parsed by the
/// backend itself when it connects.
#[derive(Debug, Clone, Default)]
pub struct ConnectionConfigs {
    backends: BTreeMap<BackendKind, serde_json::Value>,
}

impl ConnectionConfigs {
    /// Parse a connection file. Every key must name a known backend.
    pub fn from_json(text: &str) -> Result<Self> {
        let raw: BTreeMap<String, serde_json::Value> = serde_json::from_str(text)?;

        let mut backends = BTreeMap::new();
        for (name, settings) in raw {
            let kind: BackendKind = name.parse()?;
            if !settings.is_object() {
                return Err(Error::Config(format!(
                    "settings for '{}' must be an object",
                    name
                )));
            }
            if backends.insert(kind, settings).is_some() {
                return Err(Error::Config(format!(
                    "backend '{}' is configured more than once",
                    kind
                )));
            }
        }

        Ok(Self { backends })
    }

    /// Load a connection file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&text)
    }

    /// Add or replace one backend's settings.
    pub fn with_backend(mut self, kind: BackendKind, settings: serde_json::Value) -> Self {
        self.backends.insert(kind, settings);
        self
    }

    /// Settings for `kind`.
    pub fn get(&self, kind: BackendKind) -> Result<&serde_json::Value> {
        self.backends
            .get(&kind)
            .ok_or_else(|| Error::MissingConnection(kind.to_string()))
    }

    /// Configured backends, in name order.
    pub fn backends(&self) -> impl Iterator<Item = BackendKind> + '_ {
        self.backends.keys().copied()
    }
}

/// Parse query templates from a JSON array of strings.
pub fn parse_query_templates(text: &str) -> Result<Vec<QueryTemplate>> {
    Ok(serde_json::from_str(text)?)
}

/// Load a query template file.
pub fn load_query_templates(path: impl AsRef<Path>) -> Result<Vec<QueryTemplate>> {
    let text = std::fs::read_to_string(path.as_ref())?;
    parse_query_templates(&text)
}

/// Insertion sizing for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BenchSettings {
    /// Records per insert call.
    pub batch_size: usize,
    /// Records per run.
    pub total_size: usize,
}

impl BenchSettings {
    pub fn new(batch_size: usize, total_size: usize) -> Self {
        Self {
            batch_size,
            total_size,
        }
    }

    /// Set the batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the total number of records.
    pub fn with_total_size(mut self, total_size: usize) -> Self {
        self.total_size = total_size;
        self
    }

    /// Both sizes must be positive.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::Config("batch size must be positive".to_string()));
        }
        if self.total_size == 0 {
            return Err(Error::Config("total size must be positive".to_string()));
        }
        Ok(())
    }

    /// Number of insert calls: `ceil(total_size / batch_size)`.
    pub fn batch_count(&self) -> usize {
        self.total_size.div_ceil(self.batch_size)
    }

    /// Size of batch `index` (zero-based); only the last one may be short.
    pub fn batch_len(&self, index: usize) -> usize {
        let done = index * self.batch_size;
        self.batch_size.min(self.total_size.saturating_sub(done))
    }
}

impl Default for BenchSettings {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE, DEFAULT_TOTAL_SIZE)
    }
}
