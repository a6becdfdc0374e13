//! Benchmark error types.

use thiserror::Error;

/// Benchmark errors.
#[derive(Debug, Error)]
pub enum Error {
    /// A backend could not be reached or rejected the session.
    #[error("connection error: {0}")]
    Connection(String),

    /// Table creation or removal failed.
    #[error("schema error: {0}")]
    Schema(String),

    /// Record insertion failed.
    #[error("write error: {0}")]
    Write(String),

    /// A select query failed or returned an unreadable result.
    #[error("query error: {0}")]
    Query(String),

    /// A record does not match the schema it is rendered against.
    #[error("malformed record: {0}")]
    MalformedRecord(String),

    /// Backend name not in the supported set.
    #[error("unknown backend '{0}'")]
    UnknownBackend(String),

    /// Backend selected for a run but absent from the connection file.
    #[error("no connection settings for backend '{0}'")]
    MissingConnection(String),

    /// Backend known but compiled out of this build.
    #[error("backend '{0}' is not enabled in this build")]
    UnsupportedBackend(String),

    /// The run was stopped before the workload finished.
    #[error("interrupted")]
    Interrupted,

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result alias for benchmark operations.
pub type Result<T> = std::result::Result<T, Error>;
