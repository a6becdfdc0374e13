//! Database backends driven by the benchmark.
//!
//! Every backend implements [`DbClient`], a four-operation contract (create
//! table, insert a batch, run a select, drop table) that hides the backend's
//! connection model:
//!
//! - [`sqlite`]: embedded engine, one in-process connection
//! - [`postgres`] / [`mysql`]: one stateful network session
//! - [`clickhouse`]: stateless HTTP query endpoint, results parsed from JSON
//! - [`ydb`]: token-authenticated session pool with retried transactions and
//!   separate scheme/data channels
//!
//! The set is closed: [`BackendKind`] names every backend and [`connect`]
//! maps a kind plus its raw connection settings to a live client.

#[cfg(feature = "clickhouse")]
pub mod clickhouse;
#[cfg(feature = "mysql")]
pub mod mysql;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod sqlite;
#[cfg(any(feature = "postgres", feature = "mysql"))]
mod sqlx_rows;
pub mod tls;
#[cfg(feature = "ydb")]
pub mod ydb;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};
use crate::schema::Schema;
use crate::value::{Record, Row};

pub use sqlite::SqliteClient;
pub use tls::SslMode;

#[cfg(feature = "clickhouse")]
pub use clickhouse::ClickHouseClient;
#[cfg(feature = "mysql")]
pub use mysql::MysqlClient;
#[cfg(feature = "postgres")]
pub use postgres::PostgresClient;
#[cfg(feature = "ydb")]
pub use ydb::YdbClient;

/// Uniform client contract implemented by every backend.
///
/// A client owns exactly one connection (or session pool) for the whole run.
/// Operations take `&mut self` so a client is never driven by two callers at
/// once.
#[async_trait]
pub trait DbClient: Send {
    /// Create `table` with this backend's projection of the schema.
    async fn create_table(&mut self, table: &str, schema: &Schema) -> Result<()>;

    /// Insert one batch with a single multi-row statement.
    async fn add_records(&mut self, table: &str, schema: &Schema, records: &[Record])
        -> Result<()>;

    /// Run an already rendered query and return its rows in backend order.
    async fn select(&mut self, query: &str) -> Result<Vec<Row>>;

    /// Drop `table`.
    async fn drop_table(&mut self, table: &str) -> Result<()>;
}

/// Supported backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BackendKind {
    ClickHouse,
    MySql,
    Postgres,
    Sqlite,
    Ydb,
}

impl BackendKind {
    /// All backends, in lookup order.
    pub const ALL: [BackendKind; 5] = [
        BackendKind::ClickHouse,
        BackendKind::MySql,
        BackendKind::Postgres,
        BackendKind::Sqlite,
        BackendKind::Ydb,
    ];

    /// Canonical name, used in configuration files and report keys.
    pub fn name(&self) -> &'static str {
        match self {
            BackendKind::ClickHouse => "clickhouse",
            BackendKind::MySql => "mysql",
            BackendKind::Postgres => "postgresql",
            BackendKind::Sqlite => "sqlite",
            BackendKind::Ydb => "ydb",
        }
    }

    /// Whether this build carries the backend's driver.
    pub fn is_enabled(&self) -> bool {
        match self {
            BackendKind::ClickHouse => cfg!(feature = "clickhouse"),
            BackendKind::MySql => cfg!(feature = "mysql"),
            BackendKind::Postgres => cfg!(feature = "postgres"),
            BackendKind::Sqlite => true,
            BackendKind::Ydb => cfg!(feature = "ydb"),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "clickhouse" | "ch" => Ok(BackendKind::ClickHouse),
            "mysql" => Ok(BackendKind::MySql),
            "postgresql" | "postgres" | "pg" => Ok(BackendKind::Postgres),
            "sqlite" => Ok(BackendKind::Sqlite),
            "ydb" => Ok(BackendKind::Ydb),
            _ => Err(Error::UnknownBackend(s.to_string())),
        }
    }
}

/// Deserialize a backend's typed settings from its opaque config object.
pub(crate) fn parse_config<T: DeserializeOwned>(
    kind: BackendKind,
    raw: &serde_json::Value,
) -> Result<T> {
    serde_json::from_value(raw.clone())
        .map_err(|e| Error::Config(format!("invalid {} connection settings: {}", kind, e)))
}

/// Accept a port written either as a number or as a string.
#[allow(dead_code)]
pub(crate) fn port<'de, D>(deserializer: D) -> std::result::Result<u16, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(serde::Deserialize)]
    #[serde(untagged)]
    enum Port {
        Number(u16),
        Text(String),
    }

    match <Port as serde::Deserialize>::deserialize(deserializer)? {
        Port::Number(n) => Ok(n),
        Port::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Connect to a backend.
///
/// This is the only place that maps a [`BackendKind`] to a concrete client.
pub async fn connect(kind: BackendKind, raw: &serde_json::Value) -> Result<Box<dyn DbClient>> {
    if !kind.is_enabled() {
        return Err(Error::UnsupportedBackend(kind.to_string()));
    }

    let client: Box<dyn DbClient> = match kind {
        BackendKind::Sqlite => Box::new(SqliteClient::connect(parse_config(kind, raw)?)?),
        #[cfg(feature = "clickhouse")]
        BackendKind::ClickHouse => {
            Box::new(ClickHouseClient::connect(parse_config(kind, raw)?).await?)
        }
        #[cfg(feature = "mysql")]
        BackendKind::MySql => Box::new(MysqlClient::connect(parse_config(kind, raw)?).await?),
        #[cfg(feature = "postgres")]
        BackendKind::Postgres => {
            Box::new(PostgresClient::connect(parse_config(kind, raw)?).await?)
        }
        #[cfg(feature = "ydb")]
        BackendKind::Ydb => Box::new(YdbClient::connect(parse_config(kind, raw)?).await?),
        #[allow(unreachable_patterns)]
        other => return Err(Error::UnsupportedBackend(other.to_string())),
    };

    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_from_str() {
        assert_eq!("mysql".parse::<BackendKind>().unwrap(), BackendKind::MySql);
        assert_eq!("PostgreSQL".parse::<BackendKind>().unwrap(), BackendKind::Postgres);
        assert_eq!("pg".parse::<BackendKind>().unwrap(), BackendKind::Postgres);
        assert_eq!("ch".parse::<BackendKind>().unwrap(), BackendKind::ClickHouse);

        let err = "oracle".parse::<BackendKind>().unwrap_err();
        assert!(matches!(err, Error::UnknownBackend(name) if name == "oracle"));
    }

    #[test]
    fn test_names_round_trip() {
        for kind in BackendKind::ALL {
            assert_eq!(kind.name().parse::<BackendKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_sqlite_always_enabled() {
        assert!(BackendKind::Sqlite.is_enabled());
    }

    #[tokio::test]
    async fn test_connect_sqlite() {
        let raw = serde_json::json!({ "path": ":memory:" });
        let mut client = connect(BackendKind::Sqlite, &raw).await.unwrap();
        let rows = client.select("SELECT 1").await.unwrap();
        assert_eq!(rows, vec![vec![crate::value::Value::Int(1)]]);
    }

    #[tokio::test]
    async fn test_connect_invalid_settings() {
        let raw = serde_json::json!({ "file": 3 });
        let err = connect(BackendKind::Sqlite, &raw).await.err().unwrap();
        assert!(matches!(err, Error::Config(_)));
    }
}
