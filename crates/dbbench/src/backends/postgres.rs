//! PostgreSQL backend.
//!
//! Holds one autocommit session for the whole run. Only a writable primary
//! is accepted, so a run never lands on a replica.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgSslMode};
use sqlx::Connection;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::schema::Schema;
use crate::sql;
use crate::value::{Record, Row};

use super::sqlx_rows::pg_row;
use super::{DbClient, SslMode};

fn default_port() -> u16 {
    5432
}

/// PostgreSQL connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct PostgresConfig {
    pub host: String,
    #[serde(default = "default_port", deserialize_with = "super::port")]
    pub port: u16,
    pub user: String,
    pub password: String,
    #[serde(alias = "database")]
    pub db: String,
    #[serde(default, alias = "sslmode")]
    pub ssl_mode: SslMode,
    /// CA certificate (PEM) for verify-ca / verify-full.
    #[serde(default)]
    pub ca_cert: Option<PathBuf>,
}

impl PostgresConfig {
    fn connect_options(&self) -> PgConnectOptions {
        let ssl_mode = match self.ssl_mode {
            SslMode::Disable => PgSslMode::Disable,
            SslMode::Prefer => PgSslMode::Prefer,
            SslMode::Require => PgSslMode::Require,
            SslMode::VerifyCa => PgSslMode::VerifyCa,
            SslMode::VerifyFull => PgSslMode::VerifyFull,
        };

        let mut options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.db)
            .ssl_mode(ssl_mode);

        if let Some(ca_cert) = &self.ca_cert {
            options = options.ssl_root_cert(ca_cert);
        }
        options
    }
}

/// PostgreSQL client.
pub struct PostgresClient {
    conn: PgConnection,
}

impl PostgresClient {
    /// Open a session and check that the server accepts writes.
    pub async fn connect(config: PostgresConfig) -> Result<Self> {
        if config.ssl_mode.is_unverified() {
            warn!(
                ssl_mode = ?config.ssl_mode,
                "PostgreSQL server certificate will not be verified"
            );
        }

        let mut conn = PgConnection::connect_with(&config.connect_options())
            .await
            .map_err(|e| {
                Error::Connection(format!(
                    "postgresql {}:{}/{}: {}",
                    config.host, config.port, config.db, e
                ))
            })?;

        let read_only: String = sqlx::query_scalar("SHOW transaction_read_only")
            .fetch_one(&mut conn)
            .await
            .map_err(|e| Error::Connection(format!("postgresql: {}", e)))?;
        if read_only == "on" {
            return Err(Error::Connection(format!(
                "postgresql {}:{} is read-only",
                config.host, config.port
            )));
        }

        info!(
            host = %config.host,
            port = config.port,
            db = %config.db,
            "connected to PostgreSQL"
        );
        Ok(Self { conn })
    }

    async fn execute(&mut self, query: &str) -> std::result::Result<(), sqlx::Error> {
        sqlx::query(query)
            .persistent(false)
            .execute(&mut self.conn)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl DbClient for PostgresClient {
    async fn create_table(&mut self, table: &str, schema: &Schema) -> Result<()> {
        let query = sql::create_table(table, schema, None);
        self.execute(&query)
            .await
            .map_err(|e| Error::Schema(format!("postgresql: {}", e)))
    }

    async fn add_records(
        &mut self,
        table: &str,
        schema: &Schema,
        records: &[Record],
    ) -> Result<()> {
        let query = sql::insert(table, schema, records, None)?;
        self.execute(&query)
            .await
            .map_err(|e| Error::Write(format!("postgresql: {}", e)))
    }

    async fn select(&mut self, query: &str) -> Result<Vec<Row>> {
        let rows = sqlx::query(query)
            .persistent(false)
            .fetch_all(&mut self.conn)
            .await
            .map_err(|e| Error::Query(format!("postgresql: {}", e)))?;

        rows.iter().map(pg_row).collect()
    }

    async fn drop_table(&mut self, table: &str) -> Result<()> {
        let query = sql::drop_table(table, None);
        self.execute(&query)
            .await
            .map_err(|e| Error::Schema(format!("postgresql: {}", e)))
    }
}
