//! MySQL backend.
//!
//! One stateful session with autocommit forced on, so each statement is its
//! own transaction and nothing is left pending between timed calls.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlSslMode};
use sqlx::Connection;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::schema::Schema;
use crate::sql;
use crate::value::{Record, Row};

use super::sqlx_rows::mysql_row;
use super::{DbClient, SslMode};

fn default_port() -> u16 {
    3306
}

/// MySQL connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct MysqlConfig {
    pub host: String,
    #[serde(default = "default_port", deserialize_with = "super::port")]
    pub port: u16,
    pub user: String,
    pub password: String,
    #[serde(alias = "database")]
    pub db: String,
    #[serde(default, alias = "sslmode")]
    pub ssl_mode: SslMode,
    /// CA certificate (PEM).
    #[serde(default)]
    pub ca_cert: Option<PathBuf>,
}

impl MysqlConfig {
    fn connect_options(&self) -> MySqlConnectOptions {
        let ssl_mode = match self.ssl_mode {
            SslMode::Disable => MySqlSslMode::Disabled,
            SslMode::Prefer => MySqlSslMode::Preferred,
            SslMode::Require => MySqlSslMode::Required,
            SslMode::VerifyCa => MySqlSslMode::VerifyCa,
            SslMode::VerifyFull => MySqlSslMode::VerifyIdentity,
        };

        let mut options = MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.db)
            .ssl_mode(ssl_mode);

        if let Some(ca_cert) = &self.ca_cert {
            options = options.ssl_ca(ca_cert);
        }
        options
    }
}

/// MySQL client.
pub struct MysqlClient {
    conn: MySqlConnection,
}

impl MysqlClient {
    /// Open a session in autocommit mode.
    pub async fn connect(config: MysqlConfig) -> Result<Self> {
        if config.ssl_mode == SslMode::Disable {
            warn!("MySQL TLS is disabled, credentials are sent in plaintext");
        }

        let connection_error = |e: sqlx::Error| {
            Error::Connection(format!(
                "mysql {}:{}/{}: {}",
                config.host, config.port, config.db, e
            ))
        };

        let mut conn = MySqlConnection::connect_with(&config.connect_options())
            .await
            .map_err(connection_error)?;

        sqlx::query("SET autocommit = 1")
            .execute(&mut conn)
            .await
            .map_err(connection_error)?;

        info!(
            host = %config.host,
            port = config.port,
            db = %config.db,
            "connected to MySQL"
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
impl DbClient for MysqlClient {
    async fn create_table(&mut self, table: &str, schema: &Schema) -> Result<()> {
        let query = sql::create_table(table, schema, None);
        self.execute(&query)
            .await
            .map_err(|e| Error::Schema(format!("mysql: {}", e)))
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
            .map_err(|e| Error::Write(format!("mysql: {}", e)))
    }

    async fn select(&mut self, query: &str) -> Result<Vec<Row>> {
        let rows = sqlx::query(query)
            .persistent(false)
            .fetch_all(&mut self.conn)
            .await
            .map_err(|e| Error::Query(format!("mysql: {}", e)))?;

        rows.iter().map(mysql_row).collect()
    }

    async fn drop_table(&mut self, table: &str) -> Result<()> {
        let query = sql::drop_table(table, None);
        self.execute(&query)
            .await
            .map_err(|e| Error::Schema(format!("mysql: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_parsing() {
        let config: MysqlConfig = serde_json::from_value(serde_json::json!({
            "host": "db.local",
            "port": 3307,
            "user": "bench",
            "password": "secret",
            "db": "bench",
            "ca_cert": "/etc/ssl/mysql-root.crt"
        }))
        .unwrap();

        assert_eq!(config.port, 3307);
        assert_eq!(config.ssl_mode, SslMode::Prefer);
        assert_eq!(
            config.ca_cert.as_deref(),
            Some(std::path::Path::new("/etc/ssl/mysql-root.crt"))
        );
    }

    #[test]
    fn test_missing_credentials_rejected() {
        let result: std::result::Result<MysqlConfig, _> =
            serde_json::from_value(serde_json::json!({ "host": "db.local", "db": "bench" }));
        assert!(result.is_err());
    }
}
