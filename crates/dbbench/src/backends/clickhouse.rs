//! ClickHouse backend.
//!
//! Talks to the stateless HTTP interface: statements are POSTed as the
//! request body, selects are sent as GET with `FORMAT JSONCompact` and the
//! rows are read from the `data` array of the response.

use std::path::PathBuf;

use async_trait::async_trait;
use reqwest::{Certificate, Client, RequestBuilder};
use serde::Deserialize;
use tracing::info;

use crate::error::{Error, Result};
use crate::schema::Schema;
use crate::sql;
use crate::value::{Record, Row, Value};

use super::DbClient;

/// Storage engine appended to every CREATE TABLE.
pub const TABLE_ENGINE: &str = "ENGINE = Log()";

fn default_port() -> u16 {
    8443
}

fn default_secure() -> bool {
    true
}

/// ClickHouse connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ClickHouseConfig {
    pub host: String,
    #[serde(default = "default_port", deserialize_with = "super::port")]
    pub port: u16,
    pub user: String,
    pub password: String,
    #[serde(alias = "database")]
    pub db: String,
    /// Extra root certificate (PEM) trusted for the HTTPS endpoint.
    #[serde(default)]
    pub ca_cert: Option<PathBuf>,
    /// Use https (default) or plain http.
    #[serde(default = "default_secure")]
    pub secure: bool,
}

impl ClickHouseConfig {
    fn base_url(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{}://{}:{}/", scheme, self.host, self.port)
    }
}

/// Query-string parameters of a select. 64-bit integers come back as JSON
/// numbers instead of the default quoted strings.
fn select_params<'a>(db: &'a str, query: &'a str) -> [(&'static str, &'a str); 3] {
    [
        ("database", db),
        ("query", query),
        ("output_format_json_quote_64bit_integers", "0"),
    ]
}

/// Shape of a `FORMAT JSONCompact` response; other keys are ignored.
#[derive(Debug, Deserialize)]
struct JsonCompact {
    data: Vec<Vec<serde_json::Value>>,
}

/// ClickHouse client.
pub struct ClickHouseClient {
    http: Client,
    base_url: String,
    db: String,
    user: String,
    password: String,
}

impl ClickHouseClient {
    /// Build the HTTP client and check the credentials with a trivial query.
    pub async fn connect(config: ClickHouseConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(path) = &config.ca_cert {
            let pem = std::fs::read(path)?;
            let cert = Certificate::from_pem(&pem).map_err(|e| {
                Error::Config(format!("clickhouse CA {}: {}", path.display(), e))
            })?;
            builder = builder.add_root_certificate(cert);
        }
        let http = builder
            .build()
            .map_err(|e| Error::Connection(format!("clickhouse: {}", e)))?;

        let mut client = Self {
            http,
            base_url: config.base_url(),
            db: config.db,
            user: config.user,
            password: config.password,
        };

        let url = client.base_url.clone();
        client
            .select("SELECT 1")
            .await
            .map_err(|e| Error::Connection(format!("clickhouse {}: {}", url, e)))?;

        info!(url = %url, db = %client.db, "connected to ClickHouse");
        Ok(client)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("X-ClickHouse-User", &self.user)
            .header("X-ClickHouse-Key", &self.password)
    }

    /// Send a request and return the body, failing on non-2xx status.
    async fn send(&self, request: RequestBuilder) -> std::result::Result<String, String> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        let body = response.text().await.map_err(|e| e.to_string())?;
        if !status.is_success() {
            return Err(format!("HTTP {}: {}", status, body.trim()));
        }
        Ok(body)
    }

    async fn post(&self, statement: String) -> std::result::Result<String, String> {
        self.send(self.http.post(&self.base_url).body(statement)).await
    }
}

fn to_value(value: serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Int(i64::from(b)),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        serde_json::Value::String(s) => Value::Text(s),
        other => Value::Text(other.to_string()),
    }
}

/// Parse the rows of a `FORMAT JSONCompact` body.
fn parse_rows(body: &str) -> Result<Vec<Row>> {
    let payload: JsonCompact = serde_json::from_str(body)
        .map_err(|e| Error::Query(format!("clickhouse: malformed response: {}", e)))?;

    Ok(payload
        .data
        .into_iter()
        .map(|row| row.into_iter().map(to_value).collect())
        .collect())
}

#[async_trait]
impl DbClient for ClickHouseClient {
    async fn create_table(&mut self, table: &str, schema: &Schema) -> Result<()> {
        let query = sql::create_table(table, schema, Some(&self.db));
        self.post(sql::append_clause(&query, TABLE_ENGINE))
            .await
            .map_err(|e| Error::Schema(format!("clickhouse: {}", e)))?;
        Ok(())
    }

    async fn add_records(
        &mut self,
        table: &str,
        schema: &Schema,
        records: &[Record],
    ) -> Result<()> {
        let query = sql::insert(table, schema, records, Some(&self.db))?;
        self.post(query)
            .await
            .map_err(|e| Error::Write(format!("clickhouse: {}", e)))?;
        Ok(())
    }

    async fn select(&mut self, query: &str) -> Result<Vec<Row>> {
        let formatted = format!("{} FORMAT JSONCompact", query);
        let request = self
            .http
            .get(&self.base_url)
            .query(&select_params(&self.db, &formatted));

        let body = self
            .send(request)
            .await
            .map_err(|e| Error::Query(format!("clickhouse: {}", e)))?;
        parse_rows(&body)
    }

    async fn drop_table(&mut self, table: &str) -> Result<()> {
        self.post(sql::drop_table(table, Some(&self.db)))
            .await
            .map_err(|e| Error::Schema(format!("clickhouse: {}", e)))?;
        Ok(())
    }
}
