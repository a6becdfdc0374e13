//! YDB backend.
//!
//! Authenticates with an access token read from the environment and drives
//! the table service through the SDK's session pool. DDL goes through the
//! scheme channel; inserts and selects run as retried transactions whose
//! callback owns its own copy of the statement. YDB tables need a primary
//! key and YDB has no `DROP TABLE IF EXISTS`, so the shared DDL is patched
//! accordingly.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;
use ydb::{AccessTokenCredentials, Client, ClientBuilder, Query, TableClient};

use crate::error::{Error, Result};
use crate::schema::Schema;
use crate::sql;
use crate::value::{Record, Row, Value};

use super::DbClient;

/// Environment variable holding the access token unless overridden.
pub const DEFAULT_TOKEN_ENV: &str = "YDB_ACCESS_TOKEN_CREDENTIALS";

fn default_token_env() -> String {
    DEFAULT_TOKEN_ENV.to_string()
}

/// YDB connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct YdbConfig {
    /// e.g. `grpcs://ydb.serverless.yandexcloud.net:2135`
    pub endpoint: String,
    pub database: String,
    /// Environment variable to read the access token from.
    #[serde(default = "default_token_env")]
    pub token_env: String,
    /// Primary key column; the first schema field when unset.
    #[serde(default)]
    pub primary_key: Option<String>,
}

impl YdbConfig {
    fn connection_string(&self) -> String {
        format!("{}?database={}", self.endpoint, self.database)
    }
}

/// YDB client.
pub struct YdbClient {
    table: TableClient,
    primary_key: Option<String>,
    _client: Client,
}

impl YdbClient {
    /// Build the driver and wait until discovery finishes.
    pub async fn connect(config: YdbConfig) -> Result<Self> {
        let token = std::env::var(&config.token_env)
            .map_err(|_| Error::Config(format!("ydb: {} is not set", config.token_env)))?;

        let connection_error =
            |e: ydb::YdbError| Error::Connection(format!("ydb {}: {}", config.endpoint, e));

        let client = ClientBuilder::new_from_connection_string(config.connection_string())
            .map_err(connection_error)?
            .with_credentials(AccessTokenCredentials::from(token.as_str()))
            .client()
            .map_err(connection_error)?;
        client.wait().await.map_err(connection_error)?;

        info!(
            endpoint = %config.endpoint,
            database = %config.database,
            "connected to YDB"
        );
        Ok(Self {
            table: client.table_client(),
            primary_key: config.primary_key,
            _client: client,
        })
    }

    fn primary_key<'a>(&'a self, schema: &'a Schema) -> Result<&'a str> {
        let key = match &self.primary_key {
            Some(key) => key.as_str(),
            None => schema.columns()[0].name.as_str(),
        };
        if !schema.contains(key) {
            return Err(Error::Schema(format!(
                "ydb: primary key '{}' is not a schema field",
                key
            )));
        }
        Ok(key)
    }

    async fn execute_scheme(&self, statement: String) -> std::result::Result<(), String> {
        self.table
            .retry_execute_scheme_query(statement)
            .await
            .map_err(|e| e.to_string())
    }

    async fn execute_data(&self, statement: String) -> std::result::Result<(), String> {
        self.table
            .retry_transaction(|mut t| {
                let statement = statement.clone();
                async move {
                    t.query(Query::new(statement)).await?;
                    t.commit().await?;
                    Ok(())
                }
            })
            .await
            .map_err(|e| e.to_string())
    }
}

fn to_value(value: ydb::Value) -> Value {
    if let Ok(v) = Option::<i64>::try_from(value.clone()) {
        return v.into();
    }
    if let Ok(v) = Option::<u64>::try_from(value.clone()) {
        return match v {
            Some(n) => i64::try_from(n)
                .map(Value::Int)
                .unwrap_or(Value::Float(n as f64)),
            None => Value::Null,
        };
    }
    if let Ok(v) = Option::<f64>::try_from(value.clone()) {
        return v.into();
    }
    if let Ok(v) = Option::<String>::try_from(value.clone()) {
        return v.into();
    }
    Value::Text(format!("{:?}", value))
}

#[async_trait]
impl DbClient for YdbClient {
    async fn create_table(&mut self, table: &str, schema: &Schema) -> Result<()> {
        let key = self.primary_key(schema)?;
        let query = sql::inject_primary_key(&sql::create_table(table, schema, None), key);
        self.execute_scheme(query)
            .await
            .map_err(|e| Error::Schema(format!("ydb: {}", e)))
    }

    async fn add_records(
        &mut self,
        table: &str,
        schema: &Schema,
        records: &[Record],
    ) -> Result<()> {
        let query = sql::insert(table, schema, records, None)?;
        self.execute_data(query)
            .await
            .map_err(|e| Error::Write(format!("ydb: {}", e)))
    }

    async fn select(&mut self, query: &str) -> Result<Vec<Row>> {
        let query = query.to_string();
        let result_set = self
            .table
            .retry_transaction(|mut t| {
                let query = query.clone();
                async move {
                    let result = t.query(Query::new(query)).await?;
                    t.commit().await?;
                    Ok(result.into_only_result()?)
                }
            })
            .await
            .map_err(|e| Error::Query(format!("ydb: {}", e)))?;

        let width = result_set.columns().len();
        let mut rows = Vec::new();
        for mut row in result_set.rows() {
            let values = (0..width)
                .map(|i| row.remove_field(i).map(to_value))
                .collect::<ydb::YdbResult<Row>>()
                .map_err(|e| Error::Query(format!("ydb: {}", e)))?;
            rows.push(values);
        }
        Ok(rows)
    }

    async fn drop_table(&mut self, table: &str) -> Result<()> {
        let query = sql::strip_if_exists(&sql::drop_table(table, None));
        self.execute_scheme(query)
            .await
            .map_err(|e| Error::Schema(format!("ydb: {}", e)))
    }
}
