//! SQLite backend.
//!
//! Embedded engine driven through a single rusqlite connection. Needs no
//! server, which also makes it the reference backend for tests.

use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde::Deserialize;
use tracing::info;

use crate::error::{Error, Result};
use crate::schema::Schema;
use crate::sql;
use crate::value::{Record, Row, Value};

use super::DbClient;

/// Path that opens a private in-memory database.
pub const MEMORY_PATH: &str = ":memory:";

/// SQLite connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteConfig {
    /// Database file, or `:memory:`.
    pub path: String,
}

/// SQLite client.
pub struct SqliteClient {
    conn: Connection,
}

impl SqliteClient {
    /// Open the configured database.
    pub fn connect(config: SqliteConfig) -> Result<Self> {
        let conn = if config.path == MEMORY_PATH {
            Connection::open_in_memory()
        } else {
            Connection::open(&config.path)
        }
        .map_err(|e| Error::Connection(format!("sqlite {}: {}", config.path, e)))?;

        info!(path = %config.path, "connected to SQLite");
        Ok(Self { conn })
    }

    /// Open a private in-memory database.
    pub fn in_memory() -> Result<Self> {
        Self::connect(SqliteConfig {
            path: MEMORY_PATH.to_string(),
        })
    }
}

fn to_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(n) => Value::Int(n),
        ValueRef::Real(n) => Value::Float(n),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Value::Text(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

#[async_trait]
impl DbClient for SqliteClient {
    async fn create_table(&mut self, table: &str, schema: &Schema) -> Result<()> {
        let query = sql::create_table(table, schema, None);
        self.conn
            .execute(&query, [])
            .map_err(|e| Error::Schema(format!("sqlite: {}", e)))?;
        Ok(())
    }

    async fn add_records(
        &mut self,
        table: &str,
        schema: &Schema,
        records: &[Record],
    ) -> Result<()> {
        let query = sql::insert(table, schema, records, None)?;
        self.conn
            .execute(&query, [])
            .map_err(|e| Error::Write(format!("sqlite: {}", e)))?;
        Ok(())
    }

    async fn select(&mut self, query: &str) -> Result<Vec<Row>> {
        let err = |e: rusqlite::Error| Error::Query(format!("sqlite: {}", e));

        let mut stmt = self.conn.prepare(query).map_err(err)?;
        let width = stmt.column_count();
        let mut rows = stmt.query([]).map_err(err)?;

        let mut result = Vec::new();
        while let Some(row) = rows.next().map_err(err)? {
            let values = (0..width)
                .map(|i| row.get_ref(i).map(to_value))
                .collect::<rusqlite::Result<Row>>()
                .map_err(err)?;
            result.push(values);
        }
        Ok(result)
    }

    async fn drop_table(&mut self, table: &str) -> Result<()> {
        let query = sql::drop_table(table, None);
        self.conn
            .execute(&query, [])
            .map_err(|e| Error::Schema(format!("sqlite: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        Schema::from_pairs([("id", "INTEGER"), ("name", "TEXT")]).unwrap()
    }

    fn record(id: i64, name: &str) -> Record {
        let mut record = Record::new();
        record.insert("id".to_string(), Value::Int(id));
        record.insert("name".to_string(), Value::from(name));
        record
    }

    #[tokio::test]
    async fn test_full_cycle() {
        let mut client = SqliteClient::in_memory().unwrap();
        client.create_table("t", &schema()).await.unwrap();
        client
            .add_records("t", &schema(), &[record(1, "abc"), record(2, "xyz")])
            .await
            .unwrap();

        let rows = client.select("SELECT id, name FROM t ORDER BY id").await.unwrap();
        assert_eq!(
            rows,
            vec![
                vec![Value::Int(1), Value::from("abc")],
                vec![Value::Int(2), Value::from("xyz")],
            ]
        );

        client.drop_table("t").await.unwrap();
        assert!(client.select("SELECT * FROM t").await.is_err());
    }

    #[tokio::test]
    async fn test_drop_is_idempotent() {
        let mut client = SqliteClient::in_memory().unwrap();
        client.create_table("t", &schema()).await.unwrap();
        client.drop_table("t").await.unwrap();
        client.drop_table("t").await.unwrap();
    }

    #[tokio::test]
    async fn test_aggregates() {
        let mut client = SqliteClient::in_memory().unwrap();
        client.create_table("t", &schema()).await.unwrap();
        client
            .add_records("t", &schema(), &[record(1, "a"), record(4, "b")])
            .await
            .unwrap();

        let rows = client
            .select("SELECT COUNT(*), AVG(id), MAX(name), NULL FROM t")
            .await
            .unwrap();
        assert_eq!(
            rows,
            vec![vec![
                Value::Int(2),
                Value::Float(2.5),
                Value::from("b"),
                Value::Null
            ]]
        );
    }

    #[tokio::test]
    async fn test_create_twice_is_schema_error() {
        let mut client = SqliteClient::in_memory().unwrap();
        client.create_table("t", &schema()).await.unwrap();
        let err = client.create_table("t", &schema()).await.unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
    }

    #[tokio::test]
    async fn test_bad_query() {
        let mut client = SqliteClient::in_memory().unwrap();
        let err = client.select("SELEC 1").await.unwrap_err();
        assert!(matches!(err, Error::Query(_)));
    }
}
