//! Cross-database benchmark harness.
//!
//! Applies one workload (create a table, insert record batches, run a list of
//! queries, drop the table) to several database backends and reports how long
//! each backend took for each step.
//!
//! # Components
//!
//! - **Query builder** ([`sql`]): renders CREATE / INSERT / DROP statements
//!   shared by every backend, plus small per-dialect patches
//! - **Backends** ([`backends`]): the [`DbClient`] contract and its ClickHouse,
//!   MySQL, PostgreSQL, SQLite and YDB implementations
//! - **Driver** ([`runner`]): runs the phases in order with guaranteed cleanup
//!   and fills a [`Report`]
//! - **Record sources** ([`generator`]): synthetic records or a JSON-lines file
//!
//! # Example
//!
//! ```no_run
//! use dbbench::{
//!     backends, Backend, BackendKind, BenchSettings, Benchmark, RecordGenerator, SchemaFile,
//! };
//!
//! # async fn demo() -> dbbench::Result<()> {
//! let schema = SchemaFile::load("config/schema.json")?;
//! let raw = serde_json::json!({"path": "bench.db"});
//! let client = backends::connect(BackendKind::Sqlite, &raw).await?;
//! let backend = Backend::new("sqlite", schema.schema_for(BackendKind::Sqlite)?, client);
//!
//! let queries = dbbench::config::load_query_templates("config/test_cases.json")?;
//! let mut bench = Benchmark::new(vec![backend], queries, BenchSettings::new(1_000, 10_000));
//! let result = bench.run(&mut RecordGenerator::new(&schema)).await;
//! print!("{}", bench.report());
//! result
//! # }
//! ```

pub mod backends;
pub mod config;
pub mod error;
pub mod generator;
pub mod report;
pub mod runner;
pub mod schema;
pub mod sql;
pub mod value;

pub use backends::{BackendKind, DbClient};
pub use config::{BenchSettings, ConnectionConfigs};
pub use error::{Error, Result};
pub use generator::{JsonLinesSource, RecordGenerator, RecordSource};
pub use report::{Report, Timings};
pub use runner::{Backend, Benchmark, TableName};
pub use schema::{Schema, SchemaFile};
pub use sql::QueryTemplate;
pub use value::{Record, Row, Value};
