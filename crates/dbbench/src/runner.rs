//! Benchmark driver.
//!
//! One [`Benchmark::run`] applies the same workload to every backend in turn:
//! create the run table, insert the record batches, run each query, then drop
//! the table. Calls are awaited one at a time and never overlap, so each
//! timing sample covers a single client call and nothing else.
//!
//! The drop phase always runs, whichever earlier phase failed and also when
//! the run is interrupted with Ctrl-C. A failed drop is logged and noted on
//! the report; the workload error (if any) is what `run` returns.

use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::backends::DbClient;
use crate::config::BenchSettings;
use crate::error::{Error, Result};
use crate::generator::{random_string, RecordSource};
use crate::report::{key, op, Report, Timings};
use crate::schema::Schema;
use crate::sql::QueryTemplate;

/// Prefix of generated table names.
pub const TABLE_PREFIX: &str = "test_";

/// Length of the random part of generated table names.
pub const TABLE_SUFFIX_LEN: usize = 5;

/// Title of the section totalling every query.
pub const ALL_QUERIES_TITLE: &str = "All queries";

/// Name of the table scoping one run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableName(String);

impl TableName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// `test_` followed by five random characters from `0-9a-z`.
    pub fn random() -> Self {
        Self::random_with(&mut StdRng::from_entropy())
    }

    pub fn random_with<R: Rng>(rng: &mut R) -> Self {
        Self(format!(
            "{}{}",
            TABLE_PREFIX,
            random_string(rng, TABLE_SUFFIX_LEN)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A connected client together with its name and schema projection.
pub struct Backend {
    name: String,
    schema: Schema,
    client: Box<dyn DbClient>,
}

impl Backend {
    pub fn new(name: impl Into<String>, schema: Schema, client: Box<dyn DbClient>) -> Self {
        Self {
            name: name.into(),
            schema,
            client,
        }
    }

    /// Name used in report keys.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backend")
            .field("name", &self.name)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

/// Await `future` and measure how long it took.
///
/// Yields to the runtime once the clock has stopped, so a pending interrupt
/// is seen between calls even for clients that never suspend.
async fn timed<T>(future: impl Future<Output = Result<T>>) -> (Result<T>, Duration) {
    let start = Instant::now();
    let result = future.await;
    let elapsed = start.elapsed();
    tokio::task::yield_now().await;
    (result, elapsed)
}

/// Resolves on Ctrl-C; never resolves if the handler cannot be installed.
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl+c");
        std::future::pending::<()>().await;
    }
    info!("received interrupt");
}

/// One workload pass over a set of backends.
pub struct Benchmark {
    backends: Vec<Backend>,
    queries: Vec<QueryTemplate>,
    settings: BenchSettings,
    table: TableName,
    report: Report,
    query_totals: Option<Timings>,
}

impl Benchmark {
    /// Benchmark over `backends` with a random table name.
    pub fn new(
        backends: Vec<Backend>,
        queries: Vec<QueryTemplate>,
        settings: BenchSettings,
    ) -> Self {
        Self {
            backends,
            queries,
            settings,
            table: TableName::random(),
            report: Report::new(),
            query_totals: None,
        }
    }

    /// Use a fixed table name instead of a random one.
    pub fn with_table_name(mut self, table: TableName) -> Self {
        self.table = table;
        self
    }

    pub fn table_name(&self) -> &TableName {
        &self.table
    }

    pub fn backends(&self) -> &[Backend] {
        &self.backends
    }

    /// Timings gathered by the last run, complete or not.
    pub fn report(&self) -> &Report {
        &self.report
    }

    pub fn into_report(self) -> Report {
        self.report
    }

    /// Run the workload, then drop the table on every backend.
    ///
    /// Ctrl-C stops the workload between two client calls; the table is
    /// still dropped and the run fails with [`Error::Interrupted`].
    pub async fn run(&mut self, source: &mut dyn RecordSource) -> Result<()> {
        self.run_until_shutdown(source, ctrl_c()).await
    }

    /// Run the workload until it finishes or `shutdown` resolves, then drop
    /// the table on every backend.
    ///
    /// Returns the first workload error, or [`Error::Interrupted`] when
    /// `shutdown` won. Drop failures never replace either.
    pub async fn run_until_shutdown(
        &mut self,
        source: &mut dyn RecordSource,
        shutdown: impl Future<Output = ()>,
    ) -> Result<()> {
        self.settings.validate()?;
        self.check_names()?;
        self.report = Report::new();
        self.query_totals = None;

        info!(
            table = %self.table,
            backends = self.backends.len(),
            batches = self.settings.batch_count(),
            batch_size = self.settings.batch_size,
            queries = self.queries.len(),
            "starting benchmark"
        );

        let outcome = tokio::select! {
            biased;
            _ = shutdown => Err(Error::Interrupted),
            result = self.workload(source) => result,
        };
        if let Some(totals) = self.query_totals.take() {
            self.report.push(Some(ALL_QUERIES_TITLE.to_string()), totals);
        }

        if let Err(e) = &outcome {
            warn!(table = %self.table, error = %e, "workload stopped, dropping table");
        }
        self.drop_tables().await;

        if outcome.is_ok() {
            info!(table = %self.table, "benchmark finished");
        }
        outcome
    }

    fn check_names(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for backend in &self.backends {
            if !seen.insert(backend.name.as_str()) {
                return Err(Error::Config(format!(
                    "backend '{}' is listed more than once",
                    backend.name
                )));
            }
        }
        Ok(())
    }

    async fn workload(&mut self, source: &mut dyn RecordSource) -> Result<()> {
        self.create_tables().await?;
        self.add_records(source).await?;
        self.run_queries().await
    }

    async fn create_tables(&mut self) -> Result<()> {
        info!(table = %self.table, "creating tables");
        let table = self.table.as_str();
        let timings = self.report.begin(None);

        for backend in &mut self.backends {
            let (result, elapsed) =
                timed(backend.client.create_table(table, &backend.schema)).await;
            result?;
            debug!(
                backend = %backend.name,
                elapsed_ms = elapsed.as_millis() as u64,
                "table created"
            );
            timings.add(key(&backend.name, op::CREATE_TABLE), elapsed);
        }
        Ok(())
    }

    async fn add_records(&mut self, source: &mut dyn RecordSource) -> Result<()> {
        let batches = self.settings.batch_count();
        info!(batches, total = self.settings.total_size, "inserting records");
        let table = self.table.as_str();
        let timings = self.report.begin(None);

        let mut inserted = 0usize;
        for index in 0..batches {
            let batch = source.next_batch(self.settings.batch_len(index))?;
            if batch.is_empty() {
                info!(batches = index, records = inserted, "record source exhausted");
                break;
            }

            for backend in &mut self.backends {
                let (result, elapsed) =
                    timed(backend.client.add_records(table, &backend.schema, &batch)).await;
                result?;
                debug!(
                    backend = %backend.name,
                    batch = index,
                    records = batch.len(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "batch inserted"
                );
                timings.add(key(&backend.name, op::ADD_RECORDS), elapsed);
            }
            inserted += batch.len();
        }

        info!(records = inserted, "insertion finished");
        Ok(())
    }

    async fn run_queries(&mut self) -> Result<()> {
        info!(queries = self.queries.len(), "running queries");
        let table = self.table.as_str();
        let totals = self.query_totals.insert(Timings::new());

        for template in &self.queries {
            let query = template.render(table);
            let timings = self.report.begin(Some(format!("query: {}", query)));

            for backend in &mut self.backends {
                let (result, elapsed) = timed(backend.client.select(&query)).await;
                let rows = result?;
                debug!(
                    backend = %backend.name,
                    rows = rows.len(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "query finished"
                );
                timings.add(key(&backend.name, op::SELECT), elapsed);
                totals.add(key(&backend.name, op::ALL_QUERIES), elapsed);
            }
        }
        Ok(())
    }

    async fn drop_tables(&mut self) {
        info!(table = %self.table, "dropping tables");
        let table = self.table.as_str();
        let mut timings = Timings::new();

        for backend in &mut self.backends {
            let (result, elapsed) = timed(backend.client.drop_table(table)).await;
            match result {
                Ok(()) => timings.add(key(&backend.name, op::DROP_TABLE), elapsed),
                Err(e) => {
                    warn!(backend = %backend.name, table, error = %e, "failed to drop table");
                    self.report.push_cleanup_failure(backend.name.clone(), &e);
                }
            }
        }
        self.report.push(None, timings);
    }
}
