//! Subcommand implementations.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use dbbench::config::load_query_templates;
use dbbench::generator::write_records;
use dbbench::{
    backends, Backend, BackendKind, BenchSettings, Benchmark, ConnectionConfigs, JsonLinesSource,
    RecordGenerator, RecordSource, Report, SchemaFile,
};
use tracing::info;

use crate::{GenerateArgs, RunArgs};

/// Records generated and written per chunk by `generate`.
const GENERATE_CHUNK: usize = 10_000;

fn generator(schema: &SchemaFile, seed: Option<u64>) -> RecordGenerator {
    match seed {
        Some(seed) => RecordGenerator::with_seed(schema, seed),
        None => RecordGenerator::new(schema),
    }
}

fn output(path: Option<&Path>) -> io::Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    })
}

/// Keep the first occurrence of each backend.
fn dedup(kinds: Vec<BackendKind>) -> Vec<BackendKind> {
    let mut unique = Vec::with_capacity(kinds.len());
    for kind in kinds {
        if !unique.contains(&kind) {
            unique.push(kind);
        }
    }
    unique
}

/// `dbbench generate`: stream synthetic records as JSON lines.
pub fn generate(args: GenerateArgs) -> Result<(), Box<dyn std::error::Error>> {
    let schema = SchemaFile::load(&args.schema)?;
    let mut generator = generator(&schema, args.seed);
    let mut writer = output(args.output.as_deref())?;

    let mut remaining = args.count;
    while remaining > 0 {
        let count = remaining.min(GENERATE_CHUNK);
        write_records(&mut writer, &generator.records(count))?;
        remaining -= count;
    }

    info!(count = args.count, "records generated");
    Ok(())
}

fn write_report(report: &Report, path: Option<&Path>) -> io::Result<()> {
    let mut writer = output(path)?;
    write!(writer, "{}", report)?;
    writer.flush()
}

/// `dbbench run`: connect every selected backend, run the workload, write
/// the report.
///
/// The report is written even when the run fails, holding whatever was
/// measured before the failure.
pub async fn run_benchmark(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let kinds = dedup(args.backends);
    let settings = BenchSettings::new(args.batch_size, args.total_size);
    settings.validate()?;

    let schema = SchemaFile::load(&args.schema)?;
    let queries = load_query_templates(&args.queries)?;
    let connections = ConnectionConfigs::load(&args.config)?;

    // Resolve every backend's settings before opening any connection
    let mut plan = Vec::with_capacity(kinds.len());
    for kind in kinds {
        plan.push((kind, connections.get(kind)?, schema.schema_for(kind)?));
    }

    let mut selected = Vec::with_capacity(plan.len());
    for (kind, raw, backend_schema) in plan {
        let client = backends::connect(kind, raw).await?;
        selected.push(Backend::new(kind.name(), backend_schema, client));
    }

    let mut source: Box<dyn RecordSource> = match &args.data {
        Some(path) => {
            info!(path = %path.display(), "reading records from file");
            Box::new(JsonLinesSource::open(path)?)
        }
        None => Box::new(generator(&schema, args.seed)),
    };

    let mut bench = Benchmark::new(selected, queries, settings);
    let result = bench.run(source.as_mut()).await;
    let written = write_report(bench.report(), args.output.as_deref());

    result?;
    written?;
    if let Some(path) = &args.output {
        info!(path = %path.display(), "report written");
    }
    Ok(())
}
