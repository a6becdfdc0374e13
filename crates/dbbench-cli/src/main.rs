//! dbbench command-line tool
//!
//! Generates synthetic records and runs the cross-database benchmark.

mod commands;

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};
use dbbench::config::{DEFAULT_BATCH_SIZE, DEFAULT_TOTAL_SIZE};
use dbbench::BackendKind;

/// Default log filter, overridden by `RUST_LOG`.
const DEFAULT_LOG_FILTER: &str = "dbbench=info,dbbench_cli=info";

/// Cross-database benchmark
#[derive(Parser, Debug)]
#[command(name = "dbbench")]
#[command(version, about = "Run one workload against several databases and time it")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write synthetic records as JSON lines
    Generate(GenerateArgs),
    /// Run the benchmark against one or more backends
    Run(RunArgs),
}

#[derive(ClapArgs, Debug)]
pub struct GenerateArgs {
    /// Schema description file
    #[arg(short, long, default_value = "config/schema.json")]
    pub schema: PathBuf,

    /// Number of records
    #[arg(short = 'n', long)]
    pub count: usize,

    /// Output file (stdout if omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Seed for reproducible records
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(ClapArgs, Debug)]
pub struct RunArgs {
    /// Backends to benchmark (clickhouse, mysql, postgresql, sqlite, ydb)
    #[arg(short, long = "backend", required = true, num_args = 1..)]
    pub backends: Vec<BackendKind>,

    /// Connection settings file
    #[arg(short, long, default_value = "config/connections.json")]
    pub config: PathBuf,

    /// Schema description file
    #[arg(short, long, default_value = "config/schema.json")]
    pub schema: PathBuf,

    /// Query template file
    #[arg(short, long, default_value = "config/test_cases.json")]
    pub queries: PathBuf,

    /// Records per insert call
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Records per run
    #[arg(long, default_value_t = DEFAULT_TOTAL_SIZE)]
    pub total_size: usize,

    /// Read records from a JSON-lines file instead of generating them
    #[arg(short, long)]
    pub data: Option<PathBuf>,

    /// Report file (stdout if omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Seed for reproducible records (generated records only)
    #[arg(long, conflicts_with = "data")]
    pub seed: Option<u64>,
}

#[tokio::main]
async fn main() {
    // Logs go to stderr so records and reports can be piped from stdout
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    match args.command {
        Command::Generate(args) => commands::generate(args),
        Command::Run(args) => commands::run_benchmark(args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run() {
        let args = Args::try_parse_from([
            "dbbench",
            "run",
            "--backend",
            "mysql",
            "pg",
            "--batch-size",
            "500",
            "--output",
            "result.txt",
        ])
        .unwrap();

        let Command::Run(run) = args.command else {
            panic!("expected run");
        };
        assert_eq!(run.backends, vec![BackendKind::MySql, BackendKind::Postgres]);
        assert_eq!(run.batch_size, 500);
        assert_eq!(run.total_size, DEFAULT_TOTAL_SIZE);
        assert_eq!(run.output, Some(PathBuf::from("result.txt")));
        assert_eq!(run.config, PathBuf::from("config/connections.json"));
        assert!(run.data.is_none());
    }

    #[test]
    fn test_parse_repeated_backend_flag() {
        let args =
            Args::try_parse_from(["dbbench", "run", "-b", "sqlite", "-b", "clickhouse"]).unwrap();
        let Command::Run(run) = args.command else {
            panic!("expected run");
        };
        assert_eq!(run.backends, vec![BackendKind::Sqlite, BackendKind::ClickHouse]);
    }

    #[test]
    fn test_unknown_backend_is_usage_error() {
        let err = Args::try_parse_from(["dbbench", "run", "--backend", "oracle"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_run_requires_backend() {
        assert!(Args::try_parse_from(["dbbench", "run"]).is_err());
    }

    #[test]
    fn test_seed_conflicts_with_data_file() {
        let err = Args::try_parse_from([
            "dbbench", "run", "-b", "sqlite", "--data", "d.jsonl", "--seed", "1",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_parse_generate() {
        let args = Args::try_parse_from([
            "dbbench", "generate", "--count", "10", "--seed", "3", "-o", "data.jsonl",
        ])
        .unwrap();

        let Command::Generate(generate) = args.command else {
            panic!("expected generate");
        };
        assert_eq!(generate.count, 10);
        assert_eq!(generate.seed, Some(3));
        assert_eq!(generate.schema, PathBuf::from("config/schema.json"));
        assert_eq!(generate.output, Some(PathBuf::from("data.jsonl")));
    }

    #[test]
    fn test_generate_requires_count() {
        assert!(Args::try_parse_from(["dbbench", "generate"]).is_err());
    }
}
