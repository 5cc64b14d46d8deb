use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crudsmoke_core::{DEFAULT_BASE_URL, DEFAULT_CONCURRENCY};

fn parse_duration(input: &str) -> Result<Duration, String> {
    humantime::parse_duration(input.trim())
        .map_err(|err| format!("invalid duration '{input}' ({err}; expected e.g. 10s, 250ms, 1m)"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary.
    HumanReadable,
    /// Emit the run summary as one JSON line on stdout.
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "crudsmoke",
    author,
    version,
    about = "Smoke and load test for the CRUD content service",
    long_about = "crudsmoke drives the content service with create/read/update/delete chains.\n\nEach iteration creates one entity and, once the create succeeds, reads, updates and deletes it in order. At most --parallel HTTP calls are in flight at once.\n\nA summary is printed at the end and appended as one JSON line to the results file.",
    after_help = "Examples:\n  crudsmoke\n  crudsmoke --url http://localhost:8080 -n 100 --parallel 20\n  crudsmoke -n 1000 --output json --results out/results.jsonl\n  BASE_URL=http://staging:8888 TEST_LIMIT=50 crudsmoke"
)]
pub struct Cli {
    /// Base URL of the content service
    #[arg(long, env = "BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub url: String,

    /// Number of create/read/update/delete chains to run
    #[arg(short = 'n', long, env = "TEST_LIMIT", default_value_t = 10)]
    pub iterations: usize,

    /// Maximum concurrent HTTP calls
    #[arg(
        long,
        env = "TEST_PARALLEL",
        default_value_t = DEFAULT_CONCURRENCY as u64,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub parallel: u64,

    /// Results file; one JSON summary line is appended per run
    #[arg(long, env = "RESULTS_FILE", default_value = "test-results.jsonl")]
    pub results: PathBuf,

    /// Per-call timeout, including the body read (e.g. 30s)
    #[arg(long, value_parser = parse_duration, default_value = "30s")]
    pub request_timeout: Duration,

    /// Pause between the steps of one entity's chain (e.g. 5ms)
    #[arg(long, value_parser = parse_duration, default_value = "5ms")]
    pub step_delay: Duration,

    /// Wall-clock budget for the whole run (e.g. 5m)
    #[arg(long, value_parser = parse_duration, default_value = "5m")]
    pub deadline: Duration,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::HumanReadable)]
    pub output: OutputFormat,
}
