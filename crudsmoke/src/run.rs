use anyhow::Context as _;

use crudsmoke_core::{Harness, HarnessConfig, JsonlSink};

use crate::cli::Cli;
use crate::exit_codes::ExitCode;
use crate::output;
use crate::run_error::RunError;

pub async fn run(cli: Cli) -> Result<ExitCode, RunError> {
    let out = output::formatter(cli.output);

    let config = harness_config(&cli);
    let mut harness = Harness::new(config)
        .context("invalid configuration")
        .map_err(RunError::InvalidInput)?;
    if let Some(progress) = out.progress() {
        harness = harness.with_progress(progress);
    }

    let sink = JsonlSink::new(&cli.results);
    out.print_header(harness.config(), cli.iterations, sink.path());

    let summary = harness
        .run(cli.iterations, &sink)
        .await
        .context("run failed")
        .map_err(RunError::RuntimeError)?;

    out.print_summary(&summary, sink.path())
        .map_err(RunError::RuntimeError)?;

    // Operation failures are reported in the summary; the run itself succeeded.
    Ok(ExitCode::Success)
}

fn harness_config(cli: &Cli) -> HarnessConfig {
    HarnessConfig {
        base_url: cli.url.clone(),
        concurrency: usize::try_from(cli.parallel).unwrap_or(usize::MAX),
        request_timeout: cli.request_timeout,
        step_delay: cli.step_delay,
        deadline: cli.deadline,
        ..HarnessConfig::default()
    }
}
