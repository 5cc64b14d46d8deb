use std::io::Write as _;
use std::path::Path;

use anyhow::Context as _;
use crudsmoke_core::{HarnessConfig, ProgressFn, RunSummary};

use super::OutputFormatter;

/// Prints only the summary line; logs go to stderr.
pub(crate) struct JsonOutput;

impl OutputFormatter for JsonOutput {
    fn print_header(&self, _config: &HarnessConfig, _iterations: usize, _results: &Path) {}

    fn progress(&self) -> Option<ProgressFn> {
        None
    }

    fn print_summary(&self, summary: &RunSummary, _results: &Path) -> anyhow::Result<()> {
        let line = summary
            .to_json_line()
            .context("failed to serialize run summary")?;

        let stdout = std::io::stdout();
        let mut lock = stdout.lock();
        writeln!(lock, "{line}").context("failed to write summary to stdout")?;
        lock.flush().context("failed to flush stdout")?;
        Ok(())
    }
}
