use std::path::Path;
use std::sync::Arc;

use crudsmoke_core::{HarnessConfig, ProgressFn, RunSummary};

mod format;
mod progress;
mod summary;

use format::format_duration;
use progress::HumanProgress;
use summary::render;

use super::OutputFormatter;

pub(crate) struct HumanReadableOutput {
    progress: Arc<HumanProgress>,
}

impl HumanReadableOutput {
    pub(crate) fn new() -> Self {
        Self {
            progress: Arc::new(HumanProgress::new()),
        }
    }
}

impl OutputFormatter for HumanReadableOutput {
    fn print_header(&self, config: &HarnessConfig, iterations: usize, results: &Path) {
        println!("target: {}", config.base_url);
        println!(
            "iterations: {iterations} parallel: {} step_delay: {} deadline: {}",
            config.concurrency,
            format_duration(config.step_delay),
            humantime::format_duration(config.deadline)
        );
        println!("results: {}", results.display());
        println!();
    }

    fn progress(&self) -> Option<ProgressFn> {
        let progress = self.progress.clone();
        Some(Arc::new(move |u| {
            progress.update(format!(
                "operations={} failures={} elapsed={}",
                u.completed,
                u.failures,
                format_duration(u.elapsed)
            ));
        }))
    }

    fn print_summary(&self, summary: &RunSummary, results: &Path) -> anyhow::Result<()> {
        self.progress.finish();
        print!("{}", render(summary, results));
        Ok(())
    }
}
