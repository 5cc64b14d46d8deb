use std::sync::Arc;
use std::time::{Instant, SystemTime};

use crudsmoke_http::HttpClient;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::chain::{ChainContext, ChainSettings};
use super::collector::ResultCollector;
use super::config::HarnessConfig;
use super::error::Result;
use super::executor::BoundedExecutor;
use super::progress::ProgressFn;
use super::sink::SummarySink;
use super::summary::{RunMeta, RunSummary};
use super::tracker::CompletionTracker;

/// Drives CRUD chains against one service and summarizes them.
pub struct Harness {
    config: HarnessConfig,
    client: HttpClient,
    progress: Option<ProgressFn>,
}

impl Harness {
    pub fn new(config: HarnessConfig) -> Result<Self> {
        Ok(Self {
            config: config.validate()?,
            client: HttpClient::default(),
            progress: None,
        })
    }

    #[must_use]
    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Runs `iterations` chains to completion or until the deadline, then
    /// hands the summary to `sink` and returns it.
    ///
    /// Per-operation failures end up in the summary; `Err` is reserved for the
    /// harness itself breaking.
    pub async fn run(&self, iterations: usize, sink: &dyn SummarySink) -> Result<RunSummary> {
        let cfg = &self.config;
        let started_at = SystemTime::now();
        let started = Instant::now();

        tracing::info!(
            base_url = %cfg.base_url,
            iterations,
            parallel = cfg.concurrency,
            "starting run"
        );

        let (tx, rx) = mpsc::channel(cfg.result_buffer);
        let collector = tokio::spawn(ResultCollector::new(self.progress.clone()).drain(rx));

        let tracker = CompletionTracker::new();
        let cancel = CancellationToken::new();
        let ctx = ChainContext::new(
            self.client.clone(),
            BoundedExecutor::new(cfg.concurrency)?,
            tracker.clone(),
            tx,
            cancel.clone(),
            ChainSettings {
                base_url: Arc::from(cfg.base_url.as_str()),
                request_timeout: cfg.request_timeout,
                step_delay: cfg.step_delay,
            },
        );

        let mut chains = tracker.register(iterations);
        for seq in 1..=iterations {
            ctx.spawn_chain(seq as u64, chains.split(1));
        }
        drop(chains);

        let deadline_exceeded = tokio::time::timeout(cfg.deadline, tracker.wait_idle())
            .await
            .is_err();
        let mut abandoned_operations = 0;
        if deadline_exceeded {
            abandoned_operations = tracker.outstanding() as u64;
            tracing::warn!(
                deadline = %humantime::format_duration(cfg.deadline),
                abandoned_operations,
                "run deadline exceeded; abandoning outstanding work"
            );
            cancel.cancel();
            tracker.wait_idle().await;
        }

        // The collector stops once the last sender clone is gone.
        drop(ctx);
        let stats = collector.await?;

        let summary = RunSummary::new(
            RunMeta {
                base_url: cfg.base_url.clone(),
                iterations: iterations as u64,
                parallel: cfg.concurrency as u64,
                started_at,
                elapsed: started.elapsed(),
                deadline_exceeded,
                abandoned_operations,
            },
            &stats,
        );
        sink.write(&summary);

        tracing::info!(
            total_operations = summary.total_operations,
            total_failures = summary.total_failures,
            elapsed_ms = summary.elapsed_time_ms,
            "run finished"
        );

        Ok(summary)
    }
}
