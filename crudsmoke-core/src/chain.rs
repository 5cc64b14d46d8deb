use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crudsmoke_http::{HttpClient, HttpRequest, HttpResponse};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::content::{self, ContentPatch, NewContent, PATH_CONTENT};
use super::executor::BoundedExecutor;
use super::record::{Operation, ResultRecord};
use super::tracker::{CompletionTracker, WorkGuard};

/// Units of work a successful CREATE hands to its follow-up task.
const FOLLOW_UP_STEPS: usize = 3;

type Outcome = std::result::Result<HttpResponse, String>;

/// Everything a chain needs; cloned into every spawned unit.
#[derive(Clone)]
pub struct ChainContext {
    client: HttpClient,
    base_url: Arc<str>,
    executor: BoundedExecutor,
    tracker: Arc<CompletionTracker>,
    results: mpsc::Sender<ResultRecord>,
    cancel: CancellationToken,
    request_timeout: Duration,
    step_delay: Duration,
}

pub struct ChainSettings {
    pub base_url: Arc<str>,
    pub request_timeout: Duration,
    pub step_delay: Duration,
}

impl ChainContext {
    pub fn new(
        client: HttpClient,
        executor: BoundedExecutor,
        tracker: Arc<CompletionTracker>,
        results: mpsc::Sender<ResultRecord>,
        cancel: CancellationToken,
        settings: ChainSettings,
    ) -> Self {
        Self {
            client,
            base_url: settings.base_url,
            executor,
            tracker,
            results,
            cancel,
            request_timeout: settings.request_timeout,
            step_delay: settings.step_delay,
        }
    }

    /// Launches chain `seq`. `guard` must hold exactly one unit.
    pub fn spawn_chain(&self, seq: u64, guard: WorkGuard) {
        let ctx = self.clone();
        self.spawn_unit(async move { ctx.run_chain(seq, guard).await });
    }

    // Dropping the future on cancellation drops any WorkGuard it owns.
    fn spawn_unit<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {}
                _ = fut => {}
            }
        });
    }

    async fn run_chain(self, seq: u64, guard: WorkGuard) {
        let payload = NewContent::synthetic(seq, unix_secs());
        let url = format!("{}{PATH_CONTENT}", self.base_url);

        let (elapsed, outcome) = self
            .attempt(|| HttpRequest::post_json(url, &payload))
            .await;

        let res = match outcome {
            Ok(res) => res,
            Err(error) => {
                self.emit(ResultRecord::failed(Operation::Create, "", elapsed, error))
                    .await;
                return;
            }
        };

        if !res.is_success() {
            self.emit(ResultRecord::completed(
                Operation::Create,
                "",
                res.status,
                elapsed,
            ))
            .await;
            return;
        }

        let id = match content::created_id(&res) {
            Ok(id) => id,
            Err(err) => {
                self.emit(ResultRecord::failed(
                    Operation::Create,
                    "",
                    elapsed,
                    format!("failed to decode response: {err}"),
                ))
                .await;
                return;
            }
        };

        self.emit(ResultRecord::completed(
            Operation::Create,
            id.as_str(),
            res.status,
            elapsed,
        ))
        .await;

        // Register before releasing the chain's own unit so the tracker never dips to zero in between.
        let steps = self.tracker.register(FOLLOW_UP_STEPS);
        drop(guard);

        let ctx = self.clone();
        self.spawn_unit(async move { ctx.run_steps(id, steps).await });
    }

    async fn run_steps(self, id: String, mut guard: WorkGuard) {
        let item = content::item_path(&self.base_url, &id);

        let (elapsed, outcome) = self.attempt(|| Ok(HttpRequest::get(item.as_str()))).await;
        self.emit(record_for(Operation::Read, &id, elapsed, &outcome))
            .await;
        guard.complete_one();

        tokio::time::sleep(self.step_delay).await;

        let patch = ContentPatch::synthetic(&id, unix_secs());
        let (elapsed, outcome) = self
            .attempt(|| HttpRequest::put_json(item.as_str(), &patch))
            .await;
        if let Ok(res) = &outcome
            && res.status >= 400
        {
            tracing::debug!(
                entity_id = %id,
                status = res.status,
                body = res.body_utf8().unwrap_or("<binary>"),
                "update rejected"
            );
        }
        self.emit(record_for(Operation::Update, &id, elapsed, &outcome))
            .await;
        guard.complete_one();

        tokio::time::sleep(self.step_delay).await;

        let (elapsed, outcome) = self
            .attempt(|| Ok(HttpRequest::delete(item.as_str())))
            .await;
        self.emit(record_for(Operation::Delete, &id, elapsed, &outcome))
            .await;
        guard.complete_one();
    }

    /// Runs one call inside an executor slot.
    ///
    /// The clock starts once the slot is held, and the slot is released
    /// before the caller emits its record.
    async fn attempt<B>(&self, build: B) -> (Duration, Outcome)
    where
        B: FnOnce() -> crudsmoke_http::Result<HttpRequest>,
    {
        let slot = match self.executor.acquire().await {
            Ok(slot) => slot,
            Err(err) => return (Duration::ZERO, Err(err.to_string())),
        };
        let started = Instant::now();

        let req = match build() {
            Ok(req) => req.with_timeout(Some(self.request_timeout)),
            Err(err) => {
                return (
                    started.elapsed(),
                    Err(format!("failed to build request: {err}")),
                );
            }
        };

        let outcome = self
            .client
            .request(req)
            .await
            .map_err(|err| format!("failed to execute request: {err}"));
        let elapsed = started.elapsed();
        drop(slot);

        (elapsed, outcome)
    }

    async fn emit(&self, record: ResultRecord) {
        if self.results.send(record).await.is_err() {
            tracing::debug!("result channel closed; dropping record");
        }
    }
}

fn record_for(op: Operation, id: &str, elapsed: Duration, outcome: &Outcome) -> ResultRecord {
    match outcome {
        Ok(res) => ResultRecord::completed(op, id, res.status, elapsed),
        Err(error) => ResultRecord::failed(op, id, elapsed, error.as_str()),
    }
}

fn unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
