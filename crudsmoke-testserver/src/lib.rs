use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::{Duration, sleep};

pub const PATH_CONTENT: &str = "/content";
pub const PATH_CONTENT_ITEM: &str = "/content/{id}";

pub const CALL_CREATE: &str = "CREATE";
pub const CALL_READ: &str = "READ";
pub const CALL_UPDATE: &str = "UPDATE";
pub const CALL_DELETE: &str = "DELETE";

/// Knobs for making the mock misbehave.
#[derive(Debug, Clone, Default)]
pub struct MockBehavior {
    /// Answer every CREATE with this status instead of storing the entity.
    pub create_status: Option<u16>,
    /// Answer every CREATE with `201` and this raw body instead of storing the entity.
    pub create_body: Option<&'static str>,
    /// Answer every READ with this status.
    pub read_status: Option<u16>,
    /// Answer every UPDATE with this status, leaving the entity unchanged.
    pub update_status: Option<u16>,
    /// Answer every DELETE with this status, leaving the entity stored.
    pub delete_status: Option<u16>,
    /// Delay applied to every request while it counts as in flight.
    pub latency: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct TestServerStats {
    creates: Arc<AtomicU64>,
    reads: Arc<AtomicU64>,
    updates: Arc<AtomicU64>,
    deletes: Arc<AtomicU64>,
    in_flight: Arc<AtomicU64>,
    max_in_flight: Arc<AtomicU64>,
    calls: Arc<Mutex<HashMap<String, Vec<&'static str>>>>,
}

impl TestServerStats {
    fn enter(&self) -> InFlight {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        InFlight {
            counter: self.in_flight.clone(),
        }
    }

    fn log_call(&self, id: &str, call: &'static str) {
        let counter = match call {
            CALL_CREATE => &self.creates,
            CALL_READ => &self.reads,
            CALL_UPDATE => &self.updates,
            _ => &self.deletes,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.calls.lock().entry(id.to_string()).or_default().push(call);
    }

    pub fn creates(&self) -> u64 {
        self.creates.load(Ordering::Relaxed)
    }

    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    pub fn updates(&self) -> u64 {
        self.updates.load(Ordering::Relaxed)
    }

    pub fn deletes(&self) -> u64 {
        self.deletes.load(Ordering::Relaxed)
    }

    pub fn requests_total(&self) -> u64 {
        self.creates() + self.reads() + self.updates() + self.deletes()
    }

    /// Highest number of requests observed in flight at the same time.
    pub fn max_in_flight(&self) -> u64 {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Calls seen for one entity id, in arrival order.
    pub fn calls_for(&self, id: &str) -> Vec<&'static str> {
        self.calls.lock().get(id).cloned().unwrap_or_default()
    }

    /// Every entity id that received at least one call.
    pub fn entity_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.calls.lock().keys().cloned().collect();
        ids.sort();
        ids
    }
}

struct InFlight {
    counter: Arc<AtomicU64>,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    pub id: String,
    pub title: String,
    pub body: String,
    pub author: String,
    pub status: String,
    #[serde(default)]
    pub data: serde_json::Value,
    pub created_at: u64,
    pub updated_at: u64,
}

#[derive(Debug, Deserialize)]
struct NewContent {
    title: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    author: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ContentPatch {
    title: Option<String>,
    body: Option<String>,
    author: Option<String>,
    status: Option<String>,
    data: Option<serde_json::Value>,
}

#[derive(Clone)]
struct AppState {
    stats: TestServerStats,
    store: Arc<DashMap<String, Content>>,
    behavior: MockBehavior,
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

fn error_body(status: StatusCode, message: &str) -> Response {
    (status, axum::Json(serde_json::json!({ "error": message }))).into_response()
}

fn forced(code: Option<u16>) -> Option<Response> {
    let status = StatusCode::from_u16(code?).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    Some(error_body(status, "forced failure"))
}

async fn handle_create(State(state): State<AppState>, body: Bytes) -> Response {
    let _in_flight = state.stats.enter();
    sleep(state.behavior.latency).await;

    if let Some(res) = forced(state.behavior.create_status) {
        return res;
    }
    if let Some(body) = state.behavior.create_body {
        return (
            StatusCode::CREATED,
            [(header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response();
    }

    let new: NewContent = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(_) => return error_body(StatusCode::BAD_REQUEST, "bad json"),
    };

    let now = unix_millis();
    let content = Content {
        id: uuid::Uuid::new_v4().to_string(),
        title: new.title,
        body: new.body,
        author: new.author,
        status: new.status,
        data: new.data,
        created_at: now,
        updated_at: now,
    };

    state.stats.log_call(&content.id, CALL_CREATE);
    state.store.insert(content.id.clone(), content.clone());

    (StatusCode::CREATED, axum::Json(content)).into_response()
}

async fn handle_read(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let _in_flight = state.stats.enter();
    state.stats.log_call(&id, CALL_READ);
    sleep(state.behavior.latency).await;
    if let Some(res) = forced(state.behavior.read_status) {
        return res;
    }

    match state.store.get(&id) {
        Some(content) => (StatusCode::OK, axum::Json(content.value().clone())).into_response(),
        None => error_body(StatusCode::NOT_FOUND, "content not found"),
    }
}

async fn handle_update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Response {
    let _in_flight = state.stats.enter();
    state.stats.log_call(&id, CALL_UPDATE);
    sleep(state.behavior.latency).await;
    if let Some(res) = forced(state.behavior.update_status) {
        return res;
    }

    let patch: ContentPatch = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(_) => return error_body(StatusCode::BAD_REQUEST, "bad json"),
    };

    let Some(mut content) = state.store.get_mut(&id) else {
        return error_body(StatusCode::NOT_FOUND, "content not found");
    };

    if let Some(v) = patch.title {
        content.title = v;
    }
    if let Some(v) = patch.body {
        content.body = v;
    }
    if let Some(v) = patch.author {
        content.author = v;
    }
    if let Some(v) = patch.status {
        content.status = v;
    }
    if let Some(v) = patch.data {
        content.data = v;
    }
    content.updated_at = unix_millis();

    (StatusCode::OK, axum::Json(content.value().clone())).into_response()
}

async fn handle_delete(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let _in_flight = state.stats.enter();
    state.stats.log_call(&id, CALL_DELETE);
    sleep(state.behavior.latency).await;
    if let Some(res) = forced(state.behavior.delete_status) {
        return res;
    }

    match state.store.remove(&id) {
        Some(_) => StatusCode::NO_CONTENT.into_response(),
        None => error_body(StatusCode::NOT_FOUND, "content not found"),
    }
}

fn router(stats: TestServerStats, behavior: MockBehavior) -> Router {
    let state = AppState {
        stats,
        store: Arc::new(DashMap::new()),
        behavior,
    };

    Router::new()
        .route(PATH_CONTENT, post(handle_create))
        .route(
            PATH_CONTENT_ITEM,
            get(handle_read).put(handle_update).delete(handle_delete),
        )
        .with_state(state)
}

/// Builds the mock content service router with default behavior.
pub fn content_router(stats: TestServerStats) -> Router {
    router(stats, MockBehavior::default())
}

pub struct TestServer {
    addr: SocketAddr,
    base_url: String,
    stats: TestServerStats,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    pub async fn start() -> std::io::Result<Self> {
        Self::start_with(MockBehavior::default()).await
    }

    pub async fn start_with(behavior: MockBehavior) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let stats = TestServerStats::default();
        let app = router(stats.clone(), behavior);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            let _ = serve.await;
        });

        Ok(Self {
            addr,
            base_url: format!("http://{addr}"),
            stats,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn stats(&self) -> &TestServerStats {
        &self.stats
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if self.shutdown_tx.is_some()
            && let Some(task) = self.task.take()
        {
            task.abort();
        }
    }
}
