use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crudsmoke_core::{
    Harness, HarnessConfig, JsonlSink, Operation, ProgressFn, RunSummary, SummarySink,
};
use crudsmoke_testserver::{
    CALL_CREATE, CALL_DELETE, CALL_READ, CALL_UPDATE, MockBehavior, TestServer,
};
use parking_lot::Mutex;

#[derive(Default)]
struct MemorySink {
    written: Mutex<Vec<RunSummary>>,
}

impl SummarySink for MemorySink {
    fn write(&self, summary: &RunSummary) {
        self.written.lock().push(summary.clone());
    }
}

fn config(base_url: &str, parallel: usize) -> HarnessConfig {
    HarnessConfig {
        base_url: base_url.to_string(),
        concurrency: parallel,
        request_timeout: Duration::from_secs(5),
        step_delay: Duration::from_millis(1),
        ..HarnessConfig::default()
    }
}

async fn run(cfg: HarnessConfig, iterations: usize) -> anyhow::Result<RunSummary> {
    let sink = MemorySink::default();
    let summary = Harness::new(cfg)?.run(iterations, &sink).await?;
    let written = sink.written.lock();
    anyhow::ensure!(written.len() == 1, "expected exactly one summary write");
    anyhow::ensure!(written[0] == summary, "sink saw a different summary");
    Ok(summary)
}

fn check_stat_invariants(summary: &RunSummary) -> anyhow::Result<()> {
    for (op, s) in &summary.operations {
        anyhow::ensure!(s.count == s.success + s.failures, "{op}: count mismatch");
        if s.count > 0 {
            anyhow::ensure!(
                s.min_duration_ns <= s.avg_duration_ns && s.avg_duration_ns <= s.max_duration_ns,
                "{op}: min <= avg <= max violated: {s:?}"
            );
        }
    }
    anyhow::ensure!(
        summary.total_operations == summary.total_success + summary.total_failures,
        "totals mismatch"
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn single_chain_against_compliant_service() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let summary = run(config(server.base_url(), 10), 1).await?;

    anyhow::ensure!(summary.total_operations == 4);
    anyhow::ensure!(summary.total_failures == 0);
    anyhow::ensure!(summary.success_rate == 1.0);
    for op in [
        Operation::Create,
        Operation::Read,
        Operation::Update,
        Operation::Delete,
    ] {
        let s = summary
            .operation(op)
            .ok_or_else(|| anyhow::anyhow!("missing {op}"))?;
        anyhow::ensure!(s.count == 1 && s.success == 1, "{op}: {s:?}");
    }
    anyhow::ensure!(!summary.deadline_exceeded);
    anyhow::ensure!(summary.abandoned_operations == 0);

    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn compliant_service_never_fails_for_any_iteration_count() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    for n in [0usize, 1, 2, 7, 25] {
        let summary = run(config(server.base_url(), 4), n).await?;
        anyhow::ensure!(summary.total_operations == 4 * n as u64, "n={n}: {summary:?}");
        anyhow::ensure!(summary.total_success == summary.total_operations, "n={n}");
        anyhow::ensure!(summary.total_failures == 0, "n={n}");
        check_stat_invariants(&summary)?;
    }
    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failing_creates_spawn_no_follow_up_operations() -> anyhow::Result<()> {
    let server = TestServer::start_with(MockBehavior {
        create_status: Some(500),
        ..MockBehavior::default()
    })
    .await?;
    let summary = run(config(server.base_url(), 10), 5).await?;

    let create = summary
        .operation(Operation::Create)
        .ok_or_else(|| anyhow::anyhow!("missing CREATE"))?;
    anyhow::ensure!(create.count == 5 && create.success == 0 && create.failures == 5);
    anyhow::ensure!(create.status_codes.get(&500) == Some(&5));
    anyhow::ensure!(summary.operations.len() == 1, "{:?}", summary.operations);
    anyhow::ensure!(!summary.is_success());

    let stats = server.stats();
    anyhow::ensure!(stats.reads() == 0 && stats.updates() == 0 && stats.deletes() == 0);

    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn undecodable_create_responses_spawn_no_follow_up_operations() -> anyhow::Result<()> {
    let server = TestServer::start_with(MockBehavior {
        create_body: Some("<html>created</html>"),
        ..MockBehavior::default()
    })
    .await?;
    let summary = run(config(server.base_url(), 4), 3).await?;

    let create = summary
        .operation(Operation::Create)
        .ok_or_else(|| anyhow::anyhow!("missing CREATE"))?;
    anyhow::ensure!(create.count == 3 && create.failures == 3, "{create:?}");
    anyhow::ensure!(create.status_codes.get(&0) == Some(&3), "{create:?}");
    anyhow::ensure!(summary.operations.len() == 1, "{:?}", summary.operations);

    let stats = server.stats();
    anyhow::ensure!(stats.reads() == 0 && stats.updates() == 0 && stats.deletes() == 0);

    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn rejected_reads_fail_without_stopping_later_steps() -> anyhow::Result<()> {
    let server = TestServer::start_with(MockBehavior {
        read_status: Some(404),
        ..MockBehavior::default()
    })
    .await?;
    let summary = run(config(server.base_url(), 4), 4).await?;

    let get = |op: Operation| {
        summary
            .operation(op)
            .ok_or_else(|| anyhow::anyhow!("missing {op}"))
    };
    let read = get(Operation::Read)?;
    anyhow::ensure!(read.count == 4 && read.failures == 4, "{read:?}");
    anyhow::ensure!(read.status_codes.get(&404) == Some(&4), "{read:?}");
    anyhow::ensure!(read.status_codes.get(&0).is_none(), "{read:?}");

    for op in [Operation::Create, Operation::Update, Operation::Delete] {
        let s = get(op)?;
        anyhow::ensure!(s.count == 4 && s.success == 4, "{op}: {s:?}");
    }
    anyhow::ensure!(summary.total_failures == 4);

    let stats = server.stats();
    anyhow::ensure!(stats.updates() == 4 && stats.deletes() == 4);

    server.shutdown().await;
    Ok(())
}

#[test]
fn oversized_concurrency_is_rejected_before_running() -> anyhow::Result<()> {
    let cfg = HarnessConfig {
        concurrency: usize::MAX,
        ..HarnessConfig::default()
    };
    anyhow::ensure!(matches!(
        Harness::new(cfg).err(),
        Some(crudsmoke_core::Error::InvalidConcurrency)
    ));
    Ok(())
}

#[tokio::test]
async fn zero_iterations_produces_empty_summary() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let summary = run(config(server.base_url(), 10), 0).await?;

    anyhow::ensure!(summary.total_operations == 0);
    anyhow::ensure!(summary.total_failures == 0);
    anyhow::ensure!(summary.success_rate == 0.0);
    anyhow::ensure!(summary.operations.is_empty());
    anyhow::ensure!(server.stats().requests_total() == 0);

    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn in_flight_calls_never_exceed_capacity() -> anyhow::Result<()> {
    for parallel in [1usize, 3] {
        let server = TestServer::start_with(MockBehavior {
            latency: Duration::from_millis(20),
            ..MockBehavior::default()
        })
        .await?;
        let summary = run(config(server.base_url(), parallel), 8).await?;

        anyhow::ensure!(summary.total_operations == 32, "{summary:?}");
        let max = server.stats().max_in_flight();
        anyhow::ensure!(
            max >= 1 && max <= parallel as u64,
            "parallel={parallel}, max_in_flight={max}"
        );
        server.shutdown().await;
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn each_entity_sees_calls_in_chain_order() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let summary = run(config(server.base_url(), 10), 6).await?;
    anyhow::ensure!(summary.total_failures == 0);

    let ids = server.stats().entity_ids();
    anyhow::ensure!(ids.len() == 6, "{ids:?}");
    for id in ids {
        let calls = server.stats().calls_for(&id);
        anyhow::ensure!(
            calls == vec![CALL_CREATE, CALL_READ, CALL_UPDATE, CALL_DELETE],
            "{id}: {calls:?}"
        );
    }

    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn unreachable_service_records_transport_failures() -> anyhow::Result<()> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;
    drop(listener);

    let summary = run(config(&format!("http://{addr}"), 2), 3).await?;
    let create = summary
        .operation(Operation::Create)
        .ok_or_else(|| anyhow::anyhow!("missing CREATE"))?;
    anyhow::ensure!(create.failures == 3);
    anyhow::ensure!(create.status_codes.get(&0) == Some(&3), "{create:?}");
    anyhow::ensure!(summary.operations.len() == 1);
    check_stat_invariants(&summary)?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn deadline_abandons_outstanding_operations() -> anyhow::Result<()> {
    let server = TestServer::start_with(MockBehavior {
        latency: Duration::from_millis(500),
        ..MockBehavior::default()
    })
    .await?;
    let cfg = HarnessConfig {
        deadline: Duration::from_millis(100),
        ..config(server.base_url(), 10)
    };

    let started = Instant::now();
    let summary = run(cfg, 5).await?;

    anyhow::ensure!(started.elapsed() < Duration::from_millis(450));
    anyhow::ensure!(summary.deadline_exceeded);
    anyhow::ensure!(summary.abandoned_operations == 5);
    anyhow::ensure!(summary.total_operations == 0, "{summary:?}");

    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn progress_reports_every_folded_record() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let seen = Arc::new(AtomicU64::new(0));
    let s = seen.clone();
    let progress: ProgressFn = Arc::new(move |u| {
        s.fetch_max(u.completed, Ordering::SeqCst);
    });

    let sink = MemorySink::default();
    let summary = Harness::new(config(server.base_url(), 4))?
        .with_progress(progress)
        .run(3, &sink)
        .await?;

    anyhow::ensure!(seen.load(Ordering::SeqCst) == summary.total_operations);
    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn jsonl_sink_appends_one_line_per_run() -> anyhow::Result<()> {
    let server = TestServer::start().await?;
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("test-results.jsonl");
    let sink = JsonlSink::new(&path);
    let harness = Harness::new(config(server.base_url(), 4))?;

    harness.run(2, &sink).await?;
    let second = harness.run(1, &sink).await?;

    let text = std::fs::read_to_string(&path)?;
    let lines: Vec<&str> = text.lines().collect();
    anyhow::ensure!(lines.len() == 2, "{text}");
    let last: RunSummary = serde_json::from_str(lines[1])?;
    anyhow::ensure!(last == second);
    anyhow::ensure!(last.iterations == 1 && last.total_operations == 4);

    server.shutdown().await;
    Ok(())
}

#[test]
fn invalid_config_is_rejected_before_running() {
    let err = Harness::new(HarnessConfig {
        concurrency: 0,
        ..HarnessConfig::default()
    })
    .err();
    assert!(matches!(err, Some(crudsmoke_core::Error::InvalidConcurrency)));
}
