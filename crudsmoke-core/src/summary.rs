use std::collections::BTreeMap;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use super::collector::{CollectedStats, OperationStats};
use super::error::Result;
use super::record::Operation;

/// Per-kind statistics as written to the results log. Durations are nanoseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationSummary {
    pub count: u64,
    pub success: u64,
    pub failures: u64,
    pub avg_duration_ns: u64,
    pub min_duration_ns: u64,
    pub max_duration_ns: u64,
    pub p50_duration_ns: u64,
    pub p90_duration_ns: u64,
    pub p95_duration_ns: u64,
    pub p99_duration_ns: u64,
    pub success_rate: f64,
    pub status_codes: BTreeMap<u16, u64>,
}

fn nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

impl From<&OperationStats> for OperationSummary {
    fn from(s: &OperationStats) -> Self {
        let pct = |q: f64| s.percentile(q).map(nanos).unwrap_or(0);
        Self {
            count: s.stat.total,
            success: s.stat.success,
            failures: s.stat.failures,
            avg_duration_ns: s.stat.avg_duration().map(nanos).unwrap_or(0),
            min_duration_ns: s.stat.min_duration.map(nanos).unwrap_or(0),
            max_duration_ns: nanos(s.stat.max_duration),
            p50_duration_ns: pct(0.50),
            p90_duration_ns: pct(0.90),
            p95_duration_ns: pct(0.95),
            p99_duration_ns: pct(0.99),
            success_rate: s.stat.success_rate(),
            status_codes: s.status_codes.clone(),
        }
    }
}

/// Run metadata gathered by the orchestrator.
#[derive(Debug, Clone)]
pub struct RunMeta {
    pub base_url: String,
    pub iterations: u64,
    pub parallel: u64,
    pub started_at: SystemTime,
    pub elapsed: Duration,
    pub deadline_exceeded: bool,
    /// Outstanding tracker units when the deadline fired.
    pub abandoned_operations: u64,
}

/// One line of the results log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// When the run started (RFC 3339, milliseconds), not when it finished.
    pub timestamp: String,
    pub base_url: String,
    pub iterations: u64,
    pub parallel: u64,
    pub total_operations: u64,
    pub total_success: u64,
    pub total_failures: u64,
    pub success_rate: f64,
    pub elapsed_time_ms: u64,
    pub deadline_exceeded: bool,
    /// Tracker units still outstanding when the deadline fired. A chain cut off
    /// during CREATE counts once, although its READ/UPDATE/DELETE never ran; a
    /// follow-up task counts its unfinished steps.
    pub abandoned_operations: u64,
    pub operations: BTreeMap<Operation, OperationSummary>,
}

impl RunSummary {
    pub fn new(meta: RunMeta, stats: &CollectedStats) -> Self {
        let operations: BTreeMap<Operation, OperationSummary> = stats
            .iter()
            .map(|(op, s)| (*op, OperationSummary::from(s)))
            .collect();

        let total_operations = operations.values().map(|o| o.count).sum();
        let total_success = operations.values().map(|o| o.success).sum();
        let total_failures = operations.values().map(|o| o.failures).sum();
        let success_rate = if total_operations == 0 {
            0.0
        } else {
            total_success as f64 / total_operations as f64
        };

        Self {
            timestamp: humantime::format_rfc3339_millis(meta.started_at).to_string(),
            base_url: meta.base_url,
            iterations: meta.iterations,
            parallel: meta.parallel,
            total_operations,
            total_success,
            total_failures,
            success_rate,
            elapsed_time_ms: u64::try_from(meta.elapsed.as_millis()).unwrap_or(u64::MAX),
            deadline_exceeded: meta.deadline_exceeded,
            abandoned_operations: meta.abandoned_operations,
            operations,
        }
    }

    /// True when no recorded operation failed.
    pub fn is_success(&self) -> bool {
        self.total_failures == 0
    }

    pub fn operation(&self, op: Operation) -> Option<&OperationSummary> {
        self.operations.get(&op)
    }

    pub fn to_json_line(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
