use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use hdrhistogram::Histogram;
use tokio::sync::mpsc;

use super::progress::{ProgressFn, ProgressUpdate};
use super::record::{Operation, ResultRecord};

/// Counts and duration extremes for one operation kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OperationStat {
    pub total: u64,
    pub success: u64,
    pub failures: u64,
    pub total_duration: Duration,
    pub min_duration: Option<Duration>,
    pub max_duration: Duration,
}

impl OperationStat {
    pub fn record(&mut self, record: &ResultRecord) {
        self.total += 1;
        if record.is_success() {
            self.success += 1;
        } else {
            self.failures += 1;
        }

        let d = record.duration();
        self.total_duration = self.total_duration.saturating_add(d);
        self.min_duration = Some(self.min_duration.map_or(d, |min| min.min(d)));
        self.max_duration = self.max_duration.max(d);
    }

    pub fn avg_duration(&self) -> Option<Duration> {
        if self.total == 0 {
            return None;
        }
        let avg_ns = self.total_duration.as_nanos() / u128::from(self.total);
        Some(Duration::from_nanos(
            u64::try_from(avg_ns).unwrap_or(u64::MAX),
        ))
    }

    /// `success / total`, or 0 when nothing was recorded.
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.success as f64 / self.total as f64
    }
}

/// Everything the collector keeps for one operation kind.
#[derive(Debug, Clone)]
pub struct OperationStats {
    pub stat: OperationStat,
    /// Responses per status code; transport failures count under 0.
    pub status_codes: BTreeMap<u16, u64>,
    latency_us: Histogram<u64>,
}

fn new_latency_histogram() -> Histogram<u64> {
    // 1us..1h with 3 significant figures.
    match Histogram::<u64>::new_with_bounds(1, 3_600_000_000, 3) {
        Ok(h) => h,
        Err(err) => panic!("failed to create histogram: {err}"),
    }
}

impl Default for OperationStats {
    fn default() -> Self {
        Self {
            stat: OperationStat::default(),
            status_codes: BTreeMap::new(),
            latency_us: new_latency_histogram(),
        }
    }
}

impl OperationStats {
    pub fn record(&mut self, record: &ResultRecord) {
        self.stat.record(record);
        *self.status_codes.entry(record.status_code()).or_insert(0) += 1;

        let us = u64::try_from(record.duration().as_micros()).unwrap_or(u64::MAX);
        self.latency_us.saturating_record(us.max(1));
    }

    /// Latency at quantile `q` (0..=1), or `None` when nothing was recorded.
    pub fn percentile(&self, q: f64) -> Option<Duration> {
        if self.latency_us.is_empty() {
            return None;
        }
        Some(Duration::from_micros(self.latency_us.value_at_quantile(q)))
    }
}

/// Per-kind aggregates, keyed in chain order.
pub type CollectedStats = BTreeMap<Operation, OperationStats>;

/// Single consumer of the result channel and sole owner of the per-kind aggregates.
pub struct ResultCollector {
    stats: CollectedStats,
    progress: Option<ProgressFn>,
    started: Instant,
    completed: u64,
    failures: u64,
}

impl ResultCollector {
    pub fn new(progress: Option<ProgressFn>) -> Self {
        Self {
            stats: CollectedStats::new(),
            progress,
            started: Instant::now(),
            completed: 0,
            failures: 0,
        }
    }

    pub fn fold(&mut self, record: ResultRecord) {
        if !record.is_success() {
            self.failures += 1;
            tracing::warn!(
                operation = %record.operation(),
                entity_id = record.entity_id(),
                status = record.status_code(),
                error = record.error().unwrap_or(""),
                at = %humantime::format_rfc3339_millis(record.timestamp()),
                "operation failed"
            );
        }
        self.completed += 1;

        self.stats
            .entry(record.operation())
            .or_default()
            .record(&record);

        if let Some(progress) = &self.progress {
            progress(ProgressUpdate {
                completed: self.completed,
                failures: self.failures,
                elapsed: self.started.elapsed(),
            });
        }
    }

    /// Folds records until every sender is gone.
    pub async fn drain(mut self, mut rx: mpsc::Receiver<ResultRecord>) -> CollectedStats {
        while let Some(record) = rx.recv().await {
            self.fold(record);
        }
        self.finish()
    }

    pub fn finish(self) -> CollectedStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn sample_records() -> Vec<ResultRecord> {
        vec![
            ResultRecord::completed(Operation::Create, "a", 201, ms(12)),
            ResultRecord::completed(Operation::Create, "b", 201, ms(4)),
            ResultRecord::failed(Operation::Create, "", ms(30), "connection reset"),
            ResultRecord::completed(Operation::Read, "a", 200, ms(2)),
            ResultRecord::completed(Operation::Read, "b", 404, ms(9)),
            ResultRecord::completed(Operation::Update, "a", 200, ms(7)),
            ResultRecord::completed(Operation::Delete, "a", 204, ms(5)),
        ]
    }

    fn fold_all(records: impl IntoIterator<Item = ResultRecord>) -> CollectedStats {
        let mut c = ResultCollector::new(None);
        for r in records {
            c.fold(r);
        }
        c.finish()
    }

    fn comparable(stats: &CollectedStats) -> Vec<(Operation, OperationStat, BTreeMap<u16, u64>, Option<Duration>)> {
        stats
            .iter()
            .map(|(op, s)| (*op, s.stat, s.status_codes.clone(), s.percentile(0.95)))
            .collect()
    }

    #[test]
    fn stat_counts_and_extremes() {
        let stats = fold_all(sample_records());
        let create = &stats[&Operation::Create].stat;

        assert_eq!(create.total, 3);
        assert_eq!(create.success, 2);
        assert_eq!(create.failures, 1);
        assert_eq!(create.min_duration, Some(ms(4)));
        assert_eq!(create.max_duration, ms(30));
        assert_eq!(create.avg_duration(), Some(Duration::from_nanos(15_333_333)));
        assert!((create.success_rate() - 2.0 / 3.0).abs() < 1e-9);

        let read = &stats[&Operation::Read];
        assert_eq!(read.stat.failures, 1);
        assert_eq!(read.status_codes.get(&404), Some(&1));
        assert_eq!(stats[&Operation::Create].status_codes.get(&0), Some(&1));
    }

    #[test]
    fn invariants_hold_for_every_kind() {
        let stats = fold_all(sample_records());
        for s in stats.values() {
            let st = s.stat;
            assert_eq!(st.total, st.success + st.failures);
            let avg = st.avg_duration().unwrap_or_default();
            let min = st.min_duration.unwrap_or_default();
            assert!(min <= avg && avg <= st.max_duration);
        }
    }

    #[test]
    fn empty_stat_has_no_average_and_zero_rate() {
        let st = OperationStat::default();
        assert_eq!(st.avg_duration(), None);
        assert_eq!(st.success_rate(), 0.0);
        assert!(OperationStats::default().percentile(0.5).is_none());
    }

    #[test]
    fn folding_is_order_independent() {
        let forward = fold_all(sample_records());

        let mut reversed = sample_records();
        reversed.reverse();
        let backward = fold_all(reversed);

        // A fixed interleaving that moves the slow failure first.
        let mut shuffled = sample_records();
        shuffled.rotate_left(2);
        shuffled.swap(0, 5);
        let rotated = fold_all(shuffled);

        assert_eq!(comparable(&forward), comparable(&backward));
        assert_eq!(comparable(&forward), comparable(&rotated));
    }

    #[test]
    fn kinds_never_observed_are_absent() {
        let stats = fold_all(vec![ResultRecord::completed(
            Operation::Create,
            "",
            500,
            ms(1),
        )]);
        assert_eq!(stats.len(), 1);
        assert!(!stats.contains_key(&Operation::Read));
    }

    #[tokio::test]
    async fn drain_folds_until_all_senders_drop() {
        let seen = Arc::new(AtomicU64::new(0));
        let s = seen.clone();
        let progress: ProgressFn = Arc::new(move |u| {
            s.store(u.completed, Ordering::SeqCst);
        });

        let (tx, rx) = mpsc::channel(2);
        let collector = tokio::spawn(ResultCollector::new(Some(progress)).drain(rx));

        let mut producers = Vec::new();
        for _ in 0..4 {
            let tx = tx.clone();
            producers.push(tokio::spawn(async move {
                for r in sample_records() {
                    let _ = tx.send(r).await;
                }
            }));
        }
        drop(tx);
        for p in producers {
            let _ = p.await;
        }

        let stats = match collector.await {
            Ok(s) => s,
            Err(err) => panic!("collector panicked: {err}"),
        };
        let total: u64 = stats.values().map(|s| s.stat.total).sum();
        assert_eq!(total, 28);
        assert_eq!(seen.load(Ordering::SeqCst), 28);
    }
}
