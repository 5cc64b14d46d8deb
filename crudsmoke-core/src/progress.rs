use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressUpdate {
    /// Records folded so far.
    pub completed: u64,
    /// Failed records among `completed`.
    pub failures: u64,
    /// Time since the collector started.
    pub elapsed: Duration,
}

pub type ProgressFn = Arc<dyn Fn(ProgressUpdate) + Send + Sync + 'static>;
