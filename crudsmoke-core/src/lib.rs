mod chain;
mod collector;
mod config;
mod content;
mod error;
mod executor;
mod progress;
mod record;
mod run;
mod sink;
mod summary;
mod tracker;

pub use collector::{CollectedStats, OperationStat, OperationStats, ResultCollector};
pub use config::{
    DEFAULT_BASE_URL, DEFAULT_CONCURRENCY, DEFAULT_DEADLINE, DEFAULT_REQUEST_TIMEOUT,
    DEFAULT_RESULT_BUFFER, DEFAULT_STEP_DELAY, HarnessConfig,
};
pub use content::{ContentPatch, NewContent};
pub use error::{Error, Result};
pub use executor::{BoundedExecutor, Slot};
pub use progress::{ProgressFn, ProgressUpdate};
pub use record::{Operation, ResultRecord};
pub use run::Harness;
pub use sink::{JsonlSink, SummarySink};
pub use summary::{OperationSummary, RunMeta, RunSummary};
pub use tracker::{CompletionTracker, WorkGuard};
