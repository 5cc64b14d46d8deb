use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

/// The four calls a chain makes against one entity, in chain order.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

/// Outcome of one attempted operation.
///
/// Built once, right after the call finishes, and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRecord {
    operation: Operation,
    entity_id: String,
    status_code: u16,
    duration: Duration,
    error: Option<String>,
    timestamp: SystemTime,
}

impl ResultRecord {
    /// The call reached the service and returned `status_code`.
    pub fn completed(
        operation: Operation,
        entity_id: impl Into<String>,
        status_code: u16,
        duration: Duration,
    ) -> Self {
        Self {
            operation,
            entity_id: entity_id.into(),
            status_code,
            duration,
            error: None,
            timestamp: SystemTime::now(),
        }
    }

    /// The call never produced a usable response; `status_code` is 0.
    pub fn failed(
        operation: Operation,
        entity_id: impl Into<String>,
        duration: Duration,
        error: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            entity_id: entity_id.into(),
            status_code: 0,
            duration,
            error: Some(error.into()),
            timestamp: SystemTime::now(),
        }
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Empty when the operation failed before an id was known.
    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    /// No transport error and a 2xx status.
    pub fn is_success(&self) -> bool {
        self.error.is_none() && (200..300).contains(&self.status_code)
    }
}
