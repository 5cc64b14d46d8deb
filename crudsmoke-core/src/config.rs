use std::time::Duration;

use tokio::sync::Semaphore;

use super::error::{Error, Result};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8888";
pub const DEFAULT_CONCURRENCY: usize = 10;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_STEP_DELAY: Duration = Duration::from_millis(5);
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_RESULT_BUFFER: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Service root, without a trailing `/`.
    pub base_url: String,
    /// Maximum simultaneous HTTP calls.
    pub concurrency: usize,
    /// Ceiling for one call, including the body read.
    pub request_timeout: Duration,
    /// Pause between the READ, UPDATE and DELETE of one entity.
    pub step_delay: Duration,
    /// Wall-clock budget for the whole run.
    pub deadline: Duration,
    /// Capacity of the result channel.
    pub result_buffer: usize,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            concurrency: DEFAULT_CONCURRENCY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            step_delay: DEFAULT_STEP_DELAY,
            deadline: DEFAULT_DEADLINE,
            result_buffer: DEFAULT_RESULT_BUFFER,
        }
    }
}

impl HarnessConfig {
    /// Checks the config and normalizes the base url.
    pub fn validate(mut self) -> Result<Self> {
        if self.concurrency == 0 || self.concurrency > Semaphore::MAX_PERMITS {
            return Err(Error::InvalidConcurrency);
        }
        if self.result_buffer == 0 {
            return Err(Error::InvalidResultBuffer);
        }

        let trimmed = self.base_url.trim().trim_end_matches('/');
        let parsed =
            url::Url::parse(trimmed).map_err(|_| Error::InvalidBaseUrl(self.base_url.clone()))?;
        if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
            return Err(Error::InvalidBaseUrl(self.base_url));
        }

        self.base_url = trimmed.to_string();
        Ok(self)
    }
}
