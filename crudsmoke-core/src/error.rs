pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("`parallel` must be between 1 and {}", tokio::sync::Semaphore::MAX_PERMITS)]
    InvalidConcurrency,

    #[error("`result_buffer` must be a positive integer")]
    InvalidResultBuffer,

    #[error("invalid base url `{0}` (expected an http:// or https:// url)")]
    InvalidBaseUrl(String),

    #[error("executor slots are closed")]
    ExecutorClosed,

    #[error("response has no usable `id` field")]
    MissingEntityId,

    #[error("result collector failed: {0}")]
    Collector(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Http(#[from] crudsmoke_http::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
