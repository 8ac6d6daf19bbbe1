use std::time::Duration;
use thiserror::Error;

/// Errors produced by the review pipeline and its components.
#[derive(Error, Debug)]
pub enum ReviewError {
    /// Low-level HTTP transport failure (connection refused, reset, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// JSON parsing failed at the serde level.
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP error with status code, response body, and optional Retry-After hint.
    ///
    /// Returned by [`Backend`](crate::backend::Backend) implementations when
    /// the provider returns a non-success status code. The `retry_after` field
    /// is populated from the `Retry-After` response header when present.
    #[error("HTTP {status}: {body}")]
    HttpError {
        /// HTTP status code (e.g. 429, 500, 503).
        status: u16,
        /// Response body text.
        body: String,
        /// Parsed `Retry-After` header value, if present.
        retry_after: Option<Duration>,
    },

    /// A single model call did not answer within the per-attempt timeout.
    #[error("model call timed out after {0:?}")]
    Timeout(Duration),

    /// The caller's submission failed validation and never reached the model.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The model never produced a usable star rating.
    #[error("rating prediction unavailable: {0}")]
    RatingUnavailable(String),

    /// The whole submission ran past its deadline.
    #[error("analysis did not complete within {0:?}")]
    DeadlineExceeded(Duration),

    /// Flat-file persistence failure.
    #[error("CSV storage failed: {0}")]
    Csv(#[from] csv::Error),

    /// Filesystem failure in a store.
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// A blocking storage task panicked or was cancelled.
    #[error("storage task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// Invalid configuration detected at build time.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Catch-all for other errors.
    #[error("{0}")]
    Other(String),
}

impl ReviewError {
    /// Whether the caller may simply resubmit the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ReviewError::RatingUnavailable(_) | ReviewError::DeadlineExceeded(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ReviewError>;
