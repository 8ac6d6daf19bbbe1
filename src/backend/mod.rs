//! Backend trait and normalized request/response types.
//!
//! The [`Backend`] trait abstracts over LLM providers, translating between
//! normalized [`LlmRequest`]/[`LlmResponse`] types and provider-specific
//! HTTP APIs. The production implementation is [`OpenAiBackend`] (Groq,
//! OpenAI and other compatible endpoints); [`MockBackend`] replays scripted
//! replies for tests.
//!
//! ```text
//! ModelInvoker ──► LlmRequest ──► Backend::complete() ──► LlmResponse
//!                                        │
//!                              ┌─────────┴─────────┐
//!                        OpenAiBackend         MockBackend
//!                   /v1/chat/completions     scripted replies
//! ```

pub mod backoff;
pub mod mock;
pub mod openai;

pub use backoff::BackoffConfig;
pub use mock::{MockBackend, MockReply};
pub use openai::OpenAiBackend;

use crate::client::LlmConfig;
use crate::error::Result;
use crate::ReviewError;
use async_trait::async_trait;
use reqwest::Client;

/// A provider-agnostic LLM request.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    /// Model identifier (e.g. `"llama-3.1-8b-instant"`).
    pub model: String,

    /// The user prompt text.
    pub prompt: String,

    /// Sampling configuration (temperature, max_tokens, json_mode).
    pub config: LlmConfig,
}

/// A normalized LLM response.
#[derive(Debug)]
pub struct LlmResponse {
    /// The generated text content.
    pub text: String,
}

/// Abstraction over LLM providers.
///
/// Implementors translate between the normalized [`LlmRequest`]/[`LlmResponse`]
/// and the provider's HTTP API, reporting non-success statuses as
/// [`ReviewError::HttpError`] so callers can classify them structurally.
///
/// This trait is object-safe and designed to be used as `Arc<dyn Backend>`.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Execute a single, non-streaming completion.
    async fn complete(
        &self,
        client: &Client,
        base_url: &str,
        request: &LlmRequest,
    ) -> Result<LlmResponse>;

    /// Human-readable name for logging and diagnostics.
    fn name(&self) -> &'static str;
}

/// Which backoff schedule a failed model call waits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Provider throttling (HTTP 429). Exponential backoff.
    RateLimited,
    /// Every other failure. Fixed delay.
    Transient,
}

/// Classify a [`ReviewError`] from its structure, never from message text.
///
/// Only HTTP 429 is [`ErrorClass::RateLimited`]; every other failure,
/// including bad requests and auth errors, is retried as
/// [`ErrorClass::Transient`].
pub fn classify(error: &ReviewError) -> ErrorClass {
    match error {
        ReviewError::HttpError { status: 429, .. } => ErrorClass::RateLimited,
        _ => ErrorClass::Transient,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn http(status: u16) -> ReviewError {
        ReviewError::HttpError {
            status,
            body: String::new(),
            retry_after: None,
        }
    }

    #[test]
    fn test_classify_429_is_rate_limited() {
        assert_eq!(classify(&http(429)), ErrorClass::RateLimited);
    }

    #[test]
    fn test_classify_other_statuses_are_transient() {
        for status in [400, 401, 403, 404, 500, 503] {
            assert_eq!(classify(&http(status)), ErrorClass::Transient, "status {}", status);
        }
    }

    #[test]
    fn test_classify_timeout_is_transient() {
        let err = ReviewError::Timeout(Duration::from_secs(30));
        assert_eq!(classify(&err), ErrorClass::Transient);
    }

    #[test]
    fn test_classify_ignores_message_text() {
        let err = ReviewError::Other("rate limit reached (429)".into());
        assert_eq!(classify(&err), ErrorClass::Transient);
    }
}
