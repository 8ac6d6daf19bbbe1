//! Bounded-retry model invocation.
//!
//! [`ModelInvoker`] sends one rendered prompt to the configured [`Backend`]
//! and never returns an error: the outcome is either the raw response text or
//! a typed [`InvocationFailure`] marker that downstream extraction treats as
//! "nothing recovered".
//!
//! Retry policy, per call:
//!
//! - throttling (HTTP 429) waits `2 s * 2^attempt` after every failed attempt,
//!   the last one included
//! - every other failure (any other status, transport error, timeout,
//!   malformed response) waits a fixed 2 s between attempts
//! - a `Retry-After` beyond the configured cap gives up at once

use crate::backend::{classify, Backend, BackoffConfig, ErrorClass, LlmRequest, OpenAiBackend};
use crate::client::LlmConfig;
use crate::error::{Result, ReviewError};
use crate::events::{emit, EventHandler, PipelineEvent};
use reqwest::Client;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default Groq model.
pub const DEFAULT_MODEL: &str = "llama-3.1-8b-instant";
/// Default Groq endpoint (OpenAI-compatible).
pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai";

/// Why an invocation produced no text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The provider asked for a longer wait than the invoker is allowed to
    /// make, or throttled the only attempt of a single-attempt policy.
    RateLimited,
    /// Every attempt of a retrying policy failed.
    Exhausted,
    /// The only attempt of a single-attempt policy failed without throttling.
    TransportError,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::RateLimited => "rate_limited",
            FailureKind::Exhausted => "exhausted",
            FailureKind::TransportError => "transport_error",
        }
    }
}

/// Failure marker carried in place of response text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationFailure {
    pub kind: FailureKind,
    /// Description of the last error seen.
    pub message: String,
    /// Attempts made before giving up.
    pub attempts: u32,
}

impl fmt::Display for InvocationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} after {} attempt(s): {}",
            self.kind.as_str(),
            self.attempts,
            self.message
        )
    }
}

/// Outcome of one [`ModelInvoker::invoke`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawModelOutput {
    Text(String),
    Failed(InvocationFailure),
}

impl RawModelOutput {
    pub fn text(&self) -> Option<&str> {
        match self {
            RawModelOutput::Text(text) => Some(text),
            RawModelOutput::Failed(_) => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, RawModelOutput::Failed(_))
    }

    fn failed(kind: FailureKind, error: &ReviewError, attempts: u32) -> Self {
        RawModelOutput::Failed(InvocationFailure {
            kind,
            message: error.to_string(),
            attempts,
        })
    }
}

/// Calls the model with bounded retry.
///
/// Cheap to share: the HTTP client and backend are reference-counted.
#[derive(Clone)]
pub struct ModelInvoker {
    client: Client,
    base_url: String,
    model: String,
    backend: Arc<dyn Backend>,
    backoff: BackoffConfig,
    event_handler: Option<Arc<dyn EventHandler>>,
}

impl ModelInvoker {
    /// Start configuring an invoker for the given endpoint.
    pub fn builder(base_url: impl Into<String>) -> InvokerConfig {
        InvokerConfig {
            client: None,
            base_url: base_url.into(),
            model: DEFAULT_MODEL.to_string(),
            backend: None,
            backoff: None,
            event_handler: None,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn backoff(&self) -> &BackoffConfig {
        &self.backoff
    }

    /// Report transport retries to `handler`.
    pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.event_handler = Some(handler);
        self
    }

    /// Send `prompt` and return the response text or a failure marker.
    pub async fn invoke(&self, prompt: &str, config: &LlmConfig) -> RawModelOutput {
        let request = LlmRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            config: config.clone(),
        };
        let max_attempts = self.backoff.max_attempts.max(1);
        let mut last_error: Option<ReviewError> = None;

        for attempt in 0..max_attempts {
            let attempts = attempt + 1;
            let error = match self.attempt(&request).await {
                Ok(text) => {
                    debug!(
                        backend = self.backend.name(),
                        attempts,
                        chars = text.len(),
                        "model call succeeded"
                    );
                    return RawModelOutput::Text(text);
                }
                Err(e) => e,
            };

            let wait = match classify(&error) {
                ErrorClass::RateLimited => match self.rate_limit_wait(attempt, &error) {
                    Some(wait) => Some(wait),
                    None => {
                        warn!(attempts, error = %error, "provider Retry-After exceeds cap, giving up");
                        return RawModelOutput::failed(FailureKind::RateLimited, &error, attempts);
                    }
                },
                ErrorClass::Transient if attempts < max_attempts => {
                    Some(self.backoff.transient_delay())
                }
                ErrorClass::Transient => None,
            };

            if let Some(wait) = wait {
                warn!(
                    attempts,
                    max_attempts,
                    delay_ms = wait.as_millis() as u64,
                    error = %error,
                    "model call failed, backing off"
                );
                if attempts < max_attempts {
                    emit(
                        &self.event_handler,
                        PipelineEvent::TransportRetry {
                            attempt: attempts,
                            delay_ms: wait.as_millis() as u64,
                            reason: error.to_string(),
                        },
                    );
                }
                tokio::time::sleep(wait).await;
            }
            last_error = Some(error);
        }

        let error = last_error
            .unwrap_or_else(|| ReviewError::Other("no attempt was made".into()));
        let kind = match (max_attempts, classify(&error)) {
            (1, ErrorClass::RateLimited) => FailureKind::RateLimited,
            (1, ErrorClass::Transient) => FailureKind::TransportError,
            _ => FailureKind::Exhausted,
        };
        warn!(attempts = max_attempts, kind = kind.as_str(), error = %error, "model call failed");
        RawModelOutput::failed(kind, &error, max_attempts)
    }

    async fn attempt(&self, request: &LlmRequest) -> Result<String> {
        let timeout = self.backoff.attempt_timeout;
        match tokio::time::timeout(
            timeout,
            self.backend.complete(&self.client, &self.base_url, request),
        )
        .await
        {
            Ok(result) => result.map(|response| response.text),
            Err(_) => Err(ReviewError::Timeout(timeout)),
        }
    }

    /// Throttling wait for `attempt`, or `None` when the provider's
    /// `Retry-After` is beyond `max_delay`.
    fn rate_limit_wait(&self, attempt: u32, error: &ReviewError) -> Option<Duration> {
        let computed = self.backoff.rate_limit_delay(attempt);
        match error {
            ReviewError::HttpError {
                retry_after: Some(hint),
                ..
            } if self.backoff.respect_retry_after => {
                if *hint > self.backoff.max_delay {
                    None
                } else {
                    Some(computed.max(*hint))
                }
            }
            _ => Some(computed),
        }
    }
}

impl fmt::Debug for ModelInvoker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelInvoker")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("backend", &self.backend.name())
            .field("backoff", &self.backoff)
            .field("has_event_handler", &self.event_handler.is_some())
            .finish()
    }
}

/// Builder for [`ModelInvoker`].
///
/// # Example
///
/// ```
/// use review_insight::backend::{BackoffConfig, MockBackend};
/// use review_insight::invoker::ModelInvoker;
/// use std::sync::Arc;
///
/// let invoker = ModelInvoker::builder("https://api.groq.com/openai/v1")
///     .model("llama-3.1-8b-instant")
///     .backend(Arc::new(MockBackend::fixed("{}")))
///     .backoff(BackoffConfig::standard())
///     .build()
///     .unwrap();
/// assert_eq!(invoker.model(), "llama-3.1-8b-instant");
/// ```
pub struct InvokerConfig {
    client: Option<Client>,
    base_url: String,
    model: String,
    backend: Option<Arc<dyn Backend>>,
    backoff: Option<BackoffConfig>,
    event_handler: Option<Arc<dyn EventHandler>>,
}

impl InvokerConfig {
    /// Set the HTTP client. If not set, one is built with the attempt timeout.
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the LLM backend. Default: unauthenticated [`OpenAiBackend`].
    pub fn backend(mut self, backend: Arc<dyn Backend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Use the OpenAI-compatible backend with bearer authentication.
    pub fn openai_with_key(mut self, api_key: impl Into<String>) -> Self {
        self.backend = Some(Arc::new(OpenAiBackend::new().with_api_key(api_key)));
        self
    }

    /// Set the retry policy. Default: [`BackoffConfig::standard()`].
    pub fn backoff(mut self, config: BackoffConfig) -> Self {
        self.backoff = Some(config);
        self
    }

    pub fn event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.event_handler = Some(handler);
        self
    }

    pub fn build(self) -> Result<ModelInvoker> {
        let backoff = self.backoff.unwrap_or_default();
        if backoff.attempt_timeout.is_zero() {
            return Err(ReviewError::InvalidConfig(
                "attempt timeout must be greater than zero".into(),
            ));
        }
        let client = match self.client {
            Some(client) => client,
            None => Client::builder().timeout(backoff.attempt_timeout).build()?,
        };
        Ok(ModelInvoker {
            client,
            base_url: normalize_base_url(&self.base_url),
            model: self.model,
            backend: self
                .backend
                .unwrap_or_else(|| Arc::new(OpenAiBackend::new())),
            backoff,
            event_handler: self.event_handler,
        })
    }
}

/// Strip known provider path suffixes so the backend can append its own.
/// e.g. "https://api.groq.com/openai/v1" -> "https://api.groq.com/openai"
fn normalize_base_url(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    for suffix in ["/v1/chat/completions", "/v1/chat", "/v1"] {
        if let Some(stripped) = trimmed.strip_suffix(suffix) {
            return stripped.to_string();
        }
    }
    trimmed.to_string()
}
