//! Mock backend for testing without a live LLM.
//!
//! [`MockBackend`] replays scripted replies in order, including provider
//! errors and hung calls, so retry and fallback behaviour can be tested
//! deterministically.
//!
//! # Example
//!
//! ```
//! use review_insight::backend::{MockBackend, MockReply};
//!
//! let mock = MockBackend::fixed(r#"{"predicted_stars": 4, "explanation": "Liked it"}"#);
//! let flaky = MockBackend::scripted(vec![
//!     MockReply::http(429, "rate limit reached"),
//!     MockReply::text("{\"predicted_stars\": 2}"),
//! ]);
//! assert_eq!(flaky.calls(), 0);
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::{Backend, LlmRequest, LlmResponse};
use crate::error::Result;
use crate::ReviewError;

/// One scripted outcome of a [`MockBackend`] call.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Successful completion with this text.
    Text(String),
    /// Provider error with this status and body.
    Http {
        status: u16,
        body: String,
        retry_after: Option<Duration>,
    },
    /// Never answers; only a timeout ends the call.
    Hang,
}

impl MockReply {
    pub fn text(text: impl Into<String>) -> Self {
        MockReply::Text(text.into())
    }

    pub fn http(status: u16, body: impl Into<String>) -> Self {
        MockReply::Http {
            status,
            body: body.into(),
            retry_after: None,
        }
    }

    pub fn throttled_for(retry_after: Duration) -> Self {
        MockReply::Http {
            status: 429,
            body: "rate limit reached".into(),
            retry_after: Some(retry_after),
        }
    }
}

/// A test backend that returns scripted replies in order.
///
/// Cycles back to the beginning when all replies have been consumed and
/// records every prompt it receives.
#[derive(Debug)]
pub struct MockBackend {
    replies: Vec<MockReply>,
    index: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl MockBackend {
    /// Create a mock backend answering with the given texts.
    pub fn new(responses: Vec<String>) -> Self {
        Self::scripted(responses.into_iter().map(MockReply::Text).collect())
    }

    /// Create a mock that always returns the same text.
    pub fn fixed(response: impl Into<String>) -> Self {
        Self::new(vec![response.into()])
    }

    /// Create a mock replaying arbitrary outcomes.
    ///
    /// With an empty script every call fails with
    /// [`ReviewError::InvalidConfig`].
    pub fn scripted(replies: Vec<MockReply>) -> Self {
        Self {
            replies,
            index: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Number of calls received so far.
    pub fn calls(&self) -> usize {
        self.index.load(Ordering::Relaxed)
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    fn next_reply(&self) -> Option<MockReply> {
        let idx = self.index.fetch_add(1, Ordering::Relaxed);
        if self.replies.is_empty() {
            return None;
        }
        Some(self.replies[idx % self.replies.len()].clone())
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn complete(
        &self,
        _client: &Client,
        _base_url: &str,
        request: &LlmRequest,
    ) -> Result<LlmResponse> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(request.prompt.clone());
        }
        let Some(reply) = self.next_reply() else {
            return Err(ReviewError::InvalidConfig(
                "MockBackend has no scripted replies".into(),
            ));
        };
        match reply {
            MockReply::Text(text) => Ok(LlmResponse { text }),
            MockReply::Http {
                status,
                body,
                retry_after,
            } => Err(ReviewError::HttpError {
                status,
                body,
                retry_after,
            }),
            MockReply::Hang => {
                std::future::pending::<()>().await;
                Err(ReviewError::Other("mock hang resolved".into()))
            }
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
