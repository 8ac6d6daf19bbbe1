//! Event hooks for the review pipeline.
//!
//! Provides an optional, non-intrusive way to observe a submission as it
//! moves through prompt building, model invocation, extraction and
//! normalization. Implement [`EventHandler`] to receive [`PipelineEvent`]s
//! for progress tracking, metrics or tests.

use std::sync::Arc;

/// Which model call a stage belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flow {
    Rating,
    Insights,
    Reply,
}

impl Flow {
    pub fn as_str(self) -> &'static str {
        match self {
            Flow::Rating => "rating",
            Flow::Insights => "insights",
            Flow::Reply => "reply",
        }
    }
}

/// Per-flow lifecycle.
///
/// ```text
/// PromptBuilt → Invoked → ExtractedOk ─┬─► Normalized
///                       → ExtractedEmpty ┘
///                                        └─► Failed   (rating flow only)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    PromptBuilt,
    Invoked,
    ExtractedOk,
    ExtractedEmpty,
    Normalized,
    Failed,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::PromptBuilt => "prompt_built",
            Stage::Invoked => "invoked",
            Stage::ExtractedOk => "extracted_ok",
            Stage::ExtractedEmpty => "extracted_empty",
            Stage::Normalized => "normalized",
            Stage::Failed => "failed",
        }
    }

    /// Whether no further stage follows.
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Normalized | Stage::Failed)
    }
}

/// Events emitted while a review is processed.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    /// A flow reached a new stage.
    StageEntered { flow: Flow, stage: Stage },
    /// A model call failed and will be attempted again.
    TransportRetry {
        /// The attempt that just failed (1-indexed).
        attempt: u32,
        /// Delay before the next attempt in milliseconds.
        delay_ms: u64,
        /// Error description of the failed attempt.
        reason: String,
    },
    /// A submission was persisted.
    Saved { submission_id: String },
}

/// Handler for pipeline events.
///
/// This is entirely optional; the pipeline works without one.
///
/// # Example
///
/// ```
/// use review_insight::events::{EventHandler, PipelineEvent};
///
/// struct PrintHandler;
///
/// impl EventHandler for PrintHandler {
///     fn on_event(&self, event: PipelineEvent) {
///         if let PipelineEvent::StageEntered { flow, stage } = event {
///             println!("[{}] {}", flow.as_str(), stage.as_str());
///         }
///     }
/// }
/// ```
pub trait EventHandler: Send + Sync {
    fn on_event(&self, event: PipelineEvent);
}

/// Emit an event if a handler is present. No-op otherwise.
pub(crate) fn emit(handler: &Option<Arc<dyn EventHandler>>, event: PipelineEvent) {
    if let Some(ref h) = handler {
        h.on_event(event);
    }
}

/// An [`EventHandler`] backed by a closure.
///
/// ```
/// use review_insight::events::{FnEventHandler, PipelineEvent};
/// use std::sync::Arc;
///
/// let handler = Arc::new(FnEventHandler(|event: PipelineEvent| {
///     if let PipelineEvent::TransportRetry { attempt, .. } = event {
///         eprintln!("retrying after attempt {}", attempt);
///     }
/// }));
/// ```
pub struct FnEventHandler<F: Fn(PipelineEvent) + Send + Sync>(pub F);

impl<F: Fn(PipelineEvent) + Send + Sync> EventHandler for FnEventHandler<F> {
    fn on_event(&self, event: PipelineEvent) {
        (self.0)(event);
    }
}

/// Handler that records every event, for tests and debugging.
#[derive(Debug, Default)]
pub struct EventLog {
    events: std::sync::Mutex<Vec<PipelineEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Stages entered by one flow, in order.
    pub fn stages(&self, flow: Flow) -> Vec<Stage> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                PipelineEvent::StageEntered { flow: f, stage } if f == flow => Some(stage),
                _ => None,
            })
            .collect()
    }
}

impl EventHandler for EventLog {
    fn on_event(&self, event: PipelineEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
