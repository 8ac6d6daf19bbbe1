//! # Review Insight
//!
//! Turns a free-text restaurant review plus the customer's star rating into a
//! structured analysis: an AI-predicted rating with explanation, a short
//! summary, exactly three recommended actions and a sentiment label, plus a
//! drafted reply to the customer.
//!
//! Each model interaction runs the same four steps:
//!
//! ```text
//! prompt::build ──► ModelInvoker::invoke ──► extract::extract ──► normalize::normalize
//!   (variant)        (retry + backoff)       (JSON, then regex)     (safe defaults)
//! ```
//!
//! Model output is treated as untrusted text. Every field except the predicted
//! rating has a rating-conditioned default; a missing rating is reported as
//! [`ReviewError::RatingUnavailable`] instead of being invented.
//!
//! ## Quick Start
//!
//! ```no_run
//! use review_insight::{MemoryStore, ModelInvoker, ReviewService};
//! use review_insight::types::ReviewSubmission;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let invoker = ModelInvoker::builder("https://api.groq.com/openai")
//!         .openai_with_key(std::env::var("GROQ_API_KEY")?)
//!         .build()?;
//!     let service = ReviewService::new(invoker, Arc::new(MemoryStore::new()));
//!
//!     let receipt = service
//!         .submit(&ReviewSubmission {
//!             rating: 2,
//!             review_text: "Cold food and we waited an hour.".into(),
//!         })
//!         .await?;
//!     println!("{:?}: {}", receipt.analysis.sentiment, receipt.analysis.summary);
//!     Ok(())
//! }
//! ```
//!
//! ## Extraction without a model
//!
//! ```
//! use review_insight::extract::extract_text;
//!
//! let out = extract_text("Sure! ```json\n{\"predicted_stars\": 4, \"explanation\": \"tasty\"}\n```");
//! assert_eq!(out.into_fields().predicted_stars, Some(4));
//! ```

pub mod backend;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod extract;
pub mod invoker;
pub mod normalize;
pub mod prompt;
pub mod server;
pub mod service;
pub mod store;
pub mod types;

pub use backend::{BackoffConfig, MockBackend, OpenAiBackend};
pub use client::LlmConfig;
pub use config::Config;
pub use error::{Result, ReviewError};
pub use events::{EventHandler, PipelineEvent};
pub use extract::{ExtractStrategy, Extraction};
pub use invoker::{FailureKind, InvocationFailure, ModelInvoker, RawModelOutput};
pub use prompt::PromptVariant;
pub use service::{ReviewService, SubmissionReceipt};
pub use store::{CsvStore, MemoryStore, SubmissionStore};
pub use types::{AnalysisResult, Insights, Sentiment, Stars};
