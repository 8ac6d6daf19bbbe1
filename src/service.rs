//! End-to-end processing of one review submission.
//!
//! [`ReviewService`] runs the three model flows of a submission in order
//! (rating, insights, reply), each as prompt → invoke → extract → normalize,
//! then persists the flat record. The whole analysis runs under a
//! per-submission deadline so retry and backoff cannot stall a caller.
//!
//! Only the rating flow can fail the request: insights and replies always
//! degrade to rating-conditioned defaults.

use crate::client::LlmConfig;
use crate::error::{Result, ReviewError};
use crate::events::{emit, EventHandler, Flow, PipelineEvent, Stage};
use crate::extract::{extract, strip_think_tags, Extraction};
use crate::invoker::{ModelInvoker, RawModelOutput};
use crate::normalize::{normalize, normalize_explanation, normalize_insights};
use crate::prompt::{self, PromptVariant, ReviewContext};
use crate::store::{StoredSubmission, SubmissionRecord, SubmissionStore};
use crate::types::{
    AnalysisResult, ExtractedFields, Insights, RatingPrediction, ReviewSubmission, Stars,
    ValidReview,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// What the caller gets back for an accepted submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionReceipt {
    #[serde(flatten)]
    pub analysis: AnalysisResult,
    pub user_response: String,
    pub submission_id: String,
    pub timestamp: DateTime<Utc>,
}

/// A fully analyzed review before persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub result: AnalysisResult,
    pub user_response: String,
}

/// Canned reply used when the model gives none.
pub fn fallback_reply(rating: Stars) -> &'static str {
    match rating.get() {
        4..=5 => "Thank you so much for your wonderful feedback! We're thrilled you enjoyed your experience with us.",
        3 => "Thank you for your honest feedback. We appreciate hearing about your experience and will work to improve.",
        _ => "We sincerely apologize for falling short of your expectations. Your feedback helps us improve our service.",
    }
}

/// Orchestrates model calls, normalization and persistence.
///
/// # Example
///
/// ```no_run
/// use review_insight::invoker::ModelInvoker;
/// use review_insight::service::ReviewService;
/// use review_insight::store::MemoryStore;
/// use review_insight::types::ReviewSubmission;
/// use std::sync::Arc;
///
/// # async fn run() -> review_insight::Result<()> {
/// let invoker = ModelInvoker::builder("https://api.groq.com/openai")
///     .openai_with_key("gsk_...")
///     .build()?;
/// let service = ReviewService::new(invoker, Arc::new(MemoryStore::new()));
/// let receipt = service
///     .submit(&ReviewSubmission {
///         rating: 4,
///         review_text: "Loved the pasta, slow check.".into(),
///     })
///     .await?;
/// println!("{} stars: {}", receipt.analysis.predicted_stars, receipt.analysis.summary);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ReviewService {
    invoker: ModelInvoker,
    store: Arc<dyn SubmissionStore>,
    submit_variant: PromptVariant,
    deadline: Duration,
    event_handler: Option<Arc<dyn EventHandler>>,
}

impl ReviewService {
    /// Chain-of-thought rating prompt; deadline is three times the worst
    /// case of attempt timeouts.
    pub fn new(invoker: ModelInvoker, store: Arc<dyn SubmissionStore>) -> Self {
        let backoff = invoker.backoff();
        let deadline = backoff.attempt_timeout * backoff.max_attempts.max(1) * 3;
        Self {
            invoker,
            store,
            submit_variant: PromptVariant::default(),
            deadline,
            event_handler: None,
        }
    }

    /// Rating prompt used by [`submit`](Self::submit).
    pub fn with_variant(mut self, variant: PromptVariant) -> Self {
        self.submit_variant = variant;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Observe stage transitions, saves and the invoker's transport retries.
    pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.invoker = self.invoker.with_event_handler(handler.clone());
        self.event_handler = Some(handler);
        self
    }

    pub fn store(&self) -> &Arc<dyn SubmissionStore> {
        &self.store
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    pub fn submit_variant(&self) -> PromptVariant {
        self.submit_variant
    }

    /// Validate, analyze within the deadline, persist.
    pub async fn submit(&self, submission: &ReviewSubmission) -> Result<SubmissionReceipt> {
        let review = submission.validate()?;
        info!(
            rating = review.rating.get(),
            chars = review.review_text.chars().count(),
            variant = %self.submit_variant,
            "new review submission"
        );

        let analysis = tokio::time::timeout(self.deadline, self.analyze(&review))
            .await
            .map_err(|_| {
                warn!(deadline = ?self.deadline, "submission deadline exceeded");
                ReviewError::DeadlineExceeded(self.deadline)
            })??;

        let stored = self.save(&review, &analysis).await?;
        Ok(SubmissionReceipt {
            analysis: analysis.result,
            user_response: analysis.user_response,
            submission_id: stored.submission_id,
            timestamp: stored.timestamp,
        })
    }

    /// Run rating, insights and reply flows for a validated review.
    pub async fn analyze(&self, review: &ValidReview) -> Result<Analysis> {
        info!("step 1/3: predicting rating");
        let prediction = self
            .predict_rating(&review.review_text, self.submit_variant)
            .await?;

        info!(predicted = prediction.predicted_stars.get(), "step 2/3: generating insights");
        let insight_fields = self
            .insight_fields(
                &review.review_text,
                review.rating,
                Some(prediction.predicted_stars),
            )
            .await;
        let result = normalize(&insight_fields.with_rating_from(&prediction.fields), review.rating)?;
        self.stage(Flow::Insights, Stage::Normalized);

        info!(sentiment = %result.sentiment, "step 3/3: drafting reply");
        let user_response = self.draft_reply(&review.review_text, review.rating).await;

        Ok(Analysis {
            result,
            user_response,
        })
    }

    /// Predict a star rating with the given prompt strategy.
    ///
    /// Fails with [`ReviewError::RatingUnavailable`] when the model never
    /// produced a rating in 1..=5; there is no synthetic default.
    pub async fn predict_rating(
        &self,
        review_text: &str,
        variant: PromptVariant,
    ) -> Result<RatingPrediction> {
        let prompt = prompt::build(variant, review_text, None);
        self.stage(Flow::Rating, Stage::PromptBuilt);

        let raw = self.invoker.invoke(&prompt, &LlmConfig::rating()).await;
        let fields = self.extract_fields(Flow::Rating, &raw);

        match fields.predicted_stars.and_then(Stars::new) {
            Some(predicted_stars) => {
                self.stage(Flow::Rating, Stage::Normalized);
                info!(variant = %variant, predicted = predicted_stars.get(), "rating predicted");
                Ok(RatingPrediction {
                    predicted_stars,
                    explanation: normalize_explanation(fields.explanation.as_deref()),
                    fields,
                })
            }
            None => {
                self.stage(Flow::Rating, Stage::Failed);
                let reason = match (&raw, fields.predicted_stars) {
                    (RawModelOutput::Failed(failure), _) => format!("model call failed: {}", failure),
                    (_, Some(out_of_range)) => {
                        format!("model predicted {} stars, outside 1-5", out_of_range)
                    }
                    _ => "model output contained no rating".to_string(),
                };
                warn!(variant = %variant, reason = %reason, "rating prediction failed");
                Err(ReviewError::RatingUnavailable(reason))
            }
        }
    }

    /// Summary, three actions and sentiment. Never fails.
    pub async fn generate_insights(
        &self,
        review_text: &str,
        user_rating: Stars,
        predicted: Option<Stars>,
    ) -> Insights {
        let fields = self.insight_fields(review_text, user_rating, predicted).await;
        let insights = normalize_insights(&fields, user_rating);
        self.stage(Flow::Insights, Stage::Normalized);
        insights
    }

    /// A short reply to the customer; canned text when the model gives none.
    pub async fn draft_reply(&self, review_text: &str, rating: Stars) -> String {
        let prompt = prompt::build_reply(review_text, rating);
        self.stage(Flow::Reply, Stage::PromptBuilt);

        let raw = self.invoker.invoke(&prompt, &LlmConfig::reply()).await;
        self.stage(Flow::Reply, Stage::Invoked);

        let reply = raw
            .text()
            .map(|text| strip_think_tags(text).trim().to_string())
            .filter(|text| !text.is_empty());
        let reply = match reply {
            Some(text) => {
                self.stage(Flow::Reply, Stage::ExtractedOk);
                text
            }
            None => {
                self.stage(Flow::Reply, Stage::ExtractedEmpty);
                warn!("model gave no reply, using canned response");
                fallback_reply(rating).to_string()
            }
        };
        self.stage(Flow::Reply, Stage::Normalized);
        reply
    }

    async fn insight_fields(
        &self,
        review_text: &str,
        user_rating: Stars,
        predicted: Option<Stars>,
    ) -> ExtractedFields {
        let context = ReviewContext {
            user_rating: Some(user_rating),
            predicted_rating: predicted,
        };
        let prompt = prompt::build(self.submit_variant, review_text, Some(&context));
        self.stage(Flow::Insights, Stage::PromptBuilt);

        let raw = self.invoker.invoke(&prompt, &LlmConfig::insights()).await;
        self.extract_fields(Flow::Insights, &raw)
    }

    fn extract_fields(&self, flow: Flow, raw: &RawModelOutput) -> ExtractedFields {
        self.stage(flow, Stage::Invoked);
        let extraction = extract(raw);
        match &extraction {
            Extraction::Parsed { strategy, .. } => {
                self.stage(flow, Stage::ExtractedOk);
                info!(flow = flow.as_str(), strategy = strategy.as_str(), "extracted model output");
            }
            Extraction::Empty => {
                self.stage(flow, Stage::ExtractedEmpty);
                warn!(flow = flow.as_str(), failed = raw.is_failed(), "nothing extracted, falling back to defaults");
            }
        }
        extraction.into_fields()
    }

    async fn save(&self, review: &ValidReview, analysis: &Analysis) -> Result<StoredSubmission> {
        let result = &analysis.result;
        let record = SubmissionRecord {
            user_rating: review.rating,
            review_text: review.review_text.clone(),
            ai_predicted_rating: result.predicted_stars,
            ai_explanation: result.explanation.clone(),
            ai_summary: result.summary.clone(),
            recommended_actions: result.actions.to_vec(),
            sentiment: result.sentiment,
            user_response: analysis.user_response.clone(),
        };
        let stored = self.store.save_submission(record).await?;
        info!(submission_id = %stored.submission_id, store = self.store.name(), "submission saved");
        emit(
            &self.event_handler,
            PipelineEvent::Saved {
                submission_id: stored.submission_id.clone(),
            },
        );
        Ok(stored)
    }

    fn stage(&self, flow: Flow, stage: Stage) {
        emit(&self.event_handler, PipelineEvent::StageEntered { flow, stage });
    }
}

impl std::fmt::Debug for ReviewService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReviewService")
            .field("invoker", &self.invoker)
            .field("store", &self.store.name())
            .field("submit_variant", &self.submit_variant)
            .field("deadline", &self.deadline)
            .finish()
    }
}
