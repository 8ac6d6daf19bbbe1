//! Persistence for analyzed submissions and evaluation metrics.
//!
//! Available backends:
//! - `MemoryStore` - in-process, lost on restart
//! - `CsvStore` - two flat CSV files under a data directory

pub mod csv;
pub mod memory;

pub use self::csv::CsvStore;
pub use memory::MemoryStore;

use crate::error::Result;
use crate::types::{Sentiment, Stars};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The flat record persisted for every analyzed review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub user_rating: Stars,
    pub review_text: String,
    pub ai_predicted_rating: Stars,
    pub ai_explanation: String,
    pub ai_summary: String,
    pub recommended_actions: Vec<String>,
    pub sentiment: Sentiment,
    pub user_response: String,
}

/// A record with its store-assigned identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSubmission {
    pub submission_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub record: SubmissionRecord,
}

impl StoredSubmission {
    /// Assign a fresh id and the current time.
    pub fn new(record: SubmissionRecord) -> Self {
        Self {
            submission_id: new_submission_id(),
            timestamp: Utc::now(),
            record,
        }
    }
}

/// Admin view of a submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdminSubmission {
    #[serde(flatten)]
    pub submission: StoredSubmission,
    /// Whether the model predicted exactly the user's rating.
    pub rating_match: bool,
}

impl From<StoredSubmission> for AdminSubmission {
    fn from(submission: StoredSubmission) -> Self {
        let rating_match = submission.record.user_rating == submission.record.ai_predicted_rating;
        Self {
            submission,
            rating_match,
        }
    }
}

/// Aggregate statistics over all submissions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Analytics {
    pub total_submissions: usize,
    pub average_user_rating: f64,
    pub average_predicted_rating: f64,
    /// Percentage of exact rating matches.
    pub accuracy: f64,
    pub sentiment_distribution: BTreeMap<String, usize>,
    pub rating_distribution: BTreeMap<u8, usize>,
}

impl Analytics {
    pub fn from_submissions(submissions: &[StoredSubmission]) -> Self {
        if submissions.is_empty() {
            return Self::default();
        }
        let total = submissions.len();
        let mut user_sum = 0u64;
        let mut predicted_sum = 0u64;
        let mut matches = 0usize;
        let mut sentiment_distribution = BTreeMap::new();
        let mut rating_distribution = BTreeMap::new();

        for s in submissions {
            let r = &s.record;
            user_sum += r.user_rating.get() as u64;
            predicted_sum += r.ai_predicted_rating.get() as u64;
            if r.user_rating == r.ai_predicted_rating {
                matches += 1;
            }
            *sentiment_distribution
                .entry(r.sentiment.as_str().to_string())
                .or_insert(0) += 1;
            *rating_distribution.entry(r.user_rating.get()).or_insert(0) += 1;
        }

        Self {
            total_submissions: total,
            average_user_rating: round2(user_sum as f64 / total as f64),
            average_predicted_rating: round2(predicted_sum as f64 / total as f64),
            accuracy: round2(matches as f64 / total as f64 * 100.0),
            sentiment_distribution,
            rating_distribution,
        }
    }
}

/// Offline evaluation numbers for one prompt variant, stored verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub prompt_version: String,
    pub accuracy: f64,
    pub mae: f64,
    pub validity_rate: f64,
    pub exact_matches: u32,
    pub off_by_1: u32,
    pub off_by_2_plus: u32,
    pub total_samples: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEvaluation {
    #[serde(flatten)]
    pub metrics: EvaluationMetrics,
    pub timestamp: DateTime<Utc>,
}

/// Storage backend for submissions and evaluations.
///
/// Implementations assign ids and timestamps and serialize their own writes;
/// concurrent submissions are last-write-wins with no ordering guarantee.
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    /// Persist a record, returning it with its assigned id and timestamp.
    async fn save_submission(&self, record: SubmissionRecord) -> Result<StoredSubmission>;

    /// All submissions, newest first.
    async fn list_submissions(&self) -> Result<Vec<StoredSubmission>>;

    /// Submissions for the admin view, newest first.
    async fn admin_submissions(&self) -> Result<Vec<AdminSubmission>> {
        Ok(self
            .list_submissions()
            .await?
            .into_iter()
            .map(AdminSubmission::from)
            .collect())
    }

    async fn analytics(&self) -> Result<Analytics> {
        Ok(Analytics::from_submissions(&self.list_submissions().await?))
    }

    async fn save_evaluation(&self, metrics: EvaluationMetrics) -> Result<StoredEvaluation>;

    /// All evaluations, newest first.
    async fn list_evaluations(&self) -> Result<Vec<StoredEvaluation>>;

    fn name(&self) -> &'static str;
}

/// Eight hex characters of a v4 UUID.
pub fn new_submission_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Newest first; among equal timestamps the later insertion wins.
pub(crate) fn newest_first<T>(mut items: Vec<T>, timestamp: impl Fn(&T) -> DateTime<Utc>) -> Vec<T> {
    items.reverse();
    items.sort_by_key(|item| std::cmp::Reverse(timestamp(item)));
    items
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn record(user: i64, predicted: i64, sentiment: Sentiment) -> SubmissionRecord {
        SubmissionRecord {
            user_rating: Stars::new(user).unwrap(),
            review_text: "The pasta was great, service slow.".into(),
            ai_predicted_rating: Stars::new(predicted).unwrap(),
            ai_explanation: "Mostly positive".into(),
            ai_summary: "Customer liked the pasta but waited too long.".into(),
            recommended_actions: vec!["Speed up service".into(), "Keep pasta".into(), "Add staff".into()],
            sentiment,
            user_response: "Thanks for visiting!".into(),
        }
    }

    #[test]
    fn test_empty_analytics_is_zero() {
        let analytics = Analytics::from_submissions(&[]);
        assert_eq!(analytics.total_submissions, 0);
        assert_eq!(analytics.accuracy, 0.0);
        assert!(analytics.sentiment_distribution.is_empty());
    }

    #[test]
    fn test_analytics_aggregates() {
        let subs: Vec<StoredSubmission> = vec![
            record(5, 5, Sentiment::Positive),
            record(4, 5, Sentiment::Positive),
            record(1, 2, Sentiment::Negative),
        ]
        .into_iter()
        .map(StoredSubmission::new)
        .collect();

        let analytics = Analytics::from_submissions(&subs);
        assert_eq!(analytics.total_submissions, 3);
        assert_eq!(analytics.average_user_rating, 3.33);
        assert_eq!(analytics.average_predicted_rating, 4.0);
        assert_eq!(analytics.accuracy, 33.33);
        assert_eq!(analytics.sentiment_distribution["Positive"], 2);
        assert_eq!(analytics.sentiment_distribution["Negative"], 1);
        assert_eq!(analytics.rating_distribution[&5], 1);
        assert_eq!(analytics.rating_distribution.get(&3), None);
    }

    #[test]
    fn test_rating_match() {
        let admin = AdminSubmission::from(StoredSubmission::new(record(3, 3, Sentiment::Mixed)));
        assert!(admin.rating_match);
        let admin = AdminSubmission::from(StoredSubmission::new(record(3, 4, Sentiment::Mixed)));
        assert!(!admin.rating_match);
    }

    #[test]
    fn test_admin_submission_serializes_flat() {
        let admin = AdminSubmission::from(StoredSubmission::new(record(2, 2, Sentiment::Negative)));
        let json = serde_json::to_value(&admin).unwrap();
        assert_eq!(json["user_rating"], 2);
        assert_eq!(json["sentiment"], "Negative");
        assert_eq!(json["rating_match"], true);
        assert_eq!(json["submission_id"].as_str().unwrap().len(), 8);
    }

    #[test]
    fn test_submission_ids_are_short_and_distinct() {
        let a = new_submission_id();
        let b = new_submission_id();
        assert_eq!(a.len(), 8);
        assert_ne!(a, b);
    }

    #[test]
    fn test_newest_first_breaks_ties_by_insertion() {
        let now = Utc::now();
        let items = vec![(1, now), (2, now), (3, now - chrono::Duration::seconds(5))];
        let ordered: Vec<i32> = newest_first(items, |i| i.1).into_iter().map(|i| i.0).collect();
        assert_eq!(ordered, vec![2, 1, 3]);
    }
}
