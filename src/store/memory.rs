//! In-memory storage for tests and development.

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{
    newest_first, EvaluationMetrics, StoredEvaluation, StoredSubmission, SubmissionRecord,
    SubmissionStore,
};
use crate::error::Result;

/// Keeps everything in process memory. Data is lost on restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    submissions: RwLock<Vec<StoredSubmission>>,
    evaluations: RwLock<Vec<StoredEvaluation>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn submission_count(&self) -> usize {
        self.submissions.read().await.len()
    }
}

#[async_trait]
impl SubmissionStore for MemoryStore {
    async fn save_submission(&self, record: SubmissionRecord) -> Result<StoredSubmission> {
        let stored = StoredSubmission::new(record);
        self.submissions.write().await.push(stored.clone());
        Ok(stored)
    }

    async fn list_submissions(&self) -> Result<Vec<StoredSubmission>> {
        let all = self.submissions.read().await.clone();
        Ok(newest_first(all, |s| s.timestamp))
    }

    async fn save_evaluation(&self, metrics: EvaluationMetrics) -> Result<StoredEvaluation> {
        let stored = StoredEvaluation {
            metrics,
            timestamp: Utc::now(),
        };
        self.evaluations.write().await.push(stored.clone());
        Ok(stored)
    }

    async fn list_evaluations(&self) -> Result<Vec<StoredEvaluation>> {
        let all = self.evaluations.read().await.clone();
        Ok(newest_first(all, |e| e.timestamp))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::record;
    use crate::types::Sentiment;

    #[tokio::test]
    async fn test_save_and_list_newest_first() {
        let store = MemoryStore::new();
        let first = store
            .save_submission(record(5, 5, Sentiment::Positive))
            .await
            .unwrap();
        let second = store
            .save_submission(record(1, 3, Sentiment::Negative))
            .await
            .unwrap();

        let listed = store.list_submissions().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].submission_id, second.submission_id);
        assert_eq!(listed[1].submission_id, first.submission_id);
        assert_eq!(store.submission_count().await, 2);
    }

    #[tokio::test]
    async fn test_admin_view_and_analytics() {
        let store = MemoryStore::new();
        store.save_submission(record(4, 4, Sentiment::Positive)).await.unwrap();
        store.save_submission(record(2, 3, Sentiment::Mixed)).await.unwrap();

        let admin = store.admin_submissions().await.unwrap();
        assert!(!admin[0].rating_match);
        assert!(admin[1].rating_match);

        let analytics = store.analytics().await.unwrap();
        assert_eq!(analytics.total_submissions, 2);
        assert_eq!(analytics.accuracy, 50.0);
    }

    #[tokio::test]
    async fn test_evaluations_round_trip() {
        let store = MemoryStore::new();
        let metrics = EvaluationMetrics {
            prompt_version: "v3".into(),
            accuracy: 0.64,
            mae: 0.41,
            validity_rate: 1.0,
            exact_matches: 128,
            off_by_1: 66,
            off_by_2_plus: 6,
            total_samples: 200,
        };
        store.save_evaluation(metrics.clone()).await.unwrap();
        let listed = store.list_evaluations().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].metrics, metrics);
    }
}
