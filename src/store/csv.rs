//! Flat-file storage: `submissions.csv` and `evaluations.csv`.
//!
//! Recommended actions are JSON-encoded into a single column. Files are
//! created on first write with a header row. File I/O runs on the blocking
//! pool; a mutex held across it keeps concurrent writes from interleaving
//! rows and reads from seeing a half-written one.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use super::{
    newest_first, EvaluationMetrics, StoredEvaluation, StoredSubmission, SubmissionRecord,
    SubmissionStore,
};
use crate::error::{Result, ReviewError};
use crate::types::{Sentiment, Stars};

const SUBMISSIONS_FILE: &str = "submissions.csv";
const EVALUATIONS_FILE: &str = "evaluations.csv";

#[derive(Debug, Serialize, Deserialize)]
struct SubmissionRow {
    submission_id: String,
    timestamp: DateTime<Utc>,
    user_rating: Stars,
    review_text: String,
    ai_predicted_rating: Stars,
    ai_explanation: String,
    ai_summary: String,
    recommended_actions: String,
    sentiment: Sentiment,
    user_response: String,
}

impl SubmissionRow {
    fn from_stored(stored: &StoredSubmission) -> Result<Self> {
        let r = &stored.record;
        Ok(Self {
            submission_id: stored.submission_id.clone(),
            timestamp: stored.timestamp,
            user_rating: r.user_rating,
            review_text: r.review_text.clone(),
            ai_predicted_rating: r.ai_predicted_rating,
            ai_explanation: r.ai_explanation.clone(),
            ai_summary: r.ai_summary.clone(),
            recommended_actions: serde_json::to_string(&r.recommended_actions)?,
            sentiment: r.sentiment,
            user_response: r.user_response.clone(),
        })
    }

    fn into_stored(self) -> StoredSubmission {
        // Unparseable action cells read as no actions.
        let recommended_actions = serde_json::from_str(&self.recommended_actions).unwrap_or_default();
        StoredSubmission {
            submission_id: self.submission_id,
            timestamp: self.timestamp,
            record: SubmissionRecord {
                user_rating: self.user_rating,
                review_text: self.review_text,
                ai_predicted_rating: self.ai_predicted_rating,
                ai_explanation: self.ai_explanation,
                ai_summary: self.ai_summary,
                recommended_actions,
                sentiment: self.sentiment,
                user_response: self.user_response,
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct EvaluationRow {
    prompt_version: String,
    accuracy: f64,
    mae: f64,
    validity_rate: f64,
    exact_matches: u32,
    off_by_1: u32,
    off_by_2_plus: u32,
    total_samples: u32,
    timestamp: DateTime<Utc>,
}

impl From<&StoredEvaluation> for EvaluationRow {
    fn from(stored: &StoredEvaluation) -> Self {
        let m = &stored.metrics;
        Self {
            prompt_version: m.prompt_version.clone(),
            accuracy: m.accuracy,
            mae: m.mae,
            validity_rate: m.validity_rate,
            exact_matches: m.exact_matches,
            off_by_1: m.off_by_1,
            off_by_2_plus: m.off_by_2_plus,
            total_samples: m.total_samples,
            timestamp: stored.timestamp,
        }
    }
}

impl From<EvaluationRow> for StoredEvaluation {
    fn from(row: EvaluationRow) -> Self {
        Self {
            metrics: EvaluationMetrics {
                prompt_version: row.prompt_version,
                accuracy: row.accuracy,
                mae: row.mae,
                validity_rate: row.validity_rate,
                exact_matches: row.exact_matches,
                off_by_1: row.off_by_1,
                off_by_2_plus: row.off_by_2_plus,
                total_samples: row.total_samples,
            },
            timestamp: row.timestamp,
        }
    }
}

/// CSV files under a data directory.
#[derive(Debug)]
pub struct CsvStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl CsvStore {
    /// Use `dir` for storage, creating it if needed.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }
}

/// Append `row` on the blocking pool. Callers hold the write lock across the await.
async fn append_row<T: Serialize + Send + 'static>(path: PathBuf, row: T) -> Result<()> {
    tokio::task::spawn_blocking(move || write_row(&path, &row)).await?
}

async fn load_rows<T: DeserializeOwned + Send + 'static>(path: PathBuf) -> Result<Vec<T>> {
    tokio::task::spawn_blocking(move || read_rows(&path)).await?
}

fn write_row<T: Serialize>(path: &Path, row: &T) -> Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let needs_header = file.metadata()?.len() == 0;
    let mut writer = ::csv::WriterBuilder::new()
        .has_headers(needs_header)
        .from_writer(file);
    writer.serialize(row)?;
    writer.flush()?;
    Ok(())
}

fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut reader = ::csv::Reader::from_path(path)?;
    reader
        .deserialize()
        .collect::<std::result::Result<Vec<T>, _>>()
        .map_err(ReviewError::from)
}

#[async_trait]
impl SubmissionStore for CsvStore {
    async fn save_submission(&self, record: SubmissionRecord) -> Result<StoredSubmission> {
        let stored = StoredSubmission::new(record);
        let row = SubmissionRow::from_stored(&stored)?;
        let _guard = self.write_lock.lock().await;
        append_row(self.path(SUBMISSIONS_FILE), row).await?;
        debug!(submission_id = %stored.submission_id, "appended submission row");
        Ok(stored)
    }

    async fn list_submissions(&self) -> Result<Vec<StoredSubmission>> {
        let rows: Vec<SubmissionRow> = {
            let _guard = self.write_lock.lock().await;
            load_rows(self.path(SUBMISSIONS_FILE)).await?
        };
        let all = rows.into_iter().map(SubmissionRow::into_stored).collect();
        Ok(newest_first(all, |s: &StoredSubmission| s.timestamp))
    }

    async fn save_evaluation(&self, metrics: EvaluationMetrics) -> Result<StoredEvaluation> {
        let stored = StoredEvaluation {
            metrics,
            timestamp: Utc::now(),
        };
        let _guard = self.write_lock.lock().await;
        append_row(self.path(EVALUATIONS_FILE), EvaluationRow::from(&stored)).await?;
        Ok(stored)
    }

    async fn list_evaluations(&self) -> Result<Vec<StoredEvaluation>> {
        let rows: Vec<EvaluationRow> = {
            let _guard = self.write_lock.lock().await;
            load_rows(self.path(EVALUATIONS_FILE)).await?
        };
        let all = rows.into_iter().map(StoredEvaluation::from).collect();
        Ok(newest_first(all, |e: &StoredEvaluation| e.timestamp))
    }

    fn name(&self) -> &'static str {
        "csv"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::record;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_round_trip_preserves_fields() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::open(dir.path()).unwrap();

        let mut rec = record(4, 5, Sentiment::Positive);
        rec.review_text = "Great, \"quoted\" pasta,\nwith a newline.".into();
        let saved = store.save_submission(rec.clone()).await.unwrap();

        let listed = store.list_submissions().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].submission_id, saved.submission_id);
        assert_eq!(listed[0].record, rec);
    }

    #[tokio::test]
    async fn test_actions_stored_as_json_column() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::open(dir.path()).unwrap();
        store.save_submission(record(2, 2, Sentiment::Negative)).await.unwrap();

        let raw = std::fs::read_to_string(dir.path().join(SUBMISSIONS_FILE)).unwrap();
        let mut lines = raw.lines();
        assert!(lines.next().unwrap().starts_with("submission_id,timestamp,user_rating"));
        assert!(raw.contains(r#"[""Speed up service"",""Keep pasta"",""Add staff""]"#));
    }

    #[tokio::test]
    async fn test_reopen_reads_existing_rows() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = CsvStore::open(dir.path()).unwrap();
            store.save_submission(record(1, 1, Sentiment::Negative)).await.unwrap();
            store.save_submission(record(3, 4, Sentiment::Mixed)).await.unwrap();
        }
        let store = CsvStore::open(dir.path()).unwrap();
        let analytics = store.analytics().await.unwrap();
        assert_eq!(analytics.total_submissions, 2);
        assert_eq!(analytics.accuracy, 50.0);

        let raw = std::fs::read_to_string(dir.path().join(SUBMISSIONS_FILE)).unwrap();
        assert_eq!(raw.matches("submission_id,").count(), 1);
    }

    #[tokio::test]
    async fn test_missing_files_list_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::open(dir.path().join("nested/data")).unwrap();
        assert!(store.list_submissions().await.unwrap().is_empty());
        assert!(store.list_evaluations().await.unwrap().is_empty());
        assert_eq!(store.analytics().await.unwrap().total_submissions, 0);
    }

    #[tokio::test]
    async fn test_concurrent_saves_do_not_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(CsvStore::open(dir.path()).unwrap());

        let mut handles = Vec::new();
        for i in 0..20 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let rating = (i % 5) + 1;
                store
                    .save_submission(record(rating, rating, Sentiment::Mixed))
                    .await
                    .unwrap()
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(store.list_submissions().await.unwrap().len(), 20);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_reads_during_writes_see_whole_rows() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(CsvStore::open(dir.path()).unwrap());

        let writer = {
            let store = store.clone();
            tokio::spawn(async move {
                for i in 0..20 {
                    let rating = (i % 5) + 1;
                    store
                        .save_submission(record(rating, rating, Sentiment::Mixed))
                        .await
                        .unwrap();
                }
            })
        };
        let reader = {
            let store = store.clone();
            tokio::spawn(async move {
                let mut seen = 0;
                while seen < 20 {
                    let listed = store.list_submissions().await.unwrap();
                    assert!(listed.len() >= seen);
                    assert!(listed.iter().all(|s| s.record.recommended_actions.len() == 3));
                    seen = listed.len();
                    tokio::task::yield_now().await;
                }
            })
        };
        writer.await.unwrap();
        reader.await.unwrap();
        assert_eq!(store.list_submissions().await.unwrap().len(), 20);
    }

    #[tokio::test]
    async fn test_evaluations_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::open(dir.path()).unwrap();
        let metrics = EvaluationMetrics {
            prompt_version: "v2".into(),
            accuracy: 0.58,
            mae: 0.5,
            validity_rate: 0.99,
            exact_matches: 116,
            off_by_1: 74,
            off_by_2_plus: 10,
            total_samples: 200,
        };
        store.save_evaluation(metrics.clone()).await.unwrap();
        let listed = store.list_evaluations().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].metrics, metrics);
    }
}
