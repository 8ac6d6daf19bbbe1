//! Route handlers for the review API.

use super::{AppError, AppState};
use crate::prompt::PromptVariant;
use crate::service::SubmissionReceipt;
use crate::store::{AdminSubmission, Analytics, EvaluationMetrics, StoredEvaluation};
use crate::types::{validate_review_text, ReviewSubmission};
use crate::ReviewError;
use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct PredictionRequest {
    pub review_text: String,
    /// Version tag or variant name; defaults to the criteria-based prompt.
    #[serde(default)]
    pub prompt_version: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub predicted_stars: u8,
    pub explanation: String,
    pub prompt_version: String,
}

pub async fn root() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "review-insight",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "components": {
            "api": "operational",
            "store": state.service.store().name(),
        }
    }))
}

pub async fn submit_review(
    State(state): State<AppState>,
    Json(submission): Json<ReviewSubmission>,
) -> Result<Json<SubmissionReceipt>, AppError> {
    let receipt = state.service.submit(&submission).await?;
    info!(
        submission_id = %receipt.submission_id,
        predicted = receipt.analysis.predicted_stars.get(),
        "submission processed"
    );
    Ok(Json(receipt))
}

pub async fn predict(
    State(state): State<AppState>,
    Json(request): Json<PredictionRequest>,
) -> Result<Json<PredictionResponse>, AppError> {
    let variant = match request.prompt_version.as_deref() {
        Some(version) => parse_variant(version)?,
        None => PromptVariant::CriteriaBased,
    };
    run_prediction(&state, &request.review_text, variant).await
}

pub async fn predict_version(
    State(state): State<AppState>,
    Path(version): Path<String>,
    Json(request): Json<PredictionRequest>,
) -> Result<Json<PredictionResponse>, AppError> {
    let variant = parse_variant(&version)?;
    run_prediction(&state, &request.review_text, variant).await
}

fn parse_variant(version: &str) -> Result<PromptVariant, ReviewError> {
    version.parse().map_err(ReviewError::InvalidInput)
}

async fn run_prediction(
    state: &AppState,
    review_text: &str,
    variant: PromptVariant,
) -> Result<Json<PredictionResponse>, AppError> {
    let review_text = validate_review_text(review_text)?;
    info!(variant = %variant, chars = review_text.chars().count(), "prediction request");
    let prediction = state.service.predict_rating(&review_text, variant).await?;
    Ok(Json(PredictionResponse {
        predicted_stars: prediction.predicted_stars.get(),
        explanation: prediction.explanation,
        prompt_version: variant.version().to_string(),
    }))
}

pub async fn admin_submissions(
    State(state): State<AppState>,
) -> Result<Json<Vec<AdminSubmission>>, AppError> {
    let submissions = state.service.store().admin_submissions().await?;
    info!(count = submissions.len(), "admin submissions listed");
    Ok(Json(submissions))
}

pub async fn admin_analytics(State(state): State<AppState>) -> Result<Json<Analytics>, AppError> {
    Ok(Json(state.service.store().analytics().await?))
}

pub async fn admin_evaluations(
    State(state): State<AppState>,
) -> Result<Json<Vec<StoredEvaluation>>, AppError> {
    Ok(Json(state.service.store().list_evaluations().await?))
}

pub async fn save_evaluation(
    State(state): State<AppState>,
    Json(metrics): Json<EvaluationMetrics>,
) -> Result<Json<Value>, AppError> {
    let version = metrics.prompt_version.clone();
    state.service.store().save_evaluation(metrics).await?;
    info!(prompt_version = %version, "evaluation metrics saved");
    Ok(Json(json!({ "message": "Evaluation metrics saved successfully" })))
}
