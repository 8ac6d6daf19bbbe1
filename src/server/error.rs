use crate::error::ReviewError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{error, warn};

/// Error returned by route handlers.
///
/// Converts pipeline errors into HTTP responses with a JSON `error` body.
#[derive(Debug)]
pub struct AppError(pub ReviewError);

impl From<ReviewError> for AppError {
    fn from(err: ReviewError) -> Self {
        AppError(err)
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            ReviewError::InvalidInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ReviewError::RatingUnavailable(_) => StatusCode::BAD_GATEWAY,
            ReviewError::DeadlineExceeded(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self.0 {
            ReviewError::InvalidInput(msg) => {
                warn!("rejected submission: {}", msg);
                msg.clone()
            }
            ReviewError::RatingUnavailable(msg) => {
                warn!("rating unavailable: {}", msg);
                "Analysis could not be completed, safe to retry.".to_string()
            }
            ReviewError::DeadlineExceeded(after) => {
                warn!("deadline exceeded after {:?}", after);
                "Analysis timed out, safe to retry.".to_string()
            }
            err @ (ReviewError::Csv(_) | ReviewError::Io(_) | ReviewError::Join(_)) => {
                error!("storage failure: {:?}", err);
                "Storage failure.".to_string()
            }
            other => {
                error!("review pipeline error: {:?}", other);
                "An internal server error occurred.".to_string()
            }
        };

        let body = Json(json!({
            "error": message,
            "retryable": self.0.is_retryable(),
        }));
        (status, body).into_response()
    }
}
