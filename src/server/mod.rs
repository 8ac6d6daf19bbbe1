//! HTTP API over the review service.
//!
//! | Route | Purpose |
//! |-------|---------|
//! | `GET /`, `GET /health` | liveness |
//! | `POST /api/user/submit` | full analysis of a review, persisted |
//! | `POST /api/predict`, `POST /api/predict/{version}` | rating only |
//! | `GET /api/admin/submissions` | all submissions, newest first |
//! | `GET /api/admin/analytics` | aggregate statistics |
//! | `GET /api/admin/evaluations`, `POST /api/admin/evaluate` | evaluation metrics |

mod error;
pub mod handlers;

pub use error::AppError;

use crate::service::ReviewService;
use axum::{
    http::{header::CONTENT_TYPE, Method},
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

/// Shared state handed to every handler.
#[derive(Clone, Debug)]
pub struct AppState {
    pub service: ReviewService,
}

impl AppState {
    pub fn new(service: ReviewService) -> Self {
        Self { service }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE]);

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health_check))
        .route("/api/user/submit", post(handlers::submit_review))
        .route("/api/predict", post(handlers::predict))
        .route("/api/predict/{version}", post(handlers::predict_version))
        .route("/api/admin/submissions", get(handlers::admin_submissions))
        .route("/api/admin/analytics", get(handlers::admin_analytics))
        .route("/api/admin/evaluations", get(handlers::admin_evaluations))
        .route("/api/admin/evaluate", post(handlers::save_evaluation))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Serve the API on an already-bound listener until the process stops.
pub async fn run(listener: TcpListener, state: AppState) -> anyhow::Result<()> {
    let app = create_router(state);
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
