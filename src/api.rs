// src/api.rs
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::warn;

use crate::error::AnalyzerError;
use crate::metrics::Metrics;
use crate::model::{CustomerStats, Review, ReviewMetadata};
use crate::pipeline::{LocalPipeline, StageKind, Submission};
use crate::stages::{BatchReport, EventBatch};

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<LocalPipeline>,
}

impl AppState {
    pub fn new(pipeline: LocalPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }
}

/// Routes over the pipeline; `/metrics` is mounted when a recorder is given.
pub fn router(state: AppState, metrics: Option<&Metrics>) -> Router {
    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/reviews", post(submit_review))
        .route("/reviews/{customer_id}/{review_id}", get(get_review))
        .route("/customers/{customer_id}", get(get_customer))
        .route("/events/{stage}", post(dispatch_events))
        .with_state(state);
    let app = match metrics {
        Some(m) => app.merge(m.router()),
        None => app,
    };
    app.layer(CorsLayer::very_permissive())
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Analyzer(AnalyzerError),
}

impl From<AnalyzerError> for ApiError {
    fn from(e: AnalyzerError) -> Self {
        ApiError::Analyzer(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, "bad_request", m),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, "not_found", m),
            ApiError::Analyzer(e) => {
                let status = match &e {
                    AnalyzerError::MalformedReview(_) => StatusCode::BAD_REQUEST,
                    AnalyzerError::BlobNotFound { .. } => StatusCode::NOT_FOUND,
                    e if e.is_retryable() => StatusCode::SERVICE_UNAVAILABLE,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                if status.is_server_error() {
                    warn!(kind = e.kind(), error = %e, "request failed");
                }
                (status, e.kind(), e.to_string())
            }
        };
        (status, Json(json!({ "error": kind, "message": message }))).into_response()
    }
}

async fn submit_review(
    State(state): State<AppState>,
    Json(review): Json<Review>,
) -> Result<Json<Submission>, ApiError> {
    review.validate()?;
    let submission = state.pipeline.submit(&review).await?;
    Ok(Json(submission))
}

async fn dispatch_events(
    State(state): State<AppState>,
    Path(stage): Path<String>,
    Json(batch): Json<EventBatch>,
) -> Result<Json<BatchReport>, ApiError> {
    let kind: StageKind = stage.parse().map_err(ApiError::BadRequest)?;
    Ok(Json(state.pipeline.dispatch(kind, &batch).await))
}

async fn get_review(
    State(state): State<AppState>,
    Path((customer_id, review_id)): Path<(String, String)>,
) -> Result<Json<ReviewMetadata>, ApiError> {
    state
        .pipeline
        .aggregator()
        .review_metadata(&customer_id, &review_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("no metadata for {customer_id}/{review_id}")))
}

async fn get_customer(
    State(state): State<AppState>,
    Path(customer_id): Path<String>,
) -> Result<Json<CustomerStats>, ApiError> {
    state
        .pipeline
        .aggregator()
        .customer_stats(&customer_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("no stats for customer {customer_id}")))
}
