//! HTTP surface over the [`Orchestrator`].
//!
//! The handlers are thin: they turn multipart uploads into
//! [`crate::SubmitRequest`]s and render orchestrator results as JSON. All
//! conversion logic lives in the library.

pub mod health;
pub mod tasks;
pub mod upload;

use crate::error::{ConvertError, DownloadError};
use crate::orchestrator::Orchestrator;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

/// Largest accepted upload body.
pub const MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

pub fn build_router(orchestrator: Orchestrator) -> Router {
    Router::new()
        .route("/api/v1/health", get(health::health_handler))
        .route("/api/v1/conversions", post(tasks::submit_handler))
        .route("/api/v1/tasks", get(tasks::list_handler))
        .route("/api/v1/tasks/{task_id}", get(tasks::get_task_handler))
        .route(
            "/api/v1/tasks/{task_id}/download",
            get(tasks::download_handler),
        )
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(orchestrator)
}

/// Serve the router on `listener` until the process is stopped.
pub async fn serve(
    listener: tokio::net::TcpListener,
    orchestrator: Orchestrator,
) -> std::io::Result<()> {
    axum::serve(listener, build_router(orchestrator)).await
}

/// Error body for every failing route: `{"error": "..."}`.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    NotReady(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            ApiError::NotReady(m) => (StatusCode::CONFLICT, m),
            ApiError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<ConvertError> for ApiError {
    fn from(e: ConvertError) -> Self {
        match e {
            ConvertError::TaskNotFound { .. } => ApiError::NotFound(e.to_string()),
            ConvertError::InvalidConfig(_) => ApiError::BadRequest(e.to_string()),
            other => {
                tracing::error!("Request failed: {}", other);
                ApiError::Internal(other.to_string())
            }
        }
    }
}

impl From<DownloadError> for ApiError {
    fn from(e: DownloadError) -> Self {
        match e {
            DownloadError::NotFound(_) => ApiError::NotFound(e.to_string()),
            DownloadError::NotReady { .. } => ApiError::NotReady(e.to_string()),
        }
    }
}
