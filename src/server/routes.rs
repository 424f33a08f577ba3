use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::{Form, Json};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::errors::ScanError;
use crate::models::{ScanId, ScanJob};

// ---------------------------------------------------------------------------
// Request and response bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ScanForm {
    #[serde(default = "default_scan_path")]
    pub scan_path: String,
}

fn default_scan_path() -> String {
    "/".to_string()
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ScanStartedResponse {
    pub status: String,
    pub scan_id: ScanId,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct LatestGraphResponse {
    pub scan_id: Option<ScanId>,
    pub path: Option<String>,
    pub output_file: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ScanLogParams {
    pub tail: Option<usize>,
}

fn error_response(status: StatusCode, message: &str) -> impl IntoResponse {
    (
        status,
        Json(ErrorResponse {
            status: "error".to_string(),
            message: message.to_string(),
        }),
    )
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /scan
pub async fn start_scan(
    State(state): State<Arc<AppState>>,
    Form(form): Form<ScanForm>,
) -> impl IntoResponse {
    match state.scans.submit(&form.scan_path).await {
        Ok(submission) => (
            StatusCode::ACCEPTED,
            Json(ScanStartedResponse {
                status: "scan_started".to_string(),
                scan_id: submission.scan_id,
                message: format!("Scan initiated for {}.", submission.path),
            }),
        )
            .into_response(),
        Err(e @ ScanError::PathNotFound(_)) => {
            error_response(StatusCode::BAD_REQUEST, &e.to_string()).into_response()
        }
        Err(e) => {
            tracing::error!("Failed to start scan of '{}': {}", form.scan_path, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()).into_response()
        }
    }
}

/// GET /scan_status
pub async fn scan_status(State(state): State<Arc<AppState>>) -> Json<Vec<ScanJob>> {
    Json(state.scans.registry().snapshot_all().await)
}

/// GET /scan_paths
pub async fn scan_paths(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.config.scan_paths.clone())
}

/// GET /latest_graph
pub async fn latest_graph(State(state): State<Arc<AppState>>) -> Json<LatestGraphResponse> {
    let response = match state.scans.registry().latest_finished().await {
        Some(job) => LatestGraphResponse {
            scan_id: Some(job.id),
            path: Some(job.path),
            output_file: job.output_file,
        },
        None => LatestGraphResponse::default(),
    };
    Json(response)
}

/// GET /scan_log
pub async fn scan_log(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ScanLogParams>,
) -> impl IntoResponse {
    match state.command_log.read_tail(params.tail).await {
        Ok(content) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain")],
            content,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Failed to read command log: {:#}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("Failed to read command log: {}", e),
            )
            .into_response()
        }
    }
}
