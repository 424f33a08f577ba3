use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use super::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_seconds: u64,
    pub running_scans: usize,
    pub total_scans: usize,
    pub version: String,
    pub graph_dir: String,
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    tracing::debug!("Health check");

    let uptime = state.start_time.elapsed().as_secs();
    let registry = state.scans.registry();

    let response = HealthResponse {
        status: "ok".to_string(),
        uptime_seconds: uptime,
        running_scans: registry.running_count().await,
        total_scans: registry.len().await,
        version: env!("CARGO_PKG_VERSION").to_string(),
        graph_dir: state.config.graph_dir().display().to_string(),
    };

    (StatusCode::OK, Json(response))
}
