pub mod assets;
pub mod health;
pub mod routes;
pub mod sse;

use std::sync::Arc;
use std::time::Instant;

use axum::routing::{get, post};
use axum::Router;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::daemon::events::ScanEvent;
use crate::daemon::submit::ScanService;
use crate::models::ServerConfig;
use crate::storage::CommandLog;

/// Shared application state for the Axum server.
pub struct AppState {
    pub scans: Arc<ScanService>,
    pub command_log: Arc<dyn CommandLog>,
    pub event_tx: broadcast::Sender<ScanEvent>,
    pub config: Arc<ServerConfig>,
    pub start_time: Instant,
}

/// Create the Axum router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    let graph_dir = state.config.graph_dir();

    Router::new()
        .route("/health", get(health::health_check))
        .route("/scan", post(routes::start_scan))
        .route("/scan_status", get(routes::scan_status))
        .route("/scan_paths", get(routes::scan_paths))
        .route("/latest_graph", get(routes::latest_graph))
        .route("/scan_log", get(routes::scan_log))
        .route("/scan_events", get(sse::sse_handler))
        .nest_service("/static/graphs", ServeDir::new(graph_dir))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .fallback(assets::serve_embedded)
}
