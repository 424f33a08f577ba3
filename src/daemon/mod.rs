// Scan tracking core and server bootstrap.

pub mod events;
pub mod invoker;
pub mod pipeline;
pub mod registry;
pub mod submit;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::sync::broadcast;

use crate::daemon::events::ScanEvent;
use crate::daemon::invoker::ToolInvoker;
use crate::daemon::pipeline::PipelineRunner;
use crate::daemon::registry::ScanRegistry;
use crate::daemon::submit::ScanService;
use crate::models::ServerConfig;
use crate::server::{self, AppState};
use crate::storage::command_log::FsCommandLog;
use crate::storage::CommandLog;
use crate::tool::{SystemToolRunner, ToolRunner};

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

fn read_config(path: &Path) -> Result<ServerConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: ServerConfig = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    tracing::info!("Loaded config from: {}", path.display());
    Ok(config)
}

/// Load the ServerConfig using this resolution order:
///   1. --config CLI flag (passed as config_path)
///   2. DSCAN_CONFIG_DIR environment variable
///   3. Platform config dir (dirs::config_dir()/disk-scan-server/config.json)
///   4. {data_dir}/config.json
///   5. ServerConfig::default()
pub fn load_config(config_path: Option<&Path>, data_dir: Option<&Path>) -> Result<ServerConfig> {
    if let Some(path) = config_path {
        if path.exists() {
            return read_config(path);
        }
        return Err(anyhow::anyhow!("Config file not found: {}", path.display()));
    }

    if let Ok(config_dir) = std::env::var("DSCAN_CONFIG_DIR") {
        let path = PathBuf::from(config_dir).join("config.json");
        if path.exists() {
            return read_config(&path);
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let path = config_dir.join("disk-scan-server").join("config.json");
        if path.exists() {
            return read_config(&path);
        }
    }

    let path = resolve_data_dir(data_dir).join("config.json");
    if path.exists() {
        return read_config(&path);
    }

    tracing::info!("No config file found, using defaults");
    Ok(ServerConfig::default())
}

/// Resolve the data directory: explicit override, then `DSCAN_DATA_DIR`,
/// then the current working directory.
pub fn resolve_data_dir(override_dir: Option<&Path>) -> PathBuf {
    if let Some(dir) = override_dir {
        return dir.to_path_buf();
    }

    if let Ok(d) = std::env::var("DSCAN_DATA_DIR") {
        return PathBuf::from(d);
    }

    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

/// Create the graph directory and the command log's parent directory.
pub async fn create_data_dirs(config: &ServerConfig) -> Result<()> {
    let graph_dir = config.graph_dir();
    tokio::fs::create_dir_all(&graph_dir)
        .await
        .with_context(|| format!("Failed to create graph directory {}", graph_dir.display()))?;
    tracing::info!("Graph directory: {}", graph_dir.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

/// Wire registry, invoker, pipeline and submission service into an AppState.
pub async fn build_state(
    config: ServerConfig,
    tool_runner: Arc<dyn ToolRunner>,
) -> Result<Arc<AppState>> {
    let config = Arc::new(config);

    let command_log = Arc::new(FsCommandLog::new(config.scan_log_file()).await?)
        as Arc<dyn CommandLog>;
    tracing::info!("Scan log file: {}", config.scan_log_file().display());

    let (event_tx, _) = broadcast::channel::<ScanEvent>(config.broadcast_capacity);
    let registry = Arc::new(ScanRegistry::new(config.max_retained_scans));
    let invoker = Arc::new(ToolInvoker::new(tool_runner, Arc::clone(&command_log)));
    let pipeline = Arc::new(PipelineRunner::new(
        Arc::clone(&registry),
        invoker,
        event_tx.clone(),
        &config,
    ));
    let scans = Arc::new(ScanService::new(registry, pipeline, event_tx.clone()));

    Ok(Arc::new(AppState {
        scans,
        command_log,
        event_tx,
        config,
        start_time: Instant::now(),
    }))
}

// ---------------------------------------------------------------------------
// Server bootstrap
// ---------------------------------------------------------------------------

/// Start the server in the foreground.
///
/// 1. Loads config and applies CLI overrides
/// 2. Creates the graph directory
/// 3. Builds the scan core
/// 4. Serves HTTP until Ctrl+C or SIGTERM
pub async fn start_server(
    config_path: Option<&Path>,
    data_dir_override: Option<&Path>,
    host_override: Option<&str>,
    port_override: Option<u16>,
) -> Result<()> {
    let mut config = load_config(config_path, data_dir_override)?;

    if let Some(h) = host_override {
        config.host = h.to_string();
    }
    if let Some(p) = port_override {
        config.port = p;
    }

    let data_dir = match (data_dir_override, config.data_dir.as_ref()) {
        (Some(d), _) => d.to_path_buf(),
        (None, Some(d)) => d.clone(),
        (None, None) => resolve_data_dir(None),
    };
    config.data_dir = Some(data_dir);

    create_data_dirs(&config).await?;

    let bind_addr = format!("{}:{}", config.host, config.port);
    let state = build_state(config, Arc::new(SystemToolRunner)).await?;
    let router = server::create_router(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;

    tracing::info!("Server started. Listening on http://{}", bind_addr);
    tracing::info!(
        "The server user needs passwordless sudo for the configured index and render commands"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    let running = state.scans.registry().running_count().await;
    if running > 0 {
        tracing::warn!("Exiting with {} scan(s) still running", running);
    }
    tracing::info!("Server exited cleanly.");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(e) => {
                    tracing::error!("Failed to install SIGTERM handler: {}", e);
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl+C signal");
            }
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM signal");
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Received Ctrl+C signal");
    }
}

// ===========================================================================
// Tests
// ===========================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::MockToolRunner;
    use tempfile::TempDir;

    #[test]
    fn test_load_config_explicit_path() {
        let tmp = TempDir::new().expect("temp dir");
        let path = tmp.path().join("custom.json");
        std::fs::write(&path, r#"{"port": 9123, "max_retained_scans": 5}"#).expect("write");

        let config = load_config(Some(&path), None).expect("load");
        assert_eq!(config.port, 9123);
        assert_eq!(config.max_retained_scans, 5);
    }

    #[test]
    fn test_load_config_missing_explicit_path_errors() {
        let tmp = TempDir::new().expect("temp dir");
        let path = tmp.path().join("missing.json");
        let err = load_config(Some(&path), None).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }

    #[test]
    fn test_load_config_invalid_json_errors() {
        let tmp = TempDir::new().expect("temp dir");
        let path = tmp.path().join("bad.json");
        std::fs::write(&path, "not json").expect("write");
        let err = load_config(Some(&path), None).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse config file"));
    }

    #[test]
    fn test_resolve_data_dir_override_wins() {
        let dir = resolve_data_dir(Some(Path::new("/tmp/dscan-test")));
        assert_eq!(dir, PathBuf::from("/tmp/dscan-test"));
    }

    #[tokio::test]
    async fn test_create_data_dirs_creates_graph_dir() {
        let tmp = TempDir::new().expect("temp dir");
        let config = ServerConfig {
            data_dir: Some(tmp.path().to_path_buf()),
            ..ServerConfig::default()
        };
        create_data_dirs(&config).await.expect("create");
        assert!(tmp.path().join("static").join("graphs").is_dir());
    }

    #[tokio::test]
    async fn test_build_state_wires_empty_registry() {
        let tmp = TempDir::new().expect("temp dir");
        let config = ServerConfig {
            data_dir: Some(tmp.path().to_path_buf()),
            ..ServerConfig::default()
        };
        let state = build_state(config, Arc::new(MockToolRunner::new(vec![])))
            .await
            .expect("build");
        assert!(state.scans.registry().is_empty().await);
        assert_eq!(state.config.port, 8888);
    }
}
