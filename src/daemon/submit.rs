use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast;

use crate::daemon::events::ScanEvent;
use crate::daemon::pipeline::PipelineRunner;
use crate::daemon::registry::ScanRegistry;
use crate::errors::ScanError;
use crate::models::ScanId;

/// Accepted scan returned to the caller of [`ScanService::submit`].
#[derive(Debug, Clone)]
pub struct Submission {
    pub scan_id: ScanId,
    pub path: String,
    pub output_file: String,
}

/// Entry point for new scans: validates the target and starts the pipeline.
pub struct ScanService {
    registry: Arc<ScanRegistry>,
    pipeline: Arc<PipelineRunner>,
    event_tx: broadcast::Sender<ScanEvent>,
}

impl ScanService {
    pub fn new(
        registry: Arc<ScanRegistry>,
        pipeline: Arc<PipelineRunner>,
        event_tx: broadcast::Sender<ScanEvent>,
    ) -> Self {
        Self {
            registry,
            pipeline,
            event_tx,
        }
    }

    pub fn registry(&self) -> &Arc<ScanRegistry> {
        &self.registry
    }

    /// Register a scan of `path` and start it in the background.
    ///
    /// Returns as soon as the scan is registered; fails with
    /// [`ScanError::PathNotFound`] and no side effects if `path` does not exist.
    pub async fn submit(&self, path: &str) -> Result<Submission, ScanError> {
        if path.is_empty() || !tokio::fs::try_exists(Path::new(path)).await.unwrap_or(false) {
            tracing::warn!("Scan rejected: path '{}' does not exist", path);
            return Err(ScanError::PathNotFound(path.to_string()));
        }

        let scan_id = self.registry.create(path).await;
        let output_file = scan_id.artifact_name();

        let supervisor = self
            .pipeline
            .spawn(scan_id, path.to_string(), output_file.clone());
        // A scan that already finished and was pruned has nothing to attach to.
        if let Err(e) = self
            .registry
            .attach(scan_id, supervisor.abort_handle())
            .await
        {
            tracing::debug!("Scan {} not attached: {}", scan_id, e);
        }

        tracing::info!("Scan {} submitted for {}", scan_id, path);
        let _ = self.event_tx.send(ScanEvent::Submitted {
            scan_id,
            path: path.to_string(),
            timestamp: Utc::now(),
        });

        Ok(Submission {
            scan_id,
            path: path.to_string(),
            output_file,
        })
    }
}
