use std::any::Any;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::daemon::events::{ScanEvent, Stage};
use crate::daemon::invoker::ToolInvoker;
use crate::daemon::registry::ScanRegistry;
use crate::errors::ScanError;
use crate::models::{ScanId, ServerConfig};

/// Substitute `{path}` and `{output}` in every element of an argv template.
pub fn expand_template(template: &[String], path: &str, output: &str) -> Vec<String> {
    template
        .iter()
        .map(|arg| arg.replace("{path}", path).replace("{output}", output))
        .collect()
}

/// Runs the index and render stages for one scan and records the outcome.
pub struct PipelineRunner {
    registry: Arc<ScanRegistry>,
    invoker: Arc<ToolInvoker>,
    event_tx: broadcast::Sender<ScanEvent>,
    index_command: Vec<String>,
    render_command: Vec<String>,
    graph_dir: PathBuf,
}

impl PipelineRunner {
    pub fn new(
        registry: Arc<ScanRegistry>,
        invoker: Arc<ToolInvoker>,
        event_tx: broadcast::Sender<ScanEvent>,
        config: &ServerConfig,
    ) -> Self {
        Self {
            registry,
            invoker,
            event_tx,
            index_command: config.index_command.clone(),
            render_command: config.render_command.clone(),
            graph_dir: config.graph_dir(),
        }
    }

    /// Run both stages for `id` in the background under a supervisor.
    ///
    /// The returned handle belongs to the supervisor, which ends only after
    /// the scan has been moved to a terminal state.
    pub fn spawn(self: &Arc<Self>, id: ScanId, path: String, artifact_name: String) -> JoinHandle<()> {
        let runner = Arc::clone(self);
        supervise(
            Arc::clone(&self.registry),
            self.event_tx.clone(),
            id,
            async move { runner.run(id, &path, &artifact_name).await },
        )
    }

    /// Index `path`, then render it into `artifact_name`.
    pub async fn run(&self, id: ScanId, path: &str, artifact_name: &str) {
        let graph_path = self.graph_dir.join(artifact_name);
        let graph_path_str = graph_path.display().to_string();

        tracing::info!("[{}] Starting duc index for: {}", id, path);
        self.stage_started(id, Stage::Index);
        let index = self
            .invoker
            .invoke(
                Stage::Index,
                expand_template(&self.index_command, path, &graph_path_str),
            )
            .await;

        if !index.success {
            tracing::error!("[{}] Index failed for {}: {}", id, path, index.diagnostic);
            self.fail(id, &index.diagnostic).await;
            return;
        }

        tracing::info!("[{}] Index completed for {}, rendering graph", id, path);
        self.stage_started(id, Stage::Render);
        let render = self
            .invoker
            .invoke(
                Stage::Render,
                expand_template(&self.render_command, path, &graph_path_str),
            )
            .await;

        if !render.success {
            tracing::error!("[{}] Render failed for {}: {}", id, path, render.diagnostic);
            discard_partial_artifact(&graph_path).await;
            self.fail(id, &render.diagnostic).await;
            return;
        }

        match self.registry.finish(id, artifact_name).await {
            Ok(_) => {
                tracing::info!("[{}] Graph generated: {}", id, graph_path_str);
                let _ = self.event_tx.send(ScanEvent::Finished {
                    scan_id: id,
                    output_file: artifact_name.to_string(),
                    timestamp: Utc::now(),
                });
            }
            Err(e) => tracing::warn!("[{}] Could not mark scan finished: {}", id, e),
        }
    }

    fn stage_started(&self, id: ScanId, stage: Stage) {
        let _ = self.event_tx.send(ScanEvent::StageStarted {
            scan_id: id,
            stage,
            timestamp: Utc::now(),
        });
    }

    async fn fail(&self, id: ScanId, diagnostic: &str) {
        if let Err(e) = self.registry.record_diagnostic(id, diagnostic).await {
            tracing::debug!("[{}] Could not record diagnostic: {}", id, e);
        }
        fail_scan(&self.registry, &self.event_tx, id, diagnostic).await;
    }
}

/// Spawn `work` for scan `id` and turn a panic or cancellation of it into an
/// error transition.
pub fn supervise<F>(
    registry: Arc<ScanRegistry>,
    event_tx: broadcast::Sender<ScanEvent>,
    id: ScanId,
    work: F,
) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let worker = tokio::spawn(work);
        let Err(join_err) = worker.await else {
            return;
        };

        let diagnostic = if join_err.is_panic() {
            format!(
                "Unexpected exception in scan task: {}",
                panic_message(join_err.into_panic())
            )
        } else {
            "Unexpected exception in scan task: task was cancelled".to_string()
        };
        tracing::error!("[{}] {}", id, diagnostic);
        fail_scan(&registry, &event_tx, id, &diagnostic).await;
    })
}

async fn fail_scan(
    registry: &ScanRegistry,
    event_tx: &broadcast::Sender<ScanEvent>,
    id: ScanId,
    diagnostic: &str,
) {
    match registry.fail(id, diagnostic).await {
        Ok(_) => {
            let _ = event_tx.send(ScanEvent::Failed {
                scan_id: id,
                error: diagnostic.to_string(),
                timestamp: Utc::now(),
            });
        }
        Err(ScanError::AlreadyTerminal(_)) => {
            tracing::warn!("[{}] Ignoring failure for scan already in a terminal state", id);
        }
        Err(e) => tracing::warn!("[{}] Could not mark scan failed: {}", id, e),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

async fn discard_partial_artifact(path: &std::path::Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::info!("Removed partial graph {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to remove partial graph {}: {}", path.display(), e),
    }
}
