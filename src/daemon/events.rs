use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::ScanId;

/// The two external stages every scan goes through, in order.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Index,
    Render,
}

impl Stage {
    /// Prefix used for diagnostics produced by this stage.
    pub fn failure_label(&self) -> &'static str {
        match self {
            Stage::Index => "Error indexing with duc",
            Stage::Render => "Error generating graph with duc",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Index => f.write_str("index"),
            Stage::Render => f.write_str("render"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum ScanEvent {
    Submitted {
        scan_id: ScanId,
        path: String,
        timestamp: DateTime<Utc>,
    },
    StageStarted {
        scan_id: ScanId,
        stage: Stage,
        timestamp: DateTime<Utc>,
    },
    Finished {
        scan_id: ScanId,
        output_file: String,
        timestamp: DateTime<Utc>,
    },
    Failed {
        scan_id: ScanId,
        error: String,
        timestamp: DateTime<Utc>,
    },
}

impl ScanEvent {
    pub fn scan_id(&self) -> ScanId {
        match self {
            ScanEvent::Submitted { scan_id, .. }
            | ScanEvent::StageStarted { scan_id, .. }
            | ScanEvent::Finished { scan_id, .. }
            | ScanEvent::Failed { scan_id, .. } => *scan_id,
        }
    }

    /// SSE event name.
    pub fn kind(&self) -> &'static str {
        match self {
            ScanEvent::Submitted { .. } => "submitted",
            ScanEvent::StageStarted { .. } => "stage_started",
            ScanEvent::Finished { .. } => "finished",
            ScanEvent::Failed { .. } => "failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast;

    #[test]
    fn test_submitted_event_serializes() {
        let id = ScanId::new();
        let event = ScanEvent::Submitted {
            scan_id: id,
            path: "/var".to_string(),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_string(&event).expect("serialize");
        assert!(json.contains("\"event\":\"Submitted\""));
        assert!(json.contains(&format!("\"scan_id\":\"{}\"", id)));
        assert!(json.contains("\"path\":\"/var\""));
    }

    #[test]
    fn test_stage_started_event_serializes_stage_lowercase() {
        let event = ScanEvent::StageStarted {
            scan_id: ScanId::new(),
            stage: Stage::Render,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_string(&event).expect("serialize");
        assert!(json.contains("\"stage\":\"render\""));
    }

    #[test]
    fn test_kind_and_scan_id_accessors() {
        let id = ScanId::new();
        let event = ScanEvent::Failed {
            scan_id: id,
            error: "boom".to_string(),
            timestamp: Utc::now(),
        };
        assert_eq!(event.kind(), "failed");
        assert_eq!(event.scan_id(), id);
    }

    #[test]
    fn test_stage_labels() {
        assert_eq!(Stage::Index.to_string(), "index");
        assert_eq!(Stage::Render.to_string(), "render");
        assert!(Stage::Index.failure_label().contains("indexing"));
        assert!(Stage::Render.failure_label().contains("graph"));
    }

    #[tokio::test]
    async fn test_broadcast_reaches_all_subscribers() {
        let (tx, mut rx1) = broadcast::channel::<ScanEvent>(16);
        let mut rx2 = tx.subscribe();
        let id = ScanId::new();

        tx.send(ScanEvent::Finished {
            scan_id: id,
            output_file: id.artifact_name(),
            timestamp: Utc::now(),
        })
        .expect("send");

        assert_eq!(rx1.recv().await.expect("recv").scan_id(), id);
        assert_eq!(rx2.recv().await.expect("recv").kind(), "finished");
    }
}
