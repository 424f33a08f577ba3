use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a submitted scan. UUIDv7, so ids sort by creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScanId(Uuid);

impl ScanId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// File name of the graph rendered for this scan.
    pub fn artifact_name(&self) -> String {
        format!("disk_usage_{}.png", self.0)
    }
}

impl Default for ScanId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ScanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ScanId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Running,
    Finished,
    Error,
}

impl ScanStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ScanStatus::Running)
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScanStatus::Running => "running",
            ScanStatus::Finished => "finished",
            ScanStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// A point-in-time view of one scan as served by `GET /scan_status`.
///
/// `output_file` is only set for finished scans and `error_msg` only for
/// failed ones; a running scan carries neither.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScanJob {
    pub id: ScanId,
    pub path: String,
    pub status: ScanStatus,
    pub output_file: Option<String>,
    pub error_msg: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
}

impl ScanJob {
    pub fn running(id: ScanId, path: String, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            path,
            status: ScanStatus::Running,
            output_file: None,
            error_msg: None,
            created_at,
            finished_at: None,
        }
    }
}

/// One entry of the dashboard's path drop-down.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScanPathOption {
    pub display: String,
    pub path: String,
}

impl ScanPathOption {
    pub fn new(path: &str) -> Self {
        Self {
            display: path.to_string(),
            path: path.to_string(),
        }
    }
}
