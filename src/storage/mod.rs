pub mod command_log;

use anyhow::Result;
use async_trait::async_trait;

/// Append-only record of every external command the server has run.
#[async_trait]
pub trait CommandLog: Send + Sync {
    /// Append one complete entry. Concurrent callers never interleave.
    async fn append_entry(&self, entry: &str) -> Result<()>;
    /// Read the log, optionally only the last `tail` lines.
    async fn read_tail(&self, tail: Option<usize>) -> Result<String>;
}
