use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::storage::CommandLog;

pub struct FsCommandLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FsCommandLog {
    /// Create a FsCommandLog writing to `path`, creating its parent directory.
    pub async fn new(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create command log directory")?;
        }
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CommandLog for FsCommandLog {
    async fn append_entry(&self, entry: &str) -> Result<()> {
        // One writer at a time so entries from parallel scans stay whole.
        let _guard = self.write_lock.lock().await;

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .context("Failed to open command log for appending")?;

        file.write_all(entry.as_bytes())
            .await
            .context("Failed to append to command log")?;

        file.flush().await.context("Failed to flush command log")?;

        Ok(())
    }

    async fn read_tail(&self, tail: Option<usize>) -> Result<String> {
        if !self.path.exists() {
            return Ok(String::new());
        }

        let content = tokio::fs::read_to_string(&self.path)
            .await
            .context("Failed to read command log")?;

        match tail {
            Some(n) => {
                let lines: Vec<&str> = content.lines().collect();
                let start = lines.len().saturating_sub(n);
                Ok(lines[start..].join("\n"))
            }
            None => Ok(content),
        }
    }
}
