//! In-memory registry of submitted scans.
//!
//! All reads and writes go through a single `RwLock`, so a snapshot never
//! observes a scan halfway through a transition.

use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use tokio::sync::RwLock;
use tokio::task::AbortHandle;

use crate::errors::ScanError;
use crate::models::{ScanId, ScanJob, ScanStatus};

/// Terminal outcome applied by a transition.
#[derive(Debug, Clone)]
enum Outcome {
    Finished(String),
    Error(String),
}

struct Entry {
    job: ScanJob,
    /// Artifact the render stage writes to, used when reconciling a dead worker.
    planned_artifact: String,
    /// Diagnostic noted while the scan was still running.
    diagnostic: Option<String>,
    /// Handle of the task supervising this scan.
    worker: Option<AbortHandle>,
}

impl Entry {
    fn apply(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Finished(artifact) => {
                self.job.status = ScanStatus::Finished;
                self.job.output_file = Some(artifact);
            }
            Outcome::Error(diagnostic) => {
                self.job.status = ScanStatus::Error;
                self.job.error_msg = Some(diagnostic);
            }
        }
        self.job.finished_at = Some(Utc::now());
        self.worker = None;
    }

    fn worker_gone(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| w.is_finished())
    }
}

#[derive(Default)]
struct Inner {
    next_seq: u64,
    /// Keyed by creation sequence so iteration order is submission order.
    entries: BTreeMap<u64, Entry>,
    index: HashMap<ScanId, u64>,
}

impl Inner {
    fn entry_mut(&mut self, id: ScanId) -> Result<&mut Entry, ScanError> {
        let seq = self
            .index
            .get(&id)
            .copied()
            .ok_or_else(|| ScanError::NotFound(format!("scan {}", id)))?;
        self.entries
            .get_mut(&seq)
            .ok_or_else(|| ScanError::Internal(format!("index out of sync for scan {}", id)))
    }

    /// Drop the oldest terminal scans until at most `max` remain.
    fn prune(&mut self, max: usize) {
        if max == 0 || self.entries.len() <= max {
            return;
        }
        let excess = self.entries.len() - max;
        let victims: Vec<u64> = self
            .entries
            .iter()
            .filter(|(_, e)| e.job.status.is_terminal())
            .map(|(seq, _)| *seq)
            .take(excess)
            .collect();
        for seq in victims {
            if let Some(entry) = self.entries.remove(&seq) {
                self.index.remove(&entry.job.id);
                tracing::debug!("Pruned scan {}", entry.job.id);
            }
        }
    }
}

pub struct ScanRegistry {
    inner: RwLock<Inner>,
    max_retained: usize,
}

impl ScanRegistry {
    /// Create an empty registry. `max_retained` of 0 keeps every scan.
    pub fn new(max_retained: usize) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            max_retained,
        }
    }

    /// Register a new running scan for `path` and return its id.
    ///
    /// The caller is responsible for checking that `path` exists.
    pub async fn create(&self, path: &str) -> ScanId {
        let mut inner = self.inner.write().await;

        let mut id = ScanId::new();
        while inner.index.contains_key(&id) {
            tracing::warn!("Scan id collision on {}, regenerating", id);
            id = ScanId::new();
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.entries.insert(
            seq,
            Entry {
                job: ScanJob::running(id, path.to_string(), Utc::now()),
                planned_artifact: id.artifact_name(),
                diagnostic: None,
                worker: None,
            },
        );
        inner.index.insert(id, seq);
        inner.prune(self.max_retained);

        id
    }

    /// Remember the task supervising `id` for liveness reconciliation.
    pub async fn attach(&self, id: ScanId, worker: AbortHandle) -> Result<(), ScanError> {
        let mut inner = self.inner.write().await;
        let entry = inner.entry_mut(id)?;
        if !entry.job.status.is_terminal() {
            entry.worker = Some(worker);
        }
        Ok(())
    }

    /// Note a diagnostic on a running scan without changing its visible state.
    pub async fn record_diagnostic(&self, id: ScanId, diagnostic: &str) -> Result<(), ScanError> {
        let mut inner = self.inner.write().await;
        let entry = inner.entry_mut(id)?;
        if entry.job.status.is_terminal() {
            return Err(ScanError::AlreadyTerminal(id.to_string()));
        }
        entry.diagnostic = Some(diagnostic.to_string());
        Ok(())
    }

    /// Transition `id` to finished with the given artifact.
    pub async fn finish(&self, id: ScanId, output_file: &str) -> Result<ScanJob, ScanError> {
        self.transition(id, Outcome::Finished(output_file.to_string()))
            .await
    }

    /// Transition `id` to error with the given diagnostic.
    pub async fn fail(&self, id: ScanId, diagnostic: &str) -> Result<ScanJob, ScanError> {
        self.transition(id, Outcome::Error(diagnostic.to_string()))
            .await
    }

    async fn transition(&self, id: ScanId, outcome: Outcome) -> Result<ScanJob, ScanError> {
        let mut inner = self.inner.write().await;
        let entry = inner.entry_mut(id)?;
        if entry.job.status.is_terminal() {
            return Err(ScanError::AlreadyTerminal(id.to_string()));
        }
        entry.apply(outcome);
        Ok(entry.job.clone())
    }

    /// Consistent copy of every scan, most recent first.
    ///
    /// Running scans whose supervising task is gone are resolved here: to
    /// error when a diagnostic was noted, otherwise to finished.
    pub async fn snapshot_all(&self) -> Vec<ScanJob> {
        let mut inner = self.inner.write().await;

        for entry in inner.entries.values_mut() {
            if entry.job.status.is_terminal() || !entry.worker_gone() {
                continue;
            }
            let outcome = match entry.diagnostic.take() {
                Some(diagnostic) => Outcome::Error(diagnostic),
                None => Outcome::Finished(entry.planned_artifact.clone()),
            };
            tracing::warn!(
                "Scan {} worker exited without reporting, resolving as {:?}",
                entry.job.id,
                outcome
            );
            entry.apply(outcome);
        }

        inner.entries.values().rev().map(|e| e.job.clone()).collect()
    }

    pub async fn get(&self, id: ScanId) -> Option<ScanJob> {
        let inner = self.inner.read().await;
        let seq = inner.index.get(&id)?;
        inner.entries.get(seq).map(|e| e.job.clone())
    }

    /// The most recently submitted scan that finished successfully.
    pub async fn latest_finished(&self) -> Option<ScanJob> {
        let inner = self.inner.read().await;
        inner
            .entries
            .values()
            .rev()
            .find(|e| e.job.status == ScanStatus::Finished)
            .map(|e| e.job.clone())
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn running_count(&self) -> usize {
        self.inner
            .read()
            .await
            .entries
            .values()
            .filter(|e| e.job.status == ScanStatus::Running)
            .count()
    }
}
