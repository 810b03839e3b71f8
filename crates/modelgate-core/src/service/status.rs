//! Job status table.
//!
//! One coarse lock over a map of job id to [`OpStatus`]. Entries only move
//! forward: once processed they are frozen, and progress never decreases.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::gallery::OpStatus;
use crate::progress::ProgressEvent;

#[derive(Debug, Clone, Default)]
pub struct StatusTable {
    entries: Arc<Mutex<HashMap<String, OpStatus>>>,
}

impl StatusTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, OpStatus>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Start a fresh run for `id`, replacing any record of an earlier run.
    pub fn begin(&self, id: &str) {
        let previous = self.lock().insert(id.to_string(), OpStatus::processing());
        if previous.is_some_and(|p| p.processed) {
            debug!("Job id {} reused after completion", id);
        }
    }

    /// Store `status` for `id`. Returns false if the write was dropped.
    pub fn set(&self, id: &str, mut status: OpStatus) -> bool {
        let mut entries = self.lock();
        if let Some(current) = entries.get(id) {
            if current.processed {
                debug!("Ignoring update to finished job {}", id);
                return false;
            }
            if !status.processed && status.progress < current.progress {
                status.progress = current.progress;
            }
        }
        entries.insert(id.to_string(), status);
        true
    }

    /// Apply an installer progress event to a running job.
    pub fn record_progress(&self, id: &str, event: &ProgressEvent) -> bool {
        let mut entries = self.lock();
        let Some(current) = entries.get_mut(id) else {
            return false;
        };
        if current.processed {
            return false;
        }
        current.file_name = event.file_name.clone();
        current.downloaded_bytes = event.downloaded;
        current.total_bytes = event.total;
        current.progress = current.progress.max(event.percent);
        true
    }

    pub fn get(&self, id: &str) -> Option<OpStatus> {
        self.lock().get(id).cloned()
    }

    /// Owned snapshot of every entry.
    pub fn get_all(&self) -> HashMap<String, OpStatus> {
        self.lock().clone()
    }
}
