//! Progress events emitted by installers.
//!
//! An installer reports `(file, downloaded, total, percent)` through a
//! [`ProgressSink`]. Queued jobs use a channel-backed sink whose receiver is
//! drained into the status table; bulk apply uses a log-only sink.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::NetworkConfig;

/// One progress report from an installer.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    pub file_name: String,
    pub downloaded: u64,
    pub total: u64,
    /// Overall percentage for the job, 0 to 100.
    pub percent: f64,
}

impl ProgressEvent {
    /// Build an event, computing `percent` from the byte counts of a single file.
    pub fn new(file_name: impl Into<String>, downloaded: u64, total: u64) -> Self {
        let percent = if total > 0 {
            (downloaded as f64 / total as f64 * 100.0).min(100.0)
        } else {
            0.0
        };
        Self {
            file_name: file_name.into(),
            downloaded,
            total,
            percent,
        }
    }

    pub fn with_percent(mut self, percent: f64) -> Self {
        self.percent = percent.clamp(0.0, 100.0);
        self
    }
}

/// Destination for installer progress.
///
/// Cloning shares the underlying channel and log throttle.
#[derive(Debug, Clone)]
pub struct ProgressSink {
    tx: Option<mpsc::UnboundedSender<ProgressEvent>>,
    last_logged: Arc<Mutex<Option<Instant>>>,
}

impl ProgressSink {
    /// A sink that forwards every event to the returned receiver.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx: Some(tx),
                last_logged: Arc::new(Mutex::new(None)),
            },
            rx,
        )
    }

    /// A sink that only logs.
    pub fn logging() -> Self {
        Self {
            tx: None,
            last_logged: Arc::new(Mutex::new(None)),
        }
    }

    pub fn emit(&self, event: ProgressEvent) {
        self.log(&event);
        if let Some(tx) = &self.tx {
            // A closed receiver means nobody is polling this job any more.
            let _ = tx.send(event);
        }
    }

    fn log(&self, event: &ProgressEvent) {
        let due = {
            let mut last = match self.last_logged.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            let due = event.percent >= 100.0
                || last.map_or(true, |t| {
                    t.elapsed() >= NetworkConfig::DOWNLOAD_PROGRESS_INTERVAL
                });
            if due {
                *last = Some(Instant::now());
            }
            due
        };

        if due {
            info!(
                "Downloading {}: {}/{} bytes ({:.2}%)",
                event.file_name, event.downloaded, event.total, event.percent
            );
        } else {
            debug!("{} progress {:.2}%", event.file_name, event.percent);
        }
    }
}
