//! The single worker task draining the operation queue.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use crate::shutdown::Shutdown;
use crate::gallery::{GalleryOp, OpStatus};
use crate::progress::ProgressSink;
use crate::service::dispatcher::Dispatcher;
use crate::service::status::StatusTable;

/// A queued operation plus the acknowledgement fired when the worker takes it.
pub(crate) struct Envelope {
    pub op: GalleryOp,
    pub accepted: oneshot::Sender<()>,
}

pub(crate) struct Worker {
    pub dispatcher: Arc<Dispatcher>,
    pub statuses: StatusTable,
    pub opaque_errors: bool,
    pub shutdown: Shutdown,
}

impl Worker {
    /// Take operations one at a time until shut down or every sender is gone.
    pub async fn run(self, mut queue: mpsc::Receiver<Envelope>) {
        info!("Gallery worker started");
        loop {
            let envelope = tokio::select! {
                biased;
                _ = self.shutdown.triggered() => break,
                next = queue.recv() => match next {
                    Some(envelope) => envelope,
                    None => break,
                },
            };

            let Envelope { op, accepted } = envelope;
            if accepted.send(()).is_err() {
                // Submitter went away before the handoff completed; still run it.
                warn!("Submitter for job {} is gone", op.id);
            }
            self.process(op).await;
        }
        queue.close();
        info!("Gallery worker stopped");
    }

    async fn process(&self, op: GalleryOp) {
        let id = op.id.clone();
        info!("Processing job {}", id);
        self.statuses.begin(&id);

        let (sink, mut events) = ProgressSink::channel();
        let dispatcher = self.dispatcher.as_ref();
        let dispatch = async move {
            let result = dispatcher.dispatch(&op, &sink).await;
            drop(sink);
            result
        };
        let drain = async {
            while let Some(event) = events.recv().await {
                self.statuses.record_progress(&id, &event);
            }
        };
        let (result, ()) = tokio::join!(dispatch, drain);

        match result {
            Ok(outcome) => {
                info!("Job {} completed", id);
                self.statuses
                    .set(&id, OpStatus::completed(outcome.deletion, outcome.model_name));
            }
            Err(e) => {
                warn!("Job {} failed: {}", id, e);
                self.statuses.set(&id, OpStatus::failed(&e, self.opaque_errors));
            }
        }
    }
}
