//! Shutdown signal shared by the gallery service and its worker.

use tokio::sync::watch;

/// One-way shutdown flag. Clones observe the same state.
///
/// ```
/// use modelgate_core::shutdown::Shutdown;
///
/// let shutdown = Shutdown::new();
/// let observer = shutdown.clone();
/// shutdown.trigger();
/// assert!(observer.is_triggered());
/// ```
#[derive(Debug, Clone)]
pub struct Shutdown {
    state: watch::Sender<bool>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    pub fn new() -> Self {
        let (state, _) = watch::channel(false);
        Self { state }
    }

    /// Stop accepting work. Idempotent.
    pub fn trigger(&self) {
        self.state.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.state.borrow()
    }

    /// Resolves once [`Shutdown::trigger`] has been called on any clone.
    pub async fn triggered(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|triggered| *triggered).await;
    }
}
