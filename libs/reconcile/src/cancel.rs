//! Caller-side cancellation.
//!
//! Built on a `watch` channel, the same way long-running loops receive their
//! shutdown signal. Cancellation is observed at the top of every driver step
//! and raced against every backoff or poll wait.

use tokio::sync::watch;

/// Sender half: flips the signal once.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Receiver half handed to [`reconcile`](crate::reconcile).
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: Option<watch::Receiver<bool>>,
}

/// Create a connected handle/signal pair.
pub fn channel() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelSignal { rx: Some(rx) })
}

impl CancelSignal {
    /// Wrap an existing shutdown receiver; `true` means cancelled.
    pub fn new(rx: watch::Receiver<bool>) -> Self {
        Self { rx: Some(rx) }
    }

    /// A signal that never fires.
    pub fn never() -> Self {
        Self { rx: None }
    }

    pub fn is_cancelled(&self) -> bool {
        self.rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Resolve once cancellation is requested. Pends forever if the sender is
    /// dropped without cancelling.
    pub async fn cancelled(&mut self) {
        let Some(rx) = self.rx.as_mut() else {
            return std::future::pending().await;
        };

        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

impl From<watch::Receiver<bool>> for CancelSignal {
    fn from(rx: watch::Receiver<bool>) -> Self {
        Self::new(rx)
    }
}
