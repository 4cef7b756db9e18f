//! Shared cancellation signal for fail-fast runs.

use std::sync::Arc;
use tokio::sync::watch;

use crate::error::GateError;

/// Cooperative, clonable cancellation flag.
///
/// Every clone observes the same flag. Gates poll [`is_cancelled`] between
/// units of work; the engine awaits [`cancelled`] to stop waiting on
/// in-flight gates.
///
/// [`is_cancelled`]: CancellationSignal::is_cancelled
/// [`cancelled`]: CancellationSignal::cancelled
#[derive(Debug, Clone)]
pub struct CancellationSignal {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Default for CancellationSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationSignal {
    /// Create a signal in the not-cancelled state.
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    /// Raise the signal. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Whether the signal has been raised.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Return `Err(Cancelled)` for `gate` if the signal is raised.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Cancelled`] once the signal has been raised.
    pub fn check(&self, gate: &str) -> Result<(), GateError> {
        if self.is_cancelled() {
            Err(GateError::cancelled(gate))
        } else {
            Ok(())
        }
    }

    /// Resolve once the signal is raised.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        // The sender lives as long as `self`, so this only returns on cancel.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}
