//! Process-wide shutdown flag.

use std::sync::Arc;

use tokio::sync::watch;

/// Graceful shutdown trigger shared by the server and every bridge.
///
/// A latched flag: once triggered it stays triggered, so a bridge that
/// subscribes late still observes it.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
        }
    }

    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }

    /// Latch the flag. Idempotent.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving side of [`Shutdown`].
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Resolves once shutdown has been triggered. Cancel-safe.
    pub async fn triggered(&mut self) {
        // Err: every `Shutdown` was dropped, which counts as triggered.
        let _ = self.rx.wait_for(|triggered| *triggered).await;
    }
}
