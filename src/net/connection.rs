//! Identity and live count of bridged WebSocket connections.
//!
//! # Responsibilities
//! - Hand out a `ws-N` id per accepted upgrade for log correlation
//! - Count live bridges so shutdown can wait for them to drain

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique id of one local WebSocket connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ws-{}", self.0)
    }
}

/// Shared count of live bridges.
///
/// Backed by a watch channel so [`wait_idle`](Self::wait_idle) wakes on the
/// last guard drop instead of polling.
#[derive(Debug, Clone)]
pub struct ConnectionTracker {
    live: Arc<watch::Sender<usize>>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { live: Arc::new(tx) }
    }

    /// Register a bridge. It counts as live until the guard is dropped.
    pub fn track(&self) -> ConnectionGuard {
        self.live.send_modify(|n| *n += 1);
        ConnectionGuard {
            live: Arc::clone(&self.live),
            id: ConnectionId::next(),
        }
    }

    pub fn active_count(&self) -> usize {
        *self.live.borrow()
    }

    /// Wait for every bridge to finish. `false` if some are still open
    /// after `within`.
    pub async fn wait_idle(&self, within: Duration) -> bool {
        let mut rx = self.live.subscribe();
        let idle = matches!(
            tokio::time::timeout(within, rx.wait_for(|n| *n == 0)).await,
            Ok(Ok(_))
        );
        idle
    }
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps one bridge counted as live.
#[derive(Debug)]
pub struct ConnectionGuard {
    live: Arc<watch::Sender<usize>>,
    id: ConnectionId,
}

impl ConnectionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.live.send_modify(|n| *n = n.saturating_sub(1));
        tracing::trace!(connection_id = %self.id, live = *self.live.borrow(), "Bridge released");
    }
}
