//! Bridge state machine.
//!
//! # States
//! - AwaitingLocalUpgrade: local handshake not yet complete
//! - Bridging: opening or running one upstream relay session
//! - Reconnecting: waiting out the backoff delay
//! - Closed: terminal, both sides released
//!
//! # State Transitions
//! ```text
//! AwaitingLocalUpgrade → Bridging: local upgrade accepted
//! Bridging → Reconnecting: session ended (or connect failed), local still open
//! Bridging → Closed: session ended with the local side closed
//! Reconnecting → Bridging: backoff delay elapsed
//! any → Closed: local side closed or shutdown
//! ```

use std::time::Duration;

use crate::resilience::Backoff;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    AwaitingLocalUpgrade,
    Bridging,
    Reconnecting,
    Closed,
}

/// Inputs that drive [`BridgeState`] transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeEvent {
    /// The local WebSocket handshake completed.
    Upgraded,
    /// A connect attempt failed or a relay session ended.
    SessionEnded { local_open: bool },
    /// The reconnect delay is over.
    BackoffElapsed,
    /// The local session closed (or the process is shutting down).
    LocalClosed,
}

impl BridgeState {
    /// Apply one event. Events that make no sense in the current state
    /// leave it unchanged.
    pub fn on(self, event: BridgeEvent) -> Self {
        use BridgeEvent::*;
        use BridgeState::*;

        match (self, event) {
            (Closed, _) => Closed,
            (_, LocalClosed) => Closed,
            (AwaitingLocalUpgrade, Upgraded) => Bridging,
            (Bridging, SessionEnded { local_open: true }) => Reconnecting,
            (Bridging, SessionEnded { local_open: false }) => Closed,
            (Reconnecting, BackoffElapsed) => Bridging,
            (state, _) => state,
        }
    }

    pub fn is_closed(self) -> bool {
        self == BridgeState::Closed
    }
}

/// Reconnect delay policy for one local connection.
///
/// The delay starts at its initial value when the bridge starts and doubles
/// on every wait up to the maximum. Unless `reset_on_connect` is set, an
/// established upstream session does not bring it back down.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    backoff: Backoff,
    reset_on_connect: bool,
    /// Waits since the last established session.
    attempt: u32,
}

impl ReconnectPolicy {
    pub fn new(initial: Duration, max: Duration, reset_on_connect: bool) -> Self {
        Self {
            backoff: Backoff::new(initial, max),
            reset_on_connect,
            attempt: 0,
        }
    }

    /// Called when an upstream session has been established.
    pub fn on_connected(&mut self) {
        self.attempt = 0;
        if self.reset_on_connect {
            self.backoff.reset();
        }
    }

    /// Delay for the wait about to start.
    pub fn next_delay(&mut self) -> Duration {
        self.attempt = self.attempt.saturating_add(1);
        self.backoff.next_delay()
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}
