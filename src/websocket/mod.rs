//! WebSocket bridging.
//!
//! # Responsibilities
//! - Own the local WebSocket for its whole lifetime
//! - Open a fresh upstream WebSocket per relay session
//! - Bidirectional frame forwarding
//! - Reconnect with exponential backoff while the local side stays open
//!
//! # Data Flow
//! ```text
//! Client ←── frames ──→ LocalSocket ←── RelaySession ──→ Upstream (attempt 1)
//!                            │           (backoff)
//!                            └──────── RelaySession ──→ Upstream (attempt 2) ...
//! ```
//!
//! # Design Decisions
//! - Exactly one upstream connection per local connection at any time
//! - A half-dead session (one direction ended) ends the whole session
//! - Local closure is authoritative: no reconnect after it

pub mod bridge;
pub mod relay;
pub mod state;

pub use bridge::{BridgeSettings, WebSocketBridge};
pub use relay::{LocalSocket, RelayEnd, RelaySession};
pub use state::{BridgeEvent, BridgeState, ReconnectPolicy};
