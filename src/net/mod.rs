//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Accepted WebSocket upgrade
//!     → connection.rs (connection ID, live-bridge tracking)
//!     → Hand off to the WebSocket bridge
//! ```

pub mod connection;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
