//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Upstream WebSocket session lost:
//!     → backoff.rs (how long to wait before the next connect)
//!     → websocket bridge sleeps, then reconnects
//! ```
//!
//! # Design Decisions
//! - Retries are a WebSocket-only concept; HTTP requests are never retried
//! - Deterministic delays (no jitter): one bridge per local client, no herd

pub mod backoff;

pub use backoff::Backoff;
