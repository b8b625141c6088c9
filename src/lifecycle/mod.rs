//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Close WebSocket bridges → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then upstream clients, then listener
//! - Open bridges get a bounded drain window before the process exits

pub mod shutdown;
pub mod signals;

pub use shutdown::{Shutdown, ShutdownSignal};
