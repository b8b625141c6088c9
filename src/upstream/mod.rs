//! Upstream subsystem.
//!
//! # Data Flow
//! ```text
//! startup:
//!     UpstreamConfig → target.rs (http/ws bases, Host/Origin values)
//!                    → client.rs (shared reqwest client)
//!                    → connector.rs (WebSocket connector)
//!     all three injected into every bridge via AppState
//! ```
//!
//! # Design Decisions
//! - Exactly one upstream origin; nothing here is mutable after startup
//! - Connections are shared read-only across bridges, no locking required

pub mod client;
pub mod connector;
pub mod target;

pub use client::{build_http_client, install_crypto_provider};
pub use connector::{TungsteniteConnector, UpstreamConnector, UpstreamSocket};
pub use target::UpstreamTarget;
