//! Protocol-transparent single-origin reverse proxy.
//!
//! Accepts local HTTP and WebSocket connections and relays them to one
//! fixed remote origin, rewriting headers so the remote believes it is
//! addressed directly, and re-establishing dropped upstream WebSocket
//! sessions without closing the local one.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod resilience;
pub mod upstream;
pub mod websocket;

pub use config::schema::ProxyConfig;
pub use error::ProxyError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
