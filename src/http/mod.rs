//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, dispatch on `Upgrade: websocket`)
//!         ├─ upgrade  → websocket bridge
//!         └─ other    → proxy.rs (buffer, forward, replay)
//!                         → headers.rs (request/response rewriting)
//!                         → content_type.rs (JSON override)
//!     → Send to client
//! ```

pub mod content_type;
pub mod headers;
pub mod proxy;
pub mod server;

pub use content_type::{is_known_json_path, JsonPathMatcher};
pub use headers::{rewrite_request_headers, rewrite_response_headers};
pub use server::{AppState, HttpServer};
