//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the shim.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the shim proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// The single remote origin all traffic is forwarded to.
    pub upstream: UpstreamConfig,

    /// WebSocket bridge settings (heartbeat, reconnect backoff).
    pub websocket: WebSocketConfig,

    /// Request limits.
    pub limits: LimitsConfig,

    /// Content-type override settings.
    pub content_type: ContentTypeConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "127.0.0.1:8188").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8188".to_string(),
        }
    }
}

/// Upstream origin configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base origin, e.g. "https://example.com". Required.
    pub base_url: String,

    /// Connection establishment timeout in seconds (HTTP and WebSocket).
    pub connect_timeout_secs: u64,

    /// Total time allowed for one upstream HTTP round trip.
    /// `None` leaves requests unbounded.
    pub request_timeout_secs: Option<u64>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            connect_timeout_secs: 10,
            request_timeout_secs: None,
        }
    }
}

/// WebSocket bridge configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WebSocketConfig {
    /// Upstream ping interval in seconds (0 disables the heartbeat).
    pub heartbeat_secs: u64,

    /// First reconnect delay in milliseconds.
    pub reconnect_initial_ms: u64,

    /// Upper bound for the reconnect delay in milliseconds.
    pub reconnect_max_ms: u64,

    /// Reset the delay to `reconnect_initial_ms` whenever an upstream
    /// session is established. Off by default: the delay only resets when
    /// a new local connection arrives.
    pub reset_backoff_on_connect: bool,

    /// Frames from the local client queued while no upstream session is live.
    /// The oldest is dropped once full; `0` disables queuing.
    pub max_pending_frames: usize,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            heartbeat_secs: 15,
            reconnect_initial_ms: 2_000,
            reconnect_max_ms: 20_000,
            reset_backoff_on_connect: false,
            max_pending_frames: 256,
        }
    }
}

/// Request limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum inbound request body size in bytes.
    pub max_body_size: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_size: 1024 * 1024 * 1024, // 1 GiB
        }
    }
}

/// Paths whose responses are always labelled `application/json`.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ContentTypeConfig {
    /// Path prefixes of known JSON endpoints. Unset keeps the built-in
    /// allow-list; a value replaces it entirely.
    pub json_path_prefixes: Option<Vec<String>>,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
