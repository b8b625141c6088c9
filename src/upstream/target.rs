//! The fixed remote origin every request is forwarded to.

use axum::http::HeaderValue;
use url::Url;

use crate::error::ProxyError;

/// A single upstream origin with its HTTP and WebSocket forms.
///
/// Built once at startup and shared read-only by every bridge.
#[derive(Debug, Clone)]
pub struct UpstreamTarget {
    /// Base as configured, without a trailing slash.
    http_base: String,
    /// Same base with `http`→`ws` / `https`→`wss`.
    ws_base: String,
    /// `host[:port]` of the base.
    host_value: HeaderValue,
    origin_value: HeaderValue,
}

impl UpstreamTarget {
    /// Derive a target from a base URL such as `https://remote.example`.
    pub fn parse(base_url: &str) -> Result<Self, ProxyError> {
        let trimmed = base_url.trim().trim_end_matches('/');
        let url = Url::parse(trimmed)
            .map_err(|e| ProxyError::InvalidUpstream(format!("'{}': {}", base_url, e)))?;

        let ws_base = match url.scheme() {
            "https" => format!("wss{}", &trimmed["https".len()..]),
            "http" => format!("ws{}", &trimmed["http".len()..]),
            other => {
                return Err(ProxyError::InvalidUpstream(format!(
                    "unsupported scheme '{}', expected http or https",
                    other
                )))
            }
        };

        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => {
                return Err(ProxyError::InvalidUpstream(format!(
                    "'{}' has no host",
                    base_url
                )))
            }
        };

        Ok(Self {
            host_value: HeaderValue::from_str(&host)?,
            origin_value: HeaderValue::from_str(trimmed)?,
            http_base: trimmed.to_string(),
            ws_base,
        })
    }

    /// Absolute upstream HTTP URL for an inbound path and query.
    pub fn http_url(&self, path_and_query: &str) -> String {
        join_url(&self.http_base, path_and_query)
    }

    /// Absolute upstream WebSocket URL for an inbound path and query.
    pub fn ws_url(&self, path_and_query: &str) -> String {
        join_url(&self.ws_base, path_and_query)
    }

    /// Value for the rewritten `Host` header.
    pub fn host_header(&self) -> &HeaderValue {
        &self.host_value
    }

    /// Value for the rewritten `Origin` header.
    pub fn origin_header(&self) -> &HeaderValue {
        &self.origin_value
    }
}

fn join_url(base: &str, path_and_query: &str) -> String {
    if path_and_query.starts_with('/') {
        format!("{}{}", base, path_and_query)
    } else {
        format!("{}/{}", base, path_and_query)
    }
}
