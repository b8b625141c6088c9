//! Upstream WebSocket connection capability.
//!
//! The bridge never dials sockets itself; it asks an [`UpstreamConnector`]
//! for a fresh session on every (re)connect. The production implementation
//! is [`TungsteniteConnector`]; tests wrap it to observe connect attempts.

use std::time::Duration;

use axum::http::HeaderMap;
use futures_util::future::BoxFuture;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::error::ProxyError;

/// A live upstream WebSocket connection.
pub type UpstreamSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens upstream WebSocket sessions.
pub trait UpstreamConnector: Send + Sync {
    /// Open one session to `url`, sending `headers` on the handshake.
    fn connect(&self, url: String, headers: HeaderMap)
        -> BoxFuture<'static, Result<UpstreamSocket, ProxyError>>;
}

/// Connector backed by `tokio-tungstenite`, with TLS for `wss` URLs.
#[derive(Debug, Clone)]
pub struct TungsteniteConnector {
    connect_timeout: Duration,
}

impl TungsteniteConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl UpstreamConnector for TungsteniteConnector {
    fn connect(
        &self,
        url: String,
        headers: HeaderMap,
    ) -> BoxFuture<'static, Result<UpstreamSocket, ProxyError>> {
        let timeout = self.connect_timeout;
        Box::pin(async move {
            let mut request = url.as_str().into_client_request()?;
            let target = request.headers_mut();
            for name in headers.keys() {
                // The upstream handshake negotiates its own key, version and
                // extensions.
                if name.as_str().starts_with("sec-websocket-") {
                    continue;
                }
                target.remove(name);
                for value in headers.get_all(name) {
                    target.append(name.clone(), value.clone());
                }
            }

            let mut config = WebSocketConfig::default();
            config.max_message_size = None;
            config.max_frame_size = None;

            let connect =
                tokio_tungstenite::connect_async_with_config(request, Some(config), false);
            let (socket, _response) = tokio::time::timeout(timeout, connect)
                .await
                .map_err(|_| ProxyError::ConnectTimeout(timeout.as_secs()))??;
            Ok(socket)
        })
    }
}
