//! Reconnecting WebSocket bridge for one local connection.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::WebSocket;
use axum::http::HeaderMap;

use crate::config::WebSocketConfig;
use crate::lifecycle::ShutdownSignal;
use crate::net::ConnectionGuard;
use crate::observability::metrics;
use crate::upstream::UpstreamConnector;
use crate::websocket::relay::{LocalSocket, RelaySession};
use crate::websocket::state::{BridgeEvent, BridgeState, ReconnectPolicy};

/// Timing knobs for a bridge, derived from [`WebSocketConfig`].
#[derive(Debug, Clone)]
pub struct BridgeSettings {
    pub heartbeat: Option<Duration>,
    pub reconnect_initial: Duration,
    pub reconnect_max: Duration,
    pub reset_backoff_on_connect: bool,
    pub max_pending_frames: usize,
}

impl From<&WebSocketConfig> for BridgeSettings {
    fn from(config: &WebSocketConfig) -> Self {
        Self {
            heartbeat: (config.heartbeat_secs > 0).then(|| Duration::from_secs(config.heartbeat_secs)),
            reconnect_initial: Duration::from_millis(config.reconnect_initial_ms),
            reconnect_max: Duration::from_millis(config.reconnect_max_ms),
            reset_backoff_on_connect: config.reset_backoff_on_connect,
            max_pending_frames: config.max_pending_frames,
        }
    }
}

/// Bridges one local WebSocket to a series of upstream sessions.
pub struct WebSocketBridge {
    /// Upstream URL including the inbound path and query.
    url: String,
    /// Rewritten handshake headers for every upstream attempt.
    headers: HeaderMap,
    connector: Arc<dyn UpstreamConnector>,
    settings: BridgeSettings,
    shutdown: ShutdownSignal,
    guard: ConnectionGuard,
}

impl WebSocketBridge {
    pub fn new(
        url: String,
        headers: HeaderMap,
        connector: Arc<dyn UpstreamConnector>,
        settings: BridgeSettings,
        shutdown: ShutdownSignal,
        guard: ConnectionGuard,
    ) -> Self {
        Self {
            url,
            headers,
            connector,
            settings,
            shutdown,
            guard,
        }
    }

    /// Run until the local session closes or shutdown is signalled.
    pub async fn run(mut self, socket: WebSocket) {
        let id = self.guard.id();
        let mut local = LocalSocket::new(socket, self.settings.max_pending_frames, id);
        let mut policy = ReconnectPolicy::new(
            self.settings.reconnect_initial,
            self.settings.reconnect_max,
            self.settings.reset_backoff_on_connect,
        );

        metrics::ws_session_opened();
        let mut state = BridgeState::AwaitingLocalUpgrade;

        loop {
            let event = match state {
                BridgeState::AwaitingLocalUpgrade => BridgeEvent::Upgraded,
                BridgeState::Bridging => self.bridge_once(&mut local, &mut policy).await,
                BridgeState::Reconnecting => {
                    let delay = policy.next_delay();
                    tracing::warn!(
                        connection_id = %id,
                        delay_ms = delay.as_millis() as u64,
                        attempt = policy.attempt(),
                        "Upstream dropped; reconnecting"
                    );
                    metrics::record_reconnect();
                    let signal = &mut self.shutdown;
                    let wait = async {
                        tokio::select! {
                            _ = tokio::time::sleep(delay) => BridgeEvent::BackoffElapsed,
                            _ = signal.triggered() => BridgeEvent::LocalClosed,
                        }
                    };
                    local.detached(wait).await.unwrap_or(BridgeEvent::LocalClosed)
                }
                BridgeState::Closed => break,
            };
            state = state.on(event);
        }

        local.close().await;
        metrics::ws_session_closed();
        tracing::info!(connection_id = %id, "WebSocket bridge closed");
    }

    /// One `Bridging` pass: connect, relay, always close the upstream.
    async fn bridge_once(&mut self, local: &mut LocalSocket, policy: &mut ReconnectPolicy) -> BridgeEvent {
        let id = self.guard.id();
        if !local.is_open() {
            return BridgeEvent::LocalClosed;
        }

        tracing::info!(connection_id = %id, upstream = %self.url, "Connecting upstream");
        let connect = self.connector.connect(self.url.clone(), self.headers.clone());
        let signal = &mut self.shutdown;
        let attempt = async {
            tokio::select! {
                result = connect => Some(result),
                _ = signal.triggered() => None,
            }
        };

        let socket = match local.detached(attempt).await {
            None | Some(None) => return BridgeEvent::LocalClosed,
            Some(Some(Err(e))) => {
                metrics::record_upstream_connect(false);
                tracing::warn!(connection_id = %id, upstream = %self.url, error = %e, "Upstream connect failed");
                return BridgeEvent::SessionEnded { local_open: true };
            }
            Some(Some(Ok(socket))) => socket,
        };

        metrics::record_upstream_connect(true);
        tracing::info!(connection_id = %id, upstream = %self.url, "Upstream connected");
        policy.on_connected();

        let mut session = RelaySession::new(socket, id);
        let event = tokio::select! {
            end = session.run(local, self.settings.heartbeat) => {
                tracing::debug!(connection_id = %id, ?end, "Relay session ended");
                BridgeEvent::SessionEnded { local_open: end.local_open() }
            }
            _ = self.shutdown.triggered() => BridgeEvent::LocalClosed,
        };
        session.close().await;
        event
    }
}
