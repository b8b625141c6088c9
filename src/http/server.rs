//! HTTP server setup and request dispatch.
//!
//! # Responsibilities
//! - Build the shared upstream clients once and inject them into handlers
//! - Create the Axum Router with a single catch-all handler
//! - Dispatch WebSocket upgrades to the bridge, everything else to the HTTP bridge
//! - Serve until the shutdown signal fires

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, FromRequestParts, State, WebSocketUpgrade},
    http::{header, request::Parts, HeaderMap, Request},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::http::content_type::JsonPathMatcher;
use crate::http::headers::rewrite_request_headers;
use crate::http::proxy;
use crate::lifecycle::Shutdown;
use crate::net::ConnectionTracker;
use crate::observability::metrics;
use crate::upstream::{build_http_client, TungsteniteConnector, UpstreamConnector, UpstreamTarget};
use crate::websocket::{BridgeSettings, WebSocketBridge};

/// Application state injected into handlers.
///
/// Everything here is built once at startup and only read afterwards.
#[derive(Clone)]
pub struct AppState {
    pub target: Arc<UpstreamTarget>,
    pub client: reqwest::Client,
    pub connector: Arc<dyn UpstreamConnector>,
    pub json_paths: Arc<JsonPathMatcher>,
    pub bridge_settings: BridgeSettings,
    pub max_body_size: usize,
    pub shutdown: Shutdown,
    pub connections: ConnectionTracker,
}

/// HTTP/WebSocket server for the shim.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    shutdown: Shutdown,
    connections: ConnectionTracker,
}

impl HttpServer {
    /// Create a server using the default `tokio-tungstenite` connector.
    pub fn new(config: ProxyConfig, shutdown: Shutdown) -> Result<Self, ProxyError> {
        let connector = Arc::new(TungsteniteConnector::new(Duration::from_secs(
            config.upstream.connect_timeout_secs,
        )));
        Self::with_connector(config, shutdown, connector)
    }

    /// Create a server with a caller-supplied WebSocket connector.
    pub fn with_connector(
        config: ProxyConfig,
        shutdown: Shutdown,
        connector: Arc<dyn UpstreamConnector>,
    ) -> Result<Self, ProxyError> {
        let target = Arc::new(UpstreamTarget::parse(&config.upstream.base_url)?);
        let client = build_http_client(&config.upstream)?;
        let connections = ConnectionTracker::new();

        let state = AppState {
            target,
            client,
            connector,
            json_paths: Arc::new(JsonPathMatcher::new(
                config.content_type.json_path_prefixes.clone(),
            )),
            bridge_settings: BridgeSettings::from(&config.websocket),
            max_body_size: config.limits.max_body_size,
            shutdown: shutdown.clone(),
            connections: connections.clone(),
        };

        Ok(Self {
            router: Self::build_router(state),
            config,
            shutdown,
            connections,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(dispatch))
            .route("/", any(dispatch))
            .with_state(state)
            .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
    }

    /// Run the server, accepting connections on the given listener until
    /// shutdown is triggered.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.base_url,
            "HTTP server starting"
        );

        let mut signal = self.shutdown.subscribe();
        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { signal.triggered().await })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Live WebSocket bridges.
    pub fn connections(&self) -> ConnectionTracker {
        self.connections.clone()
    }

}

/// True for `Upgrade: websocket` (case-insensitive).
pub fn is_websocket_upgrade(headers: &HeaderMap) -> bool {
    headers
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("websocket"))
}

/// Catch-all handler: routes upgrades to the WebSocket bridge and every
/// other request to the HTTP bridge.
async fn dispatch(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    tracing::debug!(
        peer = %peer,
        method = %request.method(),
        path = %request.uri(),
        "Incoming request"
    );

    if is_websocket_upgrade(request.headers()) {
        let (mut parts, _body) = request.into_parts();
        return match WebSocketUpgrade::from_request_parts(&mut parts, &state).await {
            Ok(upgrade) => upgrade_websocket(state, parts, upgrade),
            Err(rejection) => {
                tracing::warn!(peer = %peer, "Rejected WebSocket upgrade: {}", rejection.body_text());
                rejection.into_response()
            }
        };
    }

    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let response = match proxy::forward(&state, request).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(method = %method, path = %path, error = %e, "Upstream error");
            e.into_response()
        }
    };
    metrics::record_request(method.as_str(), response.status().as_u16(), start);
    response
}

fn upgrade_websocket(state: AppState, parts: Parts, upgrade: WebSocketUpgrade) -> Response {
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let url = state.target.ws_url(path_and_query);
    let headers = rewrite_request_headers(&parts.headers, &state.target);
    let guard = state.connections.track();

    tracing::info!(connection_id = %guard.id(), path = %path_and_query, upstream = %url, "WebSocket incoming");

    let bridge = WebSocketBridge::new(
        url,
        headers,
        Arc::clone(&state.connector),
        state.bridge_settings.clone(),
        state.shutdown.subscribe(),
        guard,
    );

    upgrade
        .max_message_size(usize::MAX)
        .max_frame_size(usize::MAX)
        .on_failed_upgrade(|e| tracing::warn!(error = %e, "Local WebSocket upgrade failed"))
        .on_upgrade(move |socket| bridge.run(socket))
}
