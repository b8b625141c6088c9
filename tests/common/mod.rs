//! Shared utilities for integration tests: stub upstreams and a proxy launcher.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::body::{Body, Bytes};
use axum::http::{header, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use futures_util::future::BoxFuture;
use futures_util::{SinkExt, StreamExt};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::handshake::server::{Request as HsRequest, Response as HsResponse};
use tokio_tungstenite::tungstenite::Message;

use shim_proxy::config::ProxyConfig;
use shim_proxy::net::ConnectionTracker;
use shim_proxy::upstream::{TungsteniteConnector, UpstreamConnector, UpstreamSocket};
use shim_proxy::{HttpServer, ProxyError, Shutdown};

/// A running proxy under test.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub connections: ConnectionTracker,
}

impl Drop for TestProxy {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start the proxy in front of `upstream` with the default connector.
pub async fn start_proxy(upstream: &str, tweak: impl FnOnce(&mut ProxyConfig)) -> TestProxy {
    start_proxy_with(upstream, tweak, None).await
}

/// Start the proxy with an optional custom WebSocket connector.
pub async fn start_proxy_with(
    upstream: &str,
    tweak: impl FnOnce(&mut ProxyConfig),
    connector: Option<Arc<dyn UpstreamConnector>>,
) -> TestProxy {
    let mut config = ProxyConfig::default();
    config.upstream.base_url = upstream.to_string();
    config.websocket.heartbeat_secs = 0;
    tweak(&mut config);

    let shutdown = Shutdown::new();
    let server = match connector {
        Some(connector) => HttpServer::with_connector(config, shutdown.clone(), connector),
        None => HttpServer::new(config, shutdown.clone()),
    }
    .unwrap();
    let connections = server.connections();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = server.run(listener).await;
    });

    TestProxy {
        addr,
        shutdown,
        connections,
    }
}

/// An address nothing is listening on.
pub async fn dead_address() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

// ---------------------------------------------------------------------------
// HTTP stub upstream
// ---------------------------------------------------------------------------

/// Start an HTTP upstream that echoes `"<METHOD> <body>"` as a chunked
/// `text/plain` body and reports the `Host`/`Origin` it saw.
///
/// `/redirect` answers `302 Found` instead.
pub async fn start_http_upstream() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().fallback(echo_http);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

async fn echo_http(request: Request<Body>) -> Response {
    let (parts, body) = request.into_parts();
    if parts.uri.path() == "/redirect" {
        return (StatusCode::FOUND, [(header::LOCATION, "/elsewhere")]).into_response();
    }

    let body = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    let mut echoed = format!("{} ", parts.method).into_bytes();
    echoed.extend_from_slice(&body);

    let seen = |name: header::HeaderName| {
        parts
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string()
    };

    // A single-item stream forces chunked transfer encoding.
    let stream = futures_util::stream::iter(vec![Ok::<_, std::io::Error>(Bytes::from(echoed))]);
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain")
        .header(header::CONTENT_ENCODING, "identity")
        .header("x-seen-host", seen(header::HOST))
        .header("x-seen-origin", seen(header::ORIGIN))
        .header("x-seen-query", parts.uri.query().unwrap_or(""))
        .body(Body::from_stream(stream))
        .unwrap()
}

// ---------------------------------------------------------------------------
// WebSocket stub upstream
// ---------------------------------------------------------------------------

/// How the WebSocket stub behaves on each accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WsBehavior {
    /// Echo text frames uppercased, binary frames unchanged.
    EchoUpper,
    /// Echo the first frame uppercased, then drop the TCP connection
    /// without a closing handshake.
    DropAfterFirst,
    /// Echo the first frame uppercased, then drop the TCP connection; later
    /// connections behave like `EchoUpper`.
    DropFirstOnly,
    /// On the first connection, answer the first frame with a close frame;
    /// later connections behave like `EchoUpper`.
    CloseAfterFirst,
    /// On the first connection, complete the handshake and then never read,
    /// so pings go unanswered; later connections behave like `EchoUpper`.
    SilentFirst,
    /// On the first connection, read one frame and then write an invalid
    /// frame; later connections behave like `EchoUpper`.
    CorruptFirst,
}

/// Per-connection record kept by the stub.
#[derive(Debug, Clone, Default)]
pub struct WsConnectionLog {
    pub host: String,
    pub origin: String,
    pub path: String,
    /// Text frames received from the proxy, in order.
    pub received: Vec<String>,
    /// Close frames received from the proxy.
    pub closes_received: usize,
    pub ended: bool,
}

/// A running WebSocket stub upstream.
#[derive(Clone)]
pub struct WsUpstream {
    pub addr: SocketAddr,
    /// When each connection was accepted.
    pub accepts: Arc<Mutex<Vec<Instant>>>,
    /// When a connection was dropped by the stub.
    pub drops: Arc<Mutex<Vec<Instant>>>,
    pub connections: Arc<Mutex<Vec<WsConnectionLog>>>,
    /// Upstream sockets currently open.
    pub open: Arc<AtomicUsize>,
}

impl WsUpstream {
    pub fn accept_count(&self) -> usize {
        self.accepts.lock().unwrap().len()
    }

    pub fn open_count(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    /// Wait until at least `n` connections were accepted.
    pub async fn wait_for_accepts(&self, n: usize, within: Duration) -> bool {
        let deadline = Instant::now() + within;
        while Instant::now() < deadline {
            if self.accept_count() >= n {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    /// Wait until no upstream socket is open.
    pub async fn wait_for_idle(&self, within: Duration) -> bool {
        let deadline = Instant::now() + within;
        while Instant::now() < deadline {
            if self.open_count() == 0 {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }
}

pub async fn start_ws_upstream(behavior: WsBehavior) -> WsUpstream {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let upstream = WsUpstream {
        addr: listener.local_addr().unwrap(),
        accepts: Arc::new(Mutex::new(Vec::new())),
        drops: Arc::new(Mutex::new(Vec::new())),
        connections: Arc::new(Mutex::new(Vec::new())),
        open: Arc::new(AtomicUsize::new(0)),
    };

    let stub = upstream.clone();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let stub = stub.clone();
            tokio::spawn(async move {
                let index = {
                    let mut accepts = stub.accepts.lock().unwrap();
                    accepts.push(Instant::now());
                    accepts.len() - 1
                };
                stub.connections.lock().unwrap().push(WsConnectionLog::default());
                stub.open.fetch_add(1, Ordering::SeqCst);
                serve_ws(stream, behavior, index, &stub).await;
                stub.connections.lock().unwrap()[index].ended = true;
                stub.open.fetch_sub(1, Ordering::SeqCst);
            });
        }
    });

    upstream
}

async fn serve_ws(stream: tokio::net::TcpStream, behavior: WsBehavior, index: usize, stub: &WsUpstream) {
    let log = Arc::clone(&stub.connections);
    let callback = move |req: &HsRequest, response: HsResponse| {
        let get = |name: &str| {
            req.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string()
        };
        let mut log = log.lock().unwrap();
        log[index].host = get("host");
        log[index].origin = get("origin");
        log[index].path = req.uri().to_string();
        Ok(response)
    };

    let Ok(mut ws) = tokio_tungstenite::accept_hdr_async(stream, callback).await else {
        return;
    };

    if behavior == WsBehavior::SilentFirst && index == 0 {
        tokio::time::sleep(Duration::from_secs(10)).await;
        return;
    }

    let mut first = true;
    while let Some(Ok(msg)) = ws.next().await {
        match msg {
            Message::Close(_) => {
                stub.connections.lock().unwrap()[index].closes_received += 1;
                break;
            }
            Message::Text(text) => {
                stub.connections.lock().unwrap()[index]
                    .received
                    .push(text.as_str().to_string());
                if behavior == WsBehavior::CloseAfterFirst && first && index == 0 {
                    let _ = ws.send(Message::Close(None)).await;
                    let _ = tokio::time::timeout(Duration::from_secs(2), ws.next()).await;
                    return;
                }
                if behavior == WsBehavior::CorruptFirst && first && index == 0 {
                    // FIN + reserved opcode 0x3, zero length.
                    let _ = ws.get_mut().write_all(&[0x83, 0x00]).await;
                    first = false;
                    continue;
                }
                let _ = ws.send(Message::Text(text.as_str().to_uppercase().into())).await;
                let drop_now = match behavior {
                    WsBehavior::DropAfterFirst => true,
                    WsBehavior::DropFirstOnly => index == 0,
                    _ => false,
                };
                if drop_now {
                    let _ = ws.flush().await;
                    stub.drops.lock().unwrap().push(Instant::now());
                    return;
                }
            }
            Message::Binary(data) => {
                let _ = ws.send(Message::Binary(data)).await;
            }
            _ => {}
        }
        first = false;
    }
}

// ---------------------------------------------------------------------------
// Connector wrapper
// ---------------------------------------------------------------------------

/// Wraps the real connector and records when each attempt started.
pub struct CountingConnector {
    inner: TungsteniteConnector,
    pub attempts: Arc<Mutex<Vec<Instant>>>,
}

impl CountingConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: TungsteniteConnector::new(Duration::from_secs(2)),
            attempts: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }
}

impl UpstreamConnector for CountingConnector {
    fn connect(
        &self,
        url: String,
        headers: axum::http::HeaderMap,
    ) -> BoxFuture<'static, Result<UpstreamSocket, ProxyError>> {
        self.attempts.lock().unwrap().push(Instant::now());
        self.inner.connect(url, headers)
    }
}
