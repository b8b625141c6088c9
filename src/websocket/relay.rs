//! One relay session: a local WebSocket paired with one upstream WebSocket.
//!
//! Two flows run concurrently (local→upstream and upstream→local). The
//! session ends as soon as either flow ends; the other one is dropped at its
//! current await point. Text and binary frames are forwarded in order.
//! A local close frame goes upstream and ends the bridge. An upstream close
//! frame is not forwarded: it ends only the session and the bridge
//! reconnects. Ping/pong stays on its own leg.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{self, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::time::{Instant, Interval};
use tokio_tungstenite::tungstenite::{self, protocol::CloseFrame as UpstreamCloseFrame};

use crate::net::ConnectionId;
use crate::observability::metrics;
use crate::upstream::UpstreamSocket;

type UpstreamMessage = tungstenite::Message;

/// Upper bound on the closing handshake with either side.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Why a relay session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayEnd {
    /// The local client closed, errored or went away.
    LocalClosed,
    /// The upstream sent a close frame. The local client is not told.
    UpstreamClosed,
    /// The upstream dropped, errored or stopped answering heartbeats.
    UpstreamLost,
}

impl RelayEnd {
    /// Whether the local session survives this ending.
    pub fn local_open(self) -> bool {
        self != RelayEnd::LocalClosed
    }
}

/// Convert a local frame for the upstream leg. Ping/pong yield `None`.
pub fn to_upstream(msg: ws::Message) -> Option<UpstreamMessage> {
    match msg {
        ws::Message::Text(text) => Some(UpstreamMessage::Text(text.as_str().into())),
        ws::Message::Binary(data) => Some(UpstreamMessage::Binary(data)),
        ws::Message::Close(frame) => Some(UpstreamMessage::Close(frame.map(|f| {
            UpstreamCloseFrame {
                code: f.code.into(),
                reason: f.reason.as_str().into(),
            }
        }))),
        ws::Message::Ping(_) | ws::Message::Pong(_) => None,
    }
}

/// Convert an upstream frame for the local leg. Only text and binary
/// frames cross.
pub fn to_local(msg: UpstreamMessage) -> Option<ws::Message> {
    match msg {
        UpstreamMessage::Text(text) => Some(ws::Message::Text(text.as_str().into())),
        UpstreamMessage::Binary(data) => Some(ws::Message::Binary(data)),
        UpstreamMessage::Close(_)
        | UpstreamMessage::Ping(_)
        | UpstreamMessage::Pong(_)
        | UpstreamMessage::Frame(_) => None,
    }
}

/// Frames received while no upstream session was live.
///
/// Holds at most `max` frames; a full queue drops its oldest frame.
/// `max == 0` disables queuing.
#[derive(Debug)]
struct PendingFrames {
    frames: VecDeque<UpstreamMessage>,
    max: usize,
}

impl PendingFrames {
    fn new(max: usize) -> Self {
        Self {
            frames: VecDeque::new(),
            max,
        }
    }

    /// Queue `msg`. Returns the frame evicted to make room, if any.
    fn push(&mut self, msg: UpstreamMessage) -> Option<UpstreamMessage> {
        if self.max == 0 {
            return Some(msg);
        }
        let evicted = if self.frames.len() >= self.max {
            self.frames.pop_front()
        } else {
            None
        };
        self.frames.push_back(msg);
        evicted
    }

    fn pop_front(&mut self) -> Option<UpstreamMessage> {
        self.frames.pop_front()
    }
}

/// The local half of a bridge, reused across relay sessions.
pub struct LocalSocket {
    tx: SplitSink<WebSocket, ws::Message>,
    rx: SplitStream<WebSocket>,
    open: bool,
    pending: PendingFrames,
    id: ConnectionId,
}

impl LocalSocket {
    pub fn new(socket: WebSocket, max_pending: usize, id: ConnectionId) -> Self {
        let (tx, rx) = socket.split();
        Self {
            tx,
            rx,
            open: true,
            pending: PendingFrames::new(max_pending),
            id,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Drive `fut` to completion while no relay session is running.
    ///
    /// Local frames arriving meanwhile are queued for the next session.
    /// Returns `None` as soon as the local side closes; `fut` is dropped.
    pub async fn detached<F: std::future::Future>(&mut self, fut: F) -> Option<F::Output> {
        tokio::pin!(fut);
        loop {
            tokio::select! {
                out = &mut fut => return Some(out),
                msg = self.rx.next() => match msg {
                    Some(Ok(ws::Message::Close(_))) | None => {
                        tracing::debug!(connection_id = %self.id, "Local closed while detached");
                        self.open = false;
                        return None;
                    }
                    Some(Ok(msg)) => self.queue(msg),
                    Some(Err(e)) => {
                        tracing::warn!(connection_id = %self.id, error = %e, "Local read error while detached");
                        self.open = false;
                        return None;
                    }
                },
            }
        }
    }

    fn queue(&mut self, msg: ws::Message) {
        let Some(msg) = to_upstream(msg) else { return };
        if let Some(dropped) = self.pending.push(msg) {
            tracing::warn!(
                connection_id = %self.id,
                max_pending = self.pending.max,
                dropped_bytes = dropped.len(),
                "Pending frame queue full, dropping oldest"
            );
        }
    }

    /// Close the local session. Idempotent.
    pub async fn close(&mut self) {
        self.open = false;
        let _ = tokio::time::timeout(CLOSE_TIMEOUT, self.tx.close()).await;
    }
}

/// A live pairing of the local socket with one upstream connection.
pub struct RelaySession {
    tx: SplitSink<UpstreamSocket, UpstreamMessage>,
    rx: SplitStream<UpstreamSocket>,
    /// A close frame has already gone upstream.
    close_sent: bool,
    id: ConnectionId,
}

impl RelaySession {
    pub fn new(socket: UpstreamSocket, id: ConnectionId) -> Self {
        let (tx, rx) = socket.split();
        Self {
            tx,
            rx,
            close_sent: false,
            id,
        }
    }

    /// Relay until either direction ends. `heartbeat` pings the upstream;
    /// an unanswered ping after one full interval ends the session.
    pub async fn run(&mut self, local: &mut LocalSocket, heartbeat: Option<Duration>) -> RelayEnd {
        let id = self.id;
        let awaiting_pong = AtomicBool::new(false);

        // Frames queued while detached go first, in arrival order.
        while let Some(msg) = local.pending.pop_front() {
            if let Err(e) = self.tx.send(msg).await {
                tracing::warn!(connection_id = %id, error = %e, "Failed to flush pending frames");
                return RelayEnd::UpstreamLost;
            }
        }

        let local_to_upstream = local_to_upstream(
            &mut local.rx,
            &mut self.tx,
            &mut self.close_sent,
            heartbeat,
            &awaiting_pong,
            id,
        );
        let upstream_to_local = upstream_to_local(&mut self.rx, &mut local.tx, &awaiting_pong, id);

        let end = tokio::select! {
            end = local_to_upstream => end,
            end = upstream_to_local => end,
        };

        if !end.local_open() {
            local.open = false;
        }
        end
    }

    /// Close the upstream connection. Sends at most one close frame.
    pub async fn close(mut self) {
        if !self.close_sent {
            self.close_sent = true;
            if let Ok(Err(e)) = tokio::time::timeout(CLOSE_TIMEOUT, self.tx.close()).await {
                tracing::debug!(connection_id = %self.id, error = %e, "Upstream close failed");
            }
        }
        tracing::debug!(connection_id = %self.id, "Upstream session closed");
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

async fn local_to_upstream(
    local: &mut SplitStream<WebSocket>,
    upstream: &mut SplitSink<UpstreamSocket, UpstreamMessage>,
    close_sent: &mut bool,
    heartbeat: Option<Duration>,
    awaiting_pong: &AtomicBool,
    id: ConnectionId,
) -> RelayEnd {
    let mut ticker = heartbeat.map(|period| tokio::time::interval_at(Instant::now() + period, period));

    loop {
        tokio::select! {
            msg = local.next() => match msg {
                Some(Ok(msg)) => {
                    let is_close = matches!(msg, ws::Message::Close(_));
                    let Some(out) = to_upstream(msg) else { continue };
                    if is_close {
                        tracing::info!(connection_id = %id, direction = "local->upstream", "Close received");
                        *close_sent = true;
                        let _ = tokio::time::timeout(CLOSE_TIMEOUT, upstream.send(out)).await;
                        return RelayEnd::LocalClosed;
                    }
                    if let Err(e) = upstream.send(out).await {
                        tracing::warn!(connection_id = %id, direction = "local->upstream", error = %e, "Send failed");
                        return RelayEnd::UpstreamLost;
                    }
                    metrics::record_frame("local->upstream");
                }
                Some(Err(e)) => {
                    tracing::warn!(connection_id = %id, direction = "local->upstream", error = %e, "Read error");
                    return RelayEnd::LocalClosed;
                }
                None => return RelayEnd::LocalClosed,
            },
            _ = next_tick(&mut ticker) => {
                if awaiting_pong.swap(true, Ordering::SeqCst) {
                    tracing::warn!(connection_id = %id, "Upstream heartbeat timed out");
                    return RelayEnd::UpstreamLost;
                }
                if let Err(e) = upstream.send(UpstreamMessage::Ping(Default::default())).await {
                    tracing::warn!(connection_id = %id, error = %e, "Heartbeat ping failed");
                    return RelayEnd::UpstreamLost;
                }
            }
        }
    }
}

async fn upstream_to_local(
    upstream: &mut SplitStream<UpstreamSocket>,
    local: &mut SplitSink<WebSocket, ws::Message>,
    awaiting_pong: &AtomicBool,
    id: ConnectionId,
) -> RelayEnd {
    while let Some(msg) = upstream.next().await {
        match msg {
            Ok(UpstreamMessage::Pong(_)) => awaiting_pong.store(false, Ordering::SeqCst),
            Ok(UpstreamMessage::Close(frame)) => {
                // The local client stays attached; the bridge reconnects.
                tracing::info!(
                    connection_id = %id,
                    direction = "upstream->local",
                    close = ?frame,
                    "Upstream closed session"
                );
                return RelayEnd::UpstreamClosed;
            }
            Ok(msg) => {
                let Some(out) = to_local(msg) else { continue };
                if let Err(e) = local.send(out).await {
                    tracing::warn!(connection_id = %id, direction = "upstream->local", error = %e, "Send failed");
                    return RelayEnd::LocalClosed;
                }
                metrics::record_frame("upstream->local");
            }
            Err(e) => {
                tracing::warn!(connection_id = %id, direction = "upstream->local", error = %e, "Read error");
                return RelayEnd::UpstreamLost;
            }
        }
    }
    tracing::warn!(connection_id = %id, direction = "upstream->local", "Upstream stream ended");
    RelayEnd::UpstreamLost
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

    #[test]
    fn data_frames_cross_both_ways() {
        let up = to_upstream(ws::Message::Text("ping".into())).unwrap();
        assert_eq!(up, UpstreamMessage::Text("ping".into()));

        let local = to_local(UpstreamMessage::Binary(vec![1u8, 2, 3].into())).unwrap();
        assert!(matches!(local, ws::Message::Binary(ref b) if b.as_ref() == [1, 2, 3]));
    }

    #[test]
    fn control_frames_stay_on_their_leg() {
        assert!(to_upstream(ws::Message::Ping(Default::default())).is_none());
        assert!(to_upstream(ws::Message::Pong(Default::default())).is_none());
        assert!(to_local(UpstreamMessage::Ping(Default::default())).is_none());
        assert!(to_local(UpstreamMessage::Pong(Default::default())).is_none());
        assert!(to_local(UpstreamMessage::Close(None)).is_none());
    }

    #[test]
    fn close_frames_keep_code_and_reason() {
        let up = to_upstream(ws::Message::Close(Some(ws::CloseFrame {
            code: 1001,
            reason: "bye".into(),
        })))
        .unwrap();
        match up {
            UpstreamMessage::Close(Some(frame)) => {
                assert_eq!(frame.code, CloseCode::Away);
                assert_eq!(frame.reason.as_str(), "bye");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn only_local_close_ends_the_bridge() {
        assert!(RelayEnd::UpstreamLost.local_open());
        assert!(RelayEnd::UpstreamClosed.local_open());
        assert!(!RelayEnd::LocalClosed.local_open());
    }

    #[test]
    fn pending_frames_evict_oldest_when_full() {
        let mut pending = PendingFrames::new(2);
        assert!(pending.push(UpstreamMessage::text("a")).is_none());
        assert!(pending.push(UpstreamMessage::text("b")).is_none());

        let evicted = pending.push(UpstreamMessage::text("cc")).unwrap();
        assert_eq!(evicted, UpstreamMessage::text("a"));

        assert_eq!(pending.pop_front(), Some(UpstreamMessage::text("b")));
        assert_eq!(pending.pop_front(), Some(UpstreamMessage::text("cc")));
        assert_eq!(pending.pop_front(), None);
    }

    #[test]
    fn zero_capacity_queues_nothing() {
        let mut pending = PendingFrames::new(0);
        assert_eq!(pending.push(UpstreamMessage::text("a")), Some(UpstreamMessage::text("a")));
        assert_eq!(pending.pop_front(), None);
    }
}
