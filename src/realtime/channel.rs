// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Realtime channel manager.
//!
//! Owns the single process-wide connection to the realtime server. The
//! session store drives `connect`/`disconnect`; views only subscribe and
//! emit. Every operation other than `connect` is a no-op when no stream
//! is live, so callers never have to check connection state first.

use dashmap::DashMap;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::{Message, Task};
use crate::realtime::protocol::{Packet, ENGINE_IO_VERSION};
use crate::realtime::{EventKind, SubscriptionId};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, WsMessage>;
type WsSource = SplitStream<WsStream>;

const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// Receiver side of a push subscription.
enum Handler {
    Message(mpsc::UnboundedSender<Message>),
    Task(mpsc::UnboundedSender<Task>),
}

impl Handler {
    fn is_closed(&self) -> bool {
        match self {
            Handler::Message(tx) => tx.is_closed(),
            Handler::Task(tx) => tx.is_closed(),
        }
    }
}

/// One live socket. Handlers belong to the socket and die with it.
struct Link {
    token: String,
    outbound: mpsc::UnboundedSender<Packet>,
    handlers: DashMap<EventKind, (SubscriptionId, Handler)>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Link {
    fn is_alive(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    fn emit(&self, packet: Packet) {
        if self.outbound.send(packet).is_err() {
            tracing::debug!("Realtime emit dropped: writer already stopped");
        }
    }
}

/// Process-wide realtime channel manager.
pub struct RealtimeChannel {
    socket_url: String,
    handshake_timeout: Duration,
    /// Serializes connect/disconnect so two sockets are never live at once.
    lifecycle: Mutex<()>,
    live: watch::Sender<Option<Arc<Link>>>,
    next_subscription: AtomicU64,
}

impl RealtimeChannel {
    pub fn new(config: &Config) -> Self {
        let (live, _) = watch::channel(None);
        Self {
            socket_url: config.socket_url.clone(),
            handshake_timeout: config.handshake_timeout,
            lifecycle: Mutex::new(()),
            live,
            next_subscription: AtomicU64::new(1),
        }
    }

    /// Open the channel authenticated by `token`.
    ///
    /// No-op when already connected with the same token. A different token
    /// tears the current socket down before the new one is opened. Failures
    /// are returned, never retried.
    pub async fn connect(&self, token: &str) -> Result<()> {
        let _guard = self.lifecycle.lock().await;

        if let Some(link) = self.current() {
            if link.is_alive() && link.token == token {
                tracing::debug!("Realtime channel already connected");
                return Ok(());
            }
            tracing::info!("Rekeying realtime channel");
            self.live.send_replace(None);
            teardown(&link).await;
        }

        let link = self.open(token).await.inspect_err(|e| {
            tracing::warn!(error = %e, "Realtime channel connection failed");
        })?;
        self.live.send_replace(Some(link));
        Ok(())
    }

    /// Tear down the current socket, if any.
    pub async fn disconnect(&self) {
        let _guard = self.lifecycle.lock().await;
        if let Some(link) = self.live.send_replace(None) {
            teardown(&link).await;
            tracing::info!("Realtime channel closed");
        }
    }

    /// Whether a live socket exists.
    pub fn is_connected(&self) -> bool {
        self.current().is_some_and(|link| link.is_alive())
    }

    /// Token of the live socket.
    pub fn token(&self) -> Option<String> {
        self.current()
            .filter(|link| link.is_alive())
            .map(|link| link.token.clone())
    }

    // ─── Room Membership & Emits ─────────────────────────────────

    /// Fire-and-forget `join-team`.
    pub fn join_team(&self, team_id: &str) {
        self.emit(Packet::event("join-team", json!(team_id)));
    }

    /// Fire-and-forget `leave-team`.
    pub fn leave_team(&self, team_id: &str) {
        self.emit(Packet::event("leave-team", json!(team_id)));
    }

    /// Fire-and-forget `send-message`.
    pub fn send_message(&self, team_id: &str, message: &str) {
        self.emit(Packet::event(
            "send-message",
            json!({ "teamId": team_id, "message": message }),
        ));
    }

    // ─── Push Subscriptions ──────────────────────────────────────

    /// Route `new-message` events into `sink`, replacing any prior handler.
    ///
    /// Returns `None` (and registers nothing) when no stream is live.
    pub fn on_message(&self, sink: mpsc::UnboundedSender<Message>) -> Option<SubscriptionId> {
        self.register(EventKind::NewMessage, Handler::Message(sink))
    }

    /// Route `task-updated` events into `sink`, replacing any prior handler.
    pub fn on_task_update(&self, sink: mpsc::UnboundedSender<Task>) -> Option<SubscriptionId> {
        self.register(EventKind::TaskUpdated, Handler::Task(sink))
    }

    pub fn off_message(&self) {
        self.unregister(EventKind::NewMessage);
    }

    pub fn off_task_update(&self) {
        self.unregister(EventKind::TaskUpdated);
    }

    /// Whether a handler is registered for `kind` on the live socket.
    pub fn has_handler(&self, kind: EventKind) -> bool {
        self.live_link()
            .is_some_and(|link| link.handlers.contains_key(&kind))
    }

    /// Remove the handler registered under `id`, if it is still the active
    /// one. Returns whether it was.
    pub fn release(&self, id: SubscriptionId) -> bool {
        let Some(link) = self.live_link() else {
            return false;
        };
        link.handlers.remove_if(&id.kind, |_, (active, _)| *active == id).is_some()
    }

    fn register(&self, kind: EventKind, handler: Handler) -> Option<SubscriptionId> {
        let Some(link) = self.live_link() else {
            tracing::debug!(event = kind.as_str(), "No realtime channel; handler not registered");
            return None;
        };
        let id = SubscriptionId {
            kind,
            seq: self.next_subscription.fetch_add(1, Ordering::Relaxed),
        };
        if link.handlers.insert(kind, (id, handler)).is_some() {
            tracing::warn!(event = kind.as_str(), "Replaced existing realtime handler");
        }
        Some(id)
    }

    fn unregister(&self, kind: EventKind) {
        if let Some(link) = self.live_link() {
            link.handlers.remove(&kind);
        }
    }

    fn emit(&self, packet: Packet) {
        match self.live_link() {
            Some(link) => link.emit(packet),
            None => tracing::debug!("No realtime channel; emit skipped"),
        }
    }

    fn current(&self) -> Option<Arc<Link>> {
        self.live.borrow().clone()
    }

    fn live_link(&self) -> Option<Arc<Link>> {
        self.current().filter(|link| link.is_alive())
    }

    // ─── Connection Setup ────────────────────────────────────────

    async fn open(&self, token: &str) -> Result<Arc<Link>> {
        let url = format!(
            "{}/socket.io/?EIO={}&transport=websocket",
            self.socket_url, ENGINE_IO_VERSION
        );

        let (ws, _) = tokio::time::timeout(self.handshake_timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| AppError::Channel("connection timed out".to_string()))?
            .map_err(|e| AppError::Channel(e.to_string()))?;

        let (mut sink, mut source) = ws.split();

        let sid = tokio::time::timeout(
            self.handshake_timeout,
            handshake(&mut sink, &mut source, token),
        )
        .await
        .map_err(|_| AppError::Channel("handshake timed out".to_string()))??;

        tracing::info!(sid = %sid, "Realtime channel connected");

        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let link = Arc::new(Link {
            token: token.to_string(),
            outbound,
            handlers: DashMap::new(),
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
        });

        let handle = tokio::spawn(run_link(link.clone(), sink, source, outbound_rx));
        *link.task.lock().await = Some(handle);
        Ok(link)
    }
}

/// Engine.IO open, then namespace connect authenticated by `token`.
async fn handshake(sink: &mut WsSink, source: &mut WsSource, token: &str) -> Result<String> {
    match next_packet(source).await? {
        Packet::Open(open) => {
            tracing::debug!(sid = %open.sid, ping_interval = open.ping_interval, "Transport open");
        }
        other => {
            return Err(AppError::Channel(format!(
                "expected open packet, got {other:?}"
            )))
        }
    }

    send_packet(sink, &Packet::Connect(Some(json!({ "token": token })))).await?;

    loop {
        match next_packet(source).await? {
            Packet::Connect(payload) => {
                let sid = payload
                    .as_ref()
                    .and_then(|p| p.get("sid"))
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                return Ok(sid);
            }
            Packet::ConnectError(message) => return Err(AppError::Channel(message)),
            Packet::Ping => send_packet(sink, &Packet::Pong).await?,
            Packet::Noop => {}
            other => {
                return Err(AppError::Channel(format!(
                    "unexpected packet during handshake: {other:?}"
                )))
            }
        }
    }
}

async fn next_packet(source: &mut WsSource) -> Result<Packet> {
    loop {
        match source.next().await {
            Some(Ok(WsMessage::Text(text))) => {
                return Packet::decode(text.as_str()).map_err(|e| AppError::Channel(e.to_string()))
            }
            Some(Ok(WsMessage::Close(_))) | None => {
                return Err(AppError::Channel("connection closed during handshake".to_string()))
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(AppError::Channel(e.to_string())),
        }
    }
}

async fn send_packet(sink: &mut WsSink, packet: &Packet) -> Result<()> {
    sink.send(WsMessage::text(packet.encode()))
        .await
        .map_err(|e| AppError::Channel(e.to_string()))
}

/// Cancel the socket's I/O task and wait briefly for it to say goodbye.
async fn teardown(link: &Link) {
    link.cancel.cancel();
    let handle = link.task.lock().await.take();
    if let Some(handle) = handle {
        if tokio::time::timeout(TEARDOWN_TIMEOUT, handle).await.is_err() {
            tracing::warn!("Realtime I/O task did not stop in time");
        }
    }
}

/// Per-socket I/O loop: writes emits, answers heartbeats, dispatches events.
async fn run_link(
    link: Arc<Link>,
    mut sink: WsSink,
    mut source: WsSource,
    mut outbound: mpsc::UnboundedReceiver<Packet>,
) {
    loop {
        tokio::select! {
            _ = link.cancel.cancelled() => {
                let _ = send_packet(&mut sink, &Packet::Disconnect).await;
                let _ = sink.close().await;
                break;
            }
            Some(packet) = outbound.recv() => {
                if let Err(e) = send_packet(&mut sink, &packet).await {
                    tracing::warn!(error = %e, "Realtime write failed");
                    break;
                }
            }
            frame = source.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => {
                    match Packet::decode(text.as_str()) {
                        Ok(Packet::Ping) => {
                            if send_packet(&mut sink, &Packet::Pong).await.is_err() {
                                break;
                            }
                        }
                        Ok(Packet::Event { name, data }) => dispatch(&link, &name, data),
                        Ok(Packet::Disconnect) | Ok(Packet::Close) => {
                            tracing::info!("Realtime channel disconnected by server");
                            break;
                        }
                        Ok(other) => tracing::trace!(packet = ?other, "Ignoring realtime packet"),
                        Err(e) => tracing::warn!(error = %e, "Undecodable realtime frame"),
                    }
                }
                Some(Ok(WsMessage::Close(_))) | None => {
                    tracing::info!("Realtime channel disconnected");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "Realtime transport error");
                    break;
                }
            }
        }
    }
    link.cancel.cancel();
}

fn dispatch(link: &Link, name: &str, data: Value) {
    let Some(kind) = EventKind::from_wire(name) else {
        if name == "error" {
            tracing::error!(error = %data, "Realtime server error");
        } else {
            tracing::debug!(event = name, "Unhandled realtime event");
        }
        return;
    };

    let Some(handler) = link.handlers.get(&kind) else {
        tracing::trace!(event = name, "No handler registered");
        return;
    };

    let delivered = match &handler.1 {
        Handler::Message(tx) => match serde_json::from_value::<Message>(data) {
            Ok(message) => tx.send(message).is_ok(),
            Err(e) => {
                tracing::warn!(error = %e, "Malformed new-message payload");
                true
            }
        },
        Handler::Task(tx) => match serde_json::from_value::<Task>(data) {
            Ok(task) => tx.send(task).is_ok(),
            Err(e) => {
                tracing::warn!(error = %e, "Malformed task-updated payload");
                true
            }
        },
    };
    drop(handler);

    if !delivered {
        tracing::debug!(event = name, "Handler receiver gone; unregistering");
        link.handlers.remove_if(&kind, |_, (_, h)| h.is_closed());
    }
}
