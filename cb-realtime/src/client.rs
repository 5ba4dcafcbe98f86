//! Realtime connection manager.
//!
//! Owns the websocket, the table of joined channels, and the heartbeat.
//! Outgoing frames are queued on an unbounded channel drained by the
//! connection task; incoming frames are routed by `handle_frame`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use cb_core::config::{BackendConfig, RealtimeConfig};
use cb_core::error::{CbError, CbResult};
use cb_core::token::AccessToken;

use crate::channel::{Binding, ChannelBuilder, ChannelEntry, ChannelState, PostgresChange, RealtimeChannel};
use crate::protocol::{self, events, ChangePayload, Frame, PHOENIX_TOPIC, TOPIC_PREFIX};

/// State of the websocket connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected.
    Disconnected,
    /// Opening the websocket.
    Connecting,
    /// Connected and routing frames.
    Connected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
        }
    }
}

struct Inner {
    /// Websocket URL; `None` for a detached client.
    url: Option<String>,
    token: AccessToken,
    heartbeat_interval: Duration,
    connect_timeout: Duration,
    outgoing_tx: mpsc::UnboundedSender<String>,
    /// Receiving half of the outgoing queue, held here while no connection task owns it.
    outgoing_rx: Mutex<Option<mpsc::UnboundedReceiver<String>>>,
    channels: Mutex<HashMap<String, ChannelEntry>>,
    next_ref: AtomicU64,
    state_tx: watch::Sender<ConnectionState>,
    /// Connection task and its shutdown signal.
    task: Mutex<Option<(JoinHandle<()>, oneshot::Sender<()>)>>,
}

/// Realtime client. Clones share one connection.
#[derive(Clone)]
pub struct RealtimeClient {
    inner: Arc<Inner>,
}

impl RealtimeClient {
    /// Create a client for the project in `backend`. Nothing is opened yet.
    pub fn new(
        backend: &BackendConfig,
        config: &RealtimeConfig,
        token: AccessToken,
    ) -> CbResult<Self> {
        let url = protocol::realtime_url(&backend.url, &backend.anon_key)?;
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        Ok(Self::build(Some(url), config, token, outgoing_tx, Some(outgoing_rx)))
    }

    /// Create a client without a network connection.
    ///
    /// Frames the client would send are delivered on the returned receiver;
    /// incoming frames are fed through `handle_frame`.
    pub fn detached(token: AccessToken) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let client = Self::build(None, &RealtimeConfig::default(), token, outgoing_tx, None);
        (client, outgoing_rx)
    }

    fn build(
        url: Option<String>,
        config: &RealtimeConfig,
        token: AccessToken,
        outgoing_tx: mpsc::UnboundedSender<String>,
        outgoing_rx: Option<mpsc::UnboundedReceiver<String>>,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(Inner {
                url,
                token,
                heartbeat_interval: Duration::from_millis(config.heartbeat_interval_ms.max(1)),
                connect_timeout: Duration::from_millis(config.connect_timeout_ms.max(1)),
                outgoing_tx,
                outgoing_rx: Mutex::new(outgoing_rx),
                channels: Mutex::new(HashMap::new()),
                next_ref: AtomicU64::new(1),
                state_tx,
                task: Mutex::new(None),
            }),
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.inner.state_tx.borrow()
    }

    /// Subscribe to connection state changes.
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    fn set_state(&self, new_state: ConnectionState) {
        let old = self.state();
        if old != new_state {
            info!("realtime state: {} -> {}", old, new_state);
            self.inner.state_tx.send_replace(new_state);
        }
    }

    fn make_ref(&self) -> String {
        self.inner.next_ref.fetch_add(1, Ordering::Relaxed).to_string()
    }

    /// Start building a channel named `name` (topic `realtime:<name>`).
    pub fn channel(&self, name: &str) -> ChannelBuilder {
        ChannelBuilder::new(self.clone(), name)
    }

    /// Open the websocket if it is not already open.
    pub async fn connect(&self) -> CbResult<()> {
        let mut task = self.inner.task.lock().await;
        if task.as_ref().is_some_and(|(t, _)| !t.is_finished()) {
            return Ok(());
        }

        let Some(url) = self.inner.url.clone() else {
            self.set_state(ConnectionState::Connected);
            return Ok(());
        };

        let Some(rx) = self.inner.outgoing_rx.lock().await.take() else {
            return Err(CbError::Internal("realtime outgoing queue unavailable".into()));
        };

        self.set_state(ConnectionState::Connecting);
        debug!("realtime connecting");
        let connect = tokio_tungstenite::connect_async(url.as_str());
        let stream = match tokio::time::timeout(self.inner.connect_timeout, connect).await {
            Ok(Ok((stream, _))) => stream,
            Ok(Err(e)) => {
                *self.inner.outgoing_rx.lock().await = Some(rx);
                self.set_state(ConnectionState::Disconnected);
                return Err(CbError::Realtime(format!("websocket connect failed: {e}")));
            }
            Err(_) => {
                *self.inner.outgoing_rx.lock().await = Some(rx);
                self.set_state(ConnectionState::Disconnected);
                return Err(CbError::Timeout("realtime connect".into()));
            }
        };

        self.set_state(ConnectionState::Connected);
        let client = self.clone();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(async move {
            client.run(stream, rx, shutdown_rx).await;
        });
        *task = Some((handle, shutdown_tx));
        Ok(())
    }

    /// Connection task: pump outgoing frames, route incoming ones, send heartbeats.
    async fn run<S>(
        &self,
        stream: tokio_tungstenite::WebSocketStream<S>,
        mut rx: mpsc::UnboundedReceiver<String>,
        mut shutdown: oneshot::Receiver<()>,
    ) where
        S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
    {
        let (mut sink, mut source) = stream.split();
        let mut heartbeat = tokio::time::interval(self.inner.heartbeat_interval);
        heartbeat.tick().await;

        loop {
            tokio::select! {
                outgoing = rx.recv() => {
                    let Some(text) = outgoing else { break };
                    if let Err(e) = sink.send(Message::Text(text.into())).await {
                        error!("realtime send failed: {e}");
                        break;
                    }
                }
                incoming = source.next() => {
                    match incoming {
                        Some(Ok(Message::Text(text))) => {
                            if let Err(e) = self.handle_frame(text.as_str()).await {
                                warn!("realtime frame dropped: {e}");
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            info!("realtime socket closed by server: {frame:?}");
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            error!("realtime socket error: {e}");
                            break;
                        }
                        None => break,
                    }
                }
                _ = heartbeat.tick() => {
                    let frame = Frame::heartbeat(self.make_ref());
                    match frame.encode() {
                        Ok(text) => {
                            if let Err(e) = sink.send(Message::Text(text.into())).await {
                                error!("realtime heartbeat failed: {e}");
                                break;
                            }
                        }
                        Err(e) => warn!("heartbeat encode failed: {e}"),
                    }
                }
                _ = &mut shutdown => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            }
        }

        *self.inner.outgoing_rx.lock().await = Some(rx);
        self.mark_all_closed().await;
        self.set_state(ConnectionState::Disconnected);
    }

    /// Close the websocket. Channels are marked closed but keep their listeners.
    pub async fn disconnect(&self) {
        let task = self.inner.task.lock().await.take();
        if let Some((handle, shutdown)) = task {
            let _ = shutdown.send(());
            let _ = handle.await;
        } else {
            self.mark_all_closed().await;
            self.set_state(ConnectionState::Disconnected);
        }
    }

    async fn mark_all_closed(&self) {
        let mut channels = self.inner.channels.lock().await;
        for entry in channels.values_mut() {
            entry.state = ChannelState::Closed;
        }
    }

    /// Queue a frame for sending.
    fn push(&self, frame: &Frame) -> CbResult<()> {
        let text = frame.encode()?;
        debug!("realtime -> {} {}", frame.topic, frame.event);
        self.inner
            .outgoing_tx
            .send(text)
            .map_err(|_| CbError::RealtimeDisconnected)
    }

    /// Register a channel and send its join.
    pub(crate) async fn join(&self, name: &str, bindings: Vec<Binding>) -> CbResult<RealtimeChannel> {
        let topic = format!("{TOPIC_PREFIX}{name}");
        let join_ref = self.make_ref();
        let filters: Vec<_> = bindings.iter().map(|b| b.filter.clone()).collect();

        self.inner.channels.lock().await.insert(
            join_ref.clone(),
            ChannelEntry {
                topic: topic.clone(),
                join_ref: join_ref.clone(),
                state: ChannelState::Joining,
                bindings,
            },
        );

        if let Err(e) = self.connect().await {
            self.inner.channels.lock().await.remove(&join_ref);
            return Err(e);
        }

        let token = self.inner.token.get().await;
        let frame = Frame::new(&topic, events::JOIN, protocol::join_payload(&filters, token.as_deref()))
            .with_ref(join_ref.clone())
            .with_join_ref(join_ref.clone());
        self.push(&frame)?;
        info!("joining {topic} with {} binding(s)", filters.len());

        Ok(RealtimeChannel {
            client: self.clone(),
            topic,
            join_ref,
        })
    }

    /// Leave a channel and drop its listeners.
    pub async fn remove_channel(&self, join_ref: &str) -> CbResult<()> {
        let Some(entry) = self.inner.channels.lock().await.remove(join_ref) else {
            return Ok(());
        };
        info!("leaving {}", entry.topic);

        if self.state() == ConnectionState::Connected && entry.state != ChannelState::Closed {
            let frame = Frame::new(&entry.topic, events::LEAVE, json!({}))
                .with_ref(self.make_ref())
                .with_join_ref(entry.join_ref.clone());
            self.push(&frame)?;
        }
        Ok(())
    }

    /// Number of registered channels.
    pub async fn channel_count(&self) -> usize {
        self.inner.channels.lock().await.len()
    }

    pub(crate) async fn channel_state(&self, join_ref: &str) -> Option<ChannelState> {
        self.inner.channels.lock().await.get(join_ref).map(|c| c.state)
    }

    /// Send the current access token to every open channel.
    pub async fn push_access_token(&self) -> CbResult<()> {
        let Some(token) = self.inner.token.get().await else {
            return Ok(());
        };
        if self.state() != ConnectionState::Connected {
            return Ok(());
        }
        let targets: Vec<(String, String)> = self
            .inner
            .channels
            .lock()
            .await
            .values()
            .filter(|c| matches!(c.state, ChannelState::Joining | ChannelState::Joined))
            .map(|c| (c.topic.clone(), c.join_ref.clone()))
            .collect();
        for (topic, join_ref) in targets {
            let frame = Frame::new(&topic, events::ACCESS_TOKEN, json!({ "access_token": token }))
                .with_ref(self.make_ref())
                .with_join_ref(join_ref);
            self.push(&frame)?;
        }
        Ok(())
    }

    /// Route one incoming frame.
    pub async fn handle_frame(&self, text: &str) -> CbResult<()> {
        let frame = Frame::decode(text)?;
        if frame.topic == PHOENIX_TOPIC {
            return Ok(());
        }

        match frame.event.as_str() {
            events::REPLY => self.handle_reply(&frame).await,
            events::POSTGRES_CHANGES => self.dispatch_change(&frame).await?,
            events::ERROR => {
                error!("channel {} errored: {}", frame.topic, frame.payload);
                self.set_channel_state(&frame, ChannelState::Errored).await;
            }
            events::CLOSE => {
                debug!("channel {} closed", frame.topic);
                self.set_channel_state(&frame, ChannelState::Closed).await;
            }
            events::SYSTEM => {
                if frame.reply_status() == Some("error") {
                    warn!("system message on {}: {}", frame.topic, frame.payload);
                } else {
                    debug!("system message on {}: {}", frame.topic, frame.payload);
                }
            }
            other => debug!("unhandled realtime event {other} on {}", frame.topic),
        }
        Ok(())
    }

    async fn handle_reply(&self, frame: &Frame) {
        let Some(reference) = frame.reference.as_deref() else {
            return;
        };
        let mut channels = self.inner.channels.lock().await;
        // Only join replies carry a ref equal to the channel's join_ref.
        let Some(entry) = channels.get_mut(reference) else {
            return;
        };
        if entry.topic != frame.topic {
            return;
        }

        match frame.reply_status() {
            Some("ok") => {
                entry.apply_ack(&protocol::acked_filters(&frame.payload));
                entry.state = ChannelState::Joined;
                info!("joined {}", entry.topic);
            }
            status => {
                entry.state = ChannelState::Errored;
                error!(
                    "join of {} rejected ({}): {}",
                    entry.topic,
                    status.unwrap_or("no status"),
                    frame.payload
                );
            }
        }
    }

    async fn dispatch_change(&self, frame: &Frame) -> CbResult<()> {
        let payload: ChangePayload = serde_json::from_value(frame.payload.clone())
            .map_err(|e| CbError::Realtime(format!("malformed change payload: {e}")))?;

        let callbacks: Vec<_> = {
            let channels = self.inner.channels.lock().await;
            channels
                .values()
                .filter(|c| c.topic == frame.topic && c.state != ChannelState::Closed)
                .filter(|c| frame.join_ref.as_deref().map_or(true, |r| r == c.join_ref))
                .flat_map(|c| c.bindings.iter())
                .filter(|b| b.matches(&payload.ids, &payload.data))
                .map(|b| b.callback.clone())
                .collect()
        };

        if callbacks.is_empty() {
            debug!("change on {} matched no binding", frame.topic);
            return Ok(());
        }

        let change = PostgresChange::from(payload.data);
        for callback in callbacks {
            (*callback)(&change);
        }
        Ok(())
    }

    async fn set_channel_state(&self, frame: &Frame, state: ChannelState) {
        // v1 frames carry the channel's join ref in `ref`.
        let join_ref = frame.join_ref.as_deref().or(frame.reference.as_deref());
        let mut channels = self.inner.channels.lock().await;
        for entry in channels.values_mut() {
            let same_join = join_ref.map_or(true, |r| r == entry.join_ref);
            if entry.topic == frame.topic && same_join {
                entry.state = state;
            }
        }
    }
}
