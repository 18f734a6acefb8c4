use crate::channel::{Channel, ChannelBuilder};
use crate::error::ChangeFeedError;
use crate::message::{events, RealtimeMessage};
use futures_util::{SinkExt, Stream, StreamExt};
use log::{debug, error, info, trace, warn};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, Notify, RwLock};
use tokio::time::{interval_at, Instant};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};
use url::Url;

/// Connection state of the change feed socket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Change feed client options
#[derive(Debug, Clone)]
pub struct ChangeFeedOptions {
    /// Milliseconds between heartbeats
    pub heartbeat_interval: u64,
    /// Milliseconds `subscribe` waits for the socket to come up
    pub connect_timeout: u64,
}

impl Default for ChangeFeedOptions {
    fn default() -> Self {
        Self {
            heartbeat_interval: 30000,
            connect_timeout: 10000,
        }
    }
}

impl ChangeFeedOptions {
    /// Heartbeat period, never shorter than one millisecond
    pub fn heartbeat_period(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval.max(1))
    }
}

/// Websocket client for collection change notifications.
///
/// Clones share the same socket, channels and state. The client never
/// reconnects on its own: after a connection loss every channel's error
/// callbacks fire and a new `subscribe` opens a fresh socket.
#[derive(Clone)]
pub struct ChangeFeedClient {
    pub(crate) url: String,
    pub(crate) key: String,
    next_ref: Arc<AtomicU32>,
    pub(crate) channels: Arc<RwLock<HashMap<String, Arc<Channel>>>>,
    pub(crate) socket: Arc<RwLock<Option<mpsc::Sender<Message>>>>,
    pub(crate) options: ChangeFeedOptions,
    state: Arc<RwLock<ConnectionState>>,
    is_manually_closed: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
    state_change: broadcast::Sender<ConnectionState>,
    pub(crate) access_token: Arc<RwLock<Option<String>>>,
}

impl ChangeFeedClient {
    pub fn new(url: &str, key: &str) -> Self {
        Self::new_with_options(url, key, ChangeFeedOptions::default())
    }

    pub fn new_with_options(url: &str, key: &str, options: ChangeFeedOptions) -> Self {
        let (state_change, _) = broadcast::channel(16);
        Self {
            url: url.to_string(),
            key: key.to_string(),
            next_ref: Arc::new(AtomicU32::new(1)),
            channels: Arc::new(RwLock::new(HashMap::new())),
            socket: Arc::new(RwLock::new(None)),
            options,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            is_manually_closed: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(Notify::new()),
            state_change,
            access_token: Arc::new(RwLock::new(None)),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn options(&self) -> &ChangeFeedOptions {
        &self.options
    }

    /// Token sent with every subsequent channel join
    pub async fn set_auth(&self, token: Option<String>) {
        info!("Setting auth token (is_some: {})", token.is_some());
        *self.access_token.write().await = token;
    }

    pub fn on_state_change(&self) -> broadcast::Receiver<ConnectionState> {
        self.state_change.subscribe()
    }

    pub async fn connection_state(&self) -> ConnectionState {
        *self.state.read().await
    }

    pub fn channel(&self, topic: &str) -> ChannelBuilder<'_> {
        debug!("Creating channel builder for topic: {}", topic);
        ChannelBuilder::new(self, topic)
    }

    pub(crate) fn next_ref(&self) -> String {
        self.next_ref.fetch_add(1, Ordering::SeqCst).to_string()
    }

    /// Websocket endpoint derived from the service URL
    pub fn websocket_url(&self) -> Result<Url, ChangeFeedError> {
        let mut url = Url::parse(&self.url)?;
        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            s => {
                return Err(ChangeFeedError::ConnectionError(format!(
                    "Unsupported URL scheme: {}",
                    s
                )))
            }
        };
        url.set_scheme(scheme).map_err(|_| {
            ChangeFeedError::ConnectionError(format!("Cannot use scheme {} for {}", scheme, self.url))
        })?;
        if !url.path().ends_with("/websocket") {
            url = url.join("/realtime/v1/websocket")?;
        }
        url.query_pairs_mut()
            .append_pair("apikey", &self.key)
            .append_pair("vsn", "1.0.0");
        Ok(url)
    }

    async fn set_state(&self, state: ConnectionState) {
        let mut current = self.state.write().await;
        if *current != state {
            info!("Change feed state {:?} -> {:?}", *current, state);
            *current = state;
            // no receivers is fine
            let _ = self.state_change.send(state);
        }
    }

    /// Open the socket and start the reader and writer tasks
    pub async fn connect(&self) -> Result<(), ChangeFeedError> {
        if self.connection_state().await == ConnectionState::Connected {
            return Ok(());
        }
        self.is_manually_closed.store(false, Ordering::SeqCst);

        let ws_url = self.websocket_url()?;
        info!(
            "Connecting change feed to {}",
            ws_url.host_str().unwrap_or_default()
        );
        self.set_state(ConnectionState::Connecting).await;

        let ws_stream = match connect_async(ws_url.as_str()).await {
            Ok((stream, _response)) => stream,
            Err(e) => {
                error!("WebSocket connection failed: {}", e);
                self.set_state(ConnectionState::Disconnected).await;
                return Err(ChangeFeedError::ConnectionError(format!(
                    "WebSocket connection failed: {}",
                    e
                )));
            }
        };

        let (mut write, read) = ws_stream.split();
        let (socket_tx, mut socket_rx) = mpsc::channel::<Message>(100);
        *self.socket.write().await = Some(socket_tx);
        self.set_state(ConnectionState::Connected).await;

        tokio::spawn(async move {
            while let Some(message) = socket_rx.recv().await {
                trace!("Writer sending {:?}", message);
                if let Err(e) = write.send(message).await {
                    error!("WebSocket send error: {}", e);
                    break;
                }
            }
            let _ = write.close().await;
            debug!("Change feed writer finished");
        });

        let client = self.clone();
        tokio::spawn(async move {
            client.read_loop(read).await;
        });

        Ok(())
    }

    async fn read_loop<S>(self, mut read: S)
    where
        S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
    {
        let period = self.options.heartbeat_period();
        let mut heartbeat = interval_at(Instant::now() + period, period);

        loop {
            tokio::select! {
                _ = self.shutdown.notified() => {
                    debug!("Reader stopping on disconnect");
                    break;
                }
                frame = read.next() => match frame {
                    Some(Ok(Message::Text(text))) => self.dispatch(&text).await,
                    Some(Ok(Message::Close(frame))) => {
                        debug!("Server closed the socket: {:?}", frame);
                        break;
                    }
                    Some(Ok(other)) => trace!("Ignoring non-text frame {:?}", other),
                    Some(Err(e)) => {
                        error!("WebSocket read error: {}", e);
                        break;
                    }
                    None => {
                        debug!("WebSocket stream ended");
                        break;
                    }
                },
                _ = heartbeat.tick() => {
                    let message = json!({
                        "topic": "phoenix",
                        "event": events::HEARTBEAT,
                        "payload": {},
                        "ref": self.next_ref(),
                    });
                    if let Err(e) = self.send_message(message).await {
                        warn!("Heartbeat failed, assuming connection lost: {}", e);
                        break;
                    }
                }
            }
        }

        *self.socket.write().await = None;
        self.set_state(ConnectionState::Disconnected).await;

        if !self.is_manually_closed.load(Ordering::SeqCst) {
            let channels: Vec<Arc<Channel>> =
                self.channels.read().await.values().cloned().collect();
            for channel in channels {
                channel.notify_error("connection closed").await;
            }
        }
    }

    async fn dispatch(&self, text: &str) {
        match serde_json::from_str::<RealtimeMessage>(text) {
            Ok(message) => {
                let channel = self.channels.read().await.get(&message.topic).cloned();
                match channel {
                    Some(channel) => channel.handle_message(message).await,
                    None if message.topic == "phoenix" => {
                        trace!("Phoenix reply: {}", message.payload)
                    }
                    None => warn!("Message for unknown topic '{}'", message.topic),
                }
            }
            Err(e) => error!("Unparseable frame: {}. Raw: {}", e, text),
        }
    }

    /// Close the socket. Channels stay registered but receive nothing.
    pub async fn disconnect(&self) -> Result<(), ChangeFeedError> {
        info!("disconnect() called");
        self.is_manually_closed.store(true, Ordering::SeqCst);
        let sender = self.socket.write().await.take();
        if sender.is_some() {
            drop(sender);
            self.shutdown.notify_one();
        } else {
            warn!("disconnect(): no active socket");
        }
        self.set_state(ConnectionState::Disconnected).await;
        Ok(())
    }

    /// Remove one callback and leave the channel once it is unused
    pub(crate) async fn release(
        &self,
        channel: &Arc<Channel>,
        id: &str,
    ) -> Result<(), ChangeFeedError> {
        if !channel.remove(id).await {
            return Ok(());
        }
        {
            let mut channels = self.channels.write().await;
            let registered = channels
                .get(channel.topic())
                .map(|c| Arc::ptr_eq(c, channel))
                .unwrap_or(false);
            if registered {
                channels.remove(channel.topic());
            }
        }
        if self.connection_state().await != ConnectionState::Connected {
            return Ok(());
        }
        debug!("Leaving channel '{}'", channel.topic());
        self.send_message(json!({
            "topic": channel.topic(),
            "event": events::LEAVE,
            "payload": {},
            "ref": self.next_ref(),
        }))
        .await
    }

    pub(crate) async fn send_message(
        &self,
        message: serde_json::Value,
    ) -> Result<(), ChangeFeedError> {
        let socket = self.socket.read().await;
        match socket.as_ref() {
            Some(tx) => {
                tx.send(Message::Text(message.to_string())).await?;
                Ok(())
            }
            None => Err(ChangeFeedError::ConnectionError(
                "Client socket unavailable".to_string(),
            )),
        }
    }
}
