//! Push Feed Client
//!
//! Low-latency discovery: a WebSocket connection to a pumpportal-style data
//! stream. Subscribes to new-token launches on connect and to per-token
//! trade streams on demand. Reconnects with capped exponential backoff; an
//! exhausted reconnect budget degrades the system to HTTP-poll-only
//! discovery instead of crashing it.

use std::collections::HashSet;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use super::payloads::{PushEnvelope, PushTokenPayload};

/// Default WebSocket endpoint
pub const DEFAULT_WS_URL: &str = "wss://pumpportal.fun/api/data";

const RECONNECT_BASE_DELAY_MS: u64 = 1_000;
const MAX_RECONNECT_DELAY_MS: u64 = 30_000;

#[derive(Debug, Error)]
pub enum PushFeedError {
    #[error("WebSocket connection failed: {0}")]
    ConnectionFailed(String),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Feed channel closed")]
    ChannelClosed,

    #[error("Feed is not running")]
    NotRunning,
}

/// Events emitted by the push feed
#[derive(Debug, Clone)]
pub enum FeedEvent {
    /// A token payload arrived (launch or trade tick)
    TokenData(PushTokenPayload),
    /// Connection state changed
    ConnectionState { connected: bool, reconnects: u32 },
}

/// Push feed configuration
#[derive(Debug, Clone)]
pub struct PushFeedConfig {
    /// WebSocket URL
    pub ws_url: String,
    /// Reconnect automatically on disconnect
    pub auto_reconnect: bool,
    /// Give up after this many consecutive failed reconnects
    pub max_reconnect_attempts: u32,
    /// Event channel capacity
    pub channel_buffer_size: usize,
    /// Connection establishment timeout
    pub connect_timeout_secs: u64,
    /// Keepalive ping cadence
    pub ping_interval_secs: u64,
}

impl Default for PushFeedConfig {
    fn default() -> Self {
        Self {
            ws_url: DEFAULT_WS_URL.to_string(),
            auto_reconnect: true,
            max_reconnect_attempts: 5,
            channel_buffer_size: 1_000,
            connect_timeout_secs: 10,
            ping_interval_secs: 30,
        }
    }
}

#[derive(Debug, Default)]
struct SubscriptionState {
    new_tokens: bool,
    token_trades: HashSet<String>,
}

enum FeedCommand {
    SubscribeNewTokens,
    SubscribeTokenTrades(Vec<String>),
    Shutdown,
}

/// WebSocket client for the new-asset push feed
///
/// Create with [`PushFeed::new`], spawn [`PushFeed::run`] on a task, and
/// consume [`FeedEvent`]s from the returned receiver. Subscriptions are
/// tracked and re-issued after every reconnect.
pub struct PushFeed {
    config: PushFeedConfig,
    event_tx: mpsc::Sender<FeedEvent>,
    command_tx: mpsc::Sender<FeedCommand>,
    command_rx: Mutex<Option<mpsc::Receiver<FeedCommand>>>,
    subscriptions: RwLock<SubscriptionState>,
}

impl PushFeed {
    pub fn new(config: PushFeedConfig) -> (Self, mpsc::Receiver<FeedEvent>) {
        let (event_tx, event_rx) = mpsc::channel(config.channel_buffer_size);
        let (command_tx, command_rx) = mpsc::channel(100);
        let feed = Self {
            config,
            event_tx,
            command_tx,
            command_rx: Mutex::new(Some(command_rx)),
            subscriptions: RwLock::new(SubscriptionState::default()),
        };
        (feed, event_rx)
    }

    /// Request the new-token launch stream
    pub async fn subscribe_new_tokens(&self) -> Result<(), PushFeedError> {
        self.command_tx
            .send(FeedCommand::SubscribeNewTokens)
            .await
            .map_err(|_| PushFeedError::ChannelClosed)
    }

    /// Request trade ticks for specific token addresses
    pub async fn subscribe_token_trades(&self, mints: Vec<String>) -> Result<(), PushFeedError> {
        if mints.is_empty() {
            return Ok(());
        }
        self.command_tx
            .send(FeedCommand::SubscribeTokenTrades(mints))
            .await
            .map_err(|_| PushFeedError::ChannelClosed)
    }

    /// Request graceful shutdown of the run loop
    pub async fn shutdown(&self) -> Result<(), PushFeedError> {
        self.command_tx
            .send(FeedCommand::Shutdown)
            .await
            .map_err(|_| PushFeedError::ChannelClosed)
    }

    /// Run the feed until shutdown or reconnect exhaustion.
    ///
    /// Returns `Ok(())` in both cases; losing the push feed is a degraded
    /// mode, not a failure - the HTTP scanner keeps discovering.
    pub async fn run(&self) -> Result<(), PushFeedError> {
        let mut command_rx = {
            let mut guard = self.command_rx.lock().await;
            guard.take().ok_or(PushFeedError::NotRunning)?
        };

        info!("Push feed connecting to {}", self.config.ws_url);
        let mut reconnects = 0u32;

        loop {
            match self.connect_and_stream(&mut command_rx).await {
                Ok(true) => {
                    info!("Push feed shutdown requested");
                    return Ok(());
                }
                Ok(false) => {
                    debug!("Push feed disconnected");
                    // A clean session resets the failure budget
                    reconnects = 0;
                }
                Err(e) => {
                    warn!("Push feed error: {}", e);
                }
            }

            if !self.config.auto_reconnect {
                return Ok(());
            }
            reconnects += 1;
            if reconnects > self.config.max_reconnect_attempts {
                warn!(
                    "Push feed gave up after {} reconnect attempts; running on HTTP poll only",
                    self.config.max_reconnect_attempts
                );
                return Ok(());
            }

            let delay_ms = (RECONNECT_BASE_DELAY_MS * 2u64.pow(reconnects.min(10)))
                .min(MAX_RECONNECT_DELAY_MS);
            let _ = self
                .event_tx
                .send(FeedEvent::ConnectionState {
                    connected: false,
                    reconnects,
                })
                .await;
            debug!("Push feed reconnecting in {}ms (attempt {})", delay_ms, reconnects);

            // Honor shutdown while waiting out the backoff
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(delay_ms)) => {}
                Some(FeedCommand::Shutdown) = command_rx.recv() => return Ok(()),
            }
        }
    }

    /// One connected session. Returns Ok(true) on shutdown, Ok(false) on a
    /// clean disconnect.
    async fn connect_and_stream(
        &self,
        command_rx: &mut mpsc::Receiver<FeedCommand>,
    ) -> Result<bool, PushFeedError> {
        let connect = connect_async(self.config.ws_url.as_str());
        let (stream, _) = tokio::time::timeout(
            Duration::from_secs(self.config.connect_timeout_secs),
            connect,
        )
        .await
        .map_err(|_| PushFeedError::ConnectionFailed("connect timeout".to_string()))?
        .map_err(|e| PushFeedError::ConnectionFailed(e.to_string()))?;

        info!("Push feed connected");
        let (mut write, mut read) = stream.split();

        // Re-issue whatever we were subscribed to before the reconnect
        {
            let subs = self.subscriptions.read().await;
            if subs.new_tokens {
                let message = json!({ "method": "subscribeNewToken" }).to_string();
                write
                    .send(Message::Text(message))
                    .await
                    .map_err(|e| PushFeedError::WebSocket(e.to_string()))?;
            }
            if !subs.token_trades.is_empty() {
                let keys: Vec<&String> = subs.token_trades.iter().collect();
                let message =
                    json!({ "method": "subscribeTokenTrade", "keys": keys }).to_string();
                write
                    .send(Message::Text(message))
                    .await
                    .map_err(|e| PushFeedError::WebSocket(e.to_string()))?;
            }
        }

        let _ = self
            .event_tx
            .send(FeedEvent::ConnectionState {
                connected: true,
                reconnects: 0,
            })
            .await;

        let mut ping = tokio::time::interval(Duration::from_secs(self.config.ping_interval_secs));
        ping.tick().await; // first tick fires immediately

        loop {
            tokio::select! {
                Some(command) = command_rx.recv() => match command {
                    FeedCommand::Shutdown => {
                        let _ = write.send(Message::Close(None)).await;
                        return Ok(true);
                    }
                    FeedCommand::SubscribeNewTokens => {
                        self.subscriptions.write().await.new_tokens = true;
                        let message = json!({ "method": "subscribeNewToken" }).to_string();
                        write
                            .send(Message::Text(message))
                            .await
                            .map_err(|e| PushFeedError::WebSocket(e.to_string()))?;
                        debug!("Subscribed to new tokens");
                    }
                    FeedCommand::SubscribeTokenTrades(mints) => {
                        {
                            let mut subs = self.subscriptions.write().await;
                            for mint in &mints {
                                subs.token_trades.insert(mint.clone());
                            }
                        }
                        let message =
                            json!({ "method": "subscribeTokenTrade", "keys": mints }).to_string();
                        write
                            .send(Message::Text(message))
                            .await
                            .map_err(|e| PushFeedError::WebSocket(e.to_string()))?;
                    }
                },
                message = read.next() => match message {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(payload) = Self::process_message(&text) {
                            if self.event_tx.send(FeedEvent::TokenData(payload)).await.is_err() {
                                return Err(PushFeedError::ChannelClosed);
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = write.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => return Ok(false),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(PushFeedError::WebSocket(e.to_string())),
                },
                _ = ping.tick() => {
                    let _ = write.send(Message::Ping(Vec::new())).await;
                }
            }
        }
    }

    /// Parse one raw text frame into a token payload.
    ///
    /// Frames without a mint (subscription acks, malformed records) are
    /// dropped silently; the stream never aborts on one bad message.
    fn process_message(text: &str) -> Option<PushTokenPayload> {
        if let Ok(payload) = serde_json::from_str::<PushTokenPayload>(text) {
            if !payload.mint.is_empty() {
                return Some(payload);
            }
        }
        if let Ok(envelope) = serde_json::from_str::<PushEnvelope>(text) {
            if !envelope.data.mint.is_empty() {
                return Some(envelope.data);
            }
        }
        debug!("Ignoring unparseable feed frame: {}", text.chars().take(120).collect::<String>());
        None
    }
}
