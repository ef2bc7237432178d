//! Realtime client for pushed inserts
//!
//! One WebSocket connection per client, opened lazily on the first
//! subscription and owned by a background task. Each [`Subscription`] joins
//! its own channel topic; releasing it leaves that topic. When the server
//! closes the socket every open subscription ends; missed inserts are not
//! replayed.

use crate::config::{BackendConfig, RealtimeConfig};
use crate::error::{RallyError, Result};
use crate::gateway::phoenix::{Inbound, PhoenixMessage};
use crate::gateway::records::{Record, RecordKind};
use crate::gateway::subscription::Subscription;
use futures::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

enum Command {
    Join {
        topic: String,
        kind: RecordKind,
        events: mpsc::UnboundedSender<Record>,
    },
    Leave {
        topic: String,
    },
}

/// Client for the realtime service
pub struct RealtimeClient {
    url: String,
    schema: String,
    access_token: Option<String>,
    heartbeat: Duration,
    connect_timeout: Duration,
    connection: Mutex<Option<mpsc::UnboundedSender<Command>>>,
    next_topic: AtomicU64,
}

impl RealtimeClient {
    /// Create a client for an explicit WebSocket URL
    pub fn new(url: impl Into<String>, schema: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            schema: schema.into(),
            access_token: None,
            heartbeat: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            connection: Mutex::new(None),
            next_topic: AtomicU64::new(0),
        }
    }

    /// Create a client for the configured backend
    pub fn from_config(backend: &BackendConfig, realtime: &RealtimeConfig) -> Self {
        let url = websocket_url(&backend.url, backend.anon_key.as_deref());
        let mut client = Self::new(url, backend.schema.clone())
            .with_heartbeat(Duration::from_secs(realtime.heartbeat_secs.max(1)))
            .with_connect_timeout(Duration::from_secs(realtime.connect_timeout_secs.max(1)));
        if let Some(key) = &backend.anon_key {
            client = client.with_access_token(key.clone());
        }
        client
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn with_heartbeat(mut self, interval: Duration) -> Self {
        self.heartbeat = interval;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Subscribe to inserts into one record kind
    pub async fn subscribe(&self, kind: RecordKind) -> Result<Subscription> {
        let commands = self.ensure_connected().await?;

        let topic = format!(
            "realtime:{}_channel_{}",
            kind.table(),
            self.next_topic.fetch_add(1, Ordering::SeqCst)
        );
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        commands
            .send(Command::Join {
                topic: topic.clone(),
                kind,
                events: events_tx,
            })
            .map_err(|_| RallyError::Realtime("Realtime connection closed".to_string()))?;

        debug!(kind = %kind, topic = %topic, "Subscription requested");

        let leave = commands.clone();
        Ok(Subscription::new(kind, events_rx, move || {
            // the connection may already be gone, nothing left to leave then
            let _ = leave.send(Command::Leave { topic });
        }))
    }

    async fn ensure_connected(&self) -> Result<mpsc::UnboundedSender<Command>> {
        let mut connection = self.connection.lock().await;

        if let Some(commands) = connection.as_ref() {
            if !commands.is_closed() {
                return Ok(commands.clone());
            }
            debug!("Realtime connection task ended, reconnecting");
        }

        info!(url = %redact(&self.url), "Connecting to realtime service");
        let (socket, _) = tokio::time::timeout(self.connect_timeout, connect_async(self.url.as_str()))
            .await
            .map_err(|_| RallyError::Realtime("Timed out connecting".to_string()))?
            .map_err(|e| RallyError::Realtime(format!("Failed to connect: {}", e)))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let session = Session {
            schema: self.schema.clone(),
            access_token: self.access_token.clone(),
            heartbeat: self.heartbeat,
            channels: HashMap::new(),
            next_ref: 0,
        };
        tokio::spawn(session.run(socket, rx));

        *connection = Some(tx.clone());
        Ok(tx)
    }
}

/// Build the realtime WebSocket URL from the project URL
pub fn websocket_url(base: &str, api_key: Option<&str>) -> String {
    let base = base.trim_end_matches('/');
    let ws_base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        base.to_string()
    };

    match api_key {
        Some(key) => format!("{}/realtime/v1/websocket?apikey={}&vsn=1.0.0", ws_base, key),
        None => format!("{}/realtime/v1/websocket?vsn=1.0.0", ws_base),
    }
}

fn redact(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

struct Session {
    schema: String,
    access_token: Option<String>,
    heartbeat: Duration,
    channels: HashMap<String, (RecordKind, mpsc::UnboundedSender<Record>)>,
    next_ref: u64,
}

impl Session {
    async fn run(mut self, socket: Socket, mut commands: mpsc::UnboundedReceiver<Command>) {
        let (mut sink, mut stream) = socket.split();
        let mut ticker = tokio::time::interval(self.heartbeat);
        // the first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                command = commands.recv() => {
                    let Some(command) = command else {
                        debug!("All realtime handles dropped, closing socket");
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    };
                    let outgoing = self.apply(command);
                    if let Some(msg) = outgoing {
                        if let Err(e) = sink.send(Message::Text(msg.encode())).await {
                            warn!(error = %e, "Failed to send realtime message");
                            break;
                        }
                    }
                }
                _ = ticker.tick() => {
                    let msg = PhoenixMessage::heartbeat(self.reference());
                    if let Err(e) = sink.send(Message::Text(msg.encode())).await {
                        warn!(error = %e, "Failed to send heartbeat");
                        break;
                    }
                }
                incoming = stream.next() => {
                    match incoming {
                        Some(Ok(Message::Text(text))) => self.handle_text(&text),
                        Some(Ok(Message::Ping(data))) => {
                            let _ = sink.send(Message::Pong(data)).await;
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            warn!("Realtime connection closed by server");
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            warn!(error = %e, "Realtime connection failed");
                            break;
                        }
                    }
                }
            }
        }

        // dropping the senders ends every open subscription
        self.channels.clear();
    }

    fn reference(&mut self) -> u64 {
        self.next_ref += 1;
        self.next_ref
    }

    fn apply(&mut self, command: Command) -> Option<PhoenixMessage> {
        match command {
            Command::Join { topic, kind, events } => {
                let reference = self.reference();
                let msg = PhoenixMessage::join(
                    &topic,
                    &self.schema,
                    kind.table(),
                    self.access_token.as_deref(),
                    reference,
                );
                self.channels.insert(topic, (kind, events));
                Some(msg)
            }
            Command::Leave { topic } => {
                self.channels.remove(&topic)?;
                debug!(topic = %topic, "Leaving channel");
                Some(PhoenixMessage::leave(&topic, self.reference()))
            }
        }
    }

    fn handle_text(&mut self, text: &str) {
        let Some(message) = PhoenixMessage::decode(text) else {
            debug!("Ignoring undecodable realtime frame");
            return;
        };

        match message.classify() {
            Inbound::Insert { topic, table, record } => {
                let Some((kind, events)) = self.channels.get(&topic) else {
                    return;
                };
                if kind.table() != table {
                    return;
                }
                match Record::from_row(*kind, record) {
                    Ok(record) => {
                        if events.send(record).is_err() {
                            self.channels.remove(&topic);
                        }
                    }
                    Err(e) => warn!(topic = %topic, error = %e, "Dropping malformed pushed row"),
                }
            }
            Inbound::Reply { topic, ok: false, detail, .. } => {
                if self.channels.remove(&topic).is_some() {
                    warn!(
                        topic = %topic,
                        reason = detail.as_deref().unwrap_or("unknown"),
                        "Channel join rejected"
                    );
                }
            }
            Inbound::Reply { topic, ok: true, .. } => {
                debug!(topic = %topic, "Channel reply ok");
            }
            Inbound::Closed { topic } => {
                if self.channels.remove(&topic).is_some() {
                    warn!(topic = %topic, "Channel closed by server");
                }
            }
            Inbound::Ignored => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_websocket_url() {
        assert_eq!(
            websocket_url("https://abc.supabase.co/", Some("anon")),
            "wss://abc.supabase.co/realtime/v1/websocket?apikey=anon&vsn=1.0.0"
        );
        assert_eq!(
            websocket_url("http://localhost:54321", None),
            "ws://localhost:54321/realtime/v1/websocket?vsn=1.0.0"
        );
    }

    #[test]
    fn test_redact_drops_query() {
        assert_eq!(
            redact("wss://abc/realtime/v1/websocket?apikey=secret"),
            "wss://abc/realtime/v1/websocket"
        );
    }

    #[test]
    fn test_from_config_uses_anon_key() {
        let backend = BackendConfig {
            url: "https://abc.supabase.co".to_string(),
            anon_key: Some("anon".to_string()),
            schema: "public".to_string(),
        };
        let client = RealtimeClient::from_config(&backend, &RealtimeConfig::default());
        assert!(client.url().contains("apikey=anon"));
        assert_eq!(client.access_token.as_deref(), Some("anon"));
        assert_eq!(client.heartbeat, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_subscribe_fails_without_server() {
        let client = RealtimeClient::new("ws://127.0.0.1:1/realtime/v1/websocket", "public");
        let err = client.subscribe(RecordKind::SupportVote).await.unwrap_err();
        assert!(matches!(err, RallyError::Realtime(_)));
    }
}
