//! Common test utilities: fixed signals, wait helpers and in-process fakes
//! of the REST and realtime services

#![allow(dead_code)]

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{SecondsFormat, Utc};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use rally_core::config::HttpConfig;
use rally_core::flows::Board;
use rally_core::gateway::{RealtimeClient, RestGateway};
use rally_core::identity::{EnvironmentSignals, FixedProbe, IdentityDeriver, LocalStore};
use rally_core::{VisitorId, VisitorSession};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use uuid::Uuid;

pub const TEST_ANON_KEY: &str = "test-anon-key";

const WAIT_LIMIT: Duration = Duration::from_secs(3);

/// The signal set whose fingerprint hashes to `27v7ai`
pub fn signals(user_agent: &str) -> EnvironmentSignals {
    EnvironmentSignals {
        user_agent: user_agent.to_string(),
        language: "en-US".to_string(),
        screen_width: 1920,
        screen_height: 1080,
        timezone_offset: -300,
        surface: None,
    }
}

pub fn deriver(user_agent: &str, store: Arc<dyn LocalStore>) -> IdentityDeriver {
    IdentityDeriver::new(Arc::new(FixedProbe(signals(user_agent))), store)
}

pub fn session(id: &str) -> Arc<VisitorSession> {
    VisitorSession::with_visitor(VisitorId::new(id))
}

/// Poll `check` until it holds, panicking after a few seconds
pub async fn eventually<F>(what: &str, check: F)
where
    F: Fn() -> bool,
{
    let deadline = tokio::time::Instant::now() + WAIT_LIMIT;
    while !check() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {}", what);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Wait for the board's state to satisfy `check`
pub async fn board_until<B, F>(board: &B, what: &str, check: F)
where
    B: Board,
    F: Fn(&B) -> bool,
{
    let mut changes = board.changes();
    let wait = async {
        while !check(board) {
            if changes.changed().await.is_err() {
                break;
            }
        }
    };
    if tokio::time::timeout(WAIT_LIMIT, wait).await.is_err() || !check(board) {
        panic!("timed out waiting for {}", what);
    }
}

pub fn fast_http_config() -> HttpConfig {
    HttpConfig {
        timeout_secs: 5,
        max_retries: 2,
        retry_delay_ms: 10,
        backoff_multiplier: 2.0,
        user_agent: None,
    }
}

// ----------------------------------------------------------------------------
// Fake REST service
// ----------------------------------------------------------------------------

/// In-process PostgREST stand-in
#[derive(Clone, Default)]
pub struct FakeRest {
    tables: Arc<Mutex<HashMap<String, Vec<Value>>>>,
    failing_reads: Arc<AtomicUsize>,
    fail_inserts: Arc<AtomicBool>,
    pub reads: Arc<AtomicUsize>,
    pub inserts: Arc<AtomicUsize>,
    pub last_headers: Arc<Mutex<Option<HeaderMap>>>,
}

impl FakeRest {
    /// Bind to an ephemeral port and serve; returns the base URL
    pub async fn start(&self) -> String {
        let app = Router::new()
            .route("/rest/v1/:table", get(list).head(count).post(insert))
            .with_state(self.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        format!("http://{}", addr)
    }

    pub fn seed(&self, table: &str, row: Value) {
        self.tables
            .lock()
            .entry(table.to_string())
            .or_default()
            .push(row);
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.tables.lock().get(table).cloned().unwrap_or_default()
    }

    /// Answer the next `n` reads with 503
    pub fn fail_next_reads(&self, n: usize) {
        self.failing_reads.store(n, Ordering::SeqCst);
    }

    pub fn set_fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    fn take_read_failure(&self) -> bool {
        self.failing_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn select(&self, table: &str, params: &[(String, String)]) -> Vec<Value> {
        let mut rows: Vec<Value> = self
            .rows(table)
            .into_iter()
            .filter(|row| {
                params.iter().all(|(key, value)| match value.strip_prefix("eq.") {
                    Some(expected) if !matches!(key.as_str(), "select" | "order" | "limit") => {
                        column_text(row, key).as_deref() == Some(expected)
                    }
                    _ => true,
                })
            })
            .collect();

        if let Some((_, order)) = params.iter().find(|(k, _)| k == "order") {
            let (column, direction) = order.split_once('.').unwrap_or((order.as_str(), "asc"));
            rows.sort_by(|a, b| column_text(a, column).cmp(&column_text(b, column)));
            if direction == "desc" {
                rows.reverse();
            }
        }

        if let Some((_, limit)) = params.iter().find(|(k, _)| k == "limit") {
            rows.truncate(limit.parse().unwrap());
        }
        rows
    }
}

fn column_text(row: &Value, column: &str) -> Option<String> {
    match row.get(column)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

async fn list(
    State(fake): State<FakeRest>,
    Path(table): Path<String>,
    headers: HeaderMap,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    fake.reads.fetch_add(1, Ordering::SeqCst);
    *fake.last_headers.lock() = Some(headers);
    if fake.take_read_failure() {
        return (StatusCode::SERVICE_UNAVAILABLE, "try later").into_response();
    }
    Json(fake.select(&table, &params)).into_response()
}

async fn count(
    State(fake): State<FakeRest>,
    Path(table): Path<String>,
    headers: HeaderMap,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    fake.reads.fetch_add(1, Ordering::SeqCst);
    let wants_count = headers
        .get("prefer")
        .and_then(|v| v.to_str().ok())
        .map_or(false, |v| v.contains("count=exact"));
    *fake.last_headers.lock() = Some(headers);
    if fake.take_read_failure() {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    if !wants_count {
        return StatusCode::OK.into_response();
    }

    let total = fake.select(&table, &params).len();
    let range = if total == 0 {
        "*/0".to_string()
    } else {
        format!("0-{}/{}", total - 1, total)
    };
    (StatusCode::OK, [(header::CONTENT_RANGE, range)]).into_response()
}

async fn insert(
    State(fake): State<FakeRest>,
    Path(table): Path<String>,
    headers: HeaderMap,
    Json(mut row): Json<Value>,
) -> Response {
    fake.inserts.fetch_add(1, Ordering::SeqCst);
    *fake.last_headers.lock() = Some(headers);
    if fake.fail_inserts.load(Ordering::SeqCst) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "message": "insert rejected" })),
        )
            .into_response();
    }

    row["id"] = json!(Uuid::new_v4().to_string());
    row["created_at"] = json!(timestamp_now());
    fake.seed(&table, row.clone());
    (StatusCode::CREATED, Json(json!([row]))).into_response()
}

// ----------------------------------------------------------------------------
// Fake realtime service
// ----------------------------------------------------------------------------

/// In-process Phoenix channel endpoint
#[derive(Clone, Default)]
pub struct FakeRealtime {
    joins: Arc<Mutex<Vec<(String, String)>>>,
    leaves: Arc<Mutex<Vec<String>>>,
    heartbeats: Arc<AtomicUsize>,
    connections: Arc<Mutex<Vec<mpsc::UnboundedSender<Message>>>>,
}

impl FakeRealtime {
    /// Bind to an ephemeral port and serve; returns the WebSocket URL
    pub async fn start(&self) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let fake = self.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(fake.clone().serve(stream));
            }
        });

        format!("ws://{}/realtime/v1/websocket?vsn=1.0.0", addr)
    }

    /// Joined `(topic, table)` pairs
    pub fn joins(&self) -> Vec<(String, String)> {
        self.joins.lock().clone()
    }

    pub fn leaves(&self) -> Vec<String> {
        self.leaves.lock().clone()
    }

    pub fn heartbeats(&self) -> usize {
        self.heartbeats.load(Ordering::SeqCst)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    /// Push an INSERT to every joined topic on `table`
    pub fn push_insert(&self, table: &str, record: Value) {
        let joins = self.joins();
        let leaves = self.leaves();
        for (topic, joined_table) in joins {
            if joined_table != table || leaves.contains(&topic) {
                continue;
            }
            let frame = json!({
                "topic": topic,
                "event": "postgres_changes",
                "ref": null,
                "payload": {
                    "ids": [1],
                    "data": {
                        "schema": "public",
                        "table": table,
                        "type": "INSERT",
                        "commit_timestamp": timestamp_now(),
                        "record": record.clone(),
                        "errors": null
                    }
                }
            });
            self.send_all(Message::Text(frame.to_string()));
        }
    }

    /// Close every open socket from the server side
    pub fn close_all(&self) {
        self.send_all(Message::Close(None));
    }

    fn send_all(&self, message: Message) {
        for connection in self.connections.lock().iter() {
            let _ = connection.send(message.clone());
        }
    }

    async fn serve(self, stream: TcpStream) {
        let Ok(socket) = tokio_tungstenite::accept_async(stream).await else {
            return;
        };
        let (mut sink, mut source) = socket.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
        self.connections.lock().push(tx.clone());

        loop {
            tokio::select! {
                outgoing = rx.recv() => {
                    let Some(message) = outgoing else { break };
                    let closing = matches!(message, Message::Close(_));
                    if sink.send(message).await.is_err() || closing {
                        break;
                    }
                }
                incoming = source.next() => {
                    match incoming {
                        Some(Ok(Message::Text(text))) => self.handle(&tx, &text),
                        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                        Some(Ok(_)) => {}
                    }
                }
            }
        }
    }

    fn handle(&self, tx: &mpsc::UnboundedSender<Message>, text: &str) {
        let frame: Value = serde_json::from_str(text).unwrap();
        let topic = frame["topic"].as_str().unwrap_or_default().to_string();

        match frame["event"].as_str().unwrap_or_default() {
            "phx_join" => {
                let table = frame["payload"]["config"]["postgres_changes"][0]["table"]
                    .as_str()
                    .unwrap_or_default()
                    .to_string();
                self.joins.lock().push((topic.clone(), table));
            }
            "phx_leave" => self.leaves.lock().push(topic.clone()),
            "heartbeat" => {
                self.heartbeats.fetch_add(1, Ordering::SeqCst);
            }
            _ => return,
        }

        let reply = json!({
            "topic": topic,
            "event": "phx_reply",
            "ref": frame["ref"],
            "payload": { "status": "ok", "response": {} }
        });
        let _ = tx.send(Message::Text(reply.to_string()));
    }
}

/// REST gateway pointed at the fakes
pub fn rest_gateway(rest_url: &str, realtime_url: &str) -> RestGateway {
    let realtime = Arc::new(
        RealtimeClient::new(realtime_url, "public").with_access_token(TEST_ANON_KEY),
    );
    RestGateway::new(rest_url, Some(TEST_ANON_KEY), &fast_http_config(), realtime).unwrap()
}
