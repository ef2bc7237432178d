//! Realtime wire messages
//!
//! The realtime service speaks the Phoenix channel protocol: JSON envelopes
//! carrying a topic, an event name, a payload and a client reference.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const EVENT_JOIN: &str = "phx_join";
pub const EVENT_LEAVE: &str = "phx_leave";
pub const EVENT_REPLY: &str = "phx_reply";
pub const EVENT_ERROR: &str = "phx_error";
pub const EVENT_CLOSE: &str = "phx_close";
pub const EVENT_HEARTBEAT: &str = "heartbeat";
pub const EVENT_POSTGRES_CHANGES: &str = "postgres_changes";
pub const HEARTBEAT_TOPIC: &str = "phoenix";

/// Phoenix message envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhoenixMessage {
    pub topic: String,
    pub event: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_ref: Option<String>,
}

impl PhoenixMessage {
    /// Join a channel listening for INSERTs on one table
    pub fn join(topic: &str, schema: &str, table: &str, access_token: Option<&str>, reference: u64) -> Self {
        let mut payload = json!({
            "config": {
                "broadcast": { "ack": false, "self": false },
                "presence": { "key": "" },
                "postgres_changes": [
                    { "event": "INSERT", "schema": schema, "table": table }
                ],
                "private": false
            }
        });
        if let Some(token) = access_token {
            payload["access_token"] = Value::String(token.to_string());
        }

        Self {
            topic: topic.to_string(),
            event: EVENT_JOIN.to_string(),
            payload,
            reference: Some(reference.to_string()),
            join_ref: Some(reference.to_string()),
        }
    }

    pub fn leave(topic: &str, reference: u64) -> Self {
        Self {
            topic: topic.to_string(),
            event: EVENT_LEAVE.to_string(),
            payload: json!({}),
            reference: Some(reference.to_string()),
            join_ref: None,
        }
    }

    pub fn heartbeat(reference: u64) -> Self {
        Self {
            topic: HEARTBEAT_TOPIC.to_string(),
            event: EVENT_HEARTBEAT.to_string(),
            payload: json!({}),
            reference: Some(reference.to_string()),
            join_ref: None,
        }
    }

    pub fn encode(&self) -> String {
        // envelope is strings and a JSON value
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn decode(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }

    /// Interpret the message
    pub fn classify(&self) -> Inbound {
        match self.event.as_str() {
            EVENT_REPLY => {
                let ok = self.payload.get("status").and_then(Value::as_str) == Some("ok");
                let detail = self
                    .payload
                    .pointer("/response/reason")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                Inbound::Reply {
                    topic: self.topic.clone(),
                    reference: self.reference.clone(),
                    ok,
                    detail,
                }
            }
            EVENT_POSTGRES_CHANGES => {
                let data = self.payload.get("data").cloned().unwrap_or(Value::Null);
                let change = data
                    .get("type")
                    .or_else(|| data.get("eventType"))
                    .and_then(Value::as_str)
                    .unwrap_or_default();

                match (change, data.get("table").and_then(Value::as_str), data.get("record")) {
                    ("INSERT", Some(table), Some(record)) => Inbound::Insert {
                        topic: self.topic.clone(),
                        table: table.to_string(),
                        record: record.clone(),
                    },
                    _ => Inbound::Ignored,
                }
            }
            EVENT_ERROR | EVENT_CLOSE => Inbound::Closed {
                topic: self.topic.clone(),
            },
            _ => Inbound::Ignored,
        }
    }
}

/// What an inbound message means to the client
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Answer to a join, leave or heartbeat
    Reply {
        topic: String,
        reference: Option<String>,
        ok: bool,
        detail: Option<String>,
    },
    /// A row was inserted into a table the topic listens to
    Insert {
        topic: String,
        table: String,
        record: Value,
    },
    /// The server closed or errored the channel
    Closed { topic: String },
    /// Presence, system and other events the client has no use for
    Ignored,
}
