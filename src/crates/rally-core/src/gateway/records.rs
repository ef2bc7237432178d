//! Record kinds and row types
//!
//! Field names on the wire follow the backend tables (`user_id`,
//! `experience`, `message`, `dept`); the Rust names describe what the field
//! holds.

use crate::error::{RallyError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// The five record streams the board works with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    SupportVote,
    Experience,
    WallMessage,
    PollResponse,
    GuideProfile,
}

impl RecordKind {
    pub const ALL: [RecordKind; 5] = [
        RecordKind::SupportVote,
        RecordKind::Experience,
        RecordKind::WallMessage,
        RecordKind::PollResponse,
        RecordKind::GuideProfile,
    ];

    /// Kinds that receive inserts and can be subscribed to
    pub const LIVE: [RecordKind; 4] = [
        RecordKind::SupportVote,
        RecordKind::Experience,
        RecordKind::WallMessage,
        RecordKind::PollResponse,
    ];

    /// Backend table name
    pub fn table(&self) -> &'static str {
        match self {
            Self::SupportVote => "votes",
            Self::Experience => "experiences",
            Self::WallMessage => "messages",
            Self::PollResponse => "polls",
            Self::GuideProfile => "ogs",
        }
    }

    pub fn from_table(table: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.table() == table)
    }

    /// Whether rows of this kind carry a visitor id column
    pub fn has_visitor(&self) -> bool {
        matches!(self, Self::SupportVote | Self::PollResponse)
    }

    /// Whether rows of this kind carry `created_at`
    pub fn is_timestamped(&self) -> bool {
        !matches!(self, Self::GuideProfile)
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

/// Column holding the visitor id
pub const VISITOR_COLUMN: &str = "user_id";

/// Column used for recency ordering
pub const CREATED_AT_COLUMN: &str = "created_at";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportVote {
    #[serde(deserialize_with = "id_from_value")]
    pub id: String,
    #[serde(rename = "user_id")]
    pub visitor_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experience {
    #[serde(deserialize_with = "id_from_value")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "experience")]
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl Experience {
    /// Name to show, `Anonymous` when none was given
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or("Anonymous")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WallMessage {
    #[serde(deserialize_with = "id_from_value")]
    pub id: String,
    #[serde(rename = "message")]
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollResponse {
    #[serde(deserialize_with = "id_from_value")]
    pub id: String,
    pub question: String,
    pub option: String,
    #[serde(rename = "user_id")]
    pub visitor_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuideProfile {
    #[serde(deserialize_with = "id_from_value")]
    pub id: String,
    pub name: String,
    #[serde(rename = "dept")]
    pub department: String,
    pub quote: String,
    #[serde(default)]
    pub photo_url: Option<String>,
}

/// Row ids are uuids or bigints depending on the table definition
fn id_from_value<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {}",
            other
        ))),
    }
}

/// A row of any kind
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    SupportVote(SupportVote),
    Experience(Experience),
    WallMessage(WallMessage),
    PollResponse(PollResponse),
    GuideProfile(GuideProfile),
}

impl Record {
    /// Decode a backend row of the given kind
    pub fn from_row(kind: RecordKind, row: Value) -> Result<Self> {
        let record = match kind {
            RecordKind::SupportVote => Self::SupportVote(serde_json::from_value(row)?),
            RecordKind::Experience => Self::Experience(serde_json::from_value(row)?),
            RecordKind::WallMessage => Self::WallMessage(serde_json::from_value(row)?),
            RecordKind::PollResponse => Self::PollResponse(serde_json::from_value(row)?),
            RecordKind::GuideProfile => Self::GuideProfile(serde_json::from_value(row)?),
        };
        Ok(record)
    }

    /// Encode as a backend row
    pub fn to_row(&self) -> Value {
        let encoded = match self {
            Self::SupportVote(r) => serde_json::to_value(r),
            Self::Experience(r) => serde_json::to_value(r),
            Self::WallMessage(r) => serde_json::to_value(r),
            Self::PollResponse(r) => serde_json::to_value(r),
            Self::GuideProfile(r) => serde_json::to_value(r),
        };
        // plain structs of strings and timestamps always encode
        encoded.unwrap_or(Value::Null)
    }

    pub fn kind(&self) -> RecordKind {
        match self {
            Self::SupportVote(_) => RecordKind::SupportVote,
            Self::Experience(_) => RecordKind::Experience,
            Self::WallMessage(_) => RecordKind::WallMessage,
            Self::PollResponse(_) => RecordKind::PollResponse,
            Self::GuideProfile(_) => RecordKind::GuideProfile,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::SupportVote(r) => &r.id,
            Self::Experience(r) => &r.id,
            Self::WallMessage(r) => &r.id,
            Self::PollResponse(r) => &r.id,
            Self::GuideProfile(r) => &r.id,
        }
    }

    /// Creation time; guide profiles have none
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::SupportVote(r) => Some(r.created_at),
            Self::Experience(r) => Some(r.created_at),
            Self::WallMessage(r) => Some(r.created_at),
            Self::PollResponse(r) => Some(r.created_at),
            Self::GuideProfile(_) => None,
        }
    }

    pub fn visitor_id(&self) -> Option<&str> {
        match self {
            Self::SupportVote(r) => Some(&r.visitor_id),
            Self::PollResponse(r) => Some(&r.visitor_id),
            _ => None,
        }
    }

    /// Column value rendered as the string a PostgREST `eq` filter compares
    pub fn column_value(&self, column: &str) -> Option<String> {
        match self.to_row().get(column)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

/// Insert payloads; the backend fills in `id` and `created_at`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewRecord {
    SupportVote {
        visitor_id: String,
    },
    Experience {
        name: Option<String>,
        text: String,
    },
    WallMessage {
        text: String,
    },
    PollResponse {
        question: String,
        option: String,
        visitor_id: String,
    },
}

impl NewRecord {
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::SupportVote { .. } => RecordKind::SupportVote,
            Self::Experience { .. } => RecordKind::Experience,
            Self::WallMessage { .. } => RecordKind::WallMessage,
            Self::PollResponse { .. } => RecordKind::PollResponse,
        }
    }

    /// Encode as the insert body row
    pub fn to_row(&self) -> Value {
        match self {
            Self::SupportVote { visitor_id } => json!({ "user_id": visitor_id }),
            Self::Experience { name, text } => json!({ "name": name, "experience": text }),
            Self::WallMessage { text } => json!({ "message": text }),
            Self::PollResponse {
                question,
                option,
                visitor_id,
            } => json!({ "question": question, "option": option, "user_id": visitor_id }),
        }
    }

    /// Materialize the row the backend would store
    pub fn into_record(self, id: String, created_at: DateTime<Utc>) -> Record {
        match self {
            Self::SupportVote { visitor_id } => Record::SupportVote(SupportVote {
                id,
                visitor_id,
                created_at,
            }),
            Self::Experience { name, text } => Record::Experience(Experience {
                id,
                name,
                text,
                created_at,
            }),
            Self::WallMessage { text } => Record::WallMessage(WallMessage {
                id,
                text,
                created_at,
            }),
            Self::PollResponse {
                question,
                option,
                visitor_id,
            } => Record::PollResponse(PollResponse {
                id,
                question,
                option,
                visitor_id,
                created_at,
            }),
        }
    }
}

/// Decode a list of rows, failing on the first malformed one
pub fn decode_rows(kind: RecordKind, rows: Vec<Value>) -> Result<Vec<Record>> {
    rows.into_iter()
        .map(|row| Record::from_row(kind, row))
        .collect::<Result<Vec<_>>>()
        .map_err(|e| RallyError::Other(format!("Malformed {} row: {}", kind, e)))
}
