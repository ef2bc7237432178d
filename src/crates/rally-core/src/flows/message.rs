//! Message wall

use crate::error::{RallyError, Result};
use crate::feed::{Applied, Feed, FeedItem};
use crate::flows::{validate_text, Board, Lifecycle, SubmissionState, SubmissionTracker};
use crate::gateway::query::Query;
use crate::gateway::records::{NewRecord, Record, RecordKind, WallMessage};
use crate::gateway::Gateway;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, warn};

pub const MESSAGE_MAX_CHARS: usize = 140;

/// Default number of messages on the wall
pub const MESSAGE_LIMIT: usize = 50;

pub struct MessageWall {
    gateway: Arc<dyn Gateway>,
    lifecycle: Lifecycle,
    tracker: SubmissionTracker,
    feed: Mutex<Feed<WallMessage>>,
    draft: Mutex<String>,
}

impl MessageWall {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self::with_limit(gateway, MESSAGE_LIMIT)
    }

    pub fn with_limit(gateway: Arc<dyn Gateway>, limit: usize) -> Self {
        Self {
            gateway,
            lifecycle: Lifecycle::new(),
            tracker: SubmissionTracker::repeatable("wall message"),
            feed: Mutex::new(Feed::new(limit)),
            draft: Mutex::new(String::new()),
        }
    }

    /// Messages, newest first
    pub fn messages(&self) -> Vec<WallMessage> {
        self.feed.lock().items().to_vec()
    }

    pub fn draft(&self) -> String {
        self.draft.lock().clone()
    }

    pub fn set_draft(&self, text: impl Into<String>) {
        *self.draft.lock() = text.into();
    }

    pub fn submission_state(&self) -> SubmissionState {
        self.tracker.state()
    }

    /// Post the current draft; clears it on success, keeps it on failure
    pub async fn submit(&self) -> Result<WallMessage> {
        let text = validate_text("Message", &self.draft(), MESSAGE_MAX_CHARS)?;
        let guard = self.tracker.begin()?;

        let result = self.gateway.insert(NewRecord::WallMessage { text }).await;

        let message = match result.and_then(|record| {
            WallMessage::from_record(record)
                .ok_or_else(|| RallyError::Other("Message insert returned another kind".to_string()))
        }) {
            Ok(message) => message,
            Err(e) => {
                guard.fail();
                warn!(error = %e, "Posting message failed");
                if self.lifecycle.is_active() {
                    self.lifecycle.touch();
                }
                return Err(e);
            }
        };

        guard.succeed();
        if self.lifecycle.is_active() {
            self.draft.lock().clear();
            self.feed.lock().apply_local(message.clone());
            self.lifecycle.touch();
        }
        Ok(message)
    }

    /// Set the draft and post it
    pub async fn post(&self, text: impl Into<String>) -> Result<WallMessage> {
        self.set_draft(text);
        self.submit().await
    }
}

#[async_trait]
impl Board for MessageWall {
    fn name(&self) -> &'static str {
        "wall"
    }

    fn gateway(&self) -> &Arc<dyn Gateway> {
        &self.gateway
    }

    fn live_kind(&self) -> Option<RecordKind> {
        Some(RecordKind::WallMessage)
    }

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    async fn refresh(&self) -> Result<()> {
        let limit = self.feed.lock().limit();
        let rows = self
            .gateway
            .fetch_recent(&Query::recent(RecordKind::WallMessage, limit))
            .await?;

        if !self.lifecycle.is_active() {
            debug!("Wall fetch finished after unmount, ignoring");
            return Ok(());
        }

        let fetched = rows.into_iter().filter_map(WallMessage::from_record).collect();
        self.feed.lock().merge_fetched(fetched);
        self.lifecycle.touch();
        Ok(())
    }

    async fn apply_push(&self, record: Record) {
        if !self.lifecycle.is_active() {
            return;
        }
        let Some(message) = WallMessage::from_record(record) else {
            return;
        };
        let applied = self.feed.lock().apply_remote(message);
        if applied == Applied::Inserted {
            self.lifecycle.touch();
        }
    }
}
