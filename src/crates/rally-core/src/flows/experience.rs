//! Experience stories
//!
//! Longer free-text stories with an optional author name. A blank name is
//! stored as no name and shown as `Anonymous`.

use crate::error::{RallyError, Result};
use crate::feed::{Applied, Feed, FeedItem};
use crate::flows::{validate_text, Board, Lifecycle, SubmissionState, SubmissionTracker};
use crate::gateway::query::Query;
use crate::gateway::records::{Experience, NewRecord, Record, RecordKind};
use crate::gateway::Gateway;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, warn};

pub const EXPERIENCE_MAX_CHARS: usize = 500;

/// Default number of stories shown
pub const EXPERIENCE_LIMIT: usize = 20;

/// Unsubmitted story input
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExperienceDraft {
    pub name: String,
    pub text: String,
}

impl ExperienceDraft {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }

    fn author(&self) -> Option<String> {
        let name = self.name.trim();
        (!name.is_empty()).then(|| name.to_string())
    }
}

pub struct ExperienceBoard {
    gateway: Arc<dyn Gateway>,
    lifecycle: Lifecycle,
    tracker: SubmissionTracker,
    feed: Mutex<Feed<Experience>>,
    draft: Mutex<ExperienceDraft>,
}

impl ExperienceBoard {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self::with_limit(gateway, EXPERIENCE_LIMIT)
    }

    pub fn with_limit(gateway: Arc<dyn Gateway>, limit: usize) -> Self {
        Self {
            gateway,
            lifecycle: Lifecycle::new(),
            tracker: SubmissionTracker::repeatable("experience"),
            feed: Mutex::new(Feed::new(limit)),
            draft: Mutex::new(ExperienceDraft::default()),
        }
    }

    /// Stories, newest first
    pub fn experiences(&self) -> Vec<Experience> {
        self.feed.lock().items().to_vec()
    }

    pub fn draft(&self) -> ExperienceDraft {
        self.draft.lock().clone()
    }

    pub fn set_draft(&self, draft: ExperienceDraft) {
        *self.draft.lock() = draft;
    }

    pub fn submission_state(&self) -> SubmissionState {
        self.tracker.state()
    }

    /// Share the current draft; clears it on success, keeps it on failure
    pub async fn submit(&self) -> Result<Experience> {
        let draft = self.draft();
        let text = validate_text("Experience", &draft.text, EXPERIENCE_MAX_CHARS)?;
        let guard = self.tracker.begin()?;

        let result = self
            .gateway
            .insert(NewRecord::Experience {
                name: draft.author(),
                text,
            })
            .await;

        let story = match result.and_then(|record| {
            Experience::from_record(record).ok_or_else(|| {
                RallyError::Other("Experience insert returned another kind".to_string())
            })
        }) {
            Ok(story) => story,
            Err(e) => {
                guard.fail();
                warn!(error = %e, "Sharing experience failed");
                if self.lifecycle.is_active() {
                    self.lifecycle.touch();
                }
                return Err(e);
            }
        };

        guard.succeed();
        if self.lifecycle.is_active() {
            *self.draft.lock() = ExperienceDraft::default();
            self.feed.lock().apply_local(story.clone());
            self.lifecycle.touch();
        }
        Ok(story)
    }

    /// Set the draft and share it
    pub async fn share(&self, name: Option<&str>, text: impl Into<String>) -> Result<Experience> {
        self.set_draft(ExperienceDraft::new(name.unwrap_or_default(), text));
        self.submit().await
    }
}

#[async_trait]
impl Board for ExperienceBoard {
    fn name(&self) -> &'static str {
        "experiences"
    }

    fn gateway(&self) -> &Arc<dyn Gateway> {
        &self.gateway
    }

    fn live_kind(&self) -> Option<RecordKind> {
        Some(RecordKind::Experience)
    }

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    async fn refresh(&self) -> Result<()> {
        let limit = self.feed.lock().limit();
        let rows = self
            .gateway
            .fetch_recent(&Query::recent(RecordKind::Experience, limit))
            .await?;

        if !self.lifecycle.is_active() {
            debug!("Experience fetch finished after unmount, ignoring");
            return Ok(());
        }

        let fetched = rows.into_iter().filter_map(Experience::from_record).collect();
        self.feed.lock().merge_fetched(fetched);
        self.lifecycle.touch();
        Ok(())
    }

    async fn apply_push(&self, record: Record) {
        if !self.lifecycle.is_active() {
            return;
        }
        let Some(story) = Experience::from_record(record) else {
            return;
        };
        if self.feed.lock().apply_remote(story) == Applied::Inserted {
            self.lifecycle.touch();
        }
    }
}
