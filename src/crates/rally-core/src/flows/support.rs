//! Support counter and vote button

use crate::error::{RallyError, Result};
use crate::flows::{Board, Lifecycle, SubmissionState, SubmissionTracker};
use crate::gateway::records::{NewRecord, Record, RecordKind, SupportVote};
use crate::gateway::Gateway;
use crate::session::VisitorSession;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Number of votes the progress bar fills at
pub const SUPPORT_GOAL: u64 = 1000;

/// What the support section shows
#[derive(Debug, Clone, PartialEq)]
pub struct SupportSnapshot {
    pub count: u64,
    pub goal: u64,
    pub has_voted: bool,
    pub state: SubmissionState,
}

impl SupportSnapshot {
    /// Percent of the goal reached, capped at 100
    pub fn progress(&self) -> f64 {
        if self.goal == 0 {
            return 100.0;
        }
        (self.count as f64 / self.goal as f64 * 100.0).min(100.0)
    }
}

pub struct SupportBoard {
    gateway: Arc<dyn Gateway>,
    session: Arc<VisitorSession>,
    lifecycle: Lifecycle,
    tracker: SubmissionTracker,
    count: Mutex<u64>,
}

impl SupportBoard {
    pub fn new(gateway: Arc<dyn Gateway>, session: Arc<VisitorSession>) -> Self {
        Self {
            gateway,
            session,
            lifecycle: Lifecycle::new(),
            tracker: SubmissionTracker::single_answer("support vote"),
            count: Mutex::new(0),
        }
    }

    pub fn snapshot(&self) -> SupportSnapshot {
        SupportSnapshot {
            count: *self.count.lock(),
            goal: SUPPORT_GOAL,
            has_voted: self.tracker.is_answered(),
            state: self.tracker.state(),
        }
    }

    pub fn has_voted(&self) -> bool {
        self.tracker.is_answered()
    }

    /// Cast this visitor's vote
    ///
    /// Refused while a vote is in flight and once the visitor has voted.
    pub async fn vote(&self) -> Result<SupportVote> {
        let guard = self.tracker.begin()?;
        let visitor = self.session.visitor();

        let result = self
            .gateway
            .insert(NewRecord::SupportVote {
                visitor_id: visitor.to_string(),
            })
            .await;

        match result {
            Ok(Record::SupportVote(vote)) => {
                guard.succeed();
                info!(visitor = %visitor, "Support vote recorded");
                if self.lifecycle.is_active() {
                    self.refresh_count().await;
                    self.lifecycle.touch();
                }
                Ok(vote)
            }
            Ok(other) => {
                guard.fail();
                Err(RallyError::Other(format!(
                    "Vote insert returned a {} row",
                    other.kind()
                )))
            }
            Err(e) => {
                guard.fail();
                warn!(visitor = %visitor, error = %e, "Support vote failed");
                if self.lifecycle.is_active() {
                    self.lifecycle.touch();
                }
                Err(e)
            }
        }
    }

    async fn refresh_count(&self) {
        match self.gateway.count(RecordKind::SupportVote, &[]).await {
            Ok(count) => {
                if self.lifecycle.is_active() {
                    *self.count.lock() = count;
                }
            }
            Err(e) => warn!(error = %e, "Failed to refresh vote count"),
        }
    }
}

#[async_trait]
impl Board for SupportBoard {
    fn name(&self) -> &'static str {
        "support"
    }

    fn gateway(&self) -> &Arc<dyn Gateway> {
        &self.gateway
    }

    fn live_kind(&self) -> Option<RecordKind> {
        Some(RecordKind::SupportVote)
    }

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    /// Count and visitor check are independent: either result is applied
    /// even when the other read fails, and the first failure is returned
    async fn refresh(&self) -> Result<()> {
        let (count, existing) = tokio::join!(
            self.gateway.count(RecordKind::SupportVote, &[]),
            self.gateway
                .find_by_visitor(RecordKind::SupportVote, self.session.visitor(), None),
        );

        if !self.lifecycle.is_active() {
            debug!("Support fetch finished after unmount, ignoring");
            return Ok(());
        }

        let mut failure = None;
        match count {
            Ok(count) => *self.count.lock() = count,
            Err(e) => failure = Some(e),
        }
        match existing {
            Ok(Some(_)) => self.tracker.mark_answered(),
            Ok(None) => {}
            Err(e) if failure.is_some() => warn!(error = %e, "Vote check failed"),
            Err(e) => failure = Some(e),
        }

        self.lifecycle.touch();
        failure.map_or(Ok(()), Err)
    }

    async fn apply_push(&self, record: Record) {
        if !self.lifecycle.is_active() || record.kind() != RecordKind::SupportVote {
            return;
        }
        if record.visitor_id() == Some(self.session.visitor().as_str()) {
            self.tracker.mark_answered();
        }
        self.refresh_count().await;
        if self.lifecycle.is_active() {
            self.lifecycle.touch();
        }
    }
}
