//! Boards and submission flows
//!
//! A board holds the view state of one section of the page: it fetches when
//! mounted, applies pushed inserts while mounted, and runs submissions
//! through a [`SubmissionTracker`]. Once a board is unmounted, results that
//! arrive late (fetches and inserts that were already in flight) no longer
//! touch its state.

pub mod experience;
pub mod guides;
pub mod message;
pub mod poll;
pub mod support;

pub use experience::{ExperienceBoard, ExperienceDraft, EXPERIENCE_LIMIT, EXPERIENCE_MAX_CHARS};
pub use guides::GuideSpotlight;
pub use message::{MessageWall, MESSAGE_LIMIT, MESSAGE_MAX_CHARS};
pub use poll::{PollBoard, PollOption, PollTally, OG_POLL_QUESTION};
pub use support::{SupportBoard, SupportSnapshot, SUPPORT_GOAL};

use crate::error::{RallyError, Result};
use crate::gateway::records::{Record, RecordKind};
use crate::gateway::Gateway;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Where a submission stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionState {
    Idle,
    Submitting,
    Succeeded,
    Failed,
}

#[derive(Debug)]
struct TrackerInner {
    state: SubmissionState,
    answered: bool,
}

/// Guards the `Idle -> Submitting -> {Succeeded, Failed}` transitions
///
/// A single-answer tracker (votes, poll answers) refuses to start once an
/// answer is on record; a repeatable one (messages, stories) only refuses
/// while a submission is in flight.
#[derive(Debug)]
pub struct SubmissionTracker {
    label: &'static str,
    single_answer: bool,
    inner: Mutex<TrackerInner>,
}

impl SubmissionTracker {
    pub fn single_answer(label: &'static str) -> Self {
        Self::build(label, true)
    }

    pub fn repeatable(label: &'static str) -> Self {
        Self::build(label, false)
    }

    fn build(label: &'static str, single_answer: bool) -> Self {
        Self {
            label,
            single_answer,
            inner: Mutex::new(TrackerInner {
                state: SubmissionState::Idle,
                answered: false,
            }),
        }
    }

    pub fn state(&self) -> SubmissionState {
        self.inner.lock().state
    }

    pub fn is_answered(&self) -> bool {
        self.inner.lock().answered
    }

    /// Record an answer found on the backend
    pub fn mark_answered(&self) {
        if self.single_answer {
            self.inner.lock().answered = true;
        }
    }

    /// Enter `Submitting`, or explain why not
    pub fn begin(&self) -> Result<SubmissionGuard<'_>> {
        let mut inner = self.inner.lock();
        if inner.state == SubmissionState::Submitting {
            return Err(RallyError::SubmissionInFlight(self.label.to_string()));
        }
        if self.single_answer && inner.answered {
            return Err(RallyError::AlreadySubmitted(self.label.to_string()));
        }

        inner.state = SubmissionState::Submitting;
        debug!(flow = self.label, "Submission started");
        Ok(SubmissionGuard {
            tracker: self,
            settled: false,
        })
    }

    fn settle(&self, succeeded: bool) {
        let mut inner = self.inner.lock();
        if succeeded {
            inner.state = SubmissionState::Succeeded;
            if self.single_answer {
                inner.answered = true;
            }
        } else {
            inner.state = SubmissionState::Failed;
        }
    }
}

/// An in-flight submission
///
/// Dropping the guard without settling it (the submitting future was
/// cancelled) counts as a failure.
#[must_use = "a dropped guard marks the submission failed"]
pub struct SubmissionGuard<'a> {
    tracker: &'a SubmissionTracker,
    settled: bool,
}

impl SubmissionGuard<'_> {
    pub fn succeed(mut self) {
        self.settled = true;
        self.tracker.settle(true);
        debug!(flow = self.tracker.label, "Submission succeeded");
    }

    pub fn fail(mut self) {
        self.settled = true;
        self.tracker.settle(false);
    }
}

impl Drop for SubmissionGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.tracker.settle(false);
        }
    }
}

/// Mounted flag and change counter shared by every board
#[derive(Debug)]
pub struct Lifecycle {
    active: AtomicBool,
    revision: watch::Sender<u64>,
}

impl Lifecycle {
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            active: AtomicBool::new(true),
            revision,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Stop accepting results; irreversible
    pub fn deactivate(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    /// Signal observers that the board's state changed
    pub fn touch(&self) {
        self.revision.send_modify(|r| *r += 1);
    }

    /// Receiver that wakes on every state change
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// View-state holder for one section of the page
#[async_trait]
pub trait Board: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    fn gateway(&self) -> &Arc<dyn Gateway>;

    /// Kind whose inserts the board follows; `None` for static boards
    fn live_kind(&self) -> Option<RecordKind>;

    fn lifecycle(&self) -> &Lifecycle;

    /// Fetch the board's data from the backend
    async fn refresh(&self) -> Result<()>;

    /// Apply one pushed insert
    async fn apply_push(&self, record: Record);

    fn is_mounted(&self) -> bool {
        self.lifecycle().is_active()
    }

    fn changes(&self) -> watch::Receiver<u64> {
        self.lifecycle().changes()
    }
}

/// A board that is fetching and following pushes
///
/// Dropping the handle unmounts the board.
pub struct Mounted<B: Board> {
    board: Arc<B>,
    pump: Option<JoinHandle<()>>,
}

impl<B: Board> Mounted<B> {
    pub fn board(&self) -> &Arc<B> {
        &self.board
    }

    /// Release the subscription and ignore any late results
    pub fn unmount(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.board.lifecycle().deactivate();
        if let Some(pump) = self.pump.take() {
            // aborting drops the subscription, which releases it
            pump.abort();
            debug!(board = self.board.name(), "Board unmounted");
        }
    }
}

impl<B: Board> std::ops::Deref for Mounted<B> {
    type Target = B;

    fn deref(&self) -> &B {
        &self.board
    }
}

impl<B: Board> Drop for Mounted<B> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Subscribe, fetch and start applying pushed inserts
///
/// Fetch and subscribe failures are logged and leave the board with
/// whatever it already held; mounting itself never fails.
pub async fn mount<B: Board>(board: Arc<B>) -> Mounted<B> {
    let subscription = match board.live_kind() {
        Some(kind) => match board.gateway().subscribe_inserts(kind).await {
            Ok(subscription) => Some(subscription),
            Err(e) => {
                warn!(board = board.name(), error = %e, "Live updates unavailable");
                None
            }
        },
        None => None,
    };

    if let Err(e) = board.refresh().await {
        warn!(board = board.name(), error = %e, "Initial fetch failed");
    }

    let pump = subscription.map(|mut subscription| {
        let board = board.clone();
        tokio::spawn(async move {
            while let Some(record) = subscription.next().await {
                if !board.is_mounted() {
                    break;
                }
                board.apply_push(record).await;
            }
            debug!(board = board.name(), "Push stream ended");
        })
    });

    Mounted { board, pump }
}

/// Trim and length-check free text before it is submitted
pub(crate) fn validate_text(field: &str, raw: &str, max_chars: usize) -> Result<String> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(RallyError::Validation(format!("{} is empty", field)));
    }
    let length = text.chars().count();
    if length > max_chars {
        return Err(RallyError::Validation(format!(
            "{} is {} characters, the limit is {}",
            field, length, max_chars
        )));
    }
    Ok(text.to_string())
}
