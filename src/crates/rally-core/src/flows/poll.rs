//! The OG poll
//!
//! One fixed question with two options. The tally is rebuilt from the rows
//! for that question and keyed by row id, so a pushed echo of the visitor's
//! own answer is not counted twice.

use crate::error::{RallyError, Result};
use crate::flows::{Board, Lifecycle, SubmissionState, SubmissionTracker};
use crate::gateway::query::{Filter, Query};
use crate::gateway::records::{NewRecord, PollResponse, Record, RecordKind};
use crate::gateway::Gateway;
use crate::session::VisitorSession;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const OG_POLL_QUESTION: &str = "Do you think OGs abandoned freshmen?";

const QUESTION_COLUMN: &str = "question";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PollOption {
    Yes,
    No,
}

impl PollOption {
    pub const ALL: [PollOption; 2] = [PollOption::Yes, PollOption::No];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Yes => "Yes",
            Self::No => "No",
        }
    }

    /// Option as written in a backend row; only the exact labels count
    pub fn from_stored(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|option| option.as_str() == value)
    }
}

impl fmt::Display for PollOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PollOption {
    type Err = RallyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yes" => Ok(Self::Yes),
            "no" => Ok(Self::No),
            other => Err(RallyError::Validation(format!(
                "'{}' is not a poll option, expected Yes or No",
                other
            ))),
        }
    }
}

/// Vote counts per option
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollTally {
    pub yes: u64,
    pub no: u64,
}

impl PollTally {
    pub fn total(&self) -> u64 {
        self.yes + self.no
    }

    pub fn votes(&self, option: PollOption) -> u64 {
        match option {
            PollOption::Yes => self.yes,
            PollOption::No => self.no,
        }
    }

    /// Share of the votes, rounded to one decimal; `0.0` with no votes
    pub fn percentage(&self, option: PollOption) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        (self.votes(option) as f64 / total as f64 * 1000.0).round() / 10.0
    }
}

#[derive(Default)]
struct PollState {
    responses: HashMap<String, PollOption>,
    user_vote: Option<PollOption>,
}

pub struct PollBoard {
    gateway: Arc<dyn Gateway>,
    session: Arc<VisitorSession>,
    lifecycle: Lifecycle,
    tracker: SubmissionTracker,
    state: Mutex<PollState>,
}

impl PollBoard {
    pub fn new(gateway: Arc<dyn Gateway>, session: Arc<VisitorSession>) -> Self {
        Self {
            gateway,
            session,
            lifecycle: Lifecycle::new(),
            tracker: SubmissionTracker::single_answer("poll answer"),
            state: Mutex::new(PollState::default()),
        }
    }

    pub fn question(&self) -> &'static str {
        OG_POLL_QUESTION
    }

    pub fn tally(&self) -> PollTally {
        let state = self.state.lock();
        let mut tally = PollTally::default();
        for option in state.responses.values() {
            match option {
                PollOption::Yes => tally.yes += 1,
                PollOption::No => tally.no += 1,
            }
        }
        tally
    }

    /// The visitor's own answer, if any
    pub fn user_vote(&self) -> Option<PollOption> {
        self.state.lock().user_vote
    }

    pub fn submission_state(&self) -> SubmissionState {
        self.tracker.state()
    }

    /// Answer the poll
    pub async fn vote(&self, option: PollOption) -> Result<PollResponse> {
        let guard = self.tracker.begin()?;
        let visitor = self.session.visitor();

        let result = self
            .gateway
            .insert(NewRecord::PollResponse {
                question: OG_POLL_QUESTION.to_string(),
                option: option.as_str().to_string(),
                visitor_id: visitor.to_string(),
            })
            .await;

        let response = match result {
            Ok(Record::PollResponse(response)) => response,
            Ok(other) => {
                guard.fail();
                return Err(RallyError::Other(format!(
                    "Poll insert returned a {} row",
                    other.kind()
                )));
            }
            Err(e) => {
                guard.fail();
                warn!(visitor = %visitor, error = %e, "Poll answer failed");
                self.touch_if_mounted();
                return Err(e);
            }
        };

        guard.succeed();
        info!(visitor = %visitor, option = %option, "Poll answer recorded");

        if self.lifecycle.is_active() {
            let mut state = self.state.lock();
            state.responses.insert(response.id.clone(), option);
            state.user_vote = Some(option);
            drop(state);
            self.lifecycle.touch();
        }
        Ok(response)
    }

    fn touch_if_mounted(&self) {
        if self.lifecycle.is_active() {
            self.lifecycle.touch();
        }
    }
}

#[async_trait]
impl Board for PollBoard {
    fn name(&self) -> &'static str {
        "poll"
    }

    fn gateway(&self) -> &Arc<dyn Gateway> {
        &self.gateway
    }

    fn live_kind(&self) -> Option<RecordKind> {
        Some(RecordKind::PollResponse)
    }

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    /// Tally and the visitor's own answer are read independently; a failed
    /// tally read still leaves the visitor marked as answered
    async fn refresh(&self) -> Result<()> {
        let query = Query::all(RecordKind::PollResponse)
            .filter(Filter::eq(QUESTION_COLUMN, OG_POLL_QUESTION));
        let (rows, own) = tokio::join!(
            self.gateway.fetch_recent(&query),
            self.gateway.find_by_visitor(
                RecordKind::PollResponse,
                self.session.visitor(),
                Some(Filter::eq(QUESTION_COLUMN, OG_POLL_QUESTION)),
            ),
        );

        if !self.lifecycle.is_active() {
            debug!("Poll fetch finished after unmount, ignoring");
            return Ok(());
        }

        let mut failure = None;
        let mut state = self.state.lock();
        match rows {
            Ok(rows) => {
                for row in rows {
                    if let Record::PollResponse(response) = row {
                        if let Some(option) = PollOption::from_stored(&response.option) {
                            state.responses.insert(response.id, option);
                        }
                    }
                }
            }
            Err(e) => failure = Some(e),
        }
        match own {
            Ok(Some(Record::PollResponse(own))) => {
                state.user_vote = PollOption::from_stored(&own.option);
                self.tracker.mark_answered();
            }
            Ok(_) => {}
            Err(e) if failure.is_some() => warn!(error = %e, "Poll answer check failed"),
            Err(e) => failure = Some(e),
        }
        drop(state);

        self.lifecycle.touch();
        failure.map_or(Ok(()), Err)
    }

    async fn apply_push(&self, record: Record) {
        if !self.lifecycle.is_active() {
            return;
        }
        let Record::PollResponse(response) = record else {
            return;
        };
        if response.question != OG_POLL_QUESTION {
            return;
        }
        let Some(option) = PollOption::from_stored(&response.option) else {
            debug!(option = %response.option, "Ignoring unknown poll option");
            return;
        };

        let mut state = self.state.lock();
        let is_new = state.responses.insert(response.id, option).is_none();
        if response.visitor_id == self.session.visitor().as_str() {
            state.user_vote = Some(option);
            self.tracker.mark_answered();
        }
        drop(state);

        if is_new {
            self.lifecycle.touch();
        }
    }
}
