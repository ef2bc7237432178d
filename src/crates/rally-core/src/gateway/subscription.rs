//! Insert subscriptions
//!
//! A [`Subscription`] is a scoped registration: dropping it (or calling
//! [`Subscription::unsubscribe`]) releases the backend side exactly once.

use crate::gateway::records::{Record, RecordKind};
use std::fmt;
use tokio::sync::mpsc;
use tracing::debug;

type Release = Box<dyn FnOnce() + Send + 'static>;

/// Live stream of rows inserted into one record kind
pub struct Subscription {
    kind: RecordKind,
    events: mpsc::UnboundedReceiver<Record>,
    release: Option<Release>,
}

impl Subscription {
    /// Create a subscription over a channel of pushed rows
    ///
    /// `release` runs once, when the subscription is dropped or unsubscribed.
    pub fn new<F>(kind: RecordKind, events: mpsc::UnboundedReceiver<Record>, release: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            kind,
            events,
            release: Some(Box::new(release)),
        }
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    /// Wait for the next pushed row; `None` once the channel has ended
    pub async fn next(&mut self) -> Option<Record> {
        self.events.recv().await
    }

    /// Take a pushed row if one is already waiting
    pub fn try_next(&mut self) -> Option<Record> {
        self.events.try_recv().ok()
    }

    /// Release the subscription now
    pub fn unsubscribe(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            debug!(kind = %self.kind, "Releasing subscription");
            release();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("kind", &self.kind)
            .field("released", &self.release.is_none())
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_now();
    }
}
