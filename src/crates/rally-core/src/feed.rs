//! Bounded, newest-first feeds
//!
//! A feed holds at most `limit` rows ordered by `created_at` descending and
//! never holds two rows with the same id. Rows reach it from three places:
//! the initial fetch, the caller's own successful insert, and pushed
//! inserts. A pushed echo of a row already applied locally is a duplicate
//! and is dropped.

use crate::gateway::records::{Experience, PollResponse, Record, SupportVote, WallMessage};
use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// A row that can live in a feed
pub trait FeedItem: Clone {
    fn id(&self) -> &str;
    fn created_at(&self) -> DateTime<Utc>;

    /// Extract this item type from a record of any kind
    fn from_record(record: Record) -> Option<Self>;
}

macro_rules! feed_item {
    ($ty:ident) => {
        impl FeedItem for $ty {
            fn id(&self) -> &str {
                &self.id
            }

            fn created_at(&self) -> DateTime<Utc> {
                self.created_at
            }

            fn from_record(record: Record) -> Option<Self> {
                match record {
                    Record::$ty(item) => Some(item),
                    _ => None,
                }
            }
        }
    };
}

feed_item!(SupportVote);
feed_item!(Experience);
feed_item!(WallMessage);
feed_item!(PollResponse);

/// Outcome of applying one row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The row is now in the feed
    Inserted,
    /// A row with the same id was already present
    Duplicate,
    /// The row is older than everything in a full feed
    OutsideWindow,
}

/// Newest-first list of rows, deduplicated by id
#[derive(Debug, Clone)]
pub struct Feed<T> {
    limit: usize,
    items: Vec<T>,
}

impl<T: FeedItem> Feed<T> {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            items: Vec::new(),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.iter().any(|item| item.id() == id)
    }

    /// Merge a fetched page with whatever is already held
    ///
    /// Rows pushed while the fetch was in flight are kept.
    pub fn merge_fetched(&mut self, fetched: Vec<T>) {
        let mut seen: HashSet<String> = HashSet::with_capacity(self.items.len() + fetched.len());
        let mut merged = Vec::with_capacity(self.items.len() + fetched.len());

        for item in fetched.into_iter().chain(self.items.drain(..)) {
            if seen.insert(item.id().to_string()) {
                merged.push(item);
            }
        }

        self.items = merged;
        self.settle();
    }

    /// Apply a row inserted by this process
    pub fn apply_local(&mut self, item: T) -> Applied {
        self.apply(item)
    }

    /// Apply a row delivered by a subscription
    pub fn apply_remote(&mut self, item: T) -> Applied {
        self.apply(item)
    }

    fn apply(&mut self, item: T) -> Applied {
        if self.contains(item.id()) {
            return Applied::Duplicate;
        }

        let id = item.id().to_string();
        self.items.push(item);
        self.settle();

        if self.contains(&id) {
            Applied::Inserted
        } else {
            Applied::OutsideWindow
        }
    }

    fn settle(&mut self) {
        // stable: rows with equal timestamps keep arrival order
        self.items.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        self.items.truncate(self.limit);
    }
}
