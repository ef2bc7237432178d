//! In-process gateway
//!
//! Holds every table in memory and pushes inserts to subscribers
//! synchronously, before `insert` returns.

use crate::error::{RallyError, Result};
use crate::gateway::query::{Filter, Query};
use crate::gateway::records::{NewRecord, Record, RecordKind};
use crate::gateway::subscription::Subscription;
use crate::gateway::Gateway;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    rows: HashMap<RecordKind, Vec<Record>>,
}

type Subscribers = Mutex<HashMap<u64, (RecordKind, mpsc::UnboundedSender<Record>)>>;

/// Gateway backed by in-process tables
#[derive(Clone, Default)]
pub struct MemoryGateway {
    tables: Arc<Mutex<Tables>>,
    subscribers: Arc<Subscribers>,
    next_subscriber: Arc<AtomicU64>,
    fail_inserts: Arc<AtomicBool>,
    fail_reads: Arc<AtomicBool>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following insert fail (or succeed again)
    pub fn set_fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    /// Make every following fetch and count fail (or succeed again)
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Put a row in place without notifying subscribers
    pub fn seed(&self, record: Record) {
        self.tables
            .lock()
            .rows
            .entry(record.kind())
            .or_default()
            .push(record);
    }

    /// Deliver a row to subscribers without storing it
    ///
    /// Simulates a push arriving for a row this process already holds.
    pub fn push(&self, record: Record) {
        self.notify(&record);
    }

    /// Number of live subscriptions across all kinds
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Number of stored rows of a kind
    pub fn len(&self, kind: RecordKind) -> usize {
        self.tables.lock().rows.get(&kind).map_or(0, Vec::len)
    }

    pub fn is_empty(&self, kind: RecordKind) -> bool {
        self.len(kind) == 0
    }

    fn notify(&self, record: &Record) {
        let mut subscribers = self.subscribers.lock();
        // receivers that went away without releasing are pruned here
        subscribers.retain(|id, (kind, tx)| {
            if *kind != record.kind() {
                return true;
            }
            let delivered = tx.send(record.clone()).is_ok();
            if !delivered {
                debug!(subscriber = id, "Dropping closed subscriber");
            }
            delivered
        });
    }

    fn check_reads(&self) -> Result<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(RallyError::Backend {
                status: 503,
                message: "read failure injected".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Gateway for MemoryGateway {
    async fn fetch_recent(&self, query: &Query) -> Result<Vec<Record>> {
        self.check_reads()?;
        let tables = self.tables.lock();
        let rows = tables.rows.get(&query.kind).map(Vec::as_slice).unwrap_or(&[]);
        Ok(query.apply(rows))
    }

    async fn count(&self, kind: RecordKind, filters: &[Filter]) -> Result<u64> {
        self.check_reads()?;
        let tables = self.tables.lock();
        let count = tables
            .rows
            .get(&kind)
            .map(|rows| {
                rows.iter()
                    .filter(|r| filters.iter().all(|f| f.matches(r)))
                    .count()
            })
            .unwrap_or(0);
        Ok(count as u64)
    }

    async fn insert(&self, record: NewRecord) -> Result<Record> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(RallyError::Backend {
                status: 503,
                message: "insert failure injected".to_string(),
            });
        }

        let stored = record.into_record(Uuid::new_v4().to_string(), Utc::now());
        self.seed(stored.clone());
        debug!(kind = %stored.kind(), id = stored.id(), "Row inserted");

        self.notify(&stored);
        Ok(stored)
    }

    async fn subscribe_inserts(&self, kind: RecordKind) -> Result<Subscription> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_subscriber.fetch_add(1, Ordering::SeqCst);
        self.subscribers.lock().insert(id, (kind, tx));

        let subscribers = Arc::downgrade(&self.subscribers);
        Ok(Subscription::new(kind, rx, move || {
            if let Some(subscribers) = subscribers.upgrade() {
                subscribers.lock().remove(&id);
            }
        }))
    }
}
