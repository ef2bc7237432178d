//! Remote data gateway
//!
//! Uniform access to the five record streams. Every stream is append-only
//! from this crate's point of view: rows are fetched, inserted and pushed,
//! never updated or deleted.
//!
//! Backends:
//! - [`RestGateway`]: PostgREST over HTTP with realtime push
//! - [`MemoryGateway`]: in-process tables, used by tests and offline runs

pub mod memory;
pub mod phoenix;
pub mod query;
pub mod realtime;
pub mod records;
pub mod rest;
pub mod subscription;

pub use memory::MemoryGateway;
pub use query::{Filter, Order, Query};
pub use realtime::RealtimeClient;
pub use records::{
    Experience, GuideProfile, NewRecord, PollResponse, Record, RecordKind, SupportVote,
    WallMessage, CREATED_AT_COLUMN, VISITOR_COLUMN,
};
pub use rest::RestGateway;
pub use subscription::Subscription;

use crate::error::{RallyError, Result};
use crate::identity::VisitorId;
use async_trait::async_trait;

/// Fetch, insert and subscribe primitives over the record streams
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Rows matching the query, in the query's order
    async fn fetch_recent(&self, query: &Query) -> Result<Vec<Record>>;

    /// Exact number of rows of a kind matching the filters
    async fn count(&self, kind: RecordKind, filters: &[Filter]) -> Result<u64>;

    /// Insert one row and return it as stored; never retried
    async fn insert(&self, record: NewRecord) -> Result<Record>;

    /// Receive rows inserted into `kind` from now on
    async fn subscribe_inserts(&self, kind: RecordKind) -> Result<Subscription>;

    /// First row of `kind` submitted by `visitor`, if any
    ///
    /// Advisory only: a concurrent insert from the same visitor can land
    /// between this check and the caller's own insert.
    async fn find_by_visitor(
        &self,
        kind: RecordKind,
        visitor: &VisitorId,
        extra: Option<Filter>,
    ) -> Result<Option<Record>> {
        if !kind.has_visitor() {
            return Err(RallyError::Validation(format!(
                "{} rows carry no visitor id",
                kind
            )));
        }

        let mut query = Query::all(kind)
            .filter(Filter::eq(VISITOR_COLUMN, visitor.as_str()))
            .limit(1);
        if let Some(filter) = extra {
            query = query.filter(filter);
        }

        Ok(self.fetch_recent(&query).await?.into_iter().next())
    }
}
