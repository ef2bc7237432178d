//! Guide spotlight: read-only list of orientation guides

use crate::error::Result;
use crate::flows::{Board, Lifecycle};
use crate::gateway::query::{Order, Query};
use crate::gateway::records::{GuideProfile, Record, RecordKind};
use crate::gateway::Gateway;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

pub struct GuideSpotlight {
    gateway: Arc<dyn Gateway>,
    lifecycle: Lifecycle,
    guides: Mutex<Vec<GuideProfile>>,
}

impl GuideSpotlight {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self {
            gateway,
            lifecycle: Lifecycle::new(),
            guides: Mutex::new(Vec::new()),
        }
    }

    /// Guides ordered by name
    pub fn guides(&self) -> Vec<GuideProfile> {
        self.guides.lock().clone()
    }
}

#[async_trait]
impl Board for GuideSpotlight {
    fn name(&self) -> &'static str {
        "guides"
    }

    fn gateway(&self) -> &Arc<dyn Gateway> {
        &self.gateway
    }

    fn live_kind(&self) -> Option<RecordKind> {
        None
    }

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    async fn refresh(&self) -> Result<()> {
        let query = Query::all(RecordKind::GuideProfile).order_by(Order::asc("name"));
        let rows = self.gateway.fetch_recent(&query).await?;

        if !self.lifecycle.is_active() {
            debug!("Guide fetch finished after unmount, ignoring");
            return Ok(());
        }

        *self.guides.lock() = rows
            .into_iter()
            .filter_map(|record| match record {
                Record::GuideProfile(guide) => Some(guide),
                _ => None,
            })
            .collect();
        self.lifecycle.touch();
        Ok(())
    }

    async fn apply_push(&self, _record: Record) {}
}
