//! Session-scoped visitor identity
//!
//! The visitor id is resolved once at startup and shared by every board
//! through an `Arc`. It never changes for the life of the process.

use crate::identity::{IdentityDeriver, IdentitySource, VisitorId};
use std::sync::Arc;
use tracing::info;

/// Immutable identity of the current visitor
#[derive(Debug, Clone)]
pub struct VisitorSession {
    visitor: VisitorId,
    source: IdentitySource,
}

impl VisitorSession {
    /// Resolve the visitor id and open the session
    pub async fn start(deriver: &IdentityDeriver) -> Arc<Self> {
        let (visitor, source) = deriver.resolve().await;
        info!(visitor = %visitor, source = ?source, "Visitor session started");

        Arc::new(Self { visitor, source })
    }

    /// Session for an already-known id
    pub fn with_visitor(visitor: VisitorId) -> Arc<Self> {
        Arc::new(Self {
            visitor,
            source: IdentitySource::Stored,
        })
    }

    pub fn visitor(&self) -> &VisitorId {
        &self.visitor
    }

    pub fn source(&self) -> IdentitySource {
        self.source
    }

    /// Whether the id will survive this process
    pub fn is_persistent(&self) -> bool {
        self.source != IdentitySource::Ephemeral
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{EnvironmentSignals, FixedProbe, MemoryStore, UnavailableStore};

    fn probe() -> Arc<FixedProbe> {
        Arc::new(FixedProbe(EnvironmentSignals {
            user_agent: "agent".to_string(),
            language: "en-US".to_string(),
            screen_width: 1920,
            screen_height: 1080,
            timezone_offset: -300,
            surface: None,
        }))
    }

    #[tokio::test]
    async fn test_start_derives_once() {
        let store = Arc::new(MemoryStore::new());
        let deriver = IdentityDeriver::new(probe(), store);

        let first = VisitorSession::start(&deriver).await;
        let second = VisitorSession::start(&deriver).await;

        assert_eq!(first.visitor().as_str(), "27v7ai");
        assert_eq!(first.source(), IdentitySource::Derived);
        assert_eq!(second.source(), IdentitySource::Stored);
        assert_eq!(first.visitor(), second.visitor());
    }

    #[tokio::test]
    async fn test_unavailable_storage_is_not_persistent() {
        let deriver = IdentityDeriver::new(probe(), Arc::new(UnavailableStore));
        let session = VisitorSession::start(&deriver).await;

        assert!(!session.is_persistent());
        assert_eq!(session.visitor().as_str(), "27v7ai");
    }
}
