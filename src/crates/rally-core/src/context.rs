//! Application context
//!
//! Wires configuration into the pieces every front end needs: the gateway
//! backend, the local store and the visitor session.

use crate::config::RallyConfig;
use crate::error::Result;
use crate::gateway::{Gateway, MemoryGateway, RestGateway};
use crate::identity::{FileStore, HostProbe, IdentityDeriver, LocalStore, UnavailableStore};
use crate::session::VisitorSession;
use std::sync::Arc;
use tracing::{info, warn};

/// Which gateway backend to talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// The configured PostgREST and realtime service
    Remote,
    /// In-process tables; nothing leaves the process
    Offline,
}

/// Shared handles for one run
pub struct RallyContext {
    pub config: RallyConfig,
    pub gateway: Arc<dyn Gateway>,
    pub session: Arc<VisitorSession>,
}

impl RallyContext {
    pub async fn build(config: RallyConfig, backend: Backend) -> Result<Self> {
        let gateway: Arc<dyn Gateway> = match backend {
            Backend::Remote => Arc::new(RestGateway::from_config(&config)?),
            Backend::Offline => {
                info!("Using offline in-memory backend");
                Arc::new(MemoryGateway::new())
            }
        };

        let deriver = IdentityDeriver::new(Arc::new(HostProbe::new()), local_store(&config))
            .with_key(config.identity.storage_key.clone());
        let session = VisitorSession::start(&deriver).await;

        Ok(Self {
            config,
            gateway,
            session,
        })
    }
}

/// The configured local store, or an unavailable one without a home dir
pub fn local_store(config: &RallyConfig) -> Arc<dyn LocalStore> {
    match config.storage_path() {
        Some(path) => Arc::new(FileStore::new(path)),
        None => {
            warn!("No home directory, visitor id will not persist");
            Arc::new(UnavailableStore)
        }
    }
}
