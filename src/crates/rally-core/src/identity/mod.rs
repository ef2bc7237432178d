//! Anonymous visitor identity
//!
//! A visitor id is derived once from passive environment signals, persisted
//! in local storage under [`IDENTITY_KEY`], and returned unchanged from then
//! on. It is a soft identifier: collisions and spoofing are possible and
//! tolerated, the id only adds friction against repeat voting.

pub mod hash;
pub mod signals;
pub mod storage;

pub use hash::{fold_hash, identity_from_fingerprint, to_base36};
pub use signals::{EnvironmentSignals, FixedProbe, HostProbe, SignalProbe};
pub use storage::{FileStore, LocalStore, MemoryStore, UnavailableStore};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Storage key the visitor id lives under
pub const IDENTITY_KEY: &str = "nust_user_id";

/// Pseudo-anonymous visitor identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VisitorId(String);

impl VisitorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VisitorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for VisitorId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Where a resolved identity came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentitySource {
    /// Read back from storage
    Stored,
    /// Derived now and persisted
    Derived,
    /// Derived now, storage failed; the next visit derives again
    Ephemeral,
}

/// Derives and persists the visitor id
pub struct IdentityDeriver {
    probe: Arc<dyn SignalProbe>,
    store: Arc<dyn LocalStore>,
    key: String,
}

impl IdentityDeriver {
    pub fn new(probe: Arc<dyn SignalProbe>, store: Arc<dyn LocalStore>) -> Self {
        Self {
            probe,
            store,
            key: IDENTITY_KEY.to_string(),
        }
    }

    /// Use a storage key other than [`IDENTITY_KEY`]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Return the stored id, deriving and persisting one on first use
    pub async fn get_or_create(&self) -> VisitorId {
        self.resolve().await.0
    }

    /// Like [`get_or_create`](Self::get_or_create), also reporting the source
    pub async fn resolve(&self) -> (VisitorId, IdentitySource) {
        let stored = match self.store.get(&self.key).await {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(e) => {
                warn!(error = %e, "Local storage unreadable, visitor will not be remembered");
                None
            }
        };

        if let Some(existing) = stored {
            debug!(visitor = %existing, "Using stored visitor id");
            return (VisitorId(existing), IdentitySource::Stored);
        }

        let signals = self.probe.probe().await;
        if signals.surface.is_none() {
            debug!("Rendering surface unavailable, fingerprinting without it");
        }

        let derived = identity_from_fingerprint(&signals.fingerprint(None));

        match self.store.set(&self.key, &derived).await {
            Ok(()) => {
                info!(visitor = %derived, "Derived new visitor id");
                (VisitorId(derived), IdentitySource::Derived)
            }
            Err(e) => {
                warn!(error = %e, visitor = %derived, "Failed to persist visitor id");
                (VisitorId(derived), IdentitySource::Ephemeral)
            }
        }
    }
}
