//! Visitor identity derivation and persistence

mod common;

use common::{deriver, signals};
use rally_core::identity::{
    identity_from_fingerprint, FileStore, IdentitySource, LocalStore, MemoryStore,
    UnavailableStore, IDENTITY_KEY,
};
use rally_core::VisitorSession;
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::test]
async fn test_derivation_is_deterministic() {
    let first = deriver("agent", Arc::new(MemoryStore::new())).get_or_create().await;
    let second = deriver("agent", Arc::new(MemoryStore::new())).get_or_create().await;

    assert_eq!(first, second);
    assert_eq!(first.as_str(), "27v7ai");
    assert_eq!(
        first.as_str(),
        identity_from_fingerprint(&signals("agent").fingerprint(None))
    );
}

#[tokio::test]
async fn test_stored_identity_wins_over_changed_signals() {
    let store: Arc<dyn LocalStore> = Arc::new(MemoryStore::new());

    let original = deriver("agent", store.clone()).get_or_create().await;
    let (later, source) = deriver("other agent", store.clone()).resolve().await;

    assert_eq!(later, original);
    assert_eq!(source, IdentitySource::Stored);
    assert_eq!(store.get(IDENTITY_KEY).await.unwrap().as_deref(), Some("27v7ai"));
}

#[tokio::test]
async fn test_different_signals_give_different_ids() {
    let a = deriver("agent", Arc::new(MemoryStore::new())).get_or_create().await;
    let b = deriver("other agent", Arc::new(MemoryStore::new())).get_or_create().await;

    assert_ne!(a, b);
    assert_eq!(b.as_str(), "sme9ty");
}

#[tokio::test]
async fn test_file_store_survives_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("storage.json");

    let first = deriver("agent", Arc::new(FileStore::new(&path)))
        .get_or_create()
        .await;
    assert!(path.exists());

    // a new process with different signals reads the same file
    let (second, source) = deriver("other agent", Arc::new(FileStore::new(&path)))
        .resolve()
        .await;

    assert_eq!(first, second);
    assert_eq!(source, IdentitySource::Stored);
}

#[tokio::test]
async fn test_file_store_keeps_other_keys() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("storage.json");
    std::fs::write(&path, r#"{"theme":"dark"}"#).unwrap();

    deriver("agent", Arc::new(FileStore::new(&path)))
        .get_or_create()
        .await;

    let store = FileStore::new(&path);
    assert_eq!(store.get("theme").await.unwrap().as_deref(), Some("dark"));
    assert_eq!(store.get(IDENTITY_KEY).await.unwrap().as_deref(), Some("27v7ai"));
}

#[tokio::test]
async fn test_unavailable_storage_is_a_new_visitor_every_time() {
    let (id, source) = deriver("agent", Arc::new(UnavailableStore)).resolve().await;

    assert_eq!(source, IdentitySource::Ephemeral);
    assert_eq!(id.as_str(), "27v7ai");

    let session = VisitorSession::start(&deriver("agent", Arc::new(UnavailableStore))).await;
    assert!(!session.is_persistent());
}

#[tokio::test]
async fn test_corrupt_storage_file_is_not_fatal() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("storage.json");
    std::fs::write(&path, "{ not json").unwrap();

    let (id, source) = deriver("agent", Arc::new(FileStore::new(&path))).resolve().await;

    assert_eq!(id.as_str(), "27v7ai");
    assert_eq!(source, IdentitySource::Ephemeral);
}

#[tokio::test]
async fn test_custom_storage_key() {
    let store: Arc<dyn LocalStore> = Arc::new(MemoryStore::new());
    deriver("agent", store.clone())
        .with_key("rally_visitor")
        .get_or_create()
        .await;

    assert!(store.get(IDENTITY_KEY).await.unwrap().is_none());
    assert!(store.get("rally_visitor").await.unwrap().is_some());
}
