//! Gateway behavior against the in-memory backend and the REST fake

mod common;

use common::{rest_gateway, FakeRealtime, FakeRest, TEST_ANON_KEY};
use rally_core::gateway::{Filter, Gateway, MemoryGateway, NewRecord, Query, Record, RecordKind};
use rally_core::{RallyError, VisitorId};
use serde_json::json;
use std::sync::atomic::Ordering;

fn vote(visitor: &str) -> NewRecord {
    NewRecord::SupportVote {
        visitor_id: visitor.to_string(),
    }
}

async fn rest_fixture() -> (FakeRest, rally_core::RestGateway) {
    let rest = FakeRest::default();
    let url = rest.start().await;
    let realtime = FakeRealtime::default();
    let ws = realtime.start().await;
    (rest.clone(), rest_gateway(&url, &ws))
}

// ============================================================================
// Memory backend
// ============================================================================

#[tokio::test]
async fn test_memory_insert_then_fetch_contains_row() {
    let gateway = MemoryGateway::new();
    let stored = gateway
        .insert(NewRecord::WallMessage {
            text: "Thank you OGs".to_string(),
        })
        .await
        .unwrap();

    let rows = gateway
        .fetch_recent(&Query::recent(RecordKind::WallMessage, 50))
        .await
        .unwrap();

    assert!(rows.contains(&stored));
}

#[tokio::test]
async fn test_memory_find_by_visitor() {
    let gateway = MemoryGateway::new();
    gateway.insert(vote("visitor-a")).await.unwrap();

    let found = gateway
        .find_by_visitor(RecordKind::SupportVote, &VisitorId::new("visitor-a"), None)
        .await
        .unwrap();
    let missing = gateway
        .find_by_visitor(RecordKind::SupportVote, &VisitorId::new("visitor-b"), None)
        .await
        .unwrap();

    assert_eq!(found.and_then(|r| r.visitor_id().map(str::to_string)), Some("visitor-a".to_string()));
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_find_by_visitor_rejects_kinds_without_visitor() {
    let gateway = MemoryGateway::new();
    let err = gateway
        .find_by_visitor(RecordKind::WallMessage, &VisitorId::new("v"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, RallyError::Validation(_)));
}

#[tokio::test]
async fn test_memory_find_by_visitor_with_extra_filter() {
    let gateway = MemoryGateway::new();
    gateway
        .insert(NewRecord::PollResponse {
            question: "Other question".to_string(),
            option: "Yes".to_string(),
            visitor_id: "v".to_string(),
        })
        .await
        .unwrap();

    let found = gateway
        .find_by_visitor(
            RecordKind::PollResponse,
            &VisitorId::new("v"),
            Some(Filter::eq("question", "Do you think OGs abandoned freshmen?")),
        )
        .await
        .unwrap();

    assert!(found.is_none());
}

// ============================================================================
// REST backend
// ============================================================================

#[tokio::test]
async fn test_rest_insert_then_fetch_contains_row() {
    let (rest, gateway) = rest_fixture().await;

    let stored = gateway
        .insert(NewRecord::Experience {
            name: None,
            text: "My OG showed me the library on day one.".to_string(),
        })
        .await
        .unwrap();

    let rows = gateway
        .fetch_recent(&Query::recent(RecordKind::Experience, 20))
        .await
        .unwrap();

    assert_eq!(rows, vec![stored.clone()]);
    assert_eq!(rest.rows("experiences")[0]["experience"], "My OG showed me the library on day one.");
    match stored {
        Record::Experience(experience) => assert_eq!(experience.display_name(), "Anonymous"),
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn test_rest_sends_auth_headers() {
    let (rest, gateway) = rest_fixture().await;
    gateway
        .fetch_recent(&Query::recent(RecordKind::WallMessage, 50))
        .await
        .unwrap();

    let headers = rest.last_headers.lock().clone().unwrap();
    assert_eq!(headers["apikey"], TEST_ANON_KEY);
    assert_eq!(headers["authorization"], format!("Bearer {}", TEST_ANON_KEY).as_str());
}

#[tokio::test]
async fn test_rest_fetch_orders_and_limits() {
    let (rest, gateway) = rest_fixture().await;
    for (id, at) in [
        ("m1", "2025-09-01T10:00:00.000000Z"),
        ("m2", "2025-09-01T12:00:00.000000Z"),
        ("m3", "2025-09-01T11:00:00.000000Z"),
    ] {
        rest.seed("messages", json!({ "id": id, "message": id, "created_at": at }));
    }

    let rows = gateway
        .fetch_recent(&Query::recent(RecordKind::WallMessage, 2))
        .await
        .unwrap();
    let ids: Vec<&str> = rows.iter().map(Record::id).collect();

    assert_eq!(ids, vec!["m2", "m3"]);
}

#[tokio::test]
async fn test_rest_count_uses_content_range() {
    let (rest, gateway) = rest_fixture().await;
    assert_eq!(gateway.count(RecordKind::SupportVote, &[]).await.unwrap(), 0);

    for visitor in ["a", "b", "c"] {
        gateway.insert(vote(visitor)).await.unwrap();
    }

    assert_eq!(gateway.count(RecordKind::SupportVote, &[]).await.unwrap(), 3);
    assert_eq!(
        gateway
            .count(RecordKind::SupportVote, &[Filter::eq("user_id", "b")])
            .await
            .unwrap(),
        1
    );
    assert_eq!(rest.rows("votes").len(), 3);
}

#[tokio::test]
async fn test_rest_find_by_visitor() {
    let (_rest, gateway) = rest_fixture().await;
    gateway.insert(vote("visitor-a")).await.unwrap();

    let found = gateway
        .find_by_visitor(RecordKind::SupportVote, &VisitorId::new("visitor-a"), None)
        .await
        .unwrap();
    assert!(found.is_some());
}

#[tokio::test]
async fn test_rest_reads_retry_server_errors() {
    let (rest, gateway) = rest_fixture().await;
    rest.fail_next_reads(2);

    let rows = gateway
        .fetch_recent(&Query::recent(RecordKind::WallMessage, 50))
        .await
        .unwrap();

    assert!(rows.is_empty());
    assert_eq!(rest.reads.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_rest_reads_give_up_after_max_retries() {
    let (rest, gateway) = rest_fixture().await;
    rest.fail_next_reads(10);

    let err = gateway
        .fetch_recent(&Query::recent(RecordKind::WallMessage, 50))
        .await
        .unwrap_err();

    assert!(matches!(err, RallyError::Backend { status: 503, .. }));
    // one attempt plus two retries
    assert_eq!(rest.reads.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_rest_insert_is_not_retried() {
    let (rest, gateway) = rest_fixture().await;
    rest.set_fail_inserts(true);

    let err = gateway.insert(vote("a")).await.unwrap_err();

    match err {
        RallyError::Backend { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "insert rejected");
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(rest.inserts.load(Ordering::SeqCst), 1);
    assert!(rest.rows("votes").is_empty());
}

#[tokio::test]
async fn test_rest_accepts_numeric_ids() {
    let (rest, gateway) = rest_fixture().await;
    rest.seed(
        "ogs",
        json!({ "id": 7, "name": "Sara", "dept": "SEECS", "quote": "Ask me anything", "photo_url": null }),
    );

    let rows = gateway
        .fetch_recent(&Query::all(RecordKind::GuideProfile))
        .await
        .unwrap();

    assert_eq!(rows[0].id(), "7");
}
