//! Realtime client against the in-process Phoenix fake

mod common;

use common::{eventually, rest_gateway, timestamp_now, FakeRealtime, FakeRest, TEST_ANON_KEY};
use rally_core::gateway::{Gateway, RealtimeClient, Record, RecordKind};
use serde_json::json;
use std::time::Duration;

async fn client() -> (FakeRealtime, RealtimeClient) {
    let fake = FakeRealtime::default();
    let url = fake.start().await;
    let client = RealtimeClient::new(url, "public").with_access_token(TEST_ANON_KEY);
    (fake, client)
}

#[tokio::test]
async fn test_join_uses_table_topic() {
    let (fake, client) = client().await;
    let _sub = client.subscribe(RecordKind::WallMessage).await.unwrap();

    eventually("join", || fake.joins().len() == 1).await;
    let (topic, table) = &fake.joins()[0];
    assert_eq!(topic, "realtime:messages_channel_0");
    assert_eq!(table, "messages");
}

#[tokio::test]
async fn test_pushed_insert_is_delivered() {
    let (fake, client) = client().await;
    let mut sub = client.subscribe(RecordKind::WallMessage).await.unwrap();
    eventually("join", || fake.joins().len() == 1).await;

    fake.push_insert(
        "messages",
        json!({ "id": "m1", "message": "See you at orientation", "created_at": timestamp_now() }),
    );

    let record = tokio::time::timeout(Duration::from_secs(3), sub.next())
        .await
        .unwrap()
        .unwrap();
    match record {
        Record::WallMessage(message) => assert_eq!(message.text, "See you at orientation"),
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn test_subscriptions_share_one_connection() {
    let (fake, client) = client().await;
    let mut votes = client.subscribe(RecordKind::SupportVote).await.unwrap();
    let mut polls = client.subscribe(RecordKind::PollResponse).await.unwrap();
    eventually("joins", || fake.joins().len() == 2).await;

    assert_eq!(fake.connection_count(), 1);

    fake.push_insert(
        "polls",
        json!({
            "id": 3,
            "question": "Do you think OGs abandoned freshmen?",
            "option": "No",
            "user_id": "abc",
            "created_at": timestamp_now()
        }),
    );

    let record = tokio::time::timeout(Duration::from_secs(3), polls.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.kind(), RecordKind::PollResponse);
    assert_eq!(record.id(), "3");
    assert!(votes.try_next().is_none());
}

#[tokio::test]
async fn test_drop_sends_leave() {
    let (fake, client) = client().await;
    let sub = client.subscribe(RecordKind::Experience).await.unwrap();
    eventually("join", || fake.joins().len() == 1).await;

    drop(sub);

    eventually("leave", || fake.leaves().len() == 1).await;
    assert_eq!(fake.leaves()[0], fake.joins()[0].0);
}

#[tokio::test]
async fn test_server_close_ends_subscription() {
    let (fake, client) = client().await;
    let mut sub = client.subscribe(RecordKind::SupportVote).await.unwrap();
    eventually("join", || fake.joins().len() == 1).await;

    fake.close_all();

    let ended = tokio::time::timeout(Duration::from_secs(3), sub.next())
        .await
        .unwrap();
    assert!(ended.is_none());
}

#[tokio::test]
async fn test_heartbeat_is_sent() {
    let fake = FakeRealtime::default();
    let url = fake.start().await;
    let client = RealtimeClient::new(url, "public").with_heartbeat(Duration::from_millis(50));

    let _sub = client.subscribe(RecordKind::SupportVote).await.unwrap();

    eventually("heartbeat", || fake.heartbeats() >= 1).await;
}

#[tokio::test]
async fn test_rest_gateway_subscribes_through_realtime() {
    let rest = FakeRest::default();
    let rest_url = rest.start().await;
    let fake = FakeRealtime::default();
    let ws_url = fake.start().await;
    let gateway = rest_gateway(&rest_url, &ws_url);

    let mut sub = gateway.subscribe_inserts(RecordKind::SupportVote).await.unwrap();
    eventually("join", || fake.joins().len() == 1).await;

    fake.push_insert(
        "votes",
        json!({ "id": "v1", "user_id": "abc", "created_at": timestamp_now() }),
    );

    let record = tokio::time::timeout(Duration::from_secs(3), sub.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.visitor_id(), Some("abc"));
}
