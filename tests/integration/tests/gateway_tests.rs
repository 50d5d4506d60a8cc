//! Gateway integration tests
//!
//! Each test scripts a mock gateway on a local port and drives real shard
//! runners against it.
//!
//! Run with: cargo test -p integration-tests --test gateway_tests

use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::{Json, Router};
use chord_common::ErrorKind;
use chord_core::{ShardInfo, Snowflake};
use chord_gateway::{Client, ConnectionState, Event, GatewayMessage, OpCode, ShardManager};
use integration_tests::{
    client_config, message_create, ready, shard_config, MockApi, MockGateway, TEST_TIMEOUT, TOKEN,
};
use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::timeout;

async fn next_event(events: &mut mpsc::Receiver<Event>) -> Event {
    timeout(TEST_TIMEOUT, events.recv())
        .await
        .expect("no event in time")
        .expect("event channel closed")
}

fn start_manager(gateway_url: &str) -> (Arc<ShardManager>, mpsc::Receiver<Event>) {
    let (events_tx, events_rx) = mpsc::channel(16);
    let manager = ShardManager::new(shard_config(gateway_url), events_tx).expect("valid shard config");
    (Arc::new(manager), events_rx)
}

// ============================================================================
// Connect / identify
// ============================================================================

#[tokio::test]
async fn test_client_discovers_gateway_and_delivers_events() {
    let mut gateway = MockGateway::start().await.unwrap();
    let gateway_url = gateway.url().to_string();

    let app = Router::new().route(
        "/gateway/bot",
        get(move || {
            let url = gateway_url.clone();
            async move {
                Json(json!({
                    "url": url,
                    "shards": 1,
                    "session_start_limit": { "total": 1000, "remaining": 999, "reset_after": 0, "max_concurrency": 1 },
                }))
            }
        }),
    );
    let api = MockApi::start(app).await.unwrap();

    let client = Arc::new(Client::new(client_config(None, Some(api.base_url()))).unwrap());
    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
    client.subscribe("MESSAGE_CREATE", move |event: Arc<Event>| {
        let seen_tx = seen_tx.clone();
        async move {
            let _ = seen_tx.send(event);
            anyhow::Ok(())
        }
    });

    let running = tokio::spawn({
        let client = client.clone();
        async move { client.start().await }
    });

    let mut conn = gateway.accept().await.unwrap();
    conn.hello().await.unwrap();

    let identify = conn.recv_command().await.unwrap();
    assert_eq!(identify.op, OpCode::Identify);
    let payload = identify.as_identify().expect("identify payload");
    assert_eq!(payload.token, TOKEN);
    assert_eq!(payload.shard, ShardInfo::ONE);

    conn.dispatch("READY", 1, ready("S", gateway.url())).await.unwrap();
    conn.dispatch("MESSAGE_CREATE", 2, message_create("hello")).await.unwrap();

    let event = timeout(TEST_TIMEOUT, seen_rx.recv()).await.unwrap().unwrap();
    assert_eq!(event.name, "MESSAGE_CREATE");
    assert_eq!(event.seq, Some(2));
    assert_eq!(event.data["content"], "hello");
    assert_eq!(event.guild_id(), Some(Snowflake::new(3003)));
    assert_eq!(client.states()[&0], ConnectionState::Connected);

    client.shutdown();
    let result = timeout(TEST_TIMEOUT, running).await.unwrap().unwrap();
    assert!(result.is_ok());
    assert_eq!(conn.recv_close().await.unwrap(), Some(1000));
    assert_eq!(client.states()[&0], ConnectionState::ClosedPermanently);
}

// ============================================================================
// Reconnects
// ============================================================================

#[tokio::test]
async fn test_resume_after_connection_drop() {
    let mut gateway = MockGateway::start().await.unwrap();
    let (manager, mut events) = start_manager(gateway.url());
    let running = tokio::spawn({
        let manager = manager.clone();
        async move { manager.run().await }
    });
    let shard = manager.shard(0).unwrap();

    let mut first = gateway.accept().await.unwrap();
    first.hello().await.unwrap();
    assert_eq!(first.recv_command().await.unwrap().op, OpCode::Identify);
    first.dispatch("READY", 1, ready("S", gateway.url())).await.unwrap();
    first.dispatch("MESSAGE_CREATE", 2, message_create("before")).await.unwrap();
    assert_eq!(next_event(&mut events).await.name, "READY");
    assert_eq!(next_event(&mut events).await.seq, Some(2));

    // Resumable close code
    first.close(4000).await.unwrap();

    let mut second = gateway.accept().await.unwrap();
    second.hello().await.unwrap();
    let resume = second.recv_command().await.unwrap();
    assert_eq!(resume.op, OpCode::Resume);
    let payload = resume.as_resume().expect("resume payload");
    assert_eq!(payload.session_id, "S");
    assert_eq!(payload.seq, 2);
    assert_eq!(payload.token, TOKEN);

    second.dispatch("RESUMED", 3, json!({})).await.unwrap();
    timeout(TEST_TIMEOUT, shard.wait_for(ConnectionState::Connected))
        .await
        .unwrap()
        .unwrap();
    let resumed = next_event(&mut events).await;
    assert_eq!(resumed.name, "RESUMED");
    assert_eq!(resumed.seq, Some(3));

    manager.shutdown();
    assert!(timeout(TEST_TIMEOUT, running).await.unwrap().unwrap().is_ok());
}

#[tokio::test]
async fn test_non_resumable_invalid_session_identifies_again() {
    let mut gateway = MockGateway::start().await.unwrap();
    let (manager, mut events) = start_manager(gateway.url());
    let running = tokio::spawn({
        let manager = manager.clone();
        async move { manager.run().await }
    });

    let mut first = gateway.accept().await.unwrap();
    first.hello().await.unwrap();
    assert_eq!(first.recv_command().await.unwrap().op, OpCode::Identify);
    first.dispatch("READY", 1, ready("S", gateway.url())).await.unwrap();
    assert_eq!(next_event(&mut events).await.name, "READY");

    first
        .send(&GatewayMessage::invalid_session(false))
        .await
        .unwrap();
    assert_eq!(first.recv_close().await.unwrap(), Some(1000));

    // The client waits 1-5 seconds before identifying again
    let mut second = gateway.accept().await.unwrap();
    second.hello().await.unwrap();
    let identify = second.recv_command().await.unwrap();
    assert_eq!(identify.op, OpCode::Identify);

    second.dispatch("READY", 1, ready("T", gateway.url())).await.unwrap();
    let ready_again = next_event(&mut events).await;
    assert_eq!(ready_again.name, "READY");
    assert_eq!(ready_again.data["session_id"], "T");

    manager.shutdown();
    assert!(timeout(TEST_TIMEOUT, running).await.unwrap().unwrap().is_ok());
}

#[tokio::test]
async fn test_heartbeats_continue_while_events_back_up() {
    let mut gateway = MockGateway::start().await.unwrap();
    // Nobody reads the event channel
    let (manager, _events) = start_manager(gateway.url());
    let running = tokio::spawn({
        let manager = manager.clone();
        async move { manager.run().await }
    });

    let mut conn = gateway.accept().await.unwrap();
    conn.send(&GatewayMessage::hello(300)).await.unwrap();
    assert_eq!(conn.recv_command().await.unwrap().op, OpCode::Identify);
    conn.dispatch("READY", 1, ready("S", gateway.url())).await.unwrap();
    for seq in 2..=41 {
        conn.dispatch("MESSAGE_CREATE", seq, message_create("busy")).await.unwrap();
    }

    let beats = conn.answer_heartbeats(Duration::from_secs(3)).await.unwrap();
    assert!(beats >= 5, "only {beats} heartbeats in 3s");
    assert_eq!(manager.states()[&0], ConnectionState::Connected);

    manager.shutdown();
    assert!(timeout(TEST_TIMEOUT, running).await.unwrap().unwrap().is_ok());
    assert_eq!(conn.recv_close().await.unwrap(), Some(1000));
}

// ============================================================================
// Fatal closes and shutdown
// ============================================================================

#[tokio::test]
async fn test_authentication_failure_stops_the_manager() {
    let mut gateway = MockGateway::start().await.unwrap();
    let (manager, _events) = start_manager(gateway.url());
    let running = tokio::spawn({
        let manager = manager.clone();
        async move { manager.run().await }
    });

    let mut conn = gateway.accept().await.unwrap();
    conn.hello().await.unwrap();
    assert_eq!(conn.recv_command().await.unwrap().op, OpCode::Identify);
    conn.close(4004).await.unwrap();

    let error = timeout(TEST_TIMEOUT, running)
        .await
        .unwrap()
        .unwrap()
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Authentication);
    assert_eq!(manager.states()[&0], ConnectionState::ClosedPermanently);
}

#[tokio::test]
async fn test_client_shutdown_during_backoff() {
    let mut config = client_config(Some("ws://127.0.0.1:1"), None);
    config.reconnect.min_delay_ms = 60_000;
    config.reconnect.max_delay_ms = 120_000;
    let client = Arc::new(Client::new(config).unwrap());

    let running = tokio::spawn({
        let client = client.clone();
        async move { client.start().await }
    });

    timeout(TEST_TIMEOUT, async {
        while client.states().get(&0) != Some(&ConnectionState::Reconnecting) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("shard never started backing off");

    client.shutdown();
    let result = timeout(Duration::from_secs(2), running)
        .await
        .expect("client did not stop promptly")
        .unwrap();
    assert!(result.is_ok());
}
