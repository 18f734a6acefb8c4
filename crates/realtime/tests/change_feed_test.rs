use fleet_trips_realtime::{
    ChangeFeedClient, ChangeFeedError, ChangeFeedOptions, ChangePayload, CollectionChanges,
    ConnectionState,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

/// One-connection websocket server. Replies to joins, pushes a change
/// after each join and forwards every client frame to `seen`.
async fn start_mock_server(
    change: Value,
) -> (std::net::SocketAddr, mpsc::UnboundedReceiver<Value>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (seen_tx, seen_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        while let Some(Ok(msg)) = ws.next().await {
            let text = match msg {
                Message::Text(text) => text,
                Message::Close(_) => break,
                _ => continue,
            };
            let frame: Value = serde_json::from_str(&text).unwrap();
            let _ = seen_tx.send(frame.clone());

            if frame["event"] == "phx_join" {
                let reply = json!({
                    "topic": frame["topic"],
                    "event": "phx_reply",
                    "payload": {"status": "ok", "response": {}},
                    "ref": frame["ref"],
                });
                ws.send(Message::Text(reply.to_string())).await.unwrap();

                let push = json!({
                    "topic": frame["topic"],
                    "event": "postgres_changes",
                    "payload": {"data": change.clone(), "ids": [1]},
                    "ref": null,
                });
                ws.send(Message::Text(push.to_string())).await.unwrap();
            }
        }
    });

    (addr, seen_rx)
}

async fn next_event(seen: &mut mpsc::UnboundedReceiver<Value>, event: &str) -> Value {
    timeout(Duration::from_secs(5), async {
        loop {
            let frame = seen.recv().await.expect("server closed");
            if frame["event"] == event {
                return frame;
            }
        }
    })
    .await
    .expect("timed out waiting for client frame")
}

#[tokio::test]
async fn test_subscribe_receives_changes() {
    let change = json!({
        "type": "UPDATE",
        "table": "trips",
        "commit_timestamp": "2025-07-16T08:30:00Z",
        "record": {"id": "trip-1", "status": "active"}
    });
    let (addr, mut seen) = start_mock_server(change).await;

    let client = ChangeFeedClient::new(&format!("ws://{}", addr), "anon-key");
    client.set_auth(Some("user-jwt".to_string())).await;

    let (tx, mut rx) = mpsc::unbounded_channel::<ChangePayload>();
    let subscriptions = client
        .channel("realtime:trips")
        .on(
            CollectionChanges::new("trips").eq("importSource", "web_book"),
            move |payload| {
                let _ = tx.send(payload);
            },
        )
        .subscribe()
        .await
        .expect("subscribe");
    assert_eq!(subscriptions.len(), 1);
    assert_eq!(subscriptions[0].topic(), "realtime:trips");
    assert_eq!(client.connection_state().await, ConnectionState::Connected);

    let join = next_event(&mut seen, "phx_join").await;
    assert_eq!(join["topic"], "realtime:trips");
    assert_eq!(join["payload"]["access_token"], "user-jwt");
    let binding = &join["payload"]["config"]["postgres_changes"][0];
    assert_eq!(binding["table"], "trips");
    assert_eq!(binding["event"], "*");
    assert_eq!(binding["filter"], "importSource=eq.web_book");

    let payload = timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for change")
        .expect("callback channel closed");
    assert_eq!(payload.event_type.as_deref(), Some("UPDATE"));
    assert_eq!(payload.record().unwrap()["id"], "trip-1");

    drop(subscriptions);
    let leave = next_event(&mut seen, "phx_leave").await;
    assert_eq!(leave["topic"], "realtime:trips");

    client.disconnect().await.unwrap();
    assert_eq!(client.connection_state().await, ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_heartbeat_is_sent() {
    let (addr, mut seen) = start_mock_server(json!({"type": "INSERT"})).await;
    let options = ChangeFeedOptions {
        heartbeat_interval: 50,
        ..Default::default()
    };
    let client = ChangeFeedClient::new_with_options(&format!("ws://{}", addr), "k", options);
    client.connect().await.unwrap();

    let heartbeat = next_event(&mut seen, "heartbeat").await;
    assert_eq!(heartbeat["topic"], "phoenix");
    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_connection_loss_reaches_error_callbacks() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        // wait for the join, then hang up
        let _ = ws.next().await;
        let _ = ws.close(None).await;
    });

    let client = ChangeFeedClient::new(&format!("ws://{}", addr), "k");
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let _subscriptions = client
        .channel("realtime:trips")
        .on(CollectionChanges::new("trips"), |_| {})
        .on_error(move |message| {
            let _ = tx.send(message);
        })
        .subscribe()
        .await
        .unwrap();

    let message = timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for error")
        .unwrap();
    assert_eq!(message, "connection closed");
}

#[tokio::test]
async fn test_connect_refused() {
    // bind then drop to get a port nobody listens on
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let client = ChangeFeedClient::new(&format!("ws://{}", addr), "k");
    let result = client
        .channel("realtime:trips")
        .on(CollectionChanges::new("trips"), |_| {})
        .subscribe()
        .await;
    assert!(matches!(result, Err(ChangeFeedError::ConnectionError(_))));
    assert_eq!(client.connection_state().await, ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_subscribe_without_bindings() {
    let client = ChangeFeedClient::new("ws://127.0.0.1:9", "k");
    let result = client.channel("realtime:trips").subscribe().await;
    assert!(matches!(result, Err(ChangeFeedError::SubscriptionError(_))));
}

#[tokio::test]
async fn test_zero_heartbeat_keeps_connection_alive() {
    let (addr, mut seen) = start_mock_server(json!({"type": "INSERT"})).await;
    let options = ChangeFeedOptions {
        heartbeat_interval: 0,
        ..Default::default()
    };
    let client = ChangeFeedClient::new_with_options(&format!("ws://{}", addr), "k", options);
    client.connect().await.unwrap();

    next_event(&mut seen, "heartbeat").await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(client.connection_state().await, ConnectionState::Connected);
    client.disconnect().await.unwrap();
}
