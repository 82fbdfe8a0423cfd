//! End-to-end API integration tests
//!
//! These tests verify the complete HTTP and WebSocket flows including:
//! - Health and status endpoints
//! - Producer updates and validation errors
//! - Live channel handshake, broadcast and ping/pong

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use futures_util::{SinkExt, StreamExt};
use office_realtime::api;
use office_realtime::hub::{EventHub, LiveMessage};
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::Message;
use tower::util::ServiceExt; // for oneshot

/// Setup test application around a fresh hub
fn setup_app() -> (Router, Arc<EventHub>) {
    let hub = Arc::new(EventHub::default());
    (api::router(Arc::clone(&hub)), hub)
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_update(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/agent-update")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let (app, _hub) = setup_app();

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "office-realtime");
    assert_eq!(body["connections"], 0);
}

#[tokio::test]
async fn test_update_then_status() {
    let (app, _hub) = setup_app();

    let response = app
        .clone()
        .oneshot(post_update(json!({
            "agentId": "theta",
            "state": "working",
            "location": "desk-theta"
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["event"]["type"], "agent-state-change");
    assert_eq!(body["event"]["agentId"], "theta");
    assert_eq!(body["event"]["previousState"], Value::Null);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/agent-status?limit=1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["agents"]["theta"]["state"], "working");
    assert_eq!(body["data"]["agents"]["theta"]["location"], "desk-theta");
    assert!(body["data"]["agents"]["theta"]["lastUpdated"].is_i64());
    assert_eq!(body["data"]["recentEvents"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"]["connectionCount"], 0);
}

#[tokio::test]
async fn test_update_missing_location_is_rejected() {
    let (app, hub) = setup_app();

    let response = app
        .oneshot(post_update(json!({ "agentId": "theta", "state": "working" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert!(body["error"].as_str().unwrap().contains("location"));
    assert!(hub.snapshot().is_empty());
    assert!(hub.recent(10).is_empty());
}

#[tokio::test]
async fn test_status_defaults_to_ten_events() {
    let (app, _hub) = setup_app();
    for n in 0..12 {
        app.clone()
            .oneshot(post_update(json!({
                "agentId": format!("agent-{}", n),
                "state": "working",
                "location": "board"
            })))
            .await
            .unwrap();
    }

    let response = app
        .oneshot(Request::builder().uri("/api/agent-status").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let body = json_body(response).await;
    let events = body["data"]["recentEvents"].as_array().unwrap();
    assert_eq!(events.len(), 10);
    assert_eq!(events[9]["agentId"], "agent-11");
}

async fn next_message<S>(stream: &mut S) -> LiveMessage
where
    S: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), stream.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .expect("websocket error");
        if let Message::Text(text) = frame {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

#[tokio::test]
async fn test_live_channel_handshake_broadcast_and_ping() {
    let (app, hub) = setup_app();
    hub.publish(
        "beta",
        None,
        office_realtime::hub::AgentStatus {
            state: "sleeping".to_string(),
            location: "cot-1".to_string(),
            task: None,
            animation_state: None,
            last_updated: None,
        },
        None,
    )
    .unwrap();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let (socket, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", addr))
        .await
        .unwrap();
    let (mut sink, mut stream) = socket.split();

    match next_message(&mut stream).await {
        LiveMessage::Sync { data } => assert_eq!(data.agents["beta"].location, "cot-1"),
        other => panic!("Expected sync first, got {:?}", other),
    }

    // An update sent over the live channel comes back as an event
    let update = json!({
        "type": "agent-update",
        "data": { "agentId": "beta", "state": "waking", "location": "cot-1" }
    });
    sink.send(Message::Text(update.to_string())).await.unwrap();

    match next_message(&mut stream).await {
        LiveMessage::AgentEvent { data } => {
            assert_eq!(data.agent_id, "beta");
            assert_eq!(data.previous_state.unwrap().state, "sleeping");
            assert_eq!(data.new_state.state, "waking");
        }
        other => panic!("Expected agent-event, got {:?}", other),
    }

    sink.send(Message::Text(json!({ "type": "ping", "timestamp": 1 }).to_string()))
        .await
        .unwrap();
    assert_eq!(next_message(&mut stream).await, LiveMessage::Pong);

    assert_eq!(hub.subscriber_count(), 1);
    sink.close().await.unwrap();

    for _ in 0..100 {
        if hub.subscriber_count() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(hub.subscriber_count(), 0);
}
