//! Live channel
//!
//! Each connection becomes one hub subscriber. Frames from the hub are
//! forwarded as JSON text; frames from the client may be `ping` (answered
//! with `pong` on this connection only) or `agent-update` (published like
//! an HTTP update).

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::hub::{EventHub, LiveMessage, Subscription};

/// WebSocket upgrade handler
///
/// GET /ws
pub async fn ws_handler(ws: WebSocketUpgrade, State(hub): State<Arc<EventHub>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, hub))
}

async fn handle_socket(socket: WebSocket, hub: Arc<EventHub>) {
    let Subscription { id, mut receiver } = hub.subscribe();
    let (mut sender, mut stream) = socket.split();

    let inbound_hub = Arc::clone(&hub);
    let mut recv_task = tokio::spawn(async move {
        while let Some(frame) = stream.next().await {
            match frame {
                Ok(Message::Text(text)) => handle_client_text(&inbound_hub, id, &text),
                Ok(Message::Close(_)) => {
                    debug!(subscriber_id = %id, "Client sent close frame");
                    break;
                }
                Ok(Message::Binary(data)) => {
                    debug!(subscriber_id = %id, len = data.len(), "Ignoring binary frame");
                }
                // Protocol-level ping/pong is answered by axum
                Ok(_) => {}
                Err(e) => {
                    warn!(subscriber_id = %id, error = %e, "WebSocket receive error");
                    break;
                }
            }
        }
    });

    loop {
        tokio::select! {
            outbound = receiver.recv() => match outbound {
                Some(message) => {
                    if let Err(e) = send_message(&mut sender, &message).await {
                        error!(
                            subscriber_id = %id,
                            error = %e,
                            "Failed to send, closing connection"
                        );
                        break;
                    }
                }
                None => {
                    info!(subscriber_id = %id, "Dropped by hub");
                    break;
                }
            },
            _ = &mut recv_task => {
                debug!(subscriber_id = %id, "Receiver task finished");
                break;
            }
        }
    }

    recv_task.abort();
    hub.unsubscribe(id);
    let _ = sender.close().await;
}

fn handle_client_text(hub: &EventHub, id: Uuid, text: &str) {
    match serde_json::from_str::<LiveMessage>(text) {
        Ok(LiveMessage::Ping { .. }) => {
            hub.send_to(id, LiveMessage::Pong);
        }
        Ok(LiveMessage::AgentUpdate { data }) => {
            if let Err(e) = hub.apply_update(data) {
                warn!(subscriber_id = %id, error = %e, "Rejected live update");
            }
        }
        Ok(other) => {
            debug!(subscriber_id = %id, event_type = other.event_type(), "Ignoring client message");
        }
        Err(e) => {
            warn!(subscriber_id = %id, error = %e, "Malformed client message");
        }
    }
}

async fn send_message(
    sender: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    message: &LiveMessage,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(message).map_err(|e| {
        error!(error = %e, "Failed to serialize message");
        axum::Error::new(e)
    })?;

    sender.send(Message::Text(json)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::AgentUpdate;

    #[test]
    fn ping_is_answered_on_the_same_subscriber() {
        let hub = EventHub::default();
        let mut me = hub.subscribe();
        let mut other = hub.subscribe();
        let _ = me.receiver.try_recv();
        let _ = other.receiver.try_recv();

        handle_client_text(&hub, me.id, r#"{"type":"ping","timestamp":1}"#);

        assert_eq!(me.receiver.try_recv().unwrap(), LiveMessage::Pong);
        assert!(other.receiver.try_recv().is_err());
    }

    #[test]
    fn live_update_is_published() {
        let hub = EventHub::default();
        let update = LiveMessage::AgentUpdate {
            data: AgentUpdate {
                agent_id: Some("theta".to_string()),
                state: Some("working".to_string()),
                location: Some("desk-theta".to_string()),
                ..Default::default()
            },
        };
        let text = serde_json::to_string(&update).unwrap();

        handle_client_text(&hub, Uuid::new_v4(), &text);

        assert_eq!(hub.snapshot()["theta"].location, "desk-theta");
    }

    #[test]
    fn garbage_is_ignored() {
        let hub = EventHub::default();

        handle_client_text(&hub, Uuid::new_v4(), "not json");
        let partial = r#"{"type":"agent-update","data":{"agentId":"x"}}"#;
        handle_client_text(&hub, Uuid::new_v4(), partial);

        assert!(hub.snapshot().is_empty());
    }
}
