use std::sync::Arc;

use axum::{extract::State, Json};
use chrono::Utc;
use serde_json::{json, Value};

use crate::hub::EventHub;

pub const SERVICE_NAME: &str = "office-realtime";

/// Liveness check with the live connection count
///
/// GET /health
pub async fn health_check(State(hub): State<Arc<EventHub>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": SERVICE_NAME,
        "features": ["websocket", "rest-fallback", "event-history"],
        "connections": hub.subscriber_count(),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}
