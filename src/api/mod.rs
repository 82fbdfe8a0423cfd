// API layer module (adapters for controllers)
// Follows Hexagonal Architecture - API is an adapter

pub mod errors;
pub mod handlers;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::hub::EventHub;
use handlers::{agents, diagnostics, ws};

/// Builds the service router around a shared hub
pub fn router(hub: Arc<EventHub>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(diagnostics::health_check))
        .route("/ws", get(ws::ws_handler))
        .route("/api/agent-status", get(agents::get_agent_status))
        .route("/api/agent-update", post(agents::post_agent_update))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(hub)
}
