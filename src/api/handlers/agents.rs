use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::api::errors::ApiError;
use crate::hub::{AgentUpdate, EventHub, StatusResponse, TransitionEvent};

/// Number of recent events returned when no limit is given
pub const DEFAULT_RECENT_LIMIT: usize = 10;

#[derive(Debug, Default, Deserialize)]
pub struct StatusQuery {
    pub limit: Option<usize>,
}

/// Response from a producer update
#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateResponse {
    pub success: bool,
    pub event: TransitionEvent,
}

/// Current agent states and recent history
///
/// GET /api/agent-status?limit=N
pub async fn get_agent_status(
    State(hub): State<Arc<EventHub>>,
    Query(query): Query<StatusQuery>,
) -> Json<StatusResponse> {
    let limit = query.limit.unwrap_or(DEFAULT_RECENT_LIMIT);
    Json(hub.status(limit))
}

/// Accept a state update from a producer
///
/// POST /api/agent-update
pub async fn post_agent_update(
    State(hub): State<Arc<EventHub>>,
    Json(update): Json<AgentUpdate>,
) -> Result<Json<UpdateResponse>, ApiError> {
    let event = hub.apply_update(update)?;

    Ok(Json(UpdateResponse {
        success: true,
        event,
    }))
}
