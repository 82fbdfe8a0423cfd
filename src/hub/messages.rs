// Wire format shared by the hub and the sync client
//
// Every live-channel frame is a JSON object tagged by `type`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::office::AgentSnapshot;

/// Classification tag carried by every transition event
pub const AGENT_STATE_CHANGE: &str = "agent-state-change";

/// Agent state as seen on the wire
///
/// `state` is free text so producers outside the office model (for example
/// a generic `moving` state) can still be relayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStatus {
    pub state: String,
    pub location: String,
    #[serde(default)]
    pub task: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animation_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<i64>,
}

impl From<&AgentSnapshot> for AgentStatus {
    fn from(snapshot: &AgentSnapshot) -> Self {
        let animation_state = if snapshot.state.is_walking() {
            "walking"
        } else {
            "idle"
        };

        Self {
            state: snapshot.state.to_string(),
            location: snapshot.location.clone(),
            task: snapshot.task.clone(),
            animation_state: Some(animation_state.to_string()),
            last_updated: None,
        }
    }
}

/// One relayed agent state change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionEvent {
    pub event_id: Uuid,
    #[serde(rename = "type")]
    pub kind: String,
    pub agent_id: String,
    pub previous_state: Option<AgentStatus>,
    pub new_state: AgentStatus,
    /// Hub receive time in epoch milliseconds
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub producer_timestamp: Option<i64>,
}

/// Payload of the `sync` frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncPayload {
    pub agents: HashMap<String, AgentStatus>,
    pub timestamp: i64,
}

/// Producer update, over HTTP or the live channel
///
/// All fields are optional on the wire so missing ones can be reported
/// instead of failing deserialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentUpdate {
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animation_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl AgentUpdate {
    pub fn new(agent_id: impl Into<String>, status: &AgentStatus) -> Self {
        Self {
            agent_id: Some(agent_id.into()),
            state: Some(status.state.clone()),
            location: Some(status.location.clone()),
            task: status.task.clone(),
            animation_state: status.animation_state.clone(),
            timestamp: None,
        }
    }
}

/// Frames exchanged over the live channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum LiveMessage {
    Sync { data: SyncPayload },
    AgentEvent { data: TransitionEvent },
    AgentUpdate { data: AgentUpdate },
    Ping {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },
    Pong,
}

impl LiveMessage {
    pub fn ping(timestamp: i64) -> Self {
        LiveMessage::Ping {
            timestamp: Some(timestamp),
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            LiveMessage::Sync { .. } => "sync",
            LiveMessage::AgentEvent { .. } => "agent-event",
            LiveMessage::AgentUpdate { .. } => "agent-update",
            LiveMessage::Ping { .. } => "ping",
            LiveMessage::Pong => "pong",
        }
    }
}

/// Body of the polled snapshot endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub success: bool,
    pub data: StatusData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusData {
    pub agents: HashMap<String, AgentStatus>,
    pub recent_events: Vec<TransitionEvent>,
    pub connection_count: usize,
    pub timestamp: i64,
}
