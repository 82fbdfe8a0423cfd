use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::value_objects::{AgentState, TaskStatus};

/// Observable part of an agent: what viewers need to draw it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub state: AgentState,
    pub location: String,
    pub task: Option<String>,
}

/// Named step of an agent's trip through the office
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Milestone {
    AgentWoke,
    AgentAtBoard,
    TaskClaimed,
    AgentAtDesk,
    WorkStarted,
    TaskCompleted,
    HeadingToRest,
    AgentResting,
}

impl fmt::Display for Milestone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Milestone::AgentWoke => "agent_woke",
            Milestone::AgentAtBoard => "agent_at_board",
            Milestone::TaskClaimed => "task_claimed",
            Milestone::AgentAtDesk => "agent_at_desk",
            Milestone::WorkStarted => "work_started",
            Milestone::TaskCompleted => "task_completed",
            Milestone::HeadingToRest => "heading_to_rest",
            Milestone::AgentResting => "agent_resting",
        };
        f.write_str(name)
    }
}

/// One agent moving from one observable snapshot to the next
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentTransition {
    pub agent_id: String,
    pub milestone: Milestone,
    pub previous: AgentSnapshot,
    pub current: AgentSnapshot,
    pub occurred_at: DateTime<Utc>,
}

impl AgentTransition {
    /// True when the transition changes where the agent stands
    pub fn changes_location(&self) -> bool {
        self.previous.location != self.current.location
    }
}

/// Domain events raised by the office aggregate
///
/// Observers (hub forwarders, kanban renderers, achievement trackers)
/// subscribe to these instead of hooking into rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OfficeEvent {
    /// An agent changed state, location or task
    AgentTransitioned(AgentTransition),
    /// A task moved between kanban columns
    TaskMoved {
        task_id: String,
        from: TaskStatus,
        to: TaskStatus,
        assignee: Option<String>,
    },
    /// A sleeping agent left its rest slot
    RestSlotVacated { agent_id: String, slot: String },
    /// An agent reached its desk and is now working on the task
    TaskAssigned { task_id: String, agent_id: String },
    /// The completion note for a task went down the mail chute
    MessageSent { task_id: String, agent_id: String },
    /// A reviewed task reached done
    TaskFinalized {
        task_id: String,
        assignee: Option<String>,
    },
}

impl OfficeEvent {
    /// Returns the agent this event concerns, if any
    pub fn agent_id(&self) -> Option<&str> {
        match self {
            OfficeEvent::AgentTransitioned(t) => Some(&t.agent_id),
            OfficeEvent::TaskMoved { assignee, .. } => assignee.as_deref(),
            OfficeEvent::RestSlotVacated { agent_id, .. } => Some(agent_id),
            OfficeEvent::TaskAssigned { agent_id, .. } => Some(agent_id),
            OfficeEvent::MessageSent { agent_id, .. } => Some(agent_id),
            OfficeEvent::TaskFinalized { assignee, .. } => assignee.as_deref(),
        }
    }

    pub fn as_transition(&self) -> Option<&AgentTransition> {
        match self {
            OfficeEvent::AgentTransitioned(t) => Some(t),
            _ => None,
        }
    }
}
