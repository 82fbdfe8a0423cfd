use serde::{Deserialize, Serialize};

use super::events::AgentSnapshot;
use super::value_objects::{AgentState, TaskPriority, TaskStatus};

/// An office agent
///
/// Mutated only through the operations of [`super::Office`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Agent {
    pub(super) name: String,
    pub(super) state: AgentState,
    pub(super) location: String,
    pub(super) task: Option<String>,
    pub(super) assignment: Option<String>,
    pub(super) glyph: String,
}

impl Agent {
    /// Creates a sleeping agent resting at `slot`
    pub fn sleeping(
        name: impl Into<String>,
        glyph: impl Into<String>,
        slot: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            state: AgentState::Sleeping,
            location: slot.into(),
            task: None,
            assignment: None,
            glyph: glyph.into(),
        }
    }

    /// Reconstructs an agent from persisted data without validation
    pub fn from_persistence(
        name: String,
        state: AgentState,
        location: String,
        task: Option<String>,
        assignment: Option<String>,
        glyph: String,
    ) -> Self {
        Self {
            assignment,
            name,
            state,
            location,
            task,
            glyph,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// The claimed task, if any
    pub fn task(&self) -> Option<&str> {
        self.task.as_deref()
    }

    /// The task this agent woke up for, kept from Wake until back at rest
    pub fn assignment(&self) -> Option<&str> {
        self.assignment.as_deref()
    }

    pub fn glyph(&self) -> &str {
        &self.glyph
    }

    pub fn snapshot(&self) -> AgentSnapshot {
        AgentSnapshot {
            state: self.state,
            location: self.location.clone(),
            task: self.task.clone(),
        }
    }
}

/// A unit of work on the kanban board
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub priority: TaskPriority,
    #[serde(rename = "type")]
    pub kind: String,
    pub assignee: Option<String>,
    pub status: TaskStatus,
}

impl Task {
    /// Creates an unassigned backlog task
    pub fn backlog(
        id: impl Into<String>,
        title: impl Into<String>,
        priority: TaskPriority,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            priority,
            kind: kind.into(),
            assignee: None,
            status: TaskStatus::Backlog,
        }
    }
}
