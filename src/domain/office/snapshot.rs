// Persisted office blob
//
// The versioned JSON document saved after every workflow step and merged
// over the seeded defaults on startup.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::agent::{Agent, Task};
use super::errors::{OfficeError, OfficeResult};
use super::office::{KanbanBoard, Office};
use super::value_objects::{AgentState, LocationTable, TaskStatus};

pub const SNAPSHOT_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedAgent {
    pub state: AgentState,
    pub location: String,
    pub task: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignment: Option<String>,
    pub icon: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedKanban {
    pub backlog: Vec<String>,
    pub in_progress: Vec<String>,
    pub review: Vec<String>,
    pub done: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetadata {
    pub last_update: i64,
    pub total_tasks_completed: u64,
    pub agents_active: usize,
}

/// The whole office as stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfficeSnapshot {
    pub version: String,
    pub agents: BTreeMap<String, PersistedAgent>,
    pub kanban: PersistedKanban,
    pub tasks: BTreeMap<String, Task>,
    pub metadata: SnapshotMetadata,
}

impl OfficeSnapshot {
    /// Captures the office as it stands
    pub fn capture(office: &Office) -> Self {
        let agents = office
            .agents()
            .map(|a| {
                (
                    a.name().to_string(),
                    PersistedAgent {
                        state: a.state(),
                        location: a.location().to_string(),
                        task: a.task().map(str::to_string),
                        assignment: a.assignment().map(str::to_string),
                        icon: a.glyph().to_string(),
                    },
                )
            })
            .collect();

        let board = office.board();
        let column = |status| board.column(status).to_vec();

        Self {
            version: SNAPSHOT_VERSION.to_string(),
            agents,
            kanban: PersistedKanban {
                backlog: column(TaskStatus::Backlog),
                in_progress: column(TaskStatus::InProgress),
                review: column(TaskStatus::Review),
                done: column(TaskStatus::Done),
            },
            tasks: office.tasks().map(|t| (t.id.clone(), t.clone())).collect(),
            metadata: SnapshotMetadata {
                last_update: Utc::now().timestamp_millis(),
                total_tasks_completed: office.tasks_completed(),
                agents_active: office.agents_active(),
            },
        }
    }

    /// Rebuilds the office, rejecting snapshots that break its invariants
    pub fn restore(self, locations: Arc<LocationTable>) -> OfficeResult<Office> {
        let agents = self
            .agents
            .into_iter()
            .map(|(name, a)| {
                Agent::from_persistence(name, a.state, a.location, a.task, a.assignment, a.icon)
            })
            .collect();

        let tasks = self
            .tasks
            .into_iter()
            .map(|(id, mut task)| {
                task.id = id;
                task
            })
            .collect();

        let board = KanbanBoard::new(
            self.kanban.backlog,
            self.kanban.in_progress,
            self.kanban.review,
            self.kanban.done,
        );

        Office::from_parts(agents, tasks, board, locations, self.metadata.total_tasks_completed)
    }

    /// Shallow merge: every top-level key of `saved` replaces the default one
    ///
    /// A saved blob that is not a JSON object is ignored.
    pub fn merge_over(defaults: &OfficeSnapshot, saved: Value) -> OfficeResult<OfficeSnapshot> {
        let mut merged = serde_json::to_value(defaults)
            .map_err(|e| OfficeError::CorruptSnapshot(e.to_string()))?;

        if let (Value::Object(base), Value::Object(overrides)) = (&mut merged, saved) {
            for (key, value) in overrides {
                base.insert(key, value);
            }
        }

        serde_json::from_value(merged).map_err(|e| OfficeError::CorruptSnapshot(e.to_string()))
    }
}
