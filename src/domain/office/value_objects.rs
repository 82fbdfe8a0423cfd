use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::geometry::Point;

/// Location key of the kanban board
pub const BOARD: &str = "board";

/// Rest slots in allocation order
pub const REST_SLOTS: [&str; 7] = [
    "cot-1", "cot-2", "cot-3", "cot-4", "cot-5", "cot-6", "cot-7",
];

/// Agents with a desk in the default office layout
pub const DEFAULT_AGENTS: [&str; 9] = [
    "alice", "alpha", "beta", "gamma", "delta", "epsilon", "zeta", "eta", "theta",
];

/// Returns the desk location key for an agent
pub fn desk_for(agent: &str) -> String {
    format!("desk-{}", agent)
}

/// Returns true if the location key names a rest slot
pub fn is_rest_slot(location: &str) -> bool {
    REST_SLOTS.contains(&location)
}

/// Lifecycle state of an office agent
///
/// # State Transitions
/// ```text
/// Sleeping -> Waking -> WalkingToBoard -> Claiming -> WalkingToDesk
///     ^                                                     |
///     |                                                     v
/// WalkingToRest <------------ Completing <------------- Working
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AgentState {
    Sleeping,
    Waking,
    WalkingToBoard,
    Claiming,
    WalkingToDesk,
    Working,
    Completing,
    WalkingToRest,
}

impl AgentState {
    /// Checks if moving from the current state to `next` follows the cycle
    ///
    /// # Example
    /// ```
    /// use office_realtime::domain::office::AgentState;
    ///
    /// assert!(AgentState::Sleeping.can_transition_to(AgentState::Waking));
    /// assert!(!AgentState::Sleeping.can_transition_to(AgentState::Working));
    /// ```
    pub fn can_transition_to(&self, next: AgentState) -> bool {
        use AgentState::*;
        matches!(
            (self, next),
            (Sleeping, Waking)
                | (Waking, WalkingToBoard)
                | (WalkingToBoard, Claiming)
                | (Claiming, WalkingToDesk)
                | (WalkingToDesk, Working)
                | (Working, Completing)
                | (Completing, WalkingToRest)
                | (WalkingToRest, Sleeping)
        )
    }

    /// States during which the agent is visibly moving between locations
    pub fn is_walking(&self) -> bool {
        matches!(
            self,
            AgentState::WalkingToBoard | AgentState::WalkingToDesk | AgentState::WalkingToRest
        )
    }

    /// States in which the agent may carry a claimed task
    pub fn may_hold_task(&self) -> bool {
        matches!(
            self,
            AgentState::Claiming | AgentState::WalkingToDesk | AgentState::Working
        )
    }
}

impl std::fmt::Display for AgentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentState::Sleeping => write!(f, "sleeping"),
            AgentState::Waking => write!(f, "waking"),
            AgentState::WalkingToBoard => write!(f, "walkingToBoard"),
            AgentState::Claiming => write!(f, "claiming"),
            AgentState::WalkingToDesk => write!(f, "walkingToDesk"),
            AgentState::Working => write!(f, "working"),
            AgentState::Completing => write!(f, "completing"),
            AgentState::WalkingToRest => write!(f, "walkingToRest"),
        }
    }
}

/// Lifecycle status of a task, mirrored by its kanban column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    Backlog,
    InProgress,
    Review,
    Done,
}

impl TaskStatus {
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Backlog, InProgress) | (InProgress, Review) | (Review, Done)
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Backlog => write!(f, "backlog"),
            TaskStatus::InProgress => write!(f, "in-progress"),
            TaskStatus::Review => write!(f, "review"),
            TaskStatus::Done => write!(f, "done"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

/// Fixed mapping from location key to floor coordinate
///
/// Built once at startup and shared read-only.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationTable {
    points: HashMap<String, Point>,
}

impl LocationTable {
    pub fn new(points: HashMap<String, Point>) -> Self {
        Self { points }
    }

    /// The default office floor: seven cots, the board, one desk per agent
    pub fn office_default() -> Self {
        let mut points = HashMap::new();

        for (i, slot) in REST_SLOTS.iter().enumerate() {
            points.insert(slot.to_string(), Point::new(780.0, 180.0 + 15.0 * i as f64));
        }
        points.insert(BOARD.to_string(), Point::new(450.0, 200.0));
        for (i, agent) in DEFAULT_AGENTS.iter().enumerate() {
            points.insert(desk_for(agent), Point::new(50.0 + 70.0 * i as f64, 520.0));
        }

        Self { points }
    }

    pub fn get(&self, key: &str) -> Option<Point> {
        self.points.get(key).copied()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.points.contains_key(key)
    }
}
