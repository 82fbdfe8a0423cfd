use thiserror::Error;

use super::value_objects::{AgentState, TaskStatus};

/// Precondition failures of office operations
///
/// Every variant leaves the office untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OfficeError {
    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Agent {agent} must be {expected} but is {actual}")]
    InvalidAgentState {
        agent: String,
        expected: AgentState,
        actual: AgentState,
    },

    #[error("Task {task} must be in {expected} but is in {actual}")]
    InvalidTaskStatus {
        task: String,
        expected: TaskStatus,
        actual: TaskStatus,
    },

    #[error("Agent {0} is not carrying a task")]
    NoTaskHeld(String),

    #[error("Unknown location: {0}")]
    UnknownLocation(String),

    #[error("Corrupt office snapshot: {0}")]
    CorruptSnapshot(String),
}

pub type OfficeResult<T> = Result<T, OfficeError>;
