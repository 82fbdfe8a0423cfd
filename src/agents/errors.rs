use thiserror::Error;

use crate::domain::office::OfficeError;

/// Errors that can occur while driving the office
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Office(#[from] OfficeError),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Completed task for {0} not found in emitted events")]
    MissingCompletedTask(String),
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;
