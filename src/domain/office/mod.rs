// Office domain module
// Contains the office aggregate root, its entities, value objects and domain events

#![allow(clippy::module_inception)]

pub mod agent;
pub mod errors;
pub mod events;
pub mod office;
pub mod snapshot;
pub mod value_objects;

// Re-export main types for convenience
pub use agent::{Agent, Task};
pub use errors::{OfficeError, OfficeResult};
pub use events::{AgentSnapshot, AgentTransition, Milestone, OfficeEvent};
pub use office::{KanbanBoard, Office};
pub use snapshot::OfficeSnapshot;
pub use value_objects::{AgentState, LocationTable, TaskPriority, TaskStatus};
