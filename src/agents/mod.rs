// Office agents
//
// Drives the office aggregate: the state manager owning it, the workflows
// moving agents through their cycle, the domain event bus and the
// publishers forwarding transitions to a hub.

pub mod errors;
pub mod events;
pub mod publisher;
pub mod simulation;
pub mod state;
pub mod workflow;

// Re-export main types
pub use errors::{WorkflowError, WorkflowResult};
pub use events::{EventBusError, OfficeEventBus, OfficeEventReceiver};
pub use publisher::{spawn_forwarder, HttpPublisher, HubPublisher, TransitionPublisher};
pub use simulation::run_simulation;
pub use state::OfficeStateManager;
pub use workflow::{OfficeWorkflows, Phase, PhaseTimings, WorkflowOutcome};
