// Event distribution hub
//
// Holds the last known state of every agent, a bounded event history and
// the set of live subscribers. The HTTP and websocket adapters in `api`
// sit on top of it.

pub mod history;
pub mod messages;
pub mod service;

pub use history::{EventHistory, DEFAULT_HISTORY_CAPACITY};
pub use messages::{
    AgentStatus, AgentUpdate, LiveMessage, StatusData, StatusResponse, SyncPayload, TransitionEvent,
    AGENT_STATE_CHANGE,
};
pub use service::{EventHub, HubError, Subscription, DEFAULT_SUBSCRIBER_BUFFER};
