//! Office Realtime Library
//!
//! Agent state machine, event distribution hub, sync client and walk
//! animation for the agent office, plus the HTTP/WebSocket adapters and
//! persistence used by the `office-realtime` and `office-viewer` binaries.

pub mod agents;
pub mod animation;
pub mod api;
pub mod config;
pub mod domain;
pub mod hub;
pub mod infrastructure;
pub mod sync;
