// Sync client
//
// Mirrors the hub's agent states on the viewer side and drives walk
// animations from the transitions it receives.

pub mod client;
pub mod dedup;
pub mod transport;

pub use client::{
    should_animate, ConnectionState, SyncClient, SyncNotification, SyncOptions, SyncSource,
    SyncStatus,
};
pub use dedup::RecentEventIds;
pub use transport::{
    ConnectionEvent, HttpSnapshotSource, LiveConnection, LiveConnector, LiveSink, LiveStream,
    SnapshotSource, TransportError, WsConnector,
};
