use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::time::{interval, interval_at, timeout, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::dedup::{RecentEventIds, DEFAULT_DEDUP_CAPACITY};
use super::transport::{
    ConnectionEvent, LiveConnection, LiveConnector, SnapshotSource, TransportError,
};
use crate::animation::{SharedWalkEngine, WalkCompletion, WalkOptions, WalkUpdate};
use crate::domain::office::LocationTable;
use crate::hub::{AgentStatus, LiveMessage, StatusData, TransitionEvent};

const NOTIFICATION_CAPACITY: usize = 256;

/// Tunables of the sync client
#[derive(Debug, Clone, PartialEq)]
pub struct SyncOptions {
    pub max_retries: u32,
    /// Base of the exponential reconnect backoff
    pub retry_delay: Duration,
    pub poll_interval: Duration,
    pub ping_interval: Duration,
    pub connect_timeout: Duration,
    /// How often to retry the live channel while polling; `None` disables it
    pub reconnect_probe: Option<Duration>,
    pub walk_duration: Duration,
    pub curve_intensity: f64,
    pub dedup_capacity: usize,
    /// Events requested per poll
    pub recent_limit: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            max_retries: 5,
            retry_delay: Duration::from_millis(1000),
            poll_interval: Duration::from_millis(1000),
            ping_interval: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            reconnect_probe: Some(Duration::from_secs(60)),
            walk_duration: Duration::from_millis(2500),
            curve_intensity: 0.2,
            dedup_capacity: DEFAULT_DEDUP_CAPACITY,
            recent_limit: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    UsingFallback,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::UsingFallback => write!(f, "using_fallback"),
        }
    }
}

/// Where a full agent map came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncSource {
    Live,
    Poll,
}

/// Everything a renderer needs to know
#[derive(Debug, Clone, PartialEq)]
pub enum SyncNotification {
    AgentsSync {
        agents: HashMap<String, AgentStatus>,
        timestamp: i64,
        source: SyncSource,
    },
    AgentStateChange {
        event: TransitionEvent,
        animated: bool,
    },
    AnimationUpdate(WalkUpdate),
    AnimationComplete(WalkCompletion),
    ConnectionChanged {
        state: ConnectionState,
        retry_count: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub connection: ConnectionState,
    pub using_fallback: bool,
    pub retry_count: u32,
    pub last_event_time: i64,
    pub known_agents: usize,
    pub active_animations: Vec<String>,
}

struct ClientState {
    connection: ConnectionState,
    retry_count: u32,
    using_fallback: bool,
    last_event_time: i64,
    agents: HashMap<String, AgentStatus>,
    seen: RecentEventIds,
}

enum SessionEnd {
    Clean,
    Unclean,
    Cancelled,
}

enum Connect {
    Ready(LiveConnection),
    Failed(TransportError),
    Cancelled,
}

/// Viewer-side replica of the hub
///
/// Keeps a live channel open when it can and polls the snapshot endpoint
/// when it cannot. Every transition is applied at most once regardless of
/// which path delivered it, and moves between locations are handed to the
/// walk engine.
pub struct SyncClient {
    options: SyncOptions,
    connector: Arc<dyn LiveConnector>,
    snapshots: Arc<dyn SnapshotSource>,
    engine: SharedWalkEngine,
    locations: Arc<LocationTable>,
    state: Mutex<ClientState>,
    notifications: broadcast::Sender<SyncNotification>,
}

impl SyncClient {
    pub fn new(
        options: SyncOptions,
        connector: Arc<dyn LiveConnector>,
        snapshots: Arc<dyn SnapshotSource>,
        engine: SharedWalkEngine,
        locations: Arc<LocationTable>,
    ) -> Self {
        let (notifications, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        let seen = RecentEventIds::new(options.dedup_capacity);

        Self {
            options,
            connector,
            snapshots,
            engine,
            locations,
            state: Mutex::new(ClientState {
                connection: ConnectionState::Disconnected,
                retry_count: 0,
                using_fallback: false,
                last_event_time: 0,
                agents: HashMap::new(),
                seen,
            }),
            notifications,
        }
    }

    fn state(&self) -> MutexGuard<'_, ClientState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncNotification> {
        self.notifications.subscribe()
    }

    fn notify(&self, notification: SyncNotification) {
        // No receivers is fine
        let _ = self.notifications.send(notification);
    }

    /// Last known state of every agent
    pub fn agents(&self) -> HashMap<String, AgentStatus> {
        self.state().agents.clone()
    }

    pub async fn status(&self) -> SyncStatus {
        let active_animations = self.engine.lock().await.active_animations();
        let state = self.state();

        SyncStatus {
            connection: state.connection,
            using_fallback: state.using_fallback,
            retry_count: state.retry_count,
            last_event_time: state.last_event_time,
            known_agents: state.agents.len(),
            active_animations,
        }
    }

    /// Runs until `cancel` fires
    ///
    /// Connect, and on an unclean loss retry with exponential backoff until
    /// `max_retries` is used up. A clean close or exhausted retries switch to
    /// polling, from which the optional probe may return to the live channel.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut pending: Option<LiveConnection> = None;

        loop {
            let attempt = match pending.take() {
                Some(connection) => Connect::Ready(connection),
                None => {
                    self.set_connection(ConnectionState::Connecting);
                    self.connect_once(&cancel).await
                }
            };

            let end = match attempt {
                Connect::Ready(connection) => {
                    self.mark_connected();
                    self.run_session(connection, &cancel).await
                }
                Connect::Failed(e) => {
                    warn!(error = %e, "Live channel unavailable");
                    SessionEnd::Unclean
                }
                Connect::Cancelled => SessionEnd::Cancelled,
            };

            match end {
                SessionEnd::Cancelled => break,
                SessionEnd::Unclean => {
                    if let Some(delay) = self.schedule_retry() {
                        tokio::select! {
                            _ = cancel.cancelled() => break,
                            _ = tokio::time::sleep(delay) => continue,
                        }
                    }
                }
                SessionEnd::Clean => info!("Live channel closed cleanly"),
            }

            match self.run_fallback(&cancel).await {
                Some(connection) => pending = Some(connection),
                None => break,
            }
        }

        {
            let mut state = self.state();
            state.using_fallback = false;
        }
        self.set_connection(ConnectionState::Disconnected);
        info!("Sync client stopped");
    }

    async fn connect_once(&self, cancel: &CancellationToken) -> Connect {
        let limit = self.options.connect_timeout;

        tokio::select! {
            _ = cancel.cancelled() => Connect::Cancelled,
            result = timeout(limit, self.connector.connect()) => match result {
                Ok(Ok(connection)) => Connect::Ready(connection),
                Ok(Err(e)) => Connect::Failed(e),
                Err(_) => Connect::Failed(TransportError::Timeout(limit)),
            },
        }
    }

    fn mark_connected(&self) {
        let was_polling = {
            let mut state = self.state();
            state.retry_count = 0;
            std::mem::replace(&mut state.using_fallback, false)
        };
        if was_polling {
            info!("Live channel restored, polling stopped");
        }
        self.set_connection(ConnectionState::Connected);
    }

    /// Next backoff delay, or `None` once retries are exhausted
    fn schedule_retry(&self) -> Option<Duration> {
        let (delay, attempt) = {
            let mut state = self.state();
            if state.retry_count >= self.options.max_retries {
                return None;
            }
            let delay = self.options.retry_delay * 2u32.saturating_pow(state.retry_count);
            state.retry_count += 1;
            (delay, state.retry_count)
        };

        info!(
            attempt,
            max_retries = self.options.max_retries,
            delay_ms = delay.as_millis() as u64,
            "Reconnecting"
        );
        self.set_connection(ConnectionState::Disconnected);
        Some(delay)
    }

    fn set_connection(&self, connection: ConnectionState) {
        let retry_count = {
            let mut state = self.state();
            state.connection = connection;
            state.retry_count
        };
        debug!(state = %connection, retry_count, "Connection state");
        self.notify(SyncNotification::ConnectionChanged {
            state: connection,
            retry_count,
        });
    }

    async fn run_session(
        &self,
        connection: LiveConnection,
        cancel: &CancellationToken,
    ) -> SessionEnd {
        let LiveConnection { mut sink, mut stream } = connection;
        let period = self.options.ping_interval;
        let mut keepalive = interval_at(Instant::now() + period, period);

        info!("Live channel connected");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    let _ = sink.close().await;
                    return SessionEnd::Cancelled;
                }
                _ = keepalive.tick() => {
                    if let Err(e) = sink.send(&LiveMessage::ping(now_millis())).await {
                        warn!(error = %e, "Keepalive failed");
                        return SessionEnd::Unclean;
                    }
                }
                event = stream.next_event() => match event {
                    ConnectionEvent::Message(message) => self.handle_message(message).await,
                    ConnectionEvent::Closed { clean: true } => return SessionEnd::Clean,
                    ConnectionEvent::Closed { clean: false } => {
                        warn!("Live channel lost");
                        return SessionEnd::Unclean;
                    }
                },
            }
        }
    }

    async fn handle_message(&self, message: LiveMessage) {
        match message {
            LiveMessage::Sync { data } => {
                self.apply_sync(data.agents, data.timestamp, SyncSource::Live)
            }
            LiveMessage::AgentEvent { data } => {
                self.ingest_event(data).await;
            }
            LiveMessage::Pong => debug!("Pong"),
            other => debug!(event_type = other.event_type(), "Ignoring frame"),
        }
    }

    fn apply_sync(&self, agents: HashMap<String, AgentStatus>, timestamp: i64, source: SyncSource) {
        {
            let mut state = self.state();
            state.agents = agents.clone();
        }
        debug!(agents = agents.len(), ?source, "Agents synced");
        self.notify(SyncNotification::AgentsSync {
            agents,
            timestamp,
            source,
        });
    }

    /// Polls until cancelled or until the probe reopens the live channel
    async fn run_fallback(&self, cancel: &CancellationToken) -> Option<LiveConnection> {
        {
            let mut state = self.state();
            state.using_fallback = true;
        }
        self.set_connection(ConnectionState::UsingFallback);
        warn!(
            interval_ms = self.options.poll_interval.as_millis() as u64,
            "Falling back to polling"
        );

        let mut poll = interval(self.options.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut probe = self.options.reconnect_probe.map(|period| {
            let mut timer = interval_at(Instant::now() + period, period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            timer
        });

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return None,
                _ = poll.tick() => self.poll_once().await,
                _ = next_probe(&mut probe) => match self.connect_once(cancel).await {
                    Connect::Ready(connection) => return Some(connection),
                    Connect::Failed(e) => debug!(error = %e, "Reconnect probe failed"),
                    Connect::Cancelled => return None,
                },
            }
        }
    }

    /// Fetches one snapshot and replays events at or after the last seen time
    pub async fn poll_once(&self) {
        let response = match self.snapshots.fetch(self.options.recent_limit).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Poll failed");
                return;
            }
        };

        let StatusData {
            agents,
            recent_events,
            timestamp,
            ..
        } = response.data;

        let since = self.state().last_event_time;
        for event in recent_events.into_iter().filter(|e| e.timestamp >= since) {
            self.ingest_event(event).await;
        }

        self.apply_sync(agents, timestamp, SyncSource::Poll);
    }

    /// Applies one transition unless it has been seen before
    ///
    /// Returns true when the event was new.
    pub async fn ingest_event(&self, event: TransitionEvent) -> bool {
        let walk = {
            let mut state = self.state();
            if !state.seen.insert(event.event_id) {
                debug!(event_id = %event.event_id, "Duplicate event");
                return false;
            }

            // No previous snapshot marks the agent's initial state
            let previous = event.previous_state.clone();
            state.agents.insert(event.agent_id.clone(), event.new_state.clone());
            state.last_event_time = state.last_event_time.max(event.timestamp);

            if should_animate(previous.as_ref(), &event.new_state) {
                previous.and_then(|p| {
                    let from = self.locations.get(&p.location)?;
                    let to = self.locations.get(&event.new_state.location)?;
                    Some((from, to))
                })
            } else {
                None
            }
        };

        let animated = walk.is_some();
        if let Some((from, to)) = walk {
            let updates = self.notifications.clone();
            let completions = self.notifications.clone();
            let options = WalkOptions::default()
                .with_duration(self.options.walk_duration)
                .with_curve(self.options.curve_intensity)
                .on_update(move |update| {
                    let _ = updates.send(SyncNotification::AnimationUpdate(update.clone()));
                })
                .on_complete(move |completion| {
                    let _ = completions.send(SyncNotification::AnimationComplete(completion));
                });

            self.engine.lock().await.start_walk(&event.agent_id, from, to, options);
        }

        info!(
            agent_id = %event.agent_id,
            state = %event.new_state.state,
            location = %event.new_state.location,
            animated,
            "Agent state change"
        );
        self.notify(SyncNotification::AgentStateChange { event, animated });
        true
    }
}

/// A move is animated when the location changes and the new state says the
/// agent is walking, or it went straight from sleeping to working.
pub fn should_animate(previous: Option<&AgentStatus>, next: &AgentStatus) -> bool {
    let Some(previous) = previous else {
        return false;
    };
    if previous.location == next.location {
        return false;
    }

    next.animation_state.as_deref() == Some("walking")
        || next.state == "moving"
        || (previous.state == "sleeping" && next.state == "working")
}

async fn next_probe(probe: &mut Option<Interval>) {
    match probe {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(state: &str, location: &str, animation: Option<&str>) -> AgentStatus {
        AgentStatus {
            state: state.to_string(),
            location: location.to_string(),
            task: None,
            animation_state: animation.map(str::to_string),
            last_updated: None,
        }
    }

    #[test]
    fn no_previous_state_means_no_animation() {
        assert!(!should_animate(None, &status("walkingToBoard", "board", Some("walking"))));
    }

    #[test]
    fn same_location_means_no_animation() {
        let previous = status("sleeping", "cot-1", Some("idle"));
        assert!(!should_animate(Some(&previous), &status("waking", "cot-1", Some("idle"))));
    }

    #[test]
    fn walking_moving_or_waking_to_work_animates() {
        let previous = status("waking", "cot-1", Some("idle"));
        let walking = status("walkingToBoard", "board", Some("walking"));
        assert!(should_animate(Some(&previous), &walking));
        assert!(should_animate(Some(&previous), &status("moving", "board", None)));

        let asleep = status("sleeping", "cot-1", None);
        assert!(should_animate(Some(&asleep), &status("working", "desk-beta", None)));
        assert!(!should_animate(Some(&previous), &status("working", "desk-beta", None)));
    }
}
