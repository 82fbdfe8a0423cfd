use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::history::EventHistory;
use super::messages::{
    AgentStatus, AgentUpdate, LiveMessage, StatusData, StatusResponse, SyncPayload, TransitionEvent,
    AGENT_STATE_CHANGE,
};

/// Default per-subscriber queue length
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 64;

/// Errors returned to producers
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HubError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
}

/// A live subscriber's end of the hub
///
/// The first message in `receiver` is always the `sync` handshake.
#[derive(Debug)]
pub struct Subscription {
    pub id: Uuid,
    pub receiver: mpsc::Receiver<LiveMessage>,
}

struct HubState {
    agents: HashMap<String, AgentStatus>,
    history: EventHistory,
    subscribers: HashMap<Uuid, mpsc::Sender<LiveMessage>>,
    last_timestamp: i64,
}

/// Event distribution hub
///
/// Keeps the last known state of every agent and a bounded history, and
/// relays every accepted update to all live subscribers. The lock is held
/// only for in-memory bookkeeping and non-blocking sends, so a stalled
/// subscriber is dropped rather than allowed to hold up the others.
///
/// Event timestamps are stamped by the hub on receipt and never go
/// backwards; a producer's own timestamp is kept as `producer_timestamp`.
pub struct EventHub {
    state: Mutex<HubState>,
    subscriber_buffer: usize,
}

impl EventHub {
    pub fn new(history_capacity: usize, subscriber_buffer: usize) -> Self {
        Self {
            state: Mutex::new(HubState {
                agents: HashMap::new(),
                history: EventHistory::new(history_capacity),
                subscribers: HashMap::new(),
                last_timestamp: 0,
            }),
            subscriber_buffer: subscriber_buffer.max(1),
        }
    }

    fn state(&self) -> MutexGuard<'_, HubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Validates and publishes a producer update
    pub fn apply_update(&self, update: AgentUpdate) -> Result<TransitionEvent, HubError> {
        let agent_id = required(update.agent_id, "agentId")?;
        let state = required(update.state, "state")?;
        let location = required(update.location, "location")?;

        let new_state = AgentStatus {
            state,
            location,
            task: update.task,
            animation_state: update.animation_state,
            last_updated: None,
        };

        self.publish(&agent_id, None, new_state, update.timestamp)
    }

    /// Records a state change and relays it to every subscriber
    ///
    /// When `previous` is `None` the last known state of the agent is used.
    /// Fails without touching any state if the agent id, state or location
    /// is empty.
    pub fn publish(
        &self,
        agent_id: &str,
        previous: Option<AgentStatus>,
        new_state: AgentStatus,
        producer_timestamp: Option<i64>,
    ) -> Result<TransitionEvent, HubError> {
        if agent_id.trim().is_empty() {
            return Err(HubError::MissingField("agentId"));
        }
        if new_state.state.trim().is_empty() {
            return Err(HubError::MissingField("state"));
        }
        if new_state.location.trim().is_empty() {
            return Err(HubError::MissingField("location"));
        }

        let mut state = self.state();

        let timestamp = Utc::now().timestamp_millis().max(state.last_timestamp);
        state.last_timestamp = timestamp;

        let previous = previous.or_else(|| state.agents.get(agent_id).cloned());
        let stored = AgentStatus {
            last_updated: Some(timestamp),
            ..new_state.clone()
        };
        state.agents.insert(agent_id.to_string(), stored);

        let event = TransitionEvent {
            event_id: Uuid::new_v4(),
            kind: AGENT_STATE_CHANGE.to_string(),
            agent_id: agent_id.to_string(),
            previous_state: previous,
            new_state,
            timestamp,
            producer_timestamp,
        };

        state.history.push(event.clone());
        let message = LiveMessage::AgentEvent {
            data: event.clone(),
        };
        let delivered = broadcast(&mut state, &message);

        info!(
            agent_id = %event.agent_id,
            state = %event.new_state.state,
            location = %event.new_state.location,
            event_id = %event.event_id,
            delivered,
            "Agent update"
        );

        Ok(event)
    }

    /// Registers a subscriber; its queue starts with a full `sync`
    pub fn subscribe(&self) -> Subscription {
        let (sender, receiver) = mpsc::channel(self.subscriber_buffer);
        let id = Uuid::new_v4();

        let mut state = self.state();
        let handshake = LiveMessage::Sync {
            data: SyncPayload {
                agents: state.agents.clone(),
                timestamp: Utc::now().timestamp_millis(),
            },
        };
        // Fresh channel with capacity >= 1, cannot be full
        let _ = sender.try_send(handshake);
        state.subscribers.insert(id, sender);

        info!(subscriber_id = %id, total = state.subscribers.len(), "Subscriber connected");

        Subscription { id, receiver }
    }

    pub fn unsubscribe(&self, id: Uuid) {
        let mut state = self.state();
        if state.subscribers.remove(&id).is_some() {
            info!(
                subscriber_id = %id,
                remaining = state.subscribers.len(),
                "Subscriber disconnected"
            );
        }
    }

    /// Sends a message to one subscriber, dropping it if the send fails
    pub fn send_to(&self, id: Uuid, message: LiveMessage) -> bool {
        let mut state = self.state();
        let sent = match state.subscribers.get(&id) {
            Some(sender) => sender.try_send(message).is_ok(),
            None => return false,
        };
        if !sent {
            warn!(subscriber_id = %id, "Reply failed, dropping subscriber");
            state.subscribers.remove(&id);
        }
        sent
    }

    /// Last known state of every agent
    pub fn snapshot(&self) -> HashMap<String, AgentStatus> {
        self.state().agents.clone()
    }

    /// The newest `limit` events, oldest first
    pub fn recent(&self, limit: usize) -> Vec<TransitionEvent> {
        self.state().history.recent(limit)
    }

    pub fn subscriber_count(&self) -> usize {
        self.state().subscribers.len()
    }

    /// Body of the polled snapshot endpoint
    pub fn status(&self, limit: usize) -> StatusResponse {
        let state = self.state();
        StatusResponse {
            success: true,
            data: StatusData {
                agents: state.agents.clone(),
                recent_events: state.history.recent(limit),
                connection_count: state.subscribers.len(),
                timestamp: Utc::now().timestamp_millis(),
            },
        }
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(super::history::DEFAULT_HISTORY_CAPACITY, DEFAULT_SUBSCRIBER_BUFFER)
    }
}

fn required(value: Option<String>, field: &'static str) -> Result<String, HubError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(HubError::MissingField(field)),
    }
}

/// Fans a message out, dropping subscribers whose queue is full or closed
fn broadcast(state: &mut HubState, message: &LiveMessage) -> usize {
    let mut dead = Vec::new();

    for (id, sender) in &state.subscribers {
        match sender.try_send(message.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(subscriber_id = %id, "Subscriber lagging, dropping");
                dead.push(*id);
            }
            Err(TrySendError::Closed(_)) => {
                debug!(subscriber_id = %id, "Subscriber gone");
                dead.push(*id);
            }
        }
    }

    for id in &dead {
        state.subscribers.remove(id);
    }
    if !dead.is_empty() {
        info!(removed = dead.len(), "Cleaned up dead subscribers");
    }

    state.subscribers.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(state: &str, location: &str) -> AgentStatus {
        AgentStatus {
            state: state.to_string(),
            location: location.to_string(),
            task: None,
            animation_state: None,
            last_updated: None,
        }
    }

    fn update(agent: &str, state: &str, location: &str) -> AgentUpdate {
        AgentUpdate {
            agent_id: Some(agent.to_string()),
            state: Some(state.to_string()),
            location: Some(location.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn first_update_is_recorded() {
        let hub = EventHub::default();

        let event = hub.apply_update(update("theta", "working", "desk-theta")).unwrap();

        let snapshot = hub.snapshot();
        let theta = snapshot.get("theta").expect("theta recorded");
        assert_eq!(theta.state, "working");
        assert_eq!(theta.last_updated, Some(event.timestamp));
        assert_eq!(event.previous_state, None);
        assert_eq!(event.kind, AGENT_STATE_CHANGE);
        assert_eq!(hub.recent(1), vec![event]);
    }

    #[test]
    fn missing_fields_are_rejected_without_mutation() {
        let hub = EventHub::default();

        let mut no_state = update("theta", "working", "desk-theta");
        no_state.state = None;
        let mut no_location = update("theta", "working", "desk-theta");
        no_location.location = Some("  ".to_string());
        let mut no_agent = update("theta", "working", "desk-theta");
        no_agent.agent_id = None;

        assert_eq!(hub.apply_update(no_state), Err(HubError::MissingField("state")));
        assert_eq!(hub.apply_update(no_location), Err(HubError::MissingField("location")));
        assert_eq!(hub.apply_update(no_agent), Err(HubError::MissingField("agentId")));
        assert!(hub.snapshot().is_empty());
        assert!(hub.recent(10).is_empty());
    }

    #[test]
    fn previous_state_defaults_to_last_known() {
        let hub = EventHub::default();
        hub.publish("beta", None, status("sleeping", "cot-1"), None).unwrap();

        let event = hub.publish("beta", None, status("waking", "cot-1"), None).unwrap();

        let previous = event.previous_state.expect("previous state");
        assert_eq!(previous.state, "sleeping");
    }

    #[test]
    fn explicit_previous_state_wins() {
        let hub = EventHub::default();
        hub.publish("beta", None, status("sleeping", "cot-1"), None).unwrap();

        let event = hub
            .publish(
                "beta",
                Some(status("claiming", "board")),
                status("walkingToDesk", "desk-beta"),
                Some(7),
            )
            .unwrap();

        assert_eq!(event.previous_state.unwrap().state, "claiming");
        assert_eq!(event.producer_timestamp, Some(7));
        assert!(event.timestamp > 7);
    }

    #[test]
    fn history_is_bounded() {
        let hub = EventHub::new(3, 8);
        let first = hub.publish("a", None, status("working", "board"), None).unwrap();
        for agent in ["b", "c", "d"] {
            hub.publish(agent, None, status("working", "board"), None).unwrap();
        }

        let recent = hub.recent(10);

        assert_eq!(recent.len(), 3);
        assert!(!recent.contains(&first));
        let agents: Vec<&str> = recent.iter().map(|e| e.agent_id.as_str()).collect();
        assert_eq!(agents, vec!["b", "c", "d"]);
    }

    #[test]
    fn timestamps_never_go_backwards() {
        let hub = EventHub::default();
        let mut last = 0;
        for _ in 0..20 {
            let event = hub.publish("a", None, status("working", "board"), None).unwrap();
            assert!(event.timestamp >= last);
            last = event.timestamp;
        }
    }

    #[test]
    fn subscriber_starts_with_sync() {
        let hub = EventHub::default();
        hub.publish("theta", None, status("working", "desk-theta"), None).unwrap();

        let mut sub = hub.subscribe();

        match sub.receiver.try_recv().unwrap() {
            LiveMessage::Sync { data } => assert!(data.agents.contains_key("theta")),
            other => panic!("Expected sync, got {:?}", other),
        }
        assert_eq!(hub.subscriber_count(), 1);
    }

    #[test]
    fn broadcast_reaches_every_subscriber_once() {
        let hub = EventHub::default();
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();
        let _ = a.receiver.try_recv();
        let _ = b.receiver.try_recv();

        let event = hub.publish("beta", None, status("waking", "cot-1"), None).unwrap();

        for sub in [&mut a, &mut b] {
            assert_eq!(
                sub.receiver.try_recv().unwrap(),
                LiveMessage::AgentEvent {
                    data: event.clone()
                }
            );
            assert!(sub.receiver.try_recv().is_err());
        }
    }

    #[test]
    fn closed_subscriber_is_removed_without_affecting_others() {
        let hub = EventHub::default();
        let gone = hub.subscribe();
        let mut alive = hub.subscribe();
        drop(gone);

        hub.publish("beta", None, status("waking", "cot-1"), None).unwrap();

        assert_eq!(hub.subscriber_count(), 1);
        assert!(matches!(alive.receiver.try_recv(), Ok(LiveMessage::Sync { .. })));
        assert!(matches!(alive.receiver.try_recv(), Ok(LiveMessage::AgentEvent { .. })));
    }

    #[test]
    fn lagging_subscriber_is_dropped() {
        // Room for the handshake plus one event
        let hub = EventHub::new(10, 2);
        let slow = hub.subscribe();
        let mut fast = hub.subscribe();
        let _ = fast.receiver.try_recv();

        hub.publish("a", None, status("working", "board"), None).unwrap();
        let _ = fast.receiver.try_recv();
        hub.publish("b", None, status("working", "board"), None).unwrap();

        assert_eq!(hub.subscriber_count(), 1);
        assert!(matches!(fast.receiver.try_recv(), Ok(LiveMessage::AgentEvent { .. })));
        drop(slow);
    }

    #[test]
    fn send_to_targets_one_subscriber() {
        let hub = EventHub::default();
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();
        let _ = a.receiver.try_recv();
        let _ = b.receiver.try_recv();

        assert!(hub.send_to(a.id, LiveMessage::Pong));
        assert!(!hub.send_to(Uuid::new_v4(), LiveMessage::Pong));

        assert_eq!(a.receiver.try_recv().unwrap(), LiveMessage::Pong);
        assert!(b.receiver.try_recv().is_err());
    }

    #[test]
    fn status_reports_connections_and_recent_events() {
        let hub = EventHub::default();
        let _sub = hub.subscribe();
        hub.publish("beta", None, status("waking", "cot-1"), None).unwrap();

        let response = hub.status(10);

        assert!(response.success);
        assert_eq!(response.data.connection_count, 1);
        assert_eq!(response.data.recent_events.len(), 1);
        assert!(response.data.agents.contains_key("beta"));
    }
}
