// Transition publishers
//
// Forward agent transitions from the office event bus to a hub, either one
// running in the same process or a remote one over HTTP.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::errors::{WorkflowError, WorkflowResult};
use super::events::{EventBusError, OfficeEventBus};
use crate::domain::office::{AgentTransition, OfficeEvent};
use crate::hub::{AgentStatus, AgentUpdate, EventHub};

#[async_trait]
pub trait TransitionPublisher: Send + Sync {
    async fn publish(&self, transition: &AgentTransition) -> WorkflowResult<()>;
}

/// Publishes straight into a hub in this process
pub struct HubPublisher {
    hub: Arc<EventHub>,
}

impl HubPublisher {
    pub fn new(hub: Arc<EventHub>) -> Self {
        Self { hub }
    }
}

#[async_trait]
impl TransitionPublisher for HubPublisher {
    async fn publish(&self, transition: &AgentTransition) -> WorkflowResult<()> {
        self.hub
            .publish(
                &transition.agent_id,
                Some(AgentStatus::from(&transition.previous)),
                AgentStatus::from(&transition.current),
                Some(transition.occurred_at.timestamp_millis()),
            )
            .map(|_| ())
            .map_err(|e| WorkflowError::Publish(e.to_string()))
    }
}

/// Publishes to a remote hub's update endpoint
pub struct HttpPublisher {
    client: reqwest::Client,
    url: String,
}

impl HttpPublisher {
    pub fn new(url: impl Into<String>, timeout: Duration) -> WorkflowResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WorkflowError::Publish(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl TransitionPublisher for HttpPublisher {
    async fn publish(&self, transition: &AgentTransition) -> WorkflowResult<()> {
        let status = AgentStatus::from(&transition.current);
        let mut update = AgentUpdate::new(&transition.agent_id, &status);
        update.timestamp = Some(transition.occurred_at.timestamp_millis());

        self.client
            .post(&self.url)
            .json(&update)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map(|_| ())
            .map_err(|e| WorkflowError::Publish(e.to_string()))
    }
}

/// Forwards every agent transition on the bus until cancelled
///
/// The subscription is taken before this returns, so nothing published
/// afterwards is missed.
pub fn spawn_forwarder(
    bus: &OfficeEventBus,
    publisher: Arc<dyn TransitionPublisher>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let mut events = bus.subscribe();

    tokio::spawn(async move {
        info!("Transition forwarder started");
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = events.recv() => event,
            };

            match event {
                Ok(OfficeEvent::AgentTransitioned(transition)) => {
                    if let Err(e) = publisher.publish(&transition).await {
                        warn!(
                            agent_id = %transition.agent_id,
                            milestone = %transition.milestone,
                            error = %e,
                            "Failed to forward transition"
                        );
                    }
                }
                Ok(other) => debug!(agent_id = ?other.agent_id(), "Not a transition, skipped"),
                Err(EventBusError::Lagged(_)) | Err(EventBusError::Empty) => continue,
                Err(EventBusError::Closed) => break,
            }
        }
        info!("Transition forwarder stopped");
    })
}
