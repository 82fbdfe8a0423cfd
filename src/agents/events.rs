// Office event bus
//
// In-process pub/sub for office domain events using tokio broadcast
// channels. The hub forwarder, kanban renderers and achievement trackers
// all subscribe here.

use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::domain::office::OfficeEvent;

pub const DEFAULT_BUS_CAPACITY: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus closed")]
    Closed,

    #[error("Receiver lagged by {0} events")]
    Lagged(u64),

    #[error("No event available")]
    Empty,
}

/// Event bus for publishing and subscribing to office events
#[derive(Clone)]
pub struct OfficeEventBus {
    sender: broadcast::Sender<OfficeEvent>,
}

impl OfficeEventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn publish(&self, event: OfficeEvent) {
        let receivers = self.sender.send(event).unwrap_or(0);
        if receivers == 0 {
            debug!("No subscribers listening to office event");
        }
    }

    pub fn publish_all(&self, events: impl IntoIterator<Item = OfficeEvent>) {
        for event in events {
            self.publish(event);
        }
    }

    pub fn subscribe(&self) -> OfficeEventReceiver {
        OfficeEventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for OfficeEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}

pub struct OfficeEventReceiver {
    receiver: broadcast::Receiver<OfficeEvent>,
}

impl OfficeEventReceiver {
    pub async fn recv(&mut self) -> Result<OfficeEvent, EventBusError> {
        self.receiver.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Closed => EventBusError::Closed,
            broadcast::error::RecvError::Lagged(n) => {
                warn!("Office event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }

    pub fn try_recv(&mut self) -> Result<OfficeEvent, EventBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => EventBusError::Empty,
            broadcast::error::TryRecvError::Closed => EventBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => {
                warn!("Office event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }
}
