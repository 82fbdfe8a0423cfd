use std::collections::VecDeque;

use super::messages::TransitionEvent;

/// Default number of events kept for replay
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// Bounded FIFO of transition events; the oldest entry is evicted on overflow
#[derive(Debug, Clone)]
pub struct EventHistory {
    events: VecDeque<TransitionEvent>,
    capacity: usize,
}

impl EventHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends an event, returning the evicted one if the buffer was full
    pub fn push(&mut self, event: TransitionEvent) -> Option<TransitionEvent> {
        let evicted = if self.events.len() == self.capacity {
            self.events.pop_front()
        } else {
            None
        };
        self.events.push_back(event);
        evicted
    }

    /// The newest `limit` events, oldest first
    pub fn recent(&self, limit: usize) -> Vec<TransitionEvent> {
        let skip = self.events.len().saturating_sub(limit);
        self.events.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}
