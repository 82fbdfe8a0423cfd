use std::collections::{HashSet, VecDeque};

use uuid::Uuid;

pub const DEFAULT_DEDUP_CAPACITY: usize = 100;

/// Recently seen event ids
///
/// Once more than `capacity` ids are held the oldest half is forgotten, so
/// an event replayed long after it was first seen may be accepted again.
#[derive(Debug, Clone)]
pub struct RecentEventIds {
    ids: HashSet<Uuid>,
    order: VecDeque<Uuid>,
    capacity: usize,
}

impl RecentEventIds {
    pub fn new(capacity: usize) -> Self {
        Self {
            ids: HashSet::new(),
            order: VecDeque::new(),
            capacity: capacity.max(2),
        }
    }

    /// Records an id; false if it was already known
    pub fn insert(&mut self, id: Uuid) -> bool {
        if !self.ids.insert(id) {
            return false;
        }
        self.order.push_back(id);

        if self.order.len() > self.capacity {
            for _ in 0..self.capacity / 2 {
                if let Some(old) = self.order.pop_front() {
                    self.ids.remove(&old);
                }
            }
        }
        true
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl Default for RecentEventIds {
    fn default() -> Self {
        Self::new(DEFAULT_DEDUP_CAPACITY)
    }
}
