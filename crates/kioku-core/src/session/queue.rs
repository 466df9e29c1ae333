//! Review Queue
//!
//! FIFO with reinsertion. A missed item goes to the back so the learner works
//! through the others before seeing it again; an item leaves the queue only
//! when it is answered correctly.

use std::collections::VecDeque;

use super::SessionItem;
use crate::memory::Facet;

/// Ordered, mutable sequence of session items
#[derive(Debug, Clone, Default)]
pub struct ReviewQueue {
    items: VecDeque<SessionItem>,
}

impl ReviewQueue {
    /// Build a queue, dropping repeated (ku, facet) entries
    pub fn new(items: impl IntoIterator<Item = SessionItem>) -> Self {
        let mut queue = Self::default();
        for item in items {
            if queue.contains(&item.ku_id, &item.facet) {
                tracing::warn!(ku_id = %item.ku_id, facet = %item.facet, "Dropping duplicate queue item");
                continue;
            }
            queue.items.push_back(item);
        }
        queue
    }

    /// Head of the queue
    pub fn current(&self) -> Option<&SessionItem> {
        self.items.front()
    }

    pub fn current_mut(&mut self) -> Option<&mut SessionItem> {
        self.items.front_mut()
    }

    /// Move the head to the tail; the rest keep their relative order
    ///
    /// Returns false when the queue is empty.
    pub fn requeue(&mut self) -> bool {
        match self.items.pop_front() {
            Some(item) => {
                self.items.push_back(item);
                true
            }
            None => false,
        }
    }

    /// Remove the head permanently
    pub fn remove(&mut self) -> Option<SessionItem> {
        self.items.pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SessionItem> {
        self.items.iter()
    }

    pub fn contains(&self, ku_id: &str, facet: &Facet) -> bool {
        self.items.iter().any(|i| i.ku_id == ku_id && &i.facet == facet)
    }
}
