//! Indexed binary min-heap of messages
//!
//! `messages` is an array-backed heap ordered by `Message::precedes`.
//! `positions` maps each queued id to its current slot in `messages` and is
//! updated on every swap, which is what makes removal by id O(log n).

use std::collections::HashMap;
use std::sync::Arc;

use tokio::time::Instant;

use crate::domain::Message;

use super::error::{Result, TimeQueueError};

pub struct MessageHeap<T> {
    messages: Vec<Arc<Message<T>>>,
    positions: HashMap<String, usize>,
}

impl<T> Default for MessageHeap<T> {
    fn default() -> Self {
        Self::with_capacity(0)
    }
}

impl<T> MessageHeap<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            messages: Vec::with_capacity(capacity),
            positions: HashMap::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    /// Earliest message, if any
    pub fn peek(&self) -> Option<&Arc<Message<T>>> {
        self.messages.first()
    }

    /// Insert a message; the heap is untouched if `id` is already queued
    pub fn push(&mut self, id: String, at: Instant, priority: i64, value: T) -> Result<Arc<Message<T>>> {
        if self.positions.contains_key(&id) {
            return Err(TimeQueueError::DuplicateId { id });
        }

        let message = Arc::new(Message::new(id, at, priority, value));
        let slot = self.messages.len();
        self.positions.insert(message.id.clone(), slot);
        self.messages.push(Arc::clone(&message));
        self.sift_up(slot);

        Ok(message)
    }

    /// Remove and return the earliest message
    pub fn pop(&mut self) -> Option<Arc<Message<T>>> {
        self.take(0)
    }

    /// Remove the message with the given id, wherever it sits in the heap
    pub fn remove(&mut self, id: &str) -> Result<Arc<Message<T>>> {
        let slot = self.positions.get(id).copied();
        slot.and_then(|slot| self.take(slot))
            .ok_or_else(|| TimeQueueError::NotFound { id: id.to_string() })
    }

    /// Detach every message, leaving the heap empty. Order is unspecified.
    pub fn drain(&mut self) -> Vec<Arc<Message<T>>> {
        self.positions.clear();
        std::mem::take(&mut self.messages)
    }

    /// Remove the message at `slot` and restore the heap property
    fn take(&mut self, slot: usize) -> Option<Arc<Message<T>>> {
        let last = self.messages.len().checked_sub(1)?;
        if slot != last {
            self.swap(slot, last);
        }

        let message = self.messages.pop()?;
        self.positions.remove(&message.id);

        // The element moved into `slot` may belong above or below it
        if slot < self.messages.len() && !self.sift_up(slot) {
            self.sift_down(slot);
        }

        Some(message)
    }

    fn less(&self, i: usize, j: usize) -> bool {
        self.messages[i].precedes(&self.messages[j])
    }

    fn swap(&mut self, i: usize, j: usize) {
        self.messages.swap(i, j);
        self.positions.insert(self.messages[i].id.clone(), i);
        self.positions.insert(self.messages[j].id.clone(), j);
    }

    /// Returns true if the element moved
    fn sift_up(&mut self, mut slot: usize) -> bool {
        let start = slot;
        while slot > 0 {
            let parent = (slot - 1) / 2;
            if !self.less(slot, parent) {
                break;
            }
            self.swap(slot, parent);
            slot = parent;
        }
        slot != start
    }

    fn sift_down(&mut self, mut slot: usize) {
        let len = self.messages.len();
        loop {
            let left = 2 * slot + 1;
            if left >= len {
                break;
            }
            let right = left + 1;
            let child = if right < len && self.less(right, left) { right } else { left };
            if !self.less(child, slot) {
                break;
            }
            self.swap(slot, child);
            slot = child;
        }
    }
}
