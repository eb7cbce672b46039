//! Message record stored in the queue

use std::cmp::Ordering;
use std::time::Duration;

use tokio::time::Instant;

/// A value scheduled for release at a given instant
///
/// Messages are immutable once queued; the queue hands them out as
/// `Arc<Message<T>>`. Position bookkeeping lives in the heap, not here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message<T> {
    /// Unique among the messages currently queued
    pub id: String,

    /// Instant at which the message becomes deliverable
    pub at: Instant,

    /// Tie-break for equal `at`; smaller values are delivered first
    pub priority: i64,

    /// Caller payload
    pub value: T,
}

impl<T> Message<T> {
    /// Create a new message
    pub fn new(id: impl Into<String>, at: Instant, priority: i64, value: T) -> Self {
        Self {
            id: id.into(),
            at,
            priority,
            value,
        }
    }

    /// Delivery order: earlier `at` first, then lower `priority`
    pub fn schedule_cmp(&self, other: &Self) -> Ordering {
        self.at.cmp(&other.at).then_with(|| self.priority.cmp(&other.priority))
    }

    /// True if this message must be delivered before `other`
    pub fn precedes(&self, other: &Self) -> bool {
        self.schedule_cmp(other) == Ordering::Less
    }

    /// True once `now` has reached the release instant
    pub fn is_due(&self, now: Instant) -> bool {
        self.at <= now
    }

    /// Time left until release, zero if already due
    pub fn remaining(&self, now: Instant) -> Duration {
        self.at.saturating_duration_since(now)
    }
}
