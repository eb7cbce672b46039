//! Queue configuration

use serde::{Deserialize, Serialize};

/// Queue configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Slots preallocated in the heap
    #[serde(rename = "initial-capacity", default = "default_initial_capacity")]
    pub initial_capacity: usize,

    /// Priority used by `enqueue_value`
    #[serde(rename = "default-priority", default)]
    pub default_priority: i64,
}

fn default_initial_capacity() -> usize {
    64
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            initial_capacity: default_initial_capacity(),
            default_priority: 0,
        }
    }
}
