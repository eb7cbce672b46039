//! Queue error types

use thiserror::Error;

/// Why a wait was aborted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The caller's token was cancelled
    Cancelled,

    /// The caller's deadline passed
    DeadlineExceeded,
}

impl std::fmt::Display for CancelReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cancelled => write!(f, "context cancelled"),
            Self::DeadlineExceeded => write!(f, "deadline exceeded"),
        }
    }
}

/// Errors returned by queue operations
///
/// None of these leave the queue in a degraded state; every operation can be
/// retried by the caller.
#[derive(Debug, Error)]
pub enum TimeQueueError {
    #[error("Operation aborted: {0}")]
    Cancelled(CancelReason),

    #[error("Message id already in use: {id}")]
    DuplicateId { id: String },

    #[error("Message not found: {id}")]
    NotFound { id: String },

    #[error("Queue is empty")]
    Empty,

    #[error("Failed to generate message id: {0}")]
    IdGeneration(String),
}

impl TimeQueueError {
    /// Check if the caller's context aborted the operation
    pub fn is_cancellation(&self) -> bool {
        matches!(self, TimeQueueError::Cancelled(_))
    }

    /// Get the cancel reason if this is a cancellation
    pub fn cancel_reason(&self) -> Option<CancelReason> {
        match self {
            TimeQueueError::Cancelled(reason) => Some(*reason),
            _ => None,
        }
    }
}

impl From<CancelReason> for TimeQueueError {
    fn from(reason: CancelReason) -> Self {
        TimeQueueError::Cancelled(reason)
    }
}

/// Result alias for queue operations
pub type Result<T> = std::result::Result<T, TimeQueueError>;
