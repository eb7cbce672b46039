//! Delay queue
//!
//! Messages are released in `(at, priority)` order once their instant has
//! passed. Producers never wait on the consumer: they mutate the heap under a
//! short lock and nudge the consumer through a wake notice when they queue a
//! new earliest message.

mod config;
mod core;
mod error;
mod gate;
mod heap;
mod wake;

pub use config::QueueConfig;
pub use core::TimeQueue;
pub use error::{CancelReason, Result, TimeQueueError};
pub use gate::TimeGate;
pub use heap::MessageHeap;
pub use wake::{Delivery, WakeNotice, WakeSender};
