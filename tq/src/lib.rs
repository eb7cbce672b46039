//! timequeue - in-process delay queue
//!
//! Producers queue values tagged with a release instant and a priority; a
//! consumer takes them back out in `(at, priority)` order, never before their
//! instant, waiting as long as needed and waking early when a producer queues
//! something sooner.
//!
//! # Modules
//!
//! - [`queue`] - `TimeQueue`, its heap, timer gate and wake channel
//! - [`context`] - Per-call cancellation and deadlines
//! - [`domain`] - `Message` and id generators
//! - [`schedule`] - Schedules driven through a queue by the `tq` binary
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod context;
pub mod domain;
pub mod queue;
pub mod schedule;

// Re-export commonly used types
pub use config::{Config, DemoConfig};
pub use context::Context;
pub use domain::{IdGenerator, Message, SequentialIdGenerator, UuidIdGenerator};
pub use queue::{CancelReason, QueueConfig, Result, TimeQueue, TimeQueueError};
pub use schedule::{DeliveryReport, RunReport, ScheduleItem};
