//! Domain types for timequeue
//!
//! The queued record (`Message`) and the ID sources used to name it.

mod id;
mod message;

pub use id::{IdGenerator, SequentialIdGenerator, UuidIdGenerator, slugify};
pub use message::Message;
