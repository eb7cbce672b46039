//! TimeQueue implementation

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::context::Context;
use crate::domain::{IdGenerator, Message, UuidIdGenerator};

use super::config::QueueConfig;
use super::error::{Result, TimeQueueError};
use super::gate::TimeGate;
use super::heap::MessageHeap;
use super::wake::{self, WakeNotice, WakeSender};

/// State protected by the mutation lock
struct Store<T> {
    heap: MessageHeap<T>,
}

/// State protected by the consumption lock
struct Consumer {
    gate: TimeGate,
    wake_rx: mpsc::Receiver<WakeNotice>,
}

/// A delay queue: messages come out in `(at, priority)` order, each no
/// earlier than its `at` instant.
///
/// Any number of tasks may enqueue concurrently. Consumption is single-flight:
/// a second `dequeue` waits until the first one returns. Share the queue
/// between tasks with an `Arc`.
pub struct TimeQueue<T> {
    config: QueueConfig,
    ids: Arc<dyn IdGenerator>,
    store: Mutex<Store<T>>,
    consumer: Mutex<Consumer>,
    wake_tx: WakeSender,
}

impl<T> Default for TimeQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TimeQueue<T> {
    /// Create an empty queue with default configuration and UUID ids
    pub fn new() -> Self {
        Self::with_config(QueueConfig::default())
    }

    pub fn with_config(config: QueueConfig) -> Self {
        Self::with_id_generator(config, Arc::new(UuidIdGenerator::new()))
    }

    /// Create an empty queue that names messages with `ids`
    pub fn with_id_generator(config: QueueConfig, ids: Arc<dyn IdGenerator>) -> Self {
        debug!(?config, "TimeQueue::new: called");
        let (wake_tx, wake_rx) = wake::channel();
        Self {
            store: Mutex::new(Store {
                heap: MessageHeap::with_capacity(config.initial_capacity),
            }),
            consumer: Mutex::new(Consumer {
                gate: TimeGate::new(),
                wake_rx,
            }),
            wake_tx,
            ids,
            config,
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Queue `value` for immediate release at the default priority
    pub async fn enqueue_value(&self, ctx: &Context, value: T) -> Result<Arc<Message<T>>> {
        self.enqueue(ctx, value, Instant::now(), self.config.default_priority).await
    }

    /// Queue `value` for release at `at` under a generated id
    pub async fn enqueue(&self, ctx: &Context, value: T, at: Instant, priority: i64) -> Result<Arc<Message<T>>> {
        let id = self
            .ids
            .generate()
            .map_err(|e| TimeQueueError::IdGeneration(e.to_string()))?;
        self.insert(ctx, id, value, at, priority).await
    }

    /// Queue `value` under a caller-chosen id
    ///
    /// Fails with `DuplicateId` while another message with that id is queued.
    pub async fn enqueue_with_id(
        &self,
        ctx: &Context,
        id: impl Into<String>,
        value: T,
        at: Instant,
        priority: i64,
    ) -> Result<Arc<Message<T>>> {
        self.insert(ctx, id.into(), value, at, priority).await
    }

    async fn insert(&self, ctx: &Context, id: String, value: T, at: Instant, priority: i64) -> Result<Arc<Message<T>>> {
        debug!(%id, ?at, priority, "TimeQueue::enqueue: called");
        let mut store = ctx.run(self.store.lock()).await?;

        let previous = store.heap.peek().map(|m| m.at);
        let message = store.heap.push(id, at, priority, value)?;

        if previous.is_none_or(|previous| at < previous) {
            let notice = WakeNotice {
                had_previous: previous.is_some(),
                earliest: at,
            };
            let delivery = self.wake_tx.deliver(notice);
            debug!(id = %message.id, ?delivery, "TimeQueue::enqueue: new earliest, waking consumer");
        }

        Ok(message)
    }

    /// Wait for the earliest message to come due and take it
    ///
    /// Returns the message and the instant the timer fired. Only one dequeue
    /// runs at a time; concurrent callers queue up behind it.
    pub async fn dequeue(&self, ctx: &Context) -> Result<(Arc<Message<T>>, Instant)> {
        debug!("TimeQueue::dequeue: called");
        let mut consumer = ctx.run(self.consumer.lock()).await?;
        let Consumer { gate, wake_rx } = &mut *consumer;

        // A previous dequeue may have been cancelled mid-wait
        {
            let store = ctx.run(self.store.lock()).await?;
            gate.sync(store.heap.peek().map(|m| m.at));
        }

        loop {
            let fired_at = tokio::select! {
                biased;
                reason = ctx.done() => {
                    debug!(%reason, "TimeQueue::dequeue: aborted while waiting");
                    return Err(reason.into());
                }
                Some(notice) = wake_rx.recv() => {
                    // One notice may stand for several enqueues; the heap has the truth
                    let store = ctx.run(self.store.lock()).await?;
                    if let Some(earliest) = store.heap.peek().map(|m| m.at)
                        && gate.arm_earlier(earliest)
                    {
                        debug!(?notice, ?earliest, "TimeQueue::dequeue: rearmed for earlier message");
                    }
                    continue;
                }
                fired_at = gate.fired() => fired_at,
            };

            let mut store = ctx.run(self.store.lock()).await?;

            // The armed target may have been removed or unloaded since
            match store.heap.peek().map(|m| m.at) {
                None => {
                    debug!("TimeQueue::dequeue: fired on empty queue, waiting");
                    continue;
                }
                Some(at) if at > fired_at => {
                    debug!(?at, "TimeQueue::dequeue: fired early, rearming");
                    gate.arm(at);
                    continue;
                }
                Some(_) => {}
            }

            let message = store.heap.pop().ok_or(TimeQueueError::Empty)?;
            gate.sync(store.heap.peek().map(|m| m.at));
            drop(store);

            debug!(id = %message.id, ?fired_at, "TimeQueue::dequeue: delivered");
            return Ok((message, fired_at));
        }
    }

    /// Take the earliest message if it is already due, without waiting
    pub async fn try_dequeue(&self, ctx: &Context) -> Result<Arc<Message<T>>> {
        debug!("TimeQueue::try_dequeue: called");
        let mut consumer = ctx.run(self.consumer.lock()).await?;
        let mut store = ctx.run(self.store.lock()).await?;

        let now = Instant::now();
        if !store.heap.peek().is_some_and(|m| m.is_due(now)) {
            return Err(TimeQueueError::Empty);
        }

        let message = store.heap.pop().ok_or(TimeQueueError::Empty)?;
        consumer.gate.sync(store.heap.peek().map(|m| m.at));
        Ok(message)
    }

    /// Remove a queued message by id
    ///
    /// The consumer is not signalled; if it was waiting for this message it
    /// wakes at the old instant, finds the next message not yet due and goes
    /// back to sleep.
    pub async fn remove(&self, ctx: &Context, id: &str) -> Result<Arc<Message<T>>> {
        debug!(%id, "TimeQueue::remove: called");
        let mut store = ctx.run(self.store.lock()).await?;
        store.heap.remove(id)
    }

    /// Remove every queued message, in no particular order
    ///
    /// A wake notice still pending from an earlier enqueue only makes the
    /// consumer re-read the now empty heap.
    pub async fn unload(&self, ctx: &Context) -> Result<Vec<Arc<Message<T>>>> {
        debug!("TimeQueue::unload: called");
        let mut store = ctx.run(self.store.lock()).await?;

        let messages = store.heap.drain();

        info!(count = messages.len(), "Unloaded queue");
        Ok(messages)
    }

    /// Earliest message without removing it
    pub async fn peek(&self, ctx: &Context) -> Result<Option<Arc<Message<T>>>> {
        let store = ctx.run(self.store.lock()).await?;
        Ok(store.heap.peek().cloned())
    }

    pub async fn len(&self, ctx: &Context) -> Result<usize> {
        let store = ctx.run(self.store.lock()).await?;
        Ok(store.heap.len())
    }

    pub async fn is_empty(&self, ctx: &Context) -> Result<bool> {
        Ok(self.len(ctx).await? == 0)
    }
}
