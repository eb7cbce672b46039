//! Schedules driven through a `TimeQueue` by the `tq` binary

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use eyre::{Context as _, Result, eyre};
use rand::Rng;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::DemoConfig;
use crate::context::Context;
use crate::domain::{Message, slugify};
use crate::queue::{TimeQueue, TimeQueueError};

/// One scheduled message, written `NAME@DELAY_MS[:PRIORITY]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleItem {
    pub name: String,
    pub delay: Duration,
    pub priority: i64,
}

impl ScheduleItem {
    /// Message id derived from the name
    pub fn id(&self) -> String {
        slugify(&self.name)
    }

    /// A random item named `msg-{index}`
    pub fn random<R: Rng + ?Sized>(rng: &mut R, index: usize, demo: &DemoConfig) -> Self {
        Self {
            name: format!("msg-{}", index),
            delay: Duration::from_millis(rng.random_range(0..=demo.max_delay_ms)),
            priority: rng.random_range(0..=demo.max_priority.max(0)),
        }
    }
}

impl FromStr for ScheduleItem {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, rest) = s
            .split_once('@')
            .ok_or_else(|| format!("Expected NAME@DELAY_MS[:PRIORITY], got '{}'", s))?;

        if slugify(name).is_empty() {
            return Err(format!("Name must contain letters or digits: '{}'", s));
        }

        let (delay, priority) = match rest.split_once(':') {
            Some((delay, priority)) => (delay, Some(priority)),
            None => (rest, None),
        };

        let delay_ms: u64 = delay
            .trim()
            .parse()
            .map_err(|_| format!("Invalid delay '{}' in '{}'", delay, s))?;
        let priority: i64 = match priority {
            Some(p) => p.trim().parse().map_err(|_| format!("Invalid priority '{}' in '{}'", p, s))?,
            None => 0,
        };

        Ok(Self {
            name: name.to_string(),
            delay: Duration::from_millis(delay_ms),
            priority,
        })
    }
}

/// A delivered message, with times relative to the start of the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub id: String,
    pub value: String,
    pub priority: i64,
    pub scheduled_ms: u64,
    pub fired_ms: u64,
    pub lateness_ms: u64,
}

impl DeliveryReport {
    fn new(message: &Message<String>, fired_at: Instant, start: Instant) -> Self {
        Self {
            id: message.id.clone(),
            value: message.value.clone(),
            priority: message.priority,
            scheduled_ms: millis(message.at.saturating_duration_since(start)),
            fired_ms: millis(fired_at.saturating_duration_since(start)),
            lateness_ms: millis(fired_at.saturating_duration_since(message.at)),
        }
    }
}

/// Whole milliseconds, saturating at `u64::MAX`
fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Result of running a schedule
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub delivered: Vec<DeliveryReport>,
    pub removed: Vec<String>,
    pub missing: Vec<String>,
}

/// Queue every item, apply removals, then drain the queue in delivery order
pub async fn run_schedule(
    queue: &TimeQueue<String>,
    ctx: &Context,
    items: &[ScheduleItem],
    removals: &[String],
) -> Result<RunReport> {
    debug!(items = items.len(), removals = removals.len(), "run_schedule: called");
    let start = Instant::now();
    let mut report = RunReport::default();

    for item in items {
        queue
            .enqueue_with_id(ctx, item.id(), item.name.clone(), start + item.delay, item.priority)
            .await
            .context(format!("Failed to enqueue '{}'", item.name))?;
    }

    for name in removals {
        match queue.remove(ctx, &slugify(name)).await {
            Ok(message) => report.removed.push(message.id.clone()),
            Err(TimeQueueError::NotFound { id }) => {
                warn!(%id, "Removal target not queued");
                report.missing.push(id);
            }
            Err(e) => return Err(e).context(format!("Failed to remove '{}'", name)),
        }
    }

    let pending = queue.len(ctx).await?;
    for _ in 0..pending {
        let (message, fired_at) = queue.dequeue(ctx).await.context("Failed to dequeue")?;
        report.delivered.push(DeliveryReport::new(&message, fired_at, start));
    }

    info!(
        delivered = report.delivered.len(),
        removed = report.removed.len(),
        "Schedule complete"
    );
    Ok(report)
}

/// Gap between demo arrivals: a quarter of the average spacing of `count`
/// messages over `max-delay-ms`
pub fn demo_stagger(demo: &DemoConfig) -> Duration {
    let slots = u64::try_from(demo.count).unwrap_or(u64::MAX).saturating_add(1);
    Duration::from_millis(demo.max_delay_ms / slots / 4)
}

/// Feed items from a producer task, `stagger` apart, while this task consumes
///
/// Items arrive in the given order, so a later item with a shorter delay
/// preempts the consumer's current wait. A failed enqueue stops the consumer
/// and is returned as the error.
pub async fn run_concurrent(
    queue: Arc<TimeQueue<String>>,
    ctx: &Context,
    items: Vec<ScheduleItem>,
    stagger: Duration,
) -> Result<RunReport> {
    debug!(items = items.len(), ?stagger, "run_concurrent: called");
    let start = Instant::now();
    let expected = items.len();

    let consume = ctx.child();
    let producer = {
        let queue = Arc::clone(&queue);
        let ctx = ctx.child();
        let consume = consume.clone();
        tokio::spawn(async move {
            let result = async {
                for item in items {
                    queue
                        .enqueue_with_id(&ctx, item.id(), item.name.clone(), start + item.delay, item.priority)
                        .await?;
                    if !stagger.is_zero() {
                        tokio::time::sleep(stagger).await;
                    }
                }
                Ok::<(), TimeQueueError>(())
            }
            .await;

            if let Err(e) = &result {
                warn!(error = %e, "Producer failed, stopping consumer");
                consume.cancel();
            }
            result
        })
    };

    let mut report = RunReport::default();
    let mut failure = None;
    while report.delivered.len() < expected {
        match queue.dequeue(&consume).await {
            Ok((message, fired_at)) => report.delivered.push(DeliveryReport::new(&message, fired_at, start)),
            Err(e) => {
                failure = Some(e);
                break;
            }
        }
    }

    // Report the producer's error ahead of the cancellation it caused
    producer
        .await
        .map_err(|e| eyre!("Producer task failed: {}", e))?
        .context("Producer failed to enqueue")?;
    if let Some(e) = failure {
        return Err(e).context("Failed to dequeue");
    }

    info!(delivered = report.delivered.len(), "Concurrent schedule complete");
    Ok(report)
}
