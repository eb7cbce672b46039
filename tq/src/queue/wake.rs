//! Wake notices from producers to the blocked consumer
//!
//! A notice tells the consumer that a message earlier than anything it may be
//! waiting for has been queued. Delivery goes through a depth-1 channel and
//! never blocks the producer. A notice that finds the slot taken is dropped:
//! the pending one already makes the consumer re-read the queue's earliest
//! instant, which covers every enqueue made before that read.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::Instant;
use tracing::debug;

/// "An earlier message has arrived"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WakeNotice {
    /// The queue already held messages before this one arrived
    pub had_previous: bool,

    /// Release instant of the new earliest message
    pub earliest: Instant,
}

/// Create the producer and consumer ends of a wake channel
pub fn channel() -> (WakeSender, mpsc::Receiver<WakeNotice>) {
    let (tx, rx) = mpsc::channel(1);
    (WakeSender { tx }, rx)
}

#[derive(Debug, Clone)]
pub struct WakeSender {
    tx: mpsc::Sender<WakeNotice>,
}

/// How a notice left `WakeSender::deliver`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Placed in the free slot
    Sent,

    /// Slot busy; the notice already waiting there stands in for this one
    Coalesced,

    /// Consumer gone
    Dropped,
}

impl WakeSender {
    /// Best-effort delivery that never waits
    pub fn deliver(&self, notice: WakeNotice) -> Delivery {
        match self.tx.try_send(notice) {
            Ok(()) => Delivery::Sent,
            Err(TrySendError::Full(_)) => {
                debug!(?notice, "WakeSender::deliver: slot busy, coalescing");
                Delivery::Coalesced
            }
            Err(TrySendError::Closed(_)) => {
                debug!(?notice, "WakeSender::deliver: consumer gone, dropping");
                Delivery::Dropped
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn notice(secs: u64) -> WakeNotice {
        WakeNotice {
            had_previous: false,
            earliest: Instant::now() + Duration::from_secs(secs),
        }
    }

    #[tokio::test]
    async fn test_free_slot_sends() {
        let (tx, mut rx) = channel();

        let n = notice(1);
        assert_eq!(tx.deliver(n), Delivery::Sent);
        assert_eq!(rx.recv().await, Some(n));
    }

    #[tokio::test]
    async fn test_busy_slot_coalesces() {
        let (tx, mut rx) = channel();

        let first = notice(5);
        assert_eq!(tx.deliver(first), Delivery::Sent);
        for secs in [3, 1] {
            assert_eq!(tx.deliver(notice(secs)), Delivery::Coalesced);
        }

        assert_eq!(rx.recv().await, Some(first));
        assert!(rx.try_recv().is_err());

        // Slot is free again once the pending notice is taken
        assert_eq!(tx.deliver(notice(2)), Delivery::Sent);
    }

    #[test]
    fn test_many_busy_deliveries_need_no_runtime() {
        let (tx, _rx) = channel();
        let earliest = std::time::Instant::now();
        let n = WakeNotice {
            had_previous: true,
            earliest: earliest.into(),
        };

        assert_eq!(tx.deliver(n), Delivery::Sent);
        for _ in 0..10_000 {
            assert_eq!(tx.deliver(n), Delivery::Coalesced);
        }
    }

    #[tokio::test]
    async fn test_closed_receiver_drops() {
        let (tx, rx) = channel();
        drop(rx);

        assert_eq!(tx.deliver(notice(1)), Delivery::Dropped);
    }
}
