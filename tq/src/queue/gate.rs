//! Time gate: a single rearmable timer
//!
//! The gate is either disarmed (never fires) or armed for one target instant.
//! At most one firing is pending at a time; rearming replaces a firing that
//! has not been consumed yet, so a stale firing can never be observed after a
//! new target is set.

use std::pin::Pin;

use tokio::time::{Instant, Sleep};
use tracing::debug;

pub struct TimeGate {
    /// Created on first `arm`, so a gate can be built outside a runtime
    sleep: Option<Pin<Box<Sleep>>>,
    target: Option<Instant>,
}

impl Default for TimeGate {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeGate {
    /// Create a disarmed gate
    pub fn new() -> Self {
        Self {
            sleep: None,
            target: None,
        }
    }

    pub fn target(&self) -> Option<Instant> {
        self.target
    }

    pub fn is_armed(&self) -> bool {
        self.target.is_some()
    }

    /// Fire at `at`, discarding any previous target and pending firing
    pub fn arm(&mut self, at: Instant) {
        debug!(?at, had_target = self.target.is_some(), "TimeGate::arm: called");
        match self.sleep.as_mut() {
            Some(sleep) => sleep.as_mut().reset(at),
            None => self.sleep = Some(Box::pin(tokio::time::sleep_until(at))),
        }
        self.target = Some(at);
    }

    /// Arm for `at` unless already armed for the same or an earlier instant
    ///
    /// Returns true if the target changed.
    pub fn arm_earlier(&mut self, at: Instant) -> bool {
        match self.target {
            Some(target) if target <= at => false,
            _ => {
                self.arm(at);
                true
            }
        }
    }

    /// Arm for `at` if given, otherwise disarm
    pub fn sync(&mut self, at: Option<Instant>) {
        match at {
            Some(at) => self.arm(at),
            None => self.disarm(),
        }
    }

    /// Stay silent until the next `arm`
    pub fn disarm(&mut self) {
        self.target = None;
    }

    /// Wait for the armed target, returning the instant the firing was observed
    ///
    /// Pending forever while disarmed. Consuming a firing disarms the gate.
    /// Cancel safe: dropping the future before it completes keeps the target.
    pub async fn fired(&mut self) -> Instant {
        let sleep = match (self.target, self.sleep.as_mut()) {
            (Some(_), Some(sleep)) => sleep,
            _ => return std::future::pending().await,
        };
        sleep.as_mut().await;
        self.target = None;
        Instant::now()
    }
}
