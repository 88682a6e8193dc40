use instant::Instant;
use std::time::Duration;

/// Coalesces bursts of repaint requests into one notification.
///
/// The first request arms a deadline `interval` ahead; further requests before it
/// fires are absorbed. Time is passed in explicitly so hosts can drive it from
/// their own event loop.
#[derive(Debug, Clone)]
pub struct RepaintScheduler {
    interval: Duration,
    deadline: Option<Instant>,
}

impl RepaintScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            deadline: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Arm the deadline unless it is already armed
    pub fn request(&mut self, now: Instant) {
        if self.deadline.is_none() {
            self.deadline = Some(now + self.interval);
        }
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Time left until the deadline, if armed
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.deadline.map(|deadline| deadline.saturating_duration_since(now))
    }

    /// Fires at most once per armed deadline
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}
