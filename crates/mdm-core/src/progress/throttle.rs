//! Rate-limited notification, separate from the value it guards.

use std::time::{Duration, Instant};

/// Holds a value that is always current, and decides when a change may be
/// pushed to observers: at most once per `interval`.
#[derive(Debug, Clone)]
pub struct RateLimitedNotify<T> {
    value: T,
    interval: Duration,
    last_notified: Option<Instant>,
}

impl<T> RateLimitedNotify<T> {
    pub fn new(value: T, interval: Duration) -> Self {
        Self {
            value,
            interval,
            last_notified: None,
        }
    }

    /// Store `value`. Returns it when a notification is due, else None.
    /// The stored value is updated either way.
    pub fn set(&mut self, value: T, now: Instant) -> Option<&T> {
        self.value = value;
        let due = match self.last_notified {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        };
        if due {
            self.last_notified = Some(now);
            Some(&self.value)
        } else {
            None
        }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn last_notified(&self) -> Option<Instant> {
        self.last_notified
    }
}
