//! Fixed-length counting window.

use std::time::{Duration, Instant};

/// Counts events since `start`, restarting once the window has been open for
/// at least its length.
#[derive(Debug, Clone, Copy)]
pub struct WindowCounter {
    start: Instant,
    count: u32,
}

impl WindowCounter {
    pub fn new(now: Instant) -> Self {
        Self { start: now, count: 0 }
    }

    /// Roll the window if it has expired, then count one event.
    /// Returns the count including this event.
    pub fn hit(&mut self, now: Instant, length: Duration) -> u32 {
        self.roll(now, length);
        self.count = self.count.saturating_add(1);
        self.count
    }

    /// Restart the window if it has been open for `length` or longer.
    fn roll(&mut self, now: Instant, length: Duration) {
        if self.is_expired(now, length) {
            self.start = now;
            self.count = 0;
        }
    }

    pub fn is_expired(&self, now: Instant, length: Duration) -> bool {
        now.saturating_duration_since(self.start) >= length
    }
}
