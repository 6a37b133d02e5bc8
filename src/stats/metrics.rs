//! Message counters for the upstream connection

use std::time::{Duration, Instant};

/// Cumulative count of upstream messages plus a lossy periodic reporter
///
/// The reporter fires when at least `interval` has passed since the last
/// report and the count has moved since then. It is a diagnostic aid, not a
/// rate meter: a message arriving just before a quiet period may go
/// unreported until traffic resumes.
#[derive(Debug, Clone)]
pub struct MessageCounters {
    /// Messages received from upstream, across all connections
    pub received: u64,
    /// Count at the last report
    pub last_reported: u64,
    /// Time of the last report (or construction)
    pub last_reported_at: Instant,
    interval: Duration,
}

impl MessageCounters {
    /// Create counters that report at most once per `interval`
    pub fn new(interval: Duration) -> Self {
        Self::starting_at(interval, Instant::now())
    }

    /// Create counters whose reporting window starts at `now`
    pub fn starting_at(interval: Duration, now: Instant) -> Self {
        Self {
            received: 0,
            last_reported: 0,
            last_reported_at: now,
            interval,
        }
    }

    /// Count one message received at `now`
    ///
    /// Returns the cumulative count when a report is due.
    pub fn record(&mut self, now: Instant) -> Option<u64> {
        self.received += 1;

        let elapsed = now.saturating_duration_since(self.last_reported_at);
        if elapsed >= self.interval && self.received != self.last_reported {
            self.last_reported = self.received;
            self.last_reported_at = now;
            Some(self.received)
        } else {
            None
        }
    }
}
