//! Fixed-interval ticking bounded by an absolute deadline.
//!
//! The poller only produces ticks; what a tick means is up to the caller.

use std::time::Duration;

use tokio::time::{interval_at, sleep_until, Instant, Interval, MissedTickBehavior};

const MIN_INTERVAL: Duration = Duration::from_millis(1);

// Far enough out to never fire, near enough to be representable everywhere.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// `timeout` from now, saturating instead of overflowing.
pub fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout)
        .unwrap_or_else(|| now + FAR_FUTURE)
}

pub struct BuildPoller {
    interval: Interval,
    deadline: Instant,
    ticks: u64,
}

impl BuildPoller {
    /// First tick fires one `period` from now; no tick fires at or after
    /// `deadline`.
    pub fn new(period: Duration, deadline: Instant) -> Self {
        let period = period.max(MIN_INTERVAL);
        let mut interval = interval_at(Instant::now() + period, period);
        // A slow remote call delays the next tick instead of bursting.
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        BuildPoller {
            interval,
            deadline,
            ticks: 0,
        }
    }

    /// Wait for the next tick. Returns its 1-based index, or `None` once the
    /// deadline has passed. The deadline wins when both are due.
    pub async fn tick(&mut self) -> Option<u64> {
        tokio::select! {
            biased;
            _ = sleep_until(self.deadline) => None,
            _ = self.interval.tick() => {
                self.ticks += 1;
                Some(self.ticks)
            }
        }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}
