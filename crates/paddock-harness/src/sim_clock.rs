//! Manually advanced virtual clock.
//!
//! Time only moves when a test says so, which makes expiry and overtime
//! deterministic regardless of how long the test actually takes.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use paddock_core::{Clock, Timestamp};

/// Shared virtual clock. Clones observe the same time.
#[derive(Debug, Clone, Default)]
pub struct SimClock {
    millis: Arc<AtomicU64>,
}

impl SimClock {
    /// Clock starting at the Unix epoch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clock starting at `start`.
    pub fn starting_at(start: Timestamp) -> Self {
        Self { millis: Arc::new(AtomicU64::new(start.as_millis())) }
    }

    /// Move time forward by `duration`.
    pub fn advance(&self, duration: Duration) {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        self.advance_millis(millis);
    }

    /// Move time forward by `millis` milliseconds.
    pub fn advance_millis(&self, millis: u64) {
        self.millis.fetch_add(millis, Ordering::SeqCst);
    }

    /// Jump to `at`.
    ///
    /// # Panics
    ///
    /// Panics if `at` is earlier than the current time; the clock never runs
    /// backwards.
    pub fn set(&self, at: Timestamp) {
        let previous = self.millis.swap(at.as_millis(), Ordering::SeqCst);
        assert!(previous <= at.as_millis(), "SimClock moved backwards: {previous}ms -> {at}");
    }
}

impl Clock for SimClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_millis(self.millis.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_time() {
        let clock = SimClock::new();
        let other = clock.clone();

        clock.advance(Duration::from_secs(90));

        assert_eq!(other.now(), Timestamp::from_millis(90_000));
    }

    #[test]
    #[should_panic(expected = "moved backwards")]
    fn never_runs_backwards() {
        let clock = SimClock::starting_at(Timestamp::from_millis(10));
        clock.set(Timestamp::from_millis(5));
    }
}
