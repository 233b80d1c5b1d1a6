//! Production clock reading wall-clock time.
//!
//! Rental deadlines are persisted as absolute timestamps and must stay
//! meaningful across restarts, so this reads `SystemTime` rather than a
//! monotonic `Instant`.

use std::time::{SystemTime, UNIX_EPOCH};

use paddock_core::{Clock, Timestamp};

/// Wall-clock time in milliseconds since the Unix epoch.
///
/// A system clock set before 1970 reads as the epoch.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    /// Create a new system clock.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    #[allow(clippy::disallowed_methods)]
    fn now(&self) -> Timestamp {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX));
        Timestamp::from_millis(millis)
    }
}
