//! Time abstraction for deterministic testing.
//!
//! Lifecycle logic never reads the system clock directly. Production code
//! plugs in a wall clock, tests plug in a manually advanced virtual clock, and
//! both hand out [`Timestamp`]s.

use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};

/// Milliseconds since the Unix epoch.
///
/// Wall-clock rather than monotonic: timestamps are persisted and must remain
/// meaningful across process restarts.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The Unix epoch.
    pub const EPOCH: Self = Self(0);

    /// Timestamp from milliseconds since the Unix epoch.
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Milliseconds since the Unix epoch.
    pub const fn as_millis(self) -> u64 {
        self.0
    }

    /// This timestamp shifted forward by whole minutes. Saturates at the end
    /// of representable time.
    pub const fn plus_minutes(self, minutes: u32) -> Self {
        Self(self.0.saturating_add(minutes as u64 * 60_000))
    }

    /// This timestamp shifted forward by `duration`. Saturates.
    pub fn plus(self, duration: Duration) -> Self {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        Self(self.0.saturating_add(millis))
    }

    /// Time elapsed from `earlier` to `self`, zero if `earlier` is later.
    pub const fn saturating_since(self, earlier: Self) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }

    /// Milliseconds elapsed from `earlier` to `self`, zero if `earlier` is
    /// later.
    pub const fn millis_since(self, earlier: Self) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// Source of the current time.
///
/// # Invariants
///
/// - `now()` never goes backwards within a single execution context.
pub trait Clock: Clone + Send + Sync + 'static {
    /// Current wall-clock time.
    fn now(&self) -> Timestamp;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plus_minutes_is_exact() {
        assert_eq!(Timestamp::EPOCH.plus_minutes(30), Timestamp::from_millis(1_800_000));
    }

    #[test]
    fn arithmetic_saturates() {
        let late = Timestamp::from_millis(u64::MAX - 5);
        assert_eq!(late.plus_minutes(1).as_millis(), u64::MAX);
        assert_eq!(Timestamp::EPOCH.millis_since(late), 0);
        assert_eq!(Timestamp::EPOCH.saturating_since(late), Duration::ZERO);
    }

    #[test]
    fn serializes_as_plain_integer() {
        let json = serde_json::to_string(&Timestamp::from_millis(42)).unwrap();
        assert_eq!(json, "42");
    }
}
