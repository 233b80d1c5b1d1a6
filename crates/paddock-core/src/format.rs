//! Human-readable time and status rendering.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::{clock::Timestamp, unit::Unit, unit::UnitStatus};

/// Remaining time as `MM:SS`, seconds rounded up.
///
/// Minutes are not wrapped into hours, so a fresh hour-long rental renders
/// as `60:00`. Zero renders as `00:00`.
pub fn format_countdown(remaining: Duration) -> String {
    if remaining.is_zero() {
        return "00:00".to_owned();
    }
    let total_secs = remaining.as_millis().div_ceil(1000);
    format!("{:02}:{:02}", total_secs / 60, total_secs % 60)
}

/// Elapsed time as `HH:MM:SS`, seconds rounded to nearest.
pub fn format_stopwatch(elapsed: Duration) -> String {
    let total_secs = (elapsed.as_millis() + 500) / 1000;
    format!("{:02}:{:02}:{:02}", total_secs / 3600, (total_secs % 3600) / 60, total_secs % 60)
}

/// Calendar rendering of a record timestamp (UTC). The epoch renders as
/// `N/A`, matching records whose time was never set.
pub fn format_datetime(timestamp: Timestamp) -> String {
    if timestamp == Timestamp::EPOCH {
        return "N/A".to_owned();
    }
    DateTime::<Utc>::from_timestamp_millis(timestamp.as_millis() as i64)
        .map_or_else(|| "N/A".to_owned(), |dt| dt.format("%Y-%m-%d %H:%M").to_string())
}

/// Short label for a unit's button: price while available, countdown while
/// rented, a confirmation prompt after expiry, overtime while overdue.
pub fn status_label(unit: &Unit, now: Timestamp) -> String {
    match unit.status() {
        UnitStatus::Available => format!("{} lei / 30min", unit.price30()),
        UnitStatus::Rented => {
            let remaining = unit.paid_until().map_or(Duration::ZERO, |end| end.saturating_since(now));
            format!("-{}", format_countdown(remaining))
        },
        UnitStatus::ExpiredUnconfirmed => "CONFIRM?".to_owned(),
        UnitStatus::Overdue => {
            let elapsed =
                unit.overdue_since().map_or(Duration::ZERO, |since| now.saturating_since(since));
            format!("+{}", format_countdown(elapsed))
        },
    }
}
