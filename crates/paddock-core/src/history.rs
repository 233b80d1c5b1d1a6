//! Completed-session records and usage reporting.

use std::collections::BTreeMap;

use chrono::{DateTime, Days, Utc};
use serde::{Deserialize, Serialize};

use crate::{clock::Timestamp, unit::UnitId};

/// Immutable history entry for one closed rental session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Unit that was rented.
    pub unit_id: UnitId,
    /// Unit display name at the time of the rental.
    pub display_name: String,
    /// Unit category at the time of the rental.
    pub category: String,
    /// Session start.
    pub started_at: Timestamp,
    /// Session end, set when the record is written.
    pub ended_at: Timestamp,
    /// Billed duration in whole minutes.
    pub duration_minutes: u32,
    /// Price paid, fixed at rental start.
    pub price_paid: u32,
}

/// Session count for one category within a reporting window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryUsage {
    /// Catalog category.
    pub category: String,
    /// Number of sessions that ended inside the window.
    pub sessions: usize,
}

/// Start of the reporting window: UTC midnight `days` days before `now`.
fn window_start(now: Timestamp, days: u32) -> Timestamp {
    let Some(now) = DateTime::<Utc>::from_timestamp_millis(now.as_millis() as i64) else {
        return Timestamp::EPOCH;
    };

    now.date_naive()
        .checked_sub_days(Days::new(u64::from(days)))
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .and_then(|midnight| u64::try_from(midnight.and_utc().timestamp_millis()).ok())
        .map_or(Timestamp::EPOCH, Timestamp::from_millis)
}

/// Counts sessions per category that ended within the last `days` days.
///
/// The window opens at UTC midnight `days` days before `now`, so a 7 day
/// report always covers whole days. Sorted by session count descending, then
/// category name.
pub fn usage_by_category(records: &[SessionRecord], now: Timestamp, days: u32) -> Vec<CategoryUsage> {
    let cutoff = window_start(now, days);

    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for record in records.iter().filter(|r| r.ended_at >= cutoff) {
        *counts.entry(record.category.as_str()).or_default() += 1;
    }

    let mut usage: Vec<_> = counts
        .into_iter()
        .map(|(category, sessions)| CategoryUsage { category: category.to_owned(), sessions })
        .collect();
    usage.sort_by(|a, b| b.sessions.cmp(&a.sessions).then_with(|| a.category.cmp(&b.category)));
    usage
}
