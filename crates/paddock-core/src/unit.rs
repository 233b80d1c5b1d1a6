//! Rentable units and their session state.
//!
//! A [`Unit`] pairs immutable catalog attributes (set once by the
//! [`Registry`](crate::Registry)) with an optional [`Session`]. The session
//! carries exactly the timestamps its [`Phase`] allows, so the field
//! invariants of the data model hold by construction:
//!
//! - `available` has no session, hence no timestamps or intended plan
//! - `rented` and `expired_unconfirmed` carry `paid_until` only
//! - `overdue` carries `overdue_since` only

use std::{borrow::Borrow, fmt};

use serde::{Deserialize, Serialize};

use crate::clock::Timestamp;

/// Stable unit identifier derived from catalog data.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(String);

impl UnitId {
    /// Identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UnitId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for UnitId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Borrow<str> for UnitId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Externally visible lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    /// Free to rent.
    Available,
    /// Paid time is running.
    Rented,
    /// Paid time has lapsed; waiting for the attendant to confirm return.
    ExpiredUnconfirmed,
    /// Not returned after paid time; overtime stopwatch running.
    Overdue,
}

impl UnitStatus {
    /// Wire name, identical to the serialized form.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Rented => "rented",
            Self::ExpiredUnconfirmed => "expired_unconfirmed",
            Self::Overdue => "overdue",
        }
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Priced rental plans offered for every unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RentalPlan {
    /// 30 minutes at the category's half-hour price.
    HalfHour,
    /// 60 minutes at the category's hourly price.
    Hour,
}

impl RentalPlan {
    /// Paid duration of the plan.
    pub const fn minutes(self) -> u32 {
        match self {
            Self::HalfHour => 30,
            Self::Hour => 60,
        }
    }
}

/// Timing state of an open session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Counting down to `paid_until`.
    Rented {
        /// End of the paid duration.
        paid_until: Timestamp,
    },
    /// `paid_until` has passed; return not yet confirmed.
    ExpiredUnconfirmed {
        /// End of the paid duration.
        paid_until: Timestamp,
    },
    /// Overtime stopwatch running since `overdue_since`.
    Overdue {
        /// When payment lapsed.
        overdue_since: Timestamp,
    },
}

/// One open rental occupancy of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    pub(crate) started_at: Timestamp,
    pub(crate) duration_minutes: u32,
    pub(crate) price: u32,
    pub(crate) phase: Phase,
}

impl Session {
    /// When the rental began.
    pub fn started_at(&self) -> Timestamp {
        self.started_at
    }

    /// Paid duration chosen at rental start.
    pub fn duration_minutes(&self) -> u32 {
        self.duration_minutes
    }

    /// Price chosen at rental start.
    pub fn price(&self) -> u32 {
        self.price
    }

    /// Current timing phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }
}

/// A rentable kart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    id: UnitId,
    display_name: String,
    category: String,
    price30: u32,
    price1h: u32,
    pub(crate) session: Option<Session>,
    /// Bumped on every transition; stale timer tokens compare against it.
    pub(crate) generation: u64,
}

impl Unit {
    pub(crate) fn new(
        id: UnitId,
        display_name: String,
        category: String,
        price30: u32,
        price1h: u32,
    ) -> Self {
        Self { id, display_name, category, price30, price1h, session: None, generation: 0 }
    }

    /// Stable identifier.
    pub fn id(&self) -> &UnitId {
        &self.id
    }

    /// Human-facing name, e.g. `"Verde 2"`.
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Catalog category.
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Price of a 30 minute rental.
    pub fn price30(&self) -> u32 {
        self.price30
    }

    /// Price of a one hour rental.
    pub fn price1h(&self) -> u32 {
        self.price1h
    }

    /// Price of the given plan for this unit.
    pub fn plan_price(&self, plan: RentalPlan) -> u32 {
        match plan {
            RentalPlan::HalfHour => self.price30,
            RentalPlan::Hour => self.price1h,
        }
    }

    /// Open session, `None` while available.
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Current lifecycle state.
    pub fn status(&self) -> UnitStatus {
        match self.session.map(|s| s.phase) {
            None => UnitStatus::Available,
            Some(Phase::Rented { .. }) => UnitStatus::Rented,
            Some(Phase::ExpiredUnconfirmed { .. }) => UnitStatus::ExpiredUnconfirmed,
            Some(Phase::Overdue { .. }) => UnitStatus::Overdue,
        }
    }

    /// When the current rental began.
    pub fn rental_started_at(&self) -> Option<Timestamp> {
        self.session.map(|s| s.started_at)
    }

    /// End of paid duration; present while rented or awaiting confirmation.
    pub fn paid_until(&self) -> Option<Timestamp> {
        match self.session?.phase {
            Phase::Rented { paid_until } | Phase::ExpiredUnconfirmed { paid_until } => {
                Some(paid_until)
            },
            Phase::Overdue { .. } => None,
        }
    }

    /// Start of the overtime stopwatch; present only while overdue.
    pub fn overdue_since(&self) -> Option<Timestamp> {
        match self.session?.phase {
            Phase::Overdue { overdue_since } => Some(overdue_since),
            _ => None,
        }
    }

    /// Paid duration chosen at rental start.
    pub fn intended_duration_minutes(&self) -> Option<u32> {
        self.session.map(|s| s.duration_minutes)
    }

    /// Price chosen at rental start.
    pub fn intended_price(&self) -> Option<u32> {
        self.session.map(|s| s.price)
    }

    /// Transition counter.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}
