//! Observable venue state for invariant checking.

use paddock_core::{SessionRecord, Timestamp, Unit, UnitId, UnitStatus};
use paddock_engine::{NotificationSink, RentalEngine, Storage};

use crate::SimClock;

/// Session fields of one unit, flattened as the data model describes them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitSnapshot {
    /// Unit id
    pub id: UnitId,
    /// Lifecycle state
    pub status: UnitStatus,
    /// When the rental began
    pub rental_started_at: Option<Timestamp>,
    /// End of paid duration
    pub paid_until: Option<Timestamp>,
    /// Start of overtime
    pub overdue_since: Option<Timestamp>,
    /// Paid duration chosen at start
    pub intended_duration_minutes: Option<u32>,
    /// Price chosen at start
    pub intended_price: Option<u32>,
    /// Transition counter
    pub generation: u64,
}

impl From<&Unit> for UnitSnapshot {
    fn from(unit: &Unit) -> Self {
        Self {
            id: unit.id().clone(),
            status: unit.status(),
            rental_started_at: unit.rental_started_at(),
            paid_until: unit.paid_until(),
            overdue_since: unit.overdue_since(),
            intended_duration_minutes: unit.intended_duration_minutes(),
            intended_price: unit.intended_price(),
            generation: unit.generation(),
        }
    }
}

/// Everything an invariant may look at.
#[derive(Debug, Clone, Default)]
pub struct VenueSnapshot {
    /// Time the snapshot was taken
    pub now: Timestamp,
    /// Units in catalog order
    pub units: Vec<UnitSnapshot>,
    /// Session history in append order
    pub history: Vec<SessionRecord>,
    /// Generations from the previous snapshot, when comparing two points
    pub previous_generations: Vec<(UnitId, u64)>,
}

impl VenueSnapshot {
    /// Empty venue.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Capture `engine`'s units and history.
    ///
    /// Reading units applies the lazy expiry check, exactly as a real
    /// presentation layer would. History that cannot be read is left empty.
    pub fn capture<S: Storage, N: NotificationSink>(
        engine: &mut RentalEngine<SimClock, S, N>,
    ) -> Self {
        use paddock_core::Clock;

        let units = engine.list_units().iter().map(UnitSnapshot::from).collect();
        Self {
            now: engine.clock().now(),
            units,
            history: engine.history().unwrap_or_default(),
            previous_generations: Vec::new(),
        }
    }

    /// Attach `previous`'s generations so monotonicity can be checked.
    #[must_use]
    pub fn after(mut self, previous: &Self) -> Self {
        self.previous_generations =
            previous.units.iter().map(|unit| (unit.id.clone(), unit.generation)).collect();
        self
    }
}
