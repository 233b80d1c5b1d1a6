//! Standard invariant checks.

use std::collections::{HashMap, HashSet};

use paddock_core::UnitStatus;

use super::{Invariant, InvariantResult, VenueSnapshot, Violation};

/// Session fields present exactly as the unit's status allows.
///
/// Available units carry no session fields. Rented and expired units carry
/// `paid_until` but no `overdue_since`; overdue units the reverse.
pub struct SessionFieldsMatchStatus;

impl Invariant for SessionFieldsMatchStatus {
    fn name(&self) -> &'static str {
        "session_fields_match_status"
    }

    fn check(&self, state: &VenueSnapshot) -> InvariantResult {
        for unit in &state.units {
            let session_fields = [
                unit.rental_started_at.is_some(),
                unit.intended_duration_minutes.is_some(),
                unit.intended_price.is_some(),
            ];

            let ok = match unit.status {
                UnitStatus::Available => {
                    session_fields.iter().all(|present| !present)
                        && unit.paid_until.is_none()
                        && unit.overdue_since.is_none()
                },
                UnitStatus::Rented | UnitStatus::ExpiredUnconfirmed => {
                    session_fields.iter().all(|present| *present)
                        && unit.paid_until.is_some()
                        && unit.overdue_since.is_none()
                },
                UnitStatus::Overdue => {
                    session_fields.iter().all(|present| *present)
                        && unit.paid_until.is_none()
                        && unit.overdue_since.is_some()
                },
            };

            if !ok {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("unit {} is {} with fields {unit:?}", unit.id, unit.status),
                });
            }
        }
        Ok(())
    }
}

/// A rented unit only expires once its paid time has lapsed, and overtime
/// never starts before the rental did.
pub struct SessionTimesOrdered;

impl Invariant for SessionTimesOrdered {
    fn name(&self) -> &'static str {
        "session_times_ordered"
    }

    fn check(&self, state: &VenueSnapshot) -> InvariantResult {
        for unit in &state.units {
            let Some(started) = unit.rental_started_at else {
                continue;
            };

            let violation = match (unit.status, unit.paid_until, unit.overdue_since) {
                (_, Some(paid_until), _) if paid_until < started => {
                    Some(format!("paid_until {paid_until} before start {started}"))
                },
                (UnitStatus::Rented, Some(paid_until), _) if state.now >= paid_until => {
                    Some(format!("still rented at {} past paid_until {paid_until}", state.now))
                },
                (_, _, Some(since)) if since < started => {
                    Some(format!("overdue_since {since} before start {started}"))
                },
                _ => None,
            };

            if let Some(message) = violation {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("unit {}: {message}", unit.id),
                });
            }
        }
        Ok(())
    }
}

/// Unit generations never decrease between two snapshots.
pub struct GenerationMonotonicity;

impl Invariant for GenerationMonotonicity {
    fn name(&self) -> &'static str {
        "generation_monotonicity"
    }

    fn check(&self, state: &VenueSnapshot) -> InvariantResult {
        let previous: HashMap<_, _> = state.previous_generations.iter().cloned().collect();

        for unit in &state.units {
            if let Some(&before) = previous.get(&unit.id) {
                if unit.generation < before {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!(
                            "unit {}: generation decreased {before} → {}",
                            unit.id, unit.generation
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Every history record names a catalog unit, bills at least one minute and
/// ends no earlier than it started.
pub struct HistoryWellFormed;

impl Invariant for HistoryWellFormed {
    fn name(&self) -> &'static str {
        "history_well_formed"
    }

    fn check(&self, state: &VenueSnapshot) -> InvariantResult {
        let known: HashSet<_> = state.units.iter().map(|unit| &unit.id).collect();

        for (position, record) in state.history.iter().enumerate() {
            let problem = if !known.contains(&record.unit_id) {
                Some("unknown unit")
            } else if record.duration_minutes == 0 {
                Some("zero billed minutes")
            } else if record.ended_at < record.started_at {
                Some("ends before it starts")
            } else {
                None
            };

            if let Some(problem) = problem {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("record {position} for {}: {problem}", record.unit_id),
                });
            }
        }
        Ok(())
    }
}

/// No two units share an id.
pub struct UniqueUnitIds;

impl Invariant for UniqueUnitIds {
    fn name(&self) -> &'static str {
        "unique_unit_ids"
    }

    fn check(&self, state: &VenueSnapshot) -> InvariantResult {
        let mut seen = HashSet::new();
        for unit in &state.units {
            if !seen.insert(&unit.id) {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("unit id {} appears twice", unit.id),
                });
            }
        }
        Ok(())
    }
}
