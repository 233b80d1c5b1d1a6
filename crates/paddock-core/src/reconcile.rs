//! Reconciliation of persisted session state with the current catalog.
//!
//! Startup always begins from a fresh, all-available registry. Persisted
//! sessions are overlaid only onto ids that still exist in the catalog:
//!
//! - persisted ids missing from the catalog are dropped
//! - catalog ids missing from persisted state stay available
//! - persisted entries that violate the session field invariants are
//!   rejected and the unit stays available

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    clock::Timestamp,
    registry::Registry,
    unit::{Phase, Session, Unit, UnitId, UnitStatus},
};

/// Flat, serializable session fields of one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedUnit {
    /// Lifecycle state.
    pub status: UnitStatus,
    /// When the rental began.
    #[serde(default)]
    pub rental_started_at: Option<Timestamp>,
    /// End of paid duration.
    #[serde(default)]
    pub paid_until: Option<Timestamp>,
    /// Start of overtime.
    #[serde(default)]
    pub overdue_since: Option<Timestamp>,
    /// Paid duration chosen at rental start.
    #[serde(default)]
    pub intended_duration_minutes: Option<u32>,
    /// Price chosen at rental start.
    #[serde(default)]
    pub intended_price: Option<u32>,
}

impl From<&Unit> for PersistedUnit {
    fn from(unit: &Unit) -> Self {
        Self {
            status: unit.status(),
            rental_started_at: unit.rental_started_at(),
            paid_until: unit.paid_until(),
            overdue_since: unit.overdue_since(),
            intended_duration_minutes: unit.intended_duration_minutes(),
            intended_price: unit.intended_price(),
        }
    }
}

impl PersistedUnit {
    /// Rebuilds the session, `Ok(None)` for an available unit.
    ///
    /// Returns `Err` when the field combination is impossible for the
    /// recorded status.
    fn into_session(self) -> Result<Option<Session>, ()> {
        let phase = match (self.status, self.paid_until, self.overdue_since) {
            (UnitStatus::Available, None, None)
                if self.rental_started_at.is_none()
                    && self.intended_duration_minutes.is_none()
                    && self.intended_price.is_none() =>
            {
                return Ok(None);
            },
            (UnitStatus::Rented, Some(paid_until), None) => Phase::Rented { paid_until },
            (UnitStatus::ExpiredUnconfirmed, Some(paid_until), None) => {
                Phase::ExpiredUnconfirmed { paid_until }
            },
            (UnitStatus::Overdue, None, Some(overdue_since)) => Phase::Overdue { overdue_since },
            _ => return Err(()),
        };

        match (self.rental_started_at, self.intended_duration_minutes, self.intended_price) {
            (Some(started_at), Some(duration_minutes), Some(price)) if duration_minutes > 0 => {
                Ok(Some(Session { started_at, duration_minutes, price, phase }))
            },
            _ => Err(()),
        }
    }
}

/// Outcome of [`reconcile`].
#[derive(Debug, Clone)]
pub struct Reconciled {
    /// Units in catalog order with persisted sessions applied.
    pub units: Vec<Unit>,
    /// Persisted ids no longer present in the catalog.
    pub dropped: Vec<UnitId>,
    /// Catalog ids whose persisted state was inconsistent and was discarded.
    pub rejected: Vec<UnitId>,
}

/// Overlays `persisted` onto the registry's pristine units.
pub fn reconcile(registry: &Registry, persisted: &BTreeMap<UnitId, PersistedUnit>) -> Reconciled {
    let mut units = registry.units().to_vec();
    let mut dropped = Vec::new();
    let mut rejected = Vec::new();

    for (id, state) in persisted {
        let Some(position) = registry.position(id.as_str()) else {
            dropped.push(id.clone());
            continue;
        };

        match state.clone().into_session() {
            Ok(session) => units[position].session = session,
            Err(()) => rejected.push(id.clone()),
        }
    }

    Reconciled { units, dropped, rejected }
}

/// Snapshot of every unit's session fields, keyed by id.
pub fn snapshot<'a>(units: impl IntoIterator<Item = &'a Unit>) -> BTreeMap<UnitId, PersistedUnit> {
    units.into_iter().map(|unit| (unit.id().clone(), PersistedUnit::from(unit))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Catalog, CatalogEntry};

    fn registry() -> Registry {
        Registry::load(&Catalog::new(vec![CatalogEntry {
            category: "Basic Karts".into(),
            idents: vec!["1".into(), "2".into(), "3".into(), "4".into()],
            price30: 20,
            price1h: 30,
        }]))
        .unwrap()
    }

    fn at(ms: u64) -> Timestamp {
        Timestamp::from_millis(ms)
    }

    #[test]
    fn empty_persisted_state_yields_fresh_units() {
        let reconciled = reconcile(&registry(), &BTreeMap::new());

        assert_eq!(reconciled.units.len(), 4);
        assert!(reconciled.units.iter().all(|u| u.status() == UnitStatus::Available));
        assert!(reconciled.dropped.is_empty());
    }

    #[test]
    fn round_trip_preserves_every_state() {
        let registry = registry();
        let mut units = registry.units().to_vec();
        units[1].start(at(0), 30, 20).unwrap();
        units[2].start(at(0), 30, 20).unwrap();
        units[2].expire_if_due(at(1_800_000));
        units[3].start(at(0), 60, 30).unwrap();
        units[3].expire_if_due(at(3_600_000));
        units[3].confirm_return(at(3_700_000), false).unwrap();

        let reconciled = reconcile(&registry, &snapshot(&units));

        for (restored, original) in reconciled.units.iter().zip(&units) {
            assert_eq!(restored.status(), original.status());
            assert_eq!(restored.session(), original.session());
        }
        assert!(reconciled.rejected.is_empty());
    }

    #[test]
    fn unknown_ids_are_dropped() {
        let mut persisted = snapshot(registry().units());
        persisted.insert(
            UnitId::from("retired-kart"),
            PersistedUnit {
                status: UnitStatus::Rented,
                rental_started_at: Some(at(0)),
                paid_until: Some(at(1)),
                overdue_since: None,
                intended_duration_minutes: Some(30),
                intended_price: Some(20),
            },
        );

        let reconciled = reconcile(&registry(), &persisted);

        assert_eq!(reconciled.dropped, vec![UnitId::from("retired-kart")]);
        assert_eq!(reconciled.units.len(), 4);
    }

    #[test]
    fn inconsistent_entries_are_rejected() {
        let mut persisted = BTreeMap::new();
        persisted.insert(
            UnitId::from("basic-karts-1"),
            PersistedUnit {
                status: UnitStatus::Overdue,
                rental_started_at: Some(at(0)),
                paid_until: Some(at(1_800_000)),
                overdue_since: Some(at(1_800_000)),
                intended_duration_minutes: Some(30),
                intended_price: Some(20),
            },
        );

        let reconciled = reconcile(&registry(), &persisted);

        assert_eq!(reconciled.rejected, vec![UnitId::from("basic-karts-1")]);
        assert_eq!(reconciled.units[0].status(), UnitStatus::Available);
    }

    #[test]
    fn json_uses_camel_case_fields() {
        let state = PersistedUnit {
            status: UnitStatus::Rented,
            rental_started_at: Some(at(0)),
            paid_until: Some(at(1_800_000)),
            overdue_since: None,
            intended_duration_minutes: Some(30),
            intended_price: Some(20),
        };

        let json = serde_json::to_value(&state).unwrap();

        assert_eq!(json["status"], "rented");
        assert_eq!(json["paidUntil"], 1_800_000);
        assert!(json["overdueSince"].is_null());
    }
}
