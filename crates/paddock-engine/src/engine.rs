//! Rental lifecycle engine.
//!
//! [`RentalEngine`] owns every unit's session state and is the only code that
//! mutates it. Each operation runs to completion: it applies the lazy expiry
//! check, performs one single-unit transition, then writes history (for
//! closing transitions) and the state snapshot, in that order.
//!
//! # Time-driven transitions
//!
//! The periodic [`tick`](RentalEngine::tick) expires rented units whose paid
//! time has lapsed and reports countdown and overtime progress. Callers that
//! schedule per-unit callbacks instead use [`timers`](RentalEngine::timers)
//! and [`fire`](RentalEngine::fire): a [`TimerToken`] captures the unit's
//! generation, and firing it after any later transition is a no-op.
//!
//! # Persistence faults
//!
//! Availability wins over durability. A failed write is logged and queued for
//! [`take_storage_faults`](RentalEngine::take_storage_faults); the in-memory
//! transition stands.

use std::{collections::BTreeMap, time::Duration};

use paddock_core::{
    CategoryUsage, Clock, Registry, RentalPlan, SessionRecord, Timestamp, TransitionError, Unit,
    UnitId, UnitStatus, reconcile, snapshot, usage_by_category,
};
use tracing::{debug, info, warn};

use crate::{
    error::EngineError,
    notifier::{NotificationSink, Notifier},
    state::{DecodedState, decode_state, encode_state},
    storage::{Storage, StorageError},
};

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Snapshot key of the persisted unit state. Bump on schema change.
    pub state_key: String,
    /// Ledger name of the session history.
    pub history_key: String,
    /// Period of the time-driven tick.
    pub tick_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            state_key: "rental_state.v1".to_owned(),
            history_key: "rental_history.v1".to_owned(),
            tick_interval: Duration::from_secs(1),
        }
    }
}

/// Render-state changes reported by [`RentalEngine::tick`] and
/// [`RentalEngine::fire`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// A rented unit's paid time is still running
    Countdown {
        /// Rented unit
        unit_id: UnitId,
        /// Paid time left
        remaining: Duration,
    },

    /// Paid time lapsed; the attendant must confirm whether the kart is back.
    /// Reported once per expiry.
    ReturnDue {
        /// Expired unit
        unit_id: UnitId,
    },

    /// An overdue unit's overtime stopwatch
    Overtime {
        /// Overdue unit
        unit_id: UnitId,
        /// Overtime so far
        elapsed: Duration,
    },
}

/// Which per-unit timer a token belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Countdown of a rented unit
    Countdown,
    /// Overtime stopwatch of an overdue unit
    Stopwatch,
}

/// Identity of a scheduled per-unit timer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TimerToken {
    /// Unit the timer belongs to
    pub unit_id: UnitId,
    /// Unit generation when the timer was armed
    pub generation: u64,
    /// Timer kind
    pub kind: TimerKind,
}

/// The rental lifecycle engine.
pub struct RentalEngine<C: Clock, S: Storage, N: NotificationSink> {
    config: EngineConfig,
    clock: C,
    storage: S,
    notifier: Notifier<N>,
    registry: Registry,
    /// Live units, in catalog order (same positions as `registry`)
    units: Vec<Unit>,
    /// Units expired outside `tick` whose prompt has not been reported yet,
    /// with the generation the expiry produced
    unreported: Vec<(UnitId, u64)>,
    faults: Vec<StorageError>,
}

impl<C: Clock, S: Storage, N: NotificationSink> RentalEngine<C, S, N> {
    /// Open the engine over `registry`, restoring persisted state.
    ///
    /// Persisted sessions are reconciled against the registry. Missing,
    /// mismatched or corrupt state starts every unit as available; a failed
    /// read does the same and is queued as a storage fault. Units restored
    /// awaiting confirmation are prompted for on the first tick without a
    /// second alert.
    pub fn open(config: EngineConfig, clock: C, storage: S, sink: N, registry: Registry) -> Self {
        let mut faults = Vec::new();

        let decoded = match storage.load_snapshot(&config.state_key) {
            Ok(bytes) => decode_state(bytes.as_deref()),
            Err(err) => {
                warn!(error = %err, "Failed to load rental state, starting fresh");
                faults.push(err);
                DecodedState::Missing
            },
        };

        match &decoded {
            DecodedState::Missing => debug!(key = %config.state_key, "No saved rental state"),
            DecodedState::SchemaMismatch { found } => {
                warn!(found, key = %config.state_key, "Saved state has another schema, ignoring")
            },
            DecodedState::Corrupt(reason) => {
                warn!(%reason, key = %config.state_key, "Saved state is corrupt, ignoring")
            },
            DecodedState::Loaded(units) => debug!(units = units.len(), "Loaded rental state"),
        }

        let reconciled = reconcile(&registry, &decoded.into_units());
        for id in &reconciled.dropped {
            warn!(unit_id = %id, "Dropping saved state for unit no longer in the catalog");
        }
        for id in &reconciled.rejected {
            warn!(unit_id = %id, "Discarding inconsistent saved state");
        }

        // Restored prompts were alerted before the restart; only the tick
        // prompt is raised again.
        let unreported: Vec<_> = reconciled
            .units
            .iter()
            .filter(|unit| unit.status() == UnitStatus::ExpiredUnconfirmed)
            .map(|unit| (unit.id().clone(), unit.generation()))
            .collect();

        info!(
            units = reconciled.units.len(),
            awaiting_confirmation = unreported.len(),
            "Rental engine ready"
        );

        Self {
            config,
            clock,
            storage,
            notifier: Notifier::new(sink),
            registry,
            units: reconciled.units,
            unreported,
            faults,
        }
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Injected clock.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Storage backend.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Notifier and its permission state.
    pub fn notifier(&self) -> &Notifier<N> {
        &self.notifier
    }

    /// All units in catalog order, with lapsed rentals expired first.
    pub fn list_units(&mut self) -> Vec<Unit> {
        self.refresh();
        self.units.clone()
    }

    /// Units grouped by category, categories sorted by name.
    pub fn units_by_category(&mut self) -> Vec<(String, Vec<Unit>)> {
        self.refresh();

        let mut groups: BTreeMap<&str, Vec<Unit>> = BTreeMap::new();
        for unit in &self.units {
            groups.entry(unit.category()).or_default().push(unit.clone());
        }
        groups.into_iter().map(|(category, units)| (category.to_owned(), units)).collect()
    }

    /// Current state of one unit, expiring it first if its paid time lapsed.
    ///
    /// # Errors
    ///
    /// `UnitNotFound` for an unknown id.
    pub fn get_unit(&mut self, id: &str) -> Result<Unit, EngineError> {
        let index = self.index_of(id)?;
        if self.expire_due(index, self.clock.now()) {
            self.persist();
        }
        Ok(self.units[index].clone())
    }

    /// `available → rented` for `duration_minutes` at `price`.
    ///
    /// Asks for notification permission the first time a rental starts.
    ///
    /// # Errors
    ///
    /// `UnitNotFound`, `InvalidTransition` unless available,
    /// `InvalidDuration` for zero minutes.
    pub fn start_rental(
        &mut self,
        id: &str,
        duration_minutes: u32,
        price: u32,
    ) -> Result<Unit, EngineError> {
        let (index, ()) =
            self.apply(id, |unit, now| unit.start(now, duration_minutes, price))?;

        self.notifier.prepare();
        debug!(unit_id = %id, duration_minutes, price, "Rental started");
        self.persist();
        Ok(self.units[index].clone())
    }

    /// Start a rental on one of the unit's priced plans.
    ///
    /// # Errors
    ///
    /// As [`start_rental`](Self::start_rental).
    pub fn start_plan(&mut self, id: &str, plan: RentalPlan) -> Result<Unit, EngineError> {
        let price = self.units[self.index_of(id)?].plan_price(plan);
        self.start_rental(id, plan.minutes(), price)
    }

    /// Answer the return prompt of an expired unit.
    ///
    /// `returned == true` closes the session billed for the paid duration.
    /// `false` starts overtime from the moment payment lapsed.
    ///
    /// # Errors
    ///
    /// `UnitNotFound`, `InvalidTransition` unless expired and unconfirmed.
    pub fn confirm_return(&mut self, id: &str, returned: bool) -> Result<Unit, EngineError> {
        let (index, record) = self.apply(id, |unit, now| unit.confirm_return(now, returned))?;

        match record {
            Some(record) => self.close(record),
            None => {
                debug!(unit_id = %id, "Return declined, overtime started");
                self.persist();
            },
        }
        Ok(self.units[index].clone())
    }

    /// `rented → available` before the paid time lapses.
    ///
    /// # Errors
    ///
    /// `UnitNotFound`, `InvalidTransition` unless rented.
    pub fn early_return(&mut self, id: &str) -> Result<Unit, EngineError> {
        let (index, record) = self.apply(id, Unit::early_return)?;
        self.close(record);
        Ok(self.units[index].clone())
    }

    /// `overdue → available`, closing the session with its overtime.
    ///
    /// # Errors
    ///
    /// `UnitNotFound`, `InvalidTransition` unless overdue.
    pub fn stop_overtime(&mut self, id: &str) -> Result<Unit, EngineError> {
        let (index, record) = self.apply(id, Unit::stop_overtime)?;
        self.close(record);
        Ok(self.units[index].clone())
    }

    /// Discard any session without writing history.
    ///
    /// # Errors
    ///
    /// `UnitNotFound` for an unknown id.
    pub fn force_reset(&mut self, id: &str) -> Result<Unit, EngineError> {
        let index = self.index_of(id)?;
        let previous = self.units[index].status();

        self.units[index].force_reset();
        warn!(unit_id = %id, %previous, "Unit force reset, session discarded");
        self.persist();
        Ok(self.units[index].clone())
    }

    /// The record a return at this moment would write, without changing any
    /// state. `None` while the unit is available.
    ///
    /// # Errors
    ///
    /// `UnitNotFound` for an unknown id.
    pub fn close_summary(&self, id: &str) -> Result<Option<SessionRecord>, EngineError> {
        let index = self.index_of(id)?;
        Ok(self.units[index].close_summary(self.clock.now()))
    }

    /// Every history record in append order.
    ///
    /// # Errors
    ///
    /// `Persistence` if the ledger cannot be read.
    pub fn history(&self) -> Result<Vec<SessionRecord>, EngineError> {
        let count = self.storage.record_count(&self.config.history_key)?;
        let limit = usize::try_from(count).unwrap_or(usize::MAX);
        Ok(self.storage.load_records(&self.config.history_key, 0, limit)?)
    }

    /// The last `limit` history records, newest first.
    ///
    /// # Errors
    ///
    /// `Persistence` if the ledger cannot be read.
    pub fn recent_history(&self, limit: usize) -> Result<Vec<SessionRecord>, EngineError> {
        let count = self.storage.record_count(&self.config.history_key)?;
        let from = count.saturating_sub(limit as u64);

        let mut records = self.storage.load_records(&self.config.history_key, from, limit)?;
        records.reverse();
        Ok(records)
    }

    /// Delete every history record.
    ///
    /// # Errors
    ///
    /// `Persistence` if the ledger cannot be cleared.
    pub fn clear_history(&mut self) -> Result<(), EngineError> {
        self.storage.clear_records(&self.config.history_key)?;
        info!("Rental history cleared");
        Ok(())
    }

    /// Sessions per category that ended within the last `days` days.
    ///
    /// # Errors
    ///
    /// `Persistence` if the ledger cannot be read.
    pub fn usage_report(&self, days: u32) -> Result<Vec<CategoryUsage>, EngineError> {
        Ok(usage_by_category(&self.history()?, self.clock.now(), days))
    }

    /// Units waiting for the attendant to confirm return.
    pub fn pending_confirmations(&mut self) -> Vec<UnitId> {
        self.refresh();
        self.units
            .iter()
            .filter(|unit| unit.status() == UnitStatus::ExpiredUnconfirmed)
            .map(|unit| unit.id().clone())
            .collect()
    }

    /// Drain persistence failures since the last call.
    pub fn take_storage_faults(&mut self) -> Vec<StorageError> {
        std::mem::take(&mut self.faults)
    }

    /// Time-driven step: expire lapsed rentals and report progress.
    ///
    /// Each expiry notifies once and yields one `ReturnDue`. Expiries that
    /// happened lazily since the last tick are reported here too, unless the
    /// unit has moved on since.
    pub fn tick(&mut self) -> Vec<EngineEvent> {
        let now = self.clock.now();
        let mut events = Vec::new();

        for (unit_id, generation) in std::mem::take(&mut self.unreported) {
            let current = self.registry.position(unit_id.as_str()).map(|i| &self.units[i]);
            if current.is_some_and(|unit| unit.generation() == generation) {
                events.push(EngineEvent::ReturnDue { unit_id });
            }
        }

        let mut changed = false;
        for index in 0..self.units.len() {
            if self.units[index].expire_if_due(now) {
                self.on_expired(index);
                changed = true;
                events.push(EngineEvent::ReturnDue { unit_id: self.units[index].id().clone() });
                continue;
            }

            if let Some(event) = progress(&self.units[index], now) {
                events.push(event);
            }
        }

        if changed {
            self.persist();
        }
        events
    }

    /// One token per running per-unit timer.
    pub fn timers(&self) -> Vec<TimerToken> {
        self.units
            .iter()
            .filter_map(|unit| {
                let kind = match unit.status() {
                    UnitStatus::Rented => TimerKind::Countdown,
                    UnitStatus::Overdue => TimerKind::Stopwatch,
                    UnitStatus::Available | UnitStatus::ExpiredUnconfirmed => return None,
                };
                Some(TimerToken { unit_id: unit.id().clone(), generation: unit.generation(), kind })
            })
            .collect()
    }

    /// Run one timer callback.
    ///
    /// Returns `None` when the token is stale: the unit transitioned since
    /// the token was armed, or the token's kind does not fit its state.
    pub fn fire(&mut self, token: &TimerToken) -> Option<EngineEvent> {
        let index = self.registry.position(token.unit_id.as_str())?;
        if self.units[index].generation() != token.generation {
            debug!(unit_id = %token.unit_id, "Ignoring stale timer");
            return None;
        }

        let now = self.clock.now();
        match (token.kind, self.units[index].status()) {
            (TimerKind::Countdown, UnitStatus::Rented) => {
                if self.units[index].expire_if_due(now) {
                    self.on_expired(index);
                    self.persist();
                    return Some(EngineEvent::ReturnDue { unit_id: token.unit_id.clone() });
                }
                progress(&self.units[index], now)
            },
            (TimerKind::Stopwatch, UnitStatus::Overdue) => progress(&self.units[index], now),
            _ => None,
        }
    }

    fn index_of(&self, id: &str) -> Result<usize, EngineError> {
        self.registry.position(id).ok_or_else(|| EngineError::UnitNotFound(UnitId::from(id)))
    }

    /// Lazy expiry plus one transition on the unit `id`.
    ///
    /// A rejected transition leaves the unit as the expiry check left it,
    /// and that expiry is still persisted.
    fn apply<T>(
        &mut self,
        id: &str,
        transition: impl FnOnce(&mut Unit, Timestamp) -> Result<T, TransitionError>,
    ) -> Result<(usize, T), EngineError> {
        let index = self.index_of(id)?;
        let now = self.clock.now();
        let expired = self.expire_due(index, now);

        match transition(&mut self.units[index], now) {
            Ok(value) => Ok((index, value)),
            Err(err) => {
                if expired {
                    self.persist();
                }
                debug!(unit_id = %id, error = %err, "Transition rejected");
                Err(err.into())
            },
        }
    }

    /// Expire every lapsed rental outside of a tick.
    fn refresh(&mut self) {
        let now = self.clock.now();
        let mut changed = false;
        for index in 0..self.units.len() {
            changed |= self.expire_due(index, now);
        }
        if changed {
            self.persist();
        }
    }

    /// Lazy expiry of one unit. The prompt is reported on the next tick.
    fn expire_due(&mut self, index: usize, now: Timestamp) -> bool {
        if !self.units[index].expire_if_due(now) {
            return false;
        }

        self.on_expired(index);
        let unit = &self.units[index];
        self.unreported.push((unit.id().clone(), unit.generation()));
        true
    }

    fn on_expired(&mut self, index: usize) {
        let unit = &self.units[index];
        info!(unit_id = %unit.id(), "Paid time lapsed, awaiting return confirmation");
        self.notifier.notify(unit);
    }

    /// Append `record` to history, then save state.
    fn close(&mut self, record: SessionRecord) {
        info!(
            unit_id = %record.unit_id,
            minutes = record.duration_minutes,
            price = record.price_paid,
            "Session closed"
        );

        if let Err(err) = self.storage.append_record(&self.config.history_key, &record) {
            warn!(unit_id = %record.unit_id, error = %err, "Failed to append history record");
            self.faults.push(err);
        }
        self.persist();
    }

    /// Save the snapshot of every unit. Failures are queued, not returned.
    fn persist(&mut self) {
        let result = encode_state(snapshot(&self.units))
            .and_then(|bytes| self.storage.store_snapshot(&self.config.state_key, &bytes));

        if let Err(err) = result {
            warn!(error = %err, "Failed to save rental state");
            self.faults.push(err);
        }
    }
}

/// Countdown or overtime progress of a running unit.
fn progress(unit: &Unit, now: Timestamp) -> Option<EngineEvent> {
    match unit.status() {
        UnitStatus::Rented => Some(EngineEvent::Countdown {
            unit_id: unit.id().clone(),
            remaining: unit.paid_until().map_or(Duration::ZERO, |end| end.saturating_since(now)),
        }),
        UnitStatus::Overdue => Some(EngineEvent::Overtime {
            unit_id: unit.id().clone(),
            elapsed: unit
                .overdue_since()
                .map_or(Duration::ZERO, |since| now.saturating_since(since)),
        }),
        UnitStatus::Available | UnitStatus::ExpiredUnconfirmed => None,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    };

    use paddock_core::{Catalog, CatalogEntry};

    use super::*;
    use crate::{notifier::NullSink, storage::MemoryStorage};

    #[derive(Clone, Default)]
    struct TestClock(Arc<AtomicU64>);

    impl TestClock {
        fn set(&self, ms: u64) {
            self.0.store(ms, Ordering::SeqCst);
        }
    }

    impl Clock for TestClock {
        fn now(&self) -> Timestamp {
            Timestamp::from_millis(self.0.load(Ordering::SeqCst))
        }
    }

    fn engine() -> (RentalEngine<TestClock, MemoryStorage, NullSink>, TestClock) {
        let registry = Registry::load(&Catalog::new(vec![CatalogEntry {
            category: "Basic Karts".into(),
            idents: vec!["1".into(), "2".into()],
            price30: 20,
            price1h: 30,
        }]))
        .unwrap();
        let clock = TestClock::default();
        let engine = RentalEngine::open(
            EngineConfig::default(),
            clock.clone(),
            MemoryStorage::new(),
            NullSink,
            registry,
        );
        (engine, clock)
    }

    #[test]
    fn rejected_transition_persists_nothing() {
        let (mut engine, _) = engine();

        let err = engine.stop_overtime("basic-karts-1").unwrap_err();

        assert!(matches!(err, EngineError::InvalidTransition { .. }));
        assert_eq!(engine.storage().snapshot_count(), 0);
    }

    #[test]
    fn lazy_expiry_persists_even_when_transition_rejected() {
        let (mut engine, clock) = engine();
        engine.start_rental("basic-karts-1", 30, 20).unwrap();

        clock.set(1_800_000);
        let err = engine.early_return("basic-karts-1").unwrap_err();

        assert!(matches!(
            err,
            EngineError::InvalidTransition { status: UnitStatus::ExpiredUnconfirmed, .. }
        ));
        let bytes = engine.storage().load_snapshot("rental_state.v1").unwrap().unwrap();
        let units = decode_state(Some(&bytes)).into_units();
        assert_eq!(units[&UnitId::from("basic-karts-1")].status, UnitStatus::ExpiredUnconfirmed);
    }

    #[test]
    fn tick_reports_progress() {
        let (mut engine, clock) = engine();
        engine.start_rental("basic-karts-1", 30, 20).unwrap();

        clock.set(60_000);
        let events = engine.tick();

        assert_eq!(events, vec![EngineEvent::Countdown {
            unit_id: UnitId::from("basic-karts-1"),
            remaining: Duration::from_secs(29 * 60),
        }]);
    }

    #[test]
    fn timers_track_running_units() {
        let (mut engine, _) = engine();
        assert!(engine.timers().is_empty());

        engine.start_rental("basic-karts-2", 60, 30).unwrap();

        let timers = engine.timers();
        assert_eq!(timers.len(), 1);
        assert_eq!(timers[0].kind, TimerKind::Countdown);
        assert_eq!(timers[0].unit_id.as_str(), "basic-karts-2");
    }

    #[test]
    fn start_plan_uses_category_prices() {
        let (mut engine, _) = engine();

        let unit = engine.start_plan("basic-karts-1", RentalPlan::Hour).unwrap();

        assert_eq!(unit.intended_duration_minutes(), Some(60));
        assert_eq!(unit.intended_price(), Some(30));
    }
}
