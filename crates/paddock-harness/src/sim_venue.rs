//! A complete engine on virtual time, for scenario tests.

use std::time::Duration;

use paddock_core::{Catalog, CatalogEntry, Registry, UnitId};
use paddock_engine::{EngineConfig, EngineError, MemoryStorage, RentalEngine, Storage};

use crate::{Operation, OperationError, OperationResult, RecordingSink, SimClock, VenueSnapshot};

/// Id no catalog contains.
pub const UNKNOWN_UNIT: &str = "no-such-kart";

/// Engine wired to the simulation clock and a recording sink.
pub type SimEngine<S = MemoryStorage> = RentalEngine<SimClock, S, RecordingSink>;

/// Small catalog used across tests: three basic karts at 20/30 lei and two
/// four-seaters at 50/70 lei.
pub fn test_catalog() -> Catalog {
    Catalog::new(vec![
        CatalogEntry {
            category: "Basic Karts".into(),
            idents: vec!["1".into(), "2".into(), "3".into()],
            price30: 20,
            price1h: 30,
        },
        CatalogEntry {
            category: "Grand Tour".into(),
            idents: vec!["Blue ×2".into()],
            price30: 50,
            price1h: 70,
        },
    ])
}

/// Registry of [`test_catalog`].
///
/// # Panics
///
/// Never in practice; the test catalog has no duplicate ids.
#[allow(clippy::expect_used)]
pub fn test_registry() -> Registry {
    Registry::load(&test_catalog()).expect("test catalog is valid")
}

/// Engine, clock and sink of one simulated venue.
pub struct SimVenue<S: Storage = MemoryStorage> {
    /// The engine under test
    pub engine: SimEngine<S>,
    /// Shared virtual clock
    pub clock: SimClock,
    /// Shared alert recording
    pub sink: RecordingSink,
    /// Unit ids in catalog order, for resolving operation selectors
    ids: Vec<UnitId>,
}

impl SimVenue<MemoryStorage> {
    /// Test catalog on fresh in-memory storage, time zero.
    pub fn new() -> Self {
        Self::with_storage(MemoryStorage::new(), test_registry())
    }
}

impl Default for SimVenue<MemoryStorage> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Storage> SimVenue<S> {
    /// Venue over `storage` and `registry`, time zero.
    pub fn with_storage(storage: S, registry: Registry) -> Self {
        Self::open(storage, registry, SimClock::new(), RecordingSink::new())
    }

    /// Venue from explicit parts.
    pub fn open(storage: S, registry: Registry, clock: SimClock, sink: RecordingSink) -> Self {
        let ids = registry.units().iter().map(|unit| unit.id().clone()).collect();
        let engine = RentalEngine::open(
            EngineConfig::default(),
            clock.clone(),
            storage,
            sink.clone(),
            registry,
        );
        Self { engine, clock, sink, ids }
    }

    /// Simulate a process restart: a new engine over the same storage, clock
    /// and alert recording.
    pub fn restart(self, registry: Registry) -> Self {
        let storage = self.engine.storage().clone();
        Self::open(storage, registry, self.clock, self.sink)
    }

    /// Id targeted by an operation selector, wrapped modulo the unit count.
    pub fn resolve(&self, selector: u8) -> &str {
        match self.ids.len() {
            0 => UNKNOWN_UNIT,
            len => self.ids[usize::from(selector) % len].as_str(),
        }
    }

    /// Apply one model operation to the engine.
    pub fn apply(&mut self, op: &Operation) -> OperationResult {
        let result = match *op {
            Operation::Advance { seconds } => {
                self.clock.advance(Duration::from_secs(u64::from(seconds)));
                return Ok(());
            },
            Operation::Tick => {
                self.engine.tick();
                return Ok(());
            },
            Operation::Unknown => self.engine.start_rental(UNKNOWN_UNIT, 30, 20),
            Operation::Get { unit } => {
                let id = self.resolve(unit).to_owned();
                self.engine.get_unit(&id)
            },
            Operation::Start { unit, minutes, price } => {
                let id = self.resolve(unit).to_owned();
                self.engine.start_rental(&id, u32::from(minutes), u32::from(price))
            },
            Operation::Confirm { unit, returned } => {
                let id = self.resolve(unit).to_owned();
                self.engine.confirm_return(&id, returned)
            },
            Operation::EarlyReturn { unit } => {
                let id = self.resolve(unit).to_owned();
                self.engine.early_return(&id)
            },
            Operation::StopOvertime { unit } => {
                let id = self.resolve(unit).to_owned();
                self.engine.stop_overtime(&id)
            },
            Operation::ForceReset { unit } => {
                let id = self.resolve(unit).to_owned();
                self.engine.force_reset(&id)
            },
        };

        result.map(drop).map_err(|err| match err {
            EngineError::UnitNotFound(_) => OperationError::NotFound,
            EngineError::InvalidTransition { .. } => OperationError::InvalidTransition,
            EngineError::InvalidDuration { .. } => OperationError::InvalidDuration,
            EngineError::Persistence(_) => OperationError::Storage,
        })
    }

    /// Observable state right now.
    pub fn snapshot(&mut self) -> VenueSnapshot {
        VenueSnapshot::capture(&mut self.engine)
    }
}
