//! Fuzz target for the rental lifecycle under storage failures
//!
//! # Strategy
//!
//! - Arbitrary operation sequences over the test catalog
//! - `ChaoticStorage` failure rates from 0% to 90%
//! - A restart over the surviving state at the end
//!
//! # Invariants
//!
//! - The engine NEVER panics, whatever storage does
//! - Storage failures never surface as lifecycle errors
//! - Standard invariants hold after every operation
//! - State that reached storage reconciles into consistent units

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use paddock_engine::{ChaoticStorage, MemoryStorage};
use paddock_harness::{
    InvariantRegistry, Operation, OperationError, SimVenue, VenueSnapshot, test_registry,
};

#[derive(Debug, Arbitrary)]
struct Scenario {
    chaos_seed: u64,
    /// 0-9 maps to 0%-90%
    failure_rate_tenth: u8,
    operations: Vec<Operation>,
}

fuzz_target!(|scenario: Scenario| {
    let failure_rate = f64::from(scenario.failure_rate_tenth % 10) / 10.0;
    let storage = ChaoticStorage::with_seed(MemoryStorage::new(), failure_rate, scenario.chaos_seed);
    let mut venue = SimVenue::with_storage(storage, test_registry());

    let invariants = InvariantRegistry::standard();
    let mut previous = VenueSnapshot::empty();

    for op in scenario.operations.iter().take(256) {
        let result = venue.apply(op);
        assert_ne!(result, Err(OperationError::Storage), "storage failure surfaced: {op:?}");
        let _ = venue.engine.take_storage_faults();

        let snapshot = venue.snapshot().after(&previous);
        invariants.assert_all(&snapshot, &format!("after {op:?}"));
        previous = snapshot;
    }

    let inner = venue.engine.storage().inner().clone();
    let mut restarted = SimVenue::with_storage(inner, test_registry());
    for unit in restarted.engine.list_units() {
        assert!(unit.is_consistent(), "inconsistent unit after restart: {unit:?}");
    }
});
