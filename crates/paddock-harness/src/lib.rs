//! Deterministic test harness for the rental engine.
//!
//! Virtual time, a recording notification sink and ready-made venues make
//! lifecycle scenarios reproducible without sleeping.
//!
//! # Model-Based Testing
//!
//! The `model` module is a reference implementation of the lifecycle rules.
//! Operations are applied to both the model and the real engine, and their
//! observable states are compared.
//!
//! # Invariant Testing
//!
//! The `invariants` module checks properties that must hold after any
//! operation sequence. Use [`InvariantRegistry::standard()`] for the full set.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod invariants;
pub mod model;
mod recording_sink;
mod sim_clock;
mod sim_venue;

pub use invariants::{
    GenerationMonotonicity, HistoryWellFormed, Invariant, InvariantRegistry, InvariantResult,
    SessionFieldsMatchStatus, SessionTimesOrdered, UniqueUnitIds, UnitSnapshot, VenueSnapshot,
    Violation,
};
pub use model::{
    ModelRecord, ModelStatus, ModelUnit, ModelVenue, ObservableState, Operation, OperationError,
    OperationResult, UnitIndex,
};
pub use recording_sink::RecordingSink;
pub use sim_clock::SimClock;
pub use sim_venue::{SimEngine, SimVenue, UNKNOWN_UNIT, test_catalog, test_registry};
