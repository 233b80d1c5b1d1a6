//! Operations for model-based testing.
//!
//! Generated randomly (by proptest or a fuzzer) and applied to both the
//! reference model and the real engine.

use arbitrary::Arbitrary;

/// Unit selector: an index into the test catalog's units, wrapped modulo the
/// unit count. Out-of-range values are kept in the operation space so the
/// unknown-id path gets exercised too (see [`Operation::Unknown`]).
pub type UnitIndex = u8;

/// Operations that can be applied to a venue.
#[derive(Debug, Clone, Arbitrary)]
pub enum Operation {
    /// Let time pass
    Advance {
        /// Elapsed seconds
        seconds: u16,
    },

    /// Start a rental with an explicit duration and price
    Start {
        /// Target unit
        unit: UnitIndex,
        /// Paid minutes (zero is rejected)
        minutes: u8,
        /// Price
        price: u8,
    },

    /// Answer the return prompt
    Confirm {
        /// Target unit
        unit: UnitIndex,
        /// Whether the kart is back
        returned: bool,
    },

    /// Return before paid time lapses
    EarlyReturn {
        /// Target unit
        unit: UnitIndex,
    },

    /// End overtime
    StopOvertime {
        /// Target unit
        unit: UnitIndex,
    },

    /// Administrative reset
    ForceReset {
        /// Target unit
        unit: UnitIndex,
    },

    /// Read one unit (applies lazy expiry)
    Get {
        /// Target unit
        unit: UnitIndex,
    },

    /// Periodic tick
    Tick,

    /// Start a rental on an id the catalog does not contain
    Unknown,
}

/// Rejection classes shared by model and engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationError {
    /// Unknown unit id
    NotFound,
    /// State does not permit the operation
    InvalidTransition,
    /// Zero-minute rental
    InvalidDuration,
    /// Storage failure surfaced by the engine; the model never fails this way
    Storage,
}

/// Outcome of applying an operation.
pub type OperationResult = Result<(), OperationError>;
