//! Error types for the rental core.
//!
//! Catalog errors are fatal to startup and must be fixed in the catalog data.
//! Transition errors are operator mistakes: the request is rejected and the
//! unit is left untouched.

use std::fmt;

use thiserror::Error;

use crate::unit::{UnitId, UnitStatus};

/// Lifecycle operations, named for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Begin a paid rental.
    StartRental,
    /// Answer the return prompt after paid time lapsed.
    ConfirmReturn,
    /// Return a kart before its paid time lapsed.
    EarlyReturn,
    /// End the overtime stopwatch and close the session.
    StopOvertime,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::StartRental => "start rental",
            Self::ConfirmReturn => "confirm return",
            Self::EarlyReturn => "early return",
            Self::StopOvertime => "stop overtime",
        };
        f.write_str(name)
    }
}

/// Errors raised while expanding a catalog into a registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Two catalog entries collapse to the same unit id
    #[error("duplicate unit id {id}: '{first}' and '{second}' in the catalog")]
    DuplicateId {
        /// The colliding id
        id: UnitId,
        /// Display name of the entry that claimed the id first
        first: String,
        /// Display name of the entry that collided
        second: String,
    },

    /// A catalog entry cannot be expanded (blank name, zero multiplicity)
    #[error("invalid catalog entry '{ident}' in category '{category}': {reason}")]
    InvalidEntry {
        /// Category holding the entry
        category: String,
        /// Raw identifier as written in the catalog
        ident: String,
        /// What is wrong with it
        reason: &'static str,
    },
}

/// Errors raised by a single-unit lifecycle transition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// Operation requested from a state that does not permit it
    #[error("cannot {operation} unit {unit_id} while {status}")]
    InvalidTransition {
        /// Unit the operation targeted
        unit_id: UnitId,
        /// Status at the time of the request
        status: UnitStatus,
        /// Operation that was attempted
        operation: Operation,
    },

    /// Rental requested with a zero-minute duration
    #[error("rental duration for unit {unit_id} must be at least one minute")]
    InvalidDuration {
        /// Unit the rental targeted
        unit_id: UnitId,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_transition_names_operation_and_state() {
        let err = TransitionError::InvalidTransition {
            unit_id: UnitId::from("basic-karts-1"),
            status: UnitStatus::Rented,
            operation: Operation::StartRental,
        };

        assert_eq!(err.to_string(), "cannot start rental unit basic-karts-1 while rented");
    }

    #[test]
    fn duplicate_id_names_both_entries() {
        let err = RegistryError::DuplicateId {
            id: UnitId::from("basic-karts-a-b"),
            first: "a b".into(),
            second: "a  b".into(),
        };

        assert!(err.to_string().contains("'a b' and 'a  b'"));
    }
}
