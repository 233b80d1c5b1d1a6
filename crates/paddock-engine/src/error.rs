//! Engine error types.

use paddock_core::{Operation, TransitionError, UnitId, UnitStatus};
use thiserror::Error;

use crate::storage::StorageError;

/// Errors returned by [`RentalEngine`](crate::RentalEngine) operations.
///
/// Rejected operations never mutate state. Persistence failures raised during
/// a transition are not returned here; they are queued and drained with
/// [`take_storage_faults`](crate::RentalEngine::take_storage_faults).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The unit's current state does not permit the operation
    #[error("cannot {operation} unit {unit_id} while {status}")]
    InvalidTransition {
        /// Unit the operation targeted
        unit_id: UnitId,
        /// State the unit was in
        status: UnitStatus,
        /// Rejected operation
        operation: Operation,
    },

    /// A rental was requested with a zero-minute duration
    #[error("rental duration for unit {unit_id} must be at least one minute")]
    InvalidDuration {
        /// Unit the operation targeted
        unit_id: UnitId,
    },

    /// No unit with this id exists in the catalog
    #[error("unit not found: {0}")]
    UnitNotFound(UnitId),

    /// Reading or writing the state store or history ledger failed
    #[error("persistence error: {0}")]
    Persistence(#[from] StorageError),
}

impl EngineError {
    /// Whether the caller can carry on after this error.
    ///
    /// Invalid transitions and unknown ids are operator mistakes that leave
    /// state untouched. Persistence failures are transient; the in-memory
    /// lifecycle keeps running.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::InvalidTransition { .. }
            | Self::InvalidDuration { .. }
            | Self::UnitNotFound(_) => true,
            Self::Persistence(err) => matches!(err, StorageError::Io(_)),
        }
    }
}

impl From<TransitionError> for EngineError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::InvalidTransition { unit_id, status, operation } => {
                Self::InvalidTransition { unit_id, status, operation }
            },
            TransitionError::InvalidDuration { unit_id } => Self::InvalidDuration { unit_id },
        }
    }
}
