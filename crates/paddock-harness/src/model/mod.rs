//! Reference model for model-based testing.
//!
//! Operations are applied to both the [`ModelVenue`] and a real engine;
//! their [`ObservableState`]s must agree after every step.

mod operation;
mod venue;

pub use operation::{Operation, OperationError, OperationResult, UnitIndex};
pub use venue::{ModelRecord, ModelStatus, ModelUnit, ModelVenue, ObservableState};
