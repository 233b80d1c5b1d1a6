//! Core rental lifecycle for a kart venue.
//!
//! Pure, I/O-free building blocks: the unit catalog and registry, the per-unit
//! rental state machine, reconciliation of persisted state against the
//! catalog, completed-session records and the reporting built on them.
//!
//! # Architecture
//!
//! Nothing here reads the system clock, touches storage or sends alerts. Time
//! enters through the [`Clock`] trait (or an explicit [`Timestamp`] argument)
//! so every transition is deterministic under test. The engine crate wires
//! these pieces to storage, notification and a periodic tick.
//!
//! # Components
//!
//! - [`Registry`]: expands a [`Catalog`] into uniquely identified [`Unit`]s
//! - [`Unit`]: one kart and its current [`Session`], if any
//! - [`reconcile`]: overlays persisted sessions onto a fresh registry
//! - [`SessionRecord`]: immutable history entry for a closed session

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod clock;
pub mod error;
pub mod format;
pub mod history;
pub mod lifecycle;
pub mod reconcile;
pub mod registry;
pub mod unit;

pub use clock::{Clock, Timestamp};
pub use error::{Operation, RegistryError, TransitionError};
pub use format::{format_countdown, format_datetime, format_stopwatch, status_label};
pub use history::{CategoryUsage, SessionRecord, usage_by_category};
pub use lifecycle::billed_minutes;
pub use reconcile::{PersistedUnit, Reconciled, reconcile, snapshot};
pub use registry::{Catalog, CatalogEntry, Registry, slugify};
pub use unit::{Phase, RentalPlan, Session, Unit, UnitId, UnitStatus};
