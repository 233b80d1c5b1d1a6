//! Kart rental lifecycle engine.
//!
//! Wires the pure state machine from [`paddock_core`] to durable storage,
//! expiry alerts and a periodic tick.
//!
//! # Architecture
//!
//! [`RentalEngine`] is synchronous and run-to-completion: every operation
//! applies one transition, then writes history and the state snapshot through
//! a [`Storage`] backend. Time comes from an injected [`Clock`], so tests run
//! on virtual time. The async [`runtime`] only decides when to call
//! [`RentalEngine::tick`] and when to apply an operator [`EngineCommand`].
//!
//! # Components
//!
//! - [`RentalEngine`]: lifecycle operations, timers and reporting
//! - [`Storage`]: [`MemoryStorage`], [`RedbStorage`] and the fault-injecting
//!   [`ChaoticStorage`]
//! - [`Notifier`]: permission-aware, failure-swallowing expiry alerts
//! - [`SystemClock`]: wall-clock time for production
//!
//! [`Clock`]: paddock_core::Clock

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod catalog;
pub mod command;
mod engine;
mod error;
mod notifier;
pub mod runtime;
pub mod state;
pub mod storage;
mod system_clock;

pub use catalog::{ConfigError, builtin_catalog, load_catalog, load_registry};
pub use command::{CommandOutcome, EngineCommand, ParseCommandError};
pub use engine::{EngineConfig, EngineEvent, RentalEngine, TimerKind, TimerToken};
pub use error::EngineError;
pub use notifier::{
    CommandSink, ExpiryAlert, LogSink, NotificationSink, Notifier, NotifyError, NullSink,
    Permission,
};
pub use runtime::Presenter;
pub use storage::{ChaoticStorage, MemoryStorage, RedbStorage, Storage, StorageError};
pub use system_clock::SystemClock;
