//! Storage abstraction for rental state and session history.
//!
//! Trait-based abstraction over two concerns sharing one backend:
//!
//! - **Snapshots**: opaque bytes overwritten under a versioned key. The engine
//!   stores the JSON-encoded state of every unit here.
//! - **Ledgers**: append-only, ordered sequences of [`SessionRecord`]s under a
//!   versioned name. Records are never mutated or removed individually; the
//!   only deletion path is clearing a whole ledger.
//!
//! The trait is synchronous (no async) to keep the engine's run-to-completion
//! transitions simple. An async backend can sit behind the same contract.

mod chaotic;
mod error;
mod memory;
mod redb;

pub use chaotic::ChaoticStorage;
pub use error::StorageError;
pub use memory::MemoryStorage;
use paddock_core::SessionRecord;

pub use self::redb::RedbStorage;

/// Storage abstraction for state snapshots and history ledgers.
///
/// Must be Clone (the engine and reporting code may hold separate handles),
/// Send + Sync, and synchronous. Implementations typically share internal
/// state via Arc, so clones access the same underlying storage.
///
/// # Panics
///
/// Implementations may panic if internal synchronization primitives are
/// poisoned (a thread panicked while holding a lock). Acceptable for
/// test/simulation code, but production implementations should handle poisoned
/// mutexes gracefully.
pub trait Storage: Clone + Send + Sync + 'static {
    /// Store a snapshot under `key`
    ///
    /// Overwrites any existing snapshot for this key.
    fn store_snapshot(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError>;

    /// Load the snapshot stored under `key`
    ///
    /// Returns `None` if nothing was ever stored under this key.
    fn load_snapshot(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Append a record to the end of `ledger`
    ///
    /// Returns the zero-based position of the new record.
    ///
    /// # Invariants
    ///
    /// - Post: the record is persisted at position `record_count() - 1`
    fn append_record(&self, ledger: &str, record: &SessionRecord) -> Result<u64, StorageError>;

    /// Load records from `ledger` in append order
    ///
    /// Returns records in range `[from, from+limit)`. If fewer than `limit`
    /// records exist, returns all available records. An unknown ledger is
    /// empty.
    fn load_records(
        &self,
        ledger: &str,
        from: u64,
        limit: usize,
    ) -> Result<Vec<SessionRecord>, StorageError>;

    /// Number of records in `ledger`.
    fn record_count(&self, ledger: &str) -> Result<u64, StorageError>;

    /// Remove every record from `ledger`.
    fn clear_records(&self, ledger: &str) -> Result<(), StorageError>;
}
