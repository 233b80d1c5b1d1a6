//! Fault-injecting storage wrapper.
//!
//! Randomly fails snapshot and ledger operations so tests can drive the
//! engine through persistence faults and check that in-memory rental state
//! stays consistent regardless.

#![allow(clippy::disallowed_types, reason = "Locking simple RNG state")]

use std::sync::{Arc, Mutex};

use paddock_core::SessionRecord;

use super::{Storage, StorageError};

/// Storage wrapper that fails a configurable fraction of operations
///
/// Delegates to an inner storage. Failures are decided by a seeded LCG so a
/// chaos run replays exactly under the same seed. Clones share both the RNG
/// and the operation counter.
#[derive(Clone)]
pub struct ChaoticStorage<S: Storage> {
    inner: S,
    /// Failure rate (0.0 = never fail, 1.0 = always fail)
    failure_rate: f64,
    state: Arc<Mutex<ChaosState>>,
}

struct ChaosState {
    rng: Lcg,
    operations: usize,
    injected: usize,
}

/// Linear congruential generator (Numerical Recipes constants).
struct Lcg {
    state: u64,
}

impl Lcg {
    const A: u64 = 1_664_525;
    const C: u64 = 1_013_904_223;
    const M: u64 = 1u64 << 32;

    /// Next value in [0.0, 1.0)
    fn next_unit(&mut self) -> f64 {
        self.state = Self::A.wrapping_mul(self.state).wrapping_add(Self::C) % Self::M;
        (self.state as f64) / (Self::M as f64)
    }
}

impl<S: Storage> ChaoticStorage<S> {
    /// Default seed used by [`ChaoticStorage::new`].
    pub const DEFAULT_SEED: u64 = 0x5EED_CAFE_F00D_0001;

    /// Wrap `inner`, failing roughly `failure_rate` of all operations.
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn new(inner: S, failure_rate: f64) -> Self {
        Self::with_seed(inner, failure_rate, Self::DEFAULT_SEED)
    }

    /// Wrap `inner` with an explicit seed for reproducible chaos.
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn with_seed(inner: S, failure_rate: f64, seed: u64) -> Self {
        assert!(
            (0.0..=1.0).contains(&failure_rate),
            "failure_rate must be between 0.0 and 1.0, got {failure_rate}"
        );

        Self {
            inner,
            failure_rate,
            state: Arc::new(Mutex::new(ChaosState {
                rng: Lcg { state: seed },
                operations: 0,
                injected: 0,
            })),
        }
    }

    /// Underlying storage, for inspecting what actually got persisted.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Total number of storage operations attempted.
    pub fn operation_count(&self) -> usize {
        #[allow(clippy::expect_used)]
        self.state.lock().expect("ChaosState mutex poisoned").operations
    }

    /// Number of operations that were failed on purpose.
    pub fn injected_failures(&self) -> usize {
        #[allow(clippy::expect_used)]
        self.state.lock().expect("ChaosState mutex poisoned").injected
    }

    /// Count the operation and decide whether it fails.
    fn roll(&self) -> Result<(), StorageError> {
        #[allow(clippy::expect_used)]
        let mut state = self.state.lock().expect("ChaosState mutex poisoned");
        state.operations += 1;

        if state.rng.next_unit() < self.failure_rate {
            state.injected += 1;
            return Err(StorageError::Io("chaotic failure injection".to_string()));
        }

        Ok(())
    }
}

impl<S: Storage> Storage for ChaoticStorage<S> {
    fn store_snapshot(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        self.roll()?;
        self.inner.store_snapshot(key, bytes)
    }

    fn load_snapshot(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        self.roll()?;
        self.inner.load_snapshot(key)
    }

    fn append_record(&self, ledger: &str, record: &SessionRecord) -> Result<u64, StorageError> {
        self.roll()?;
        self.inner.append_record(ledger, record)
    }

    fn load_records(
        &self,
        ledger: &str,
        from: u64,
        limit: usize,
    ) -> Result<Vec<SessionRecord>, StorageError> {
        self.roll()?;
        self.inner.load_records(ledger, from, limit)
    }

    fn record_count(&self, ledger: &str) -> Result<u64, StorageError> {
        self.roll()?;
        self.inner.record_count(ledger)
    }

    fn clear_records(&self, ledger: &str) -> Result<(), StorageError> {
        self.roll()?;
        self.inner.clear_records(ledger)
    }
}
