#![allow(clippy::disallowed_types, reason = "Synchronous in-memory operations only")]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use paddock_core::SessionRecord;

use super::{Storage, StorageError};

/// In-memory storage implementation for testing and simulation
///
/// Uses `HashMap` for snapshots and a Vec per ledger for ordered records. All
/// state is wrapped in Arc<Mutex<>> so clones share one store, which lets a
/// test inspect what the engine persisted or simulate a restart by opening a
/// second engine on the same handle. Uses `lock().expect()` which will panic
/// if the mutex is poisoned - acceptable for test code.
#[derive(Clone)]
pub struct MemoryStorage {
    inner: Arc<Mutex<MemoryStorageInner>>,
}

struct MemoryStorageInner {
    /// Snapshot bytes by key
    snapshots: HashMap<String, Vec<u8>>,

    /// Records by ledger name, in append order
    ledgers: HashMap<String, Vec<SessionRecord>>,
}

impl MemoryStorage {
    /// Create a new empty `MemoryStorage`
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryStorageInner {
                snapshots: HashMap::new(),
                ledgers: HashMap::new(),
            })),
        }
    }

    /// Number of stored snapshots.
    ///
    /// Useful for debugging and testing.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned (a thread panicked while
    /// holding the lock). This is acceptable for test/simulation code.
    #[allow(clippy::expect_used)]
    pub fn snapshot_count(&self) -> usize {
        self.inner.lock().expect("Mutex poisoned").snapshots.len()
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MemoryStorage {
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned. This is acceptable for test
    /// code.
    #[allow(clippy::expect_used)]
    fn store_snapshot(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        self.inner.lock().expect("Mutex poisoned").snapshots.insert(key.to_owned(), bytes.to_vec());

        Ok(())
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned. This is acceptable for test
    /// code.
    #[allow(clippy::expect_used)]
    fn load_snapshot(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.inner.lock().expect("Mutex poisoned").snapshots.get(key).cloned())
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned. This is acceptable for test
    /// code.
    #[allow(clippy::expect_used)]
    fn append_record(&self, ledger: &str, record: &SessionRecord) -> Result<u64, StorageError> {
        let mut inner = self.inner.lock().expect("Mutex poisoned");

        let records = inner.ledgers.entry(ledger.to_owned()).or_default();
        records.push(record.clone());

        Ok(records.len() as u64 - 1)
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned. This is acceptable for test
    /// code.
    #[allow(clippy::expect_used)]
    fn load_records(
        &self,
        ledger: &str,
        from: u64,
        limit: usize,
    ) -> Result<Vec<SessionRecord>, StorageError> {
        let inner = self.inner.lock().expect("Mutex poisoned");

        let Some(records) = inner.ledgers.get(ledger) else {
            return Ok(Vec::new());
        };

        let start = from as usize;
        if start > records.len() {
            return Ok(Vec::new());
        }
        let end = start.saturating_add(limit).min(records.len());

        Ok(records[start..end].to_vec())
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned. This is acceptable for test
    /// code.
    #[allow(clippy::expect_used)]
    fn record_count(&self, ledger: &str) -> Result<u64, StorageError> {
        let inner = self.inner.lock().expect("Mutex poisoned");

        Ok(inner.ledgers.get(ledger).map_or(0, |records| records.len() as u64))
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned. This is acceptable for test
    /// code.
    #[allow(clippy::expect_used)]
    fn clear_records(&self, ledger: &str) -> Result<(), StorageError> {
        self.inner.lock().expect("Mutex poisoned").ledgers.remove(ledger);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use paddock_core::{Timestamp, UnitId};

    use super::*;

    fn record(minutes: u32) -> SessionRecord {
        SessionRecord {
            unit_id: UnitId::from("basic-karts-1"),
            display_name: "1".into(),
            category: "Basic Karts".into(),
            started_at: Timestamp::EPOCH,
            ended_at: Timestamp::from_millis(u64::from(minutes) * 60_000),
            duration_minutes: minutes,
            price_paid: 20,
        }
    }

    #[test]
    fn snapshot_overwrite() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.load_snapshot("state").unwrap(), None);

        storage.store_snapshot("state", b"one").unwrap();
        storage.store_snapshot("state", b"two").unwrap();

        assert_eq!(storage.load_snapshot("state").unwrap(), Some(b"two".to_vec()));
        assert_eq!(storage.snapshot_count(), 1);
    }

    #[test]
    fn ledger_keeps_append_order() {
        let storage = MemoryStorage::new();

        for minutes in 1..=5 {
            let position = storage.append_record("history", &record(minutes)).unwrap();
            assert_eq!(position, u64::from(minutes) - 1);
        }

        let records = storage.load_records("history", 1, 3).unwrap();
        let minutes: Vec<_> = records.iter().map(|r| r.duration_minutes).collect();
        assert_eq!(minutes, vec![2, 3, 4]);
        assert_eq!(storage.record_count("history").unwrap(), 5);
    }

    #[test]
    fn load_past_end_is_empty() {
        let storage = MemoryStorage::new();
        storage.append_record("history", &record(1)).unwrap();

        assert!(storage.load_records("history", 5, 10).unwrap().is_empty());
        assert!(storage.load_records("unknown", 0, 10).unwrap().is_empty());
    }

    #[test]
    fn clear_empties_only_that_ledger() {
        let storage = MemoryStorage::new();
        storage.append_record("history", &record(1)).unwrap();
        storage.append_record("other", &record(2)).unwrap();

        storage.clear_records("history").unwrap();

        assert_eq!(storage.record_count("history").unwrap(), 0);
        assert_eq!(storage.record_count("other").unwrap(), 1);
    }

    #[test]
    fn clones_share_state() {
        let storage = MemoryStorage::new();
        let clone = storage.clone();

        clone.append_record("history", &record(1)).unwrap();

        assert_eq!(storage.record_count("history").unwrap(), 1);
    }
}
