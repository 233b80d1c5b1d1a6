//! Redb-backed durable storage implementation.
//!
//! Uses Redb's ACID transactions with Copy-on-Write for crash safety.
//! Unit state and session history survive process restarts.

use std::{path::Path, sync::Arc};

use paddock_core::SessionRecord;
use redb::{Database, ReadableTable, TableDefinition};

use super::{Storage, StorageError};

/// Table: snapshots
/// Key: snapshot key (UTF-8)
/// Value: opaque snapshot bytes (the engine writes JSON)
const SNAPSHOTS: TableDefinition<&str, &[u8]> = TableDefinition::new("snapshots");

/// Table: records
/// Key: ledger name bytes + 0x00 + position (8 bytes BE)
/// Value: CBOR-encoded `SessionRecord`
const RECORDS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("records");

/// Durable storage backed by Redb.
///
/// Thread-safe through Redb's internal locking. Clone is cheap (Arc).
#[derive(Clone)]
pub struct RedbStorage {
    db: Arc<Database>,
}

impl RedbStorage {
    /// Open or create a Redb database at the given path.
    ///
    /// Creates tables if they don't exist (SNAPSHOTS, RECORDS).
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the database cannot be opened or created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let db = Database::create(path.as_ref()).map_err(|e| StorageError::Io(e.to_string()))?;

        let txn = db.begin_write().map_err(|e| StorageError::Io(e.to_string()))?;
        {
            let _ = txn.open_table(SNAPSHOTS).map_err(|e| StorageError::Io(e.to_string()))?;
            let _ = txn.open_table(RECORDS).map_err(|e| StorageError::Io(e.to_string()))?;
        }
        txn.commit().map_err(|e| StorageError::Io(e.to_string()))?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Number of records in a ledger, from the position of its last key.
    fn compute_record_count<T: ReadableTable<&'static [u8], &'static [u8]>>(
        &self,
        table: &T,
        ledger: &str,
    ) -> Result<u64, StorageError> {
        let start_key = encode_record_key(ledger, 0);
        let end_key = encode_record_key(ledger, u64::MAX);

        let mut results = table
            .range(start_key.as_slice()..=end_key.as_slice())
            .map_err(|e| StorageError::Io(e.to_string()))?;

        match results.next_back() {
            Some(result) => {
                let (key, _) = result.map_err(|e| StorageError::Io(e.to_string()))?;
                Ok(decode_record_position(key.value())? + 1)
            },
            None => Ok(0),
        }
    }
}

impl Storage for RedbStorage {
    fn store_snapshot(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let txn = self.db.begin_write().map_err(|e| StorageError::Io(e.to_string()))?;

        {
            let mut table =
                txn.open_table(SNAPSHOTS).map_err(|e| StorageError::Io(e.to_string()))?;
            table.insert(key, bytes).map_err(|e| StorageError::Io(e.to_string()))?;
        }

        txn.commit().map_err(|e| StorageError::Io(e.to_string()))?;

        Ok(())
    }

    fn load_snapshot(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let txn = self.db.begin_read().map_err(|e| StorageError::Io(e.to_string()))?;

        let table = txn.open_table(SNAPSHOTS).map_err(|e| StorageError::Io(e.to_string()))?;

        let value = table.get(key).map_err(|e| StorageError::Io(e.to_string()))?;

        Ok(value.map(|v| v.value().to_vec()))
    }

    fn append_record(&self, ledger: &str, record: &SessionRecord) -> Result<u64, StorageError> {
        let txn = self.db.begin_write().map_err(|e| StorageError::Io(e.to_string()))?;

        let position;
        {
            let mut table = txn.open_table(RECORDS).map_err(|e| StorageError::Io(e.to_string()))?;

            position = self.compute_record_count(&table, ledger)?;

            let mut bytes = Vec::new();
            ciborium::into_writer(record, &mut bytes)
                .map_err(|e| StorageError::Serialization(e.to_string()))?;

            let key = encode_record_key(ledger, position);
            table
                .insert(key.as_slice(), bytes.as_slice())
                .map_err(|e| StorageError::Io(e.to_string()))?;
        }

        txn.commit().map_err(|e| StorageError::Io(e.to_string()))?;

        Ok(position)
    }

    fn load_records(
        &self,
        ledger: &str,
        from: u64,
        limit: usize,
    ) -> Result<Vec<SessionRecord>, StorageError> {
        let txn = self.db.begin_read().map_err(|e| StorageError::Io(e.to_string()))?;

        let table = txn.open_table(RECORDS).map_err(|e| StorageError::Io(e.to_string()))?;

        let start_key = encode_record_key(ledger, from);
        let end_key = encode_record_key(ledger, u64::MAX);

        let results = table
            .range(start_key.as_slice()..=end_key.as_slice())
            .map_err(|e| StorageError::Io(e.to_string()))?;

        let mut records = Vec::new();
        for result in results {
            if records.len() >= limit {
                break;
            }

            let (_, value) = result.map_err(|e| StorageError::Io(e.to_string()))?;
            let record: SessionRecord = ciborium::from_reader(value.value())
                .map_err(|e| StorageError::Serialization(e.to_string()))?;

            records.push(record);
        }

        Ok(records)
    }

    fn record_count(&self, ledger: &str) -> Result<u64, StorageError> {
        let txn = self.db.begin_read().map_err(|e| StorageError::Io(e.to_string()))?;
        let table = txn.open_table(RECORDS).map_err(|e| StorageError::Io(e.to_string()))?;

        self.compute_record_count(&table, ledger)
    }

    fn clear_records(&self, ledger: &str) -> Result<(), StorageError> {
        let txn = self.db.begin_write().map_err(|e| StorageError::Io(e.to_string()))?;

        {
            let mut table = txn.open_table(RECORDS).map_err(|e| StorageError::Io(e.to_string()))?;

            let start_key = encode_record_key(ledger, 0);
            let end_key = encode_record_key(ledger, u64::MAX);

            let mut keys = Vec::new();
            for result in table
                .range(start_key.as_slice()..=end_key.as_slice())
                .map_err(|e| StorageError::Io(e.to_string()))?
            {
                let (key, _) = result.map_err(|e| StorageError::Io(e.to_string()))?;
                keys.push(key.value().to_vec());
            }

            for key in keys {
                table.remove(key.as_slice()).map_err(|e| StorageError::Io(e.to_string()))?;
            }
        }

        txn.commit().map_err(|e| StorageError::Io(e.to_string()))?;

        Ok(())
    }
}

/// Encode record key: ledger name, a 0x00 separator, position as 8 bytes BE.
///
/// Big-endian positions sort numerically, so a range scan yields append order.
fn encode_record_key(ledger: &str, position: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(ledger.len() + 9);
    key.extend_from_slice(ledger.as_bytes());
    key.push(0);
    key.extend_from_slice(&position.to_be_bytes());
    key
}

/// Decode the position from a record key.
fn decode_record_position(key: &[u8]) -> Result<u64, StorageError> {
    let Some(split) = key.len().checked_sub(8) else {
        return Err(StorageError::Serialization(format!("record key too short: {} bytes", key.len())));
    };

    let mut position = [0u8; 8];
    position.copy_from_slice(&key[split..]);
    Ok(u64::from_be_bytes(position))
}
