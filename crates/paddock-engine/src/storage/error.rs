//! Storage error types.
//!
//! `Serialization` is permanent: retrying the same write fails the same way.
//! `Io` covers the database and file system and may clear up on retry.

use thiserror::Error;

/// Failure of a state store or history ledger operation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// A snapshot or record could not be encoded or decoded
    #[error("cannot encode or decode stored data: {0}")]
    Serialization(String),

    /// The backing database or file failed
    #[error("storage I/O failed: {0}")]
    Io(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}
