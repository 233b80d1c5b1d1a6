//! Persisted rental state envelope.
//!
//! The state store holds one JSON document under a versioned key:
//!
//! ```json
//! { "schema": 1, "units": { "basic-karts-1": { "status": "rented", ... } } }
//! ```
//!
//! Anything other than a well-formed document with the current schema is
//! read as "no saved state". A bumped schema or key therefore starts the
//! venue fresh instead of misreading old data.

use std::collections::BTreeMap;

use paddock_core::{PersistedUnit, UnitId};
use serde::{Deserialize, Serialize};

use crate::storage::StorageError;

/// Current schema version of the state document.
pub const STATE_SCHEMA: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct StateDocument {
    schema: u32,
    units: BTreeMap<UnitId, PersistedUnit>,
}

/// Result of decoding a stored state document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedState {
    /// Nothing stored under the key
    Missing,
    /// Stored under an older or newer schema
    SchemaMismatch {
        /// Schema found in the document
        found: u32,
    },
    /// Not valid JSON, or not shaped like a state document
    Corrupt(String),
    /// Current-schema state, keyed by unit id
    Loaded(BTreeMap<UnitId, PersistedUnit>),
}

impl DecodedState {
    /// Persisted units, empty unless the document loaded cleanly.
    pub fn into_units(self) -> BTreeMap<UnitId, PersistedUnit> {
        match self {
            Self::Loaded(units) => units,
            Self::Missing | Self::SchemaMismatch { .. } | Self::Corrupt(_) => BTreeMap::new(),
        }
    }
}

/// Encode units into a current-schema document.
///
/// # Errors
///
/// `StorageError::Serialization` if JSON encoding fails.
pub fn encode_state(units: BTreeMap<UnitId, PersistedUnit>) -> Result<Vec<u8>, StorageError> {
    Ok(serde_json::to_vec(&StateDocument { schema: STATE_SCHEMA, units })?)
}

/// Decode stored bytes (or their absence).
pub fn decode_state(bytes: Option<&[u8]>) -> DecodedState {
    let Some(bytes) = bytes else {
        return DecodedState::Missing;
    };

    #[derive(Deserialize)]
    struct Header {
        schema: u32,
    }

    match serde_json::from_slice::<Header>(bytes) {
        Ok(Header { schema }) if schema != STATE_SCHEMA => {
            return DecodedState::SchemaMismatch { found: schema };
        },
        Ok(_) => {},
        Err(err) => return DecodedState::Corrupt(err.to_string()),
    }

    match serde_json::from_slice::<StateDocument>(bytes) {
        Ok(document) => DecodedState::Loaded(document.units),
        Err(err) => DecodedState::Corrupt(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use paddock_core::{Timestamp, UnitStatus};

    use super::*;

    fn rented() -> PersistedUnit {
        PersistedUnit {
            status: UnitStatus::Rented,
            rental_started_at: Some(Timestamp::from_millis(0)),
            paid_until: Some(Timestamp::from_millis(1_800_000)),
            overdue_since: None,
            intended_duration_minutes: Some(30),
            intended_price: Some(20),
        }
    }

    #[test]
    fn encode_then_decode() {
        let mut units = BTreeMap::new();
        units.insert(UnitId::from("basic-karts-1"), rented());

        let bytes = encode_state(units.clone()).unwrap();

        assert_eq!(decode_state(Some(&bytes)), DecodedState::Loaded(units));
    }

    #[test]
    fn wire_format_is_camel_case_millis() {
        let mut units = BTreeMap::new();
        units.insert(UnitId::from("k1"), rented());

        let json: serde_json::Value =
            serde_json::from_slice(&encode_state(units).unwrap()).unwrap();

        assert_eq!(json["schema"], 1);
        assert_eq!(json["units"]["k1"]["status"], "rented");
        assert_eq!(json["units"]["k1"]["paidUntil"], 1_800_000);
        assert_eq!(json["units"]["k1"]["intendedDurationMinutes"], 30);
    }

    #[test]
    fn other_schema_is_no_state() {
        let bytes = br#"{"schema":4,"units":{}}"#;

        let decoded = decode_state(Some(bytes));

        assert_eq!(decoded, DecodedState::SchemaMismatch { found: 4 });
        assert!(decoded.into_units().is_empty());
    }

    #[test]
    fn garbage_is_corrupt() {
        assert!(matches!(decode_state(Some(b"not json")), DecodedState::Corrupt(_)));
        assert!(matches!(
            decode_state(Some(br#"{"schema":1,"units":{"k1":{"status":"flying"}}}"#)),
            DecodedState::Corrupt(_)
        ));
        assert_eq!(decode_state(None), DecodedState::Missing);
    }
}
