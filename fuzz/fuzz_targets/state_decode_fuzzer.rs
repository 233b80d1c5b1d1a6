//! Fuzz target for persisted rental state
//!
//! # Strategy
//!
//! - Raw bytes: arbitrary data in place of the state document
//! - Structured: well-formed JSON documents with arbitrary field combinations
//!
//! # Invariants
//!
//! - Decoding NEVER panics
//! - Every reconciled unit satisfies the session field invariants
//! - Reconciled units follow catalog order, one per catalog id
//! - Dropped ids are exactly the persisted ids the catalog lacks

#![no_main]

use std::fmt::Write;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use paddock_core::reconcile;
use paddock_engine::state::{DecodedState, decode_state};
use paddock_harness::test_registry;

#[derive(Debug, Arbitrary)]
enum Input {
    Raw(Vec<u8>),
    Document { schema: u8, units: Vec<FuzzUnit> },
}

#[derive(Debug, Arbitrary)]
struct FuzzUnit {
    id: u8,
    status: u8,
    rental_started_at: Option<u32>,
    paid_until: Option<u32>,
    overdue_since: Option<u32>,
    minutes: Option<u16>,
    price: Option<u16>,
}

const IDS: [&str; 7] = [
    "basic-karts-1",
    "basic-karts-2",
    "basic-karts-3",
    "grand-tour-blue-1",
    "grand-tour-blue-2",
    "retired-kart-1",
    "",
];

const STATUSES: [&str; 5] = ["available", "rented", "expired_unconfirmed", "overdue", "lost"];

fn field(out: &mut String, name: &str, value: Option<impl std::fmt::Display>) {
    if let Some(value) = value {
        let _ = write!(out, r#","{name}":{value}"#);
    }
}

fn render(schema: u8, units: &[FuzzUnit]) -> String {
    let mut out = format!(r#"{{"schema":{schema},"units":{{"#);
    for (i, unit) in units.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        let id = IDS[usize::from(unit.id) % IDS.len()];
        let status = STATUSES[usize::from(unit.status) % STATUSES.len()];
        let _ = write!(out, r#""{id}":{{"status":"{status}""#);
        field(&mut out, "rentalStartedAt", unit.rental_started_at);
        field(&mut out, "paidUntil", unit.paid_until);
        field(&mut out, "overdueSince", unit.overdue_since);
        field(&mut out, "intendedDurationMinutes", unit.minutes);
        field(&mut out, "intendedPrice", unit.price);
        out.push('}');
    }
    out.push_str("}}");
    out
}

fuzz_target!(|input: Input| {
    let bytes = match input {
        Input::Raw(bytes) => bytes,
        Input::Document { schema, units } => render(schema % 3, &units).into_bytes(),
    };

    let decoded = decode_state(Some(bytes.as_slice()));
    let persisted = match decoded {
        DecodedState::Loaded(units) => units,
        DecodedState::Missing | DecodedState::SchemaMismatch { .. } | DecodedState::Corrupt(_) => {
            return;
        },
    };

    let registry = test_registry();
    let reconciled = reconcile(&registry, &persisted);

    assert_eq!(reconciled.units.len(), registry.len());
    for (unit, pristine) in reconciled.units.iter().zip(registry.units()) {
        assert_eq!(unit.id(), pristine.id());
        assert!(unit.is_consistent(), "inconsistent unit after reconcile: {unit:?}");
    }

    let expected_dropped: Vec<_> =
        persisted.keys().filter(|id| !registry.contains(id.as_str())).cloned().collect();
    assert_eq!(reconciled.dropped, expected_dropped);
});
