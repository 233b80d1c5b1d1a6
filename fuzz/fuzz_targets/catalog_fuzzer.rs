//! Fuzz target for catalog files
//!
//! # Invariants
//!
//! - Parsing and registry construction NEVER panic
//! - A loaded registry has unique, whitespace-free ids
//! - Every unit starts available

#![no_main]

use std::collections::HashSet;

use libfuzzer_sys::fuzz_target;
use paddock_core::{Registry, UnitStatus};
use paddock_engine::catalog::parse_catalog;

fuzz_target!(|data: &[u8]| {
    let Ok(json) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(catalog) = parse_catalog(json) else {
        return;
    };
    let Ok(registry) = Registry::load(&catalog) else {
        return;
    };

    let mut seen = HashSet::new();
    for unit in registry.units() {
        assert!(seen.insert(unit.id().clone()), "duplicate id {}", unit.id());
        assert_eq!(unit.status(), UnitStatus::Available);
        assert!(
            !unit.id().as_str().chars().any(char::is_whitespace),
            "id not slugified: {}",
            unit.id()
        );
    }
});
