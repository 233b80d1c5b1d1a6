//! State survives restarts and is reconciled against the current catalog.

use std::time::Duration;

use paddock_core::{CatalogEntry, Registry, Timestamp, UnitStatus};
use paddock_engine::{
    EngineConfig, EngineEvent, MemoryStorage, RedbStorage, RentalEngine, Storage,
    state::STATE_SCHEMA,
};
use paddock_harness::{RecordingSink, SimClock, SimVenue, test_catalog, test_registry};
use tempfile::tempdir;

const STATE_KEY: &str = "rental_state.v1";

fn at(ms: u64) -> Timestamp {
    Timestamp::from_millis(ms)
}

/// Leaves the test catalog as rented, expired, rented, overdue, available.
fn all_four_states<S: Storage>(venue: &mut SimVenue<S>) {
    venue.engine.start_rental("basic-karts-1", 30, 20).unwrap();
    venue.engine.start_rental("basic-karts-2", 10, 20).unwrap();
    venue.engine.start_rental("grand-tour-blue-1", 10, 50).unwrap();

    venue.clock.set(at(600_000));
    venue.engine.tick();
    venue.engine.confirm_return("grand-tour-blue-1", false).unwrap();
    venue.engine.start_rental("basic-karts-3", 60, 30).unwrap();
}

#[test]
fn round_trip_preserves_all_four_states() {
    let dir = tempdir().unwrap();
    let storage = RedbStorage::open(dir.path().join("venue.redb")).unwrap();
    let mut venue = SimVenue::with_storage(storage, test_registry());
    all_four_states(&mut venue);
    let before = venue.engine.list_units();

    let mut venue = venue.restart(test_registry());
    let after = venue.engine.list_units();

    let statuses: Vec<_> = after.iter().map(|u| u.status()).collect();
    assert_eq!(statuses, vec![
        UnitStatus::Rented,
        UnitStatus::ExpiredUnconfirmed,
        UnitStatus::Rented,
        UnitStatus::Overdue,
        UnitStatus::Available,
    ]);
    for (b, a) in before.iter().zip(&after) {
        assert_eq!(b.id(), a.id());
        assert_eq!(b.session(), a.session());
    }
}

#[test]
fn generations_restart_from_zero() {
    let mut venue = SimVenue::new();
    all_four_states(&mut venue);
    assert!(venue.engine.list_units().iter().any(|u| u.generation() > 0));

    let mut venue = venue.restart(test_registry());

    assert!(venue.engine.list_units().iter().all(|u| u.generation() == 0));
}

#[test]
fn survives_reopening_the_database_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("venue.redb");
    let clock = SimClock::new();

    {
        let storage = RedbStorage::open(&path).unwrap();
        let mut venue =
            SimVenue::open(storage, test_registry(), clock.clone(), RecordingSink::new());
        venue.engine.start_rental("basic-karts-1", 30, 20).unwrap();
        venue.clock.advance(Duration::from_secs(300));
        venue.engine.start_rental("basic-karts-2", 30, 20).unwrap();
        venue.engine.early_return("basic-karts-2").unwrap();
    }

    let storage = RedbStorage::open(&path).unwrap();
    let mut venue = SimVenue::open(storage, test_registry(), clock, RecordingSink::new());

    let unit = venue.engine.get_unit("basic-karts-1").unwrap();
    assert_eq!(unit.status(), UnitStatus::Rented);
    assert_eq!(unit.paid_until(), Some(at(1_800_000)));
    assert_eq!(venue.engine.history().unwrap().len(), 1);
}

#[test]
fn rental_lapsed_while_down_expires_on_first_tick() {
    let mut venue = SimVenue::new();
    venue.engine.start_rental("basic-karts-1", 30, 20).unwrap();

    let mut venue = venue.restart(test_registry());
    venue.clock.set(at(3_600_000));
    let events = venue.engine.tick();

    assert_eq!(events.len(), 1);
    assert_eq!(venue.sink.alert_count(), 1);
    assert_eq!(
        venue.engine.get_unit("basic-karts-1").unwrap().status(),
        UnitStatus::ExpiredUnconfirmed
    );
}

#[test]
fn restored_return_prompt_is_raised_once_without_second_alert() {
    let mut venue = SimVenue::new();
    venue.engine.start_rental("basic-karts-1", 1, 20).unwrap();
    venue.clock.advance(Duration::from_secs(61));
    venue.engine.list_units();
    assert_eq!(venue.sink.alert_count(), 1);

    let mut venue = venue.restart(test_registry());
    let events = venue.engine.tick();

    let prompts: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            EngineEvent::ReturnDue { unit_id } => Some(unit_id.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(prompts, vec!["basic-karts-1"]);
    assert_eq!(venue.sink.alert_count(), 1);
    assert!(venue.engine.tick().iter().all(|e| !matches!(e, EngineEvent::ReturnDue { .. })));
}

#[test]
fn restored_prompt_answered_before_first_tick_is_not_raised() {
    let mut venue = SimVenue::new();
    venue.engine.start_rental("basic-karts-2", 1, 20).unwrap();
    venue.clock.advance(Duration::from_secs(61));
    venue.engine.tick();

    let mut venue = venue.restart(test_registry());
    venue.engine.confirm_return("basic-karts-2", true).unwrap();

    assert!(venue.engine.tick().is_empty());
}

#[test]
fn ids_missing_from_catalog_are_dropped_and_new_ids_available() {
    let mut venue = SimVenue::new();
    venue.engine.start_rental("basic-karts-1", 30, 20).unwrap();
    venue.engine.start_rental("grand-tour-blue-2", 30, 50).unwrap();

    // Grand Tour retired, a new category added
    let mut catalog = test_catalog();
    catalog.categories.truncate(1);
    catalog.categories.push(CatalogEntry {
        category: "Delfino".into(),
        idents: vec!["Mov ×1".into()],
        price30: 90,
        price1h: 130,
    });
    let registry = Registry::load(&catalog).unwrap();

    let mut venue = venue.restart(registry);

    assert_eq!(venue.engine.get_unit("basic-karts-1").unwrap().status(), UnitStatus::Rented);
    assert_eq!(venue.engine.get_unit("delfino-mov-1").unwrap().status(), UnitStatus::Available);
    assert!(venue.engine.get_unit("grand-tour-blue-2").is_err());

    // The next save no longer carries the dropped id
    venue.engine.force_reset("basic-karts-1").unwrap();
    let bytes = venue.engine.storage().load_snapshot(STATE_KEY).unwrap().unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert!(json["units"].get("grand-tour-blue-2").is_none());
}

#[test]
fn schema_mismatch_is_a_fresh_start() {
    let storage = MemoryStorage::new();
    let stale = format!(
        r#"{{"schema":{},"units":{{"basic-karts-1":{{"status":"rented","rentalStartedAt":0,"paidUntil":1800000,"intendedDurationMinutes":30,"intendedPrice":20}}}}}}"#,
        STATE_SCHEMA + 1
    );
    storage.store_snapshot(STATE_KEY, stale.as_bytes()).unwrap();

    let mut venue = SimVenue::with_storage(storage, test_registry());

    assert_eq!(venue.engine.get_unit("basic-karts-1").unwrap().status(), UnitStatus::Available);
    assert!(venue.engine.take_storage_faults().is_empty());
}

#[test]
fn older_state_key_is_ignored() {
    let storage = MemoryStorage::new();
    storage.store_snapshot("rental_state.v0", br#"{"schema":1,"units":{}}"#).unwrap();

    let mut venue = SimVenue::with_storage(storage.clone(), test_registry());

    assert!(venue.engine.list_units().iter().all(|u| u.status() == UnitStatus::Available));
    assert_eq!(storage.snapshot_count(), 1);
}

#[test]
fn corrupt_state_is_a_fresh_start() {
    let storage = MemoryStorage::new();
    storage.store_snapshot(STATE_KEY, b"{\"schema\":1,\"units\":").unwrap();

    let mut venue = SimVenue::with_storage(storage, test_registry());

    let units = venue.engine.list_units();
    assert!(units.iter().all(|u| u.status() == UnitStatus::Available));

    // Still fully usable, and the next write replaces the corrupt document
    venue.engine.start_rental("basic-karts-1", 30, 20).unwrap();
    let mut venue = venue.restart(test_registry());
    assert_eq!(venue.engine.get_unit("basic-karts-1").unwrap().status(), UnitStatus::Rented);
}

#[test]
fn inconsistent_unit_state_is_discarded() {
    let storage = MemoryStorage::new();
    let doc = r#"{"schema":1,"units":{
        "basic-karts-1":{"status":"available","paidUntil":1800000},
        "basic-karts-2":{"status":"overdue","rentalStartedAt":0,"paidUntil":1800000,"overdueSince":1800000,"intendedDurationMinutes":30,"intendedPrice":20},
        "basic-karts-3":{"status":"rented","rentalStartedAt":0,"paidUntil":1800000,"intendedDurationMinutes":30,"intendedPrice":20}
    }}"#;
    storage.store_snapshot(STATE_KEY, doc.as_bytes()).unwrap();

    let mut venue = SimVenue::with_storage(storage, test_registry());

    let statuses: Vec<_> =
        venue.engine.list_units().iter().take(3).map(|u| u.status()).collect();
    assert_eq!(statuses, vec![UnitStatus::Available, UnitStatus::Available, UnitStatus::Rented]);
}

#[test]
fn separate_keys_keep_separate_venues() {
    let storage = MemoryStorage::new();
    let clock = SimClock::new();

    let mut first =
        SimVenue::open(storage.clone(), test_registry(), clock.clone(), RecordingSink::new());
    first.engine.start_rental("basic-karts-1", 30, 20).unwrap();

    let config = EngineConfig {
        state_key: "rental_state.v2".into(),
        history_key: "rental_history.v2".into(),
        ..Default::default()
    };
    let mut second =
        RentalEngine::open(config, clock, storage, RecordingSink::new(), test_registry());

    assert_eq!(second.get_unit("basic-karts-1").unwrap().status(), UnitStatus::Available);
}
