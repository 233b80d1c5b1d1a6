//! Property-based tests for the per-unit state machine.
//!
//! Arbitrary operation sequences, with time moving forward between them,
//! must never break the session field invariants, and rejected operations
//! must leave the unit untouched.

use paddock_core::{
    Catalog, CatalogEntry, Registry, Timestamp, Unit, UnitStatus, status_label,
};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Advance(u64),
    Start(u32, u32),
    Expire,
    Confirm(bool),
    EarlyReturn,
    StopOvertime,
    ForceReset,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0u64..4_000_000).prop_map(Op::Advance),
        2 => (0u32..90, 1u32..200).prop_map(|(m, p)| Op::Start(m, p)),
        2 => Just(Op::Expire),
        1 => any::<bool>().prop_map(Op::Confirm),
        1 => Just(Op::EarlyReturn),
        1 => Just(Op::StopOvertime),
        1 => Just(Op::ForceReset),
    ]
}

fn kart() -> Unit {
    let catalog = Catalog::new(vec![CatalogEntry {
        category: "Basic Karts".into(),
        idents: vec!["1".into()],
        price30: 20,
        price1h: 30,
    }]);
    Registry::load(&catalog).unwrap().units()[0].clone()
}

proptest! {
    #[test]
    fn prop_invariants_hold(ops in prop::collection::vec(op_strategy(), 0..60)) {
        let mut unit = kart();
        let mut now = Timestamp::EPOCH;

        for op in ops {
            let before = unit.clone();
            let result = match op {
                Op::Advance(ms) => {
                    now = Timestamp::from_millis(now.as_millis() + ms);
                    Ok(())
                },
                Op::Start(minutes, price) => unit.start(now, minutes, price),
                Op::Expire => {
                    unit.expire_if_due(now);
                    Ok(())
                },
                Op::Confirm(returned) => unit.confirm_return(now, returned).map(|_| ()),
                Op::EarlyReturn => unit.early_return(now).map(|_| ()),
                Op::StopOvertime => unit.stop_overtime(now).map(|_| ()),
                Op::ForceReset => {
                    unit.force_reset();
                    Ok(())
                },
            };

            if result.is_err() {
                prop_assert_eq!(&unit, &before);
            }
            prop_assert!(unit.is_consistent());
            prop_assert!(unit.generation() >= before.generation());

            let available = unit.status() == UnitStatus::Available;
            let cleared = unit.rental_started_at().is_none()
                && unit.paid_until().is_none()
                && unit.overdue_since().is_none();
            prop_assert_eq!(available, cleared);
        }
    }

    #[test]
    fn prop_closing_records_bill_at_least_one_minute(
        minutes in 1u32..120,
        used in 0u64..7_200_000,
    ) {
        let mut unit = kart();
        unit.start(Timestamp::EPOCH, minutes, 20).unwrap();

        let now = Timestamp::from_millis(used);
        if unit.expire_if_due(now) {
            let record = unit.confirm_return(now, true).unwrap().unwrap();
            prop_assert_eq!(record.duration_minutes, minutes);
        } else {
            let record = unit.early_return(now).unwrap();
            prop_assert!(record.duration_minutes >= 1);
            prop_assert_eq!(record.price_paid, 20);
        }
    }
}

#[test]
fn labels_follow_lifecycle() {
    let mut unit = kart();
    let start = Timestamp::EPOCH;
    assert_eq!(status_label(&unit, start), "20 lei / 30min");

    unit.start(start, 30, 20).unwrap();
    assert_eq!(status_label(&unit, Timestamp::from_millis(60_000)), "-29:00");

    unit.expire_if_due(Timestamp::from_millis(1_800_000));
    assert_eq!(status_label(&unit, Timestamp::from_millis(1_800_000)), "CONFIRM?");

    unit.confirm_return(Timestamp::from_millis(1_800_000), false).unwrap();
    let later = Timestamp::from_millis(1_800_000 + 65_000);
    assert_eq!(status_label(&unit, later), "+01:05");
}
