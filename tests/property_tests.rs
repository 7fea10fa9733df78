//! Randomized invariant tests.
//!
//! Random sequences of connect/disconnect and set/unset operations, with
//! arbitrary timestamps, must never leave two overlapping active intervals
//! for the same unordered component pair or the same (component, property
//! type) pair. Conflict errors along the way are expected and ignored; the
//! invariant is on whatever state survives.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use chronograph::models::{Timestamp, Validity};
use chronograph::services::{Registry, TimeFilter};
use chronograph::InMemoryGraphStore;
use proptest::prelude::*;

const COMPONENTS: [&str; 4] = ["c0", "c1", "c2", "c3"];

fn registry() -> Registry {
    let registry = Registry::new(InMemoryGraphStore::new());
    registry.catalog().add_component_type("node", "").unwrap();
    registry
        .catalog()
        .add_property_type("state", "", ".*", 1, "", &["node"])
        .unwrap();
    for name in COMPONENTS {
        registry.components().add(name, "node", None).unwrap();
    }
    registry
}

fn ts(time: i64) -> Timestamp {
    Timestamp::new(time, "prop")
}

/// Sorted intervals must be pairwise disjoint, with any open interval last.
fn assert_disjoint(mut intervals: Vec<Validity>, context: &str) {
    intervals.sort_by_key(Validity::start_time);
    for pair in intervals.windows(2) {
        let end = pair[0]
            .end_time()
            .unwrap_or_else(|| panic!("open interval before another one: {context}"));
        assert!(
            end <= pair[1].start_time(),
            "overlapping intervals in {context}: [{}, {end}) and [{}, ...)",
            pair[0].start_time(),
            pair[1].start_time()
        );
    }
}

#[derive(Debug, Clone)]
enum ConnectOp {
    Connect { a: usize, b: usize, start: i64, end: Option<i64> },
    Disconnect { a: usize, b: usize, at: i64 },
}

fn connect_op() -> impl Strategy<Value = ConnectOp> {
    let connect = (0..4_usize, 0..4_usize, 0..1000_i64, proptest::option::of(0..1000_i64))
        .prop_map(|(a, b, start, end)| ConnectOp::Connect { a, b, start, end });
    let disconnect =
        (0..4_usize, 0..4_usize, 0..1000_i64).prop_map(|(a, b, at)| ConnectOp::Disconnect { a, b, at });
    prop_oneof![3 => connect, 1 => disconnect]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn connections_never_overlap(ops in proptest::collection::vec(connect_op(), 1..40)) {
        let registry = registry();
        for op in ops {
            // Conflict and validation errors are routine here.
            match op {
                ConnectOp::Connect { a, b, start, end } => {
                    let _ = registry.components().try_connect(
                        COMPONENTS[a],
                        COMPONENTS[b],
                        ts(start),
                        end.map(ts),
                    );
                },
                ConnectOp::Disconnect { a, b, at } => {
                    let _ = registry
                        .components()
                        .disconnect(COMPONENTS[a], COMPONENTS[b], ts(at));
                },
            }
        }

        for (i, a) in COMPONENTS.iter().enumerate() {
            for b in &COMPONENTS[i + 1..] {
                let intervals: Vec<Validity> = registry
                    .components()
                    .get_connections(a, TimeFilter::All, Some(&[b]))
                    .unwrap()
                    .into_iter()
                    .map(|c| c.validity)
                    .collect();
                assert_disjoint(intervals, &format!("connections {a}-{b}"));
            }
        }
    }

    #[test]
    fn property_intervals_never_overlap(
        ops in proptest::collection::vec(
            (0..4_usize, 0..3_u8, 0..1000_i64, proptest::option::of(0..1000_i64), any::<bool>()),
            1..40,
        )
    ) {
        let registry = registry();
        for (component, kind, time, end, force) in ops {
            let name = COMPONENTS[component];
            if kind == 0 {
                let _ = registry.properties().unset_property(name, "state", ts(time));
            } else {
                let value = format!("v{}", time % 5);
                let _ = registry.properties().set_property(
                    name,
                    "state",
                    vec![value],
                    ts(time),
                    end.map(ts),
                    force,
                );
            }
        }

        for name in COMPONENTS {
            let intervals: Vec<Validity> = registry
                .properties()
                .get_properties(name, TimeFilter::All)
                .unwrap()
                .into_iter()
                .map(|a| a.validity)
                .collect();
            assert_disjoint(intervals, &format!("properties of {name}"));
        }
    }
}
