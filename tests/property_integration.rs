//! Property engine integration tests.
//!
//! Exercises the partition rules on same-type property intervals against
//! the SQLite store: implicit close-over, force semantics, and history
//! queries.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use chronograph::models::Timestamp;
use chronograph::services::{Registry, TimeFilter};
use chronograph::{Error, SqliteGraphStore};
use tempfile::TempDir;
use test_case::test_case;

fn registry() -> (TempDir, Registry) {
    let temp_dir = TempDir::new().unwrap();
    let store = SqliteGraphStore::new(temp_dir.path().join("registry.db")).unwrap();
    let registry = Registry::new(store);
    registry.catalog().add_component_type("computer", "").unwrap();
    registry
        .catalog()
        .add_property_type("OS", "", ".*", 1, "operating system", &["computer"])
        .unwrap();
    registry
        .catalog()
        .add_property_type("cores", "count", r"^\d+$", 1, "", &["computer"])
        .unwrap();
    registry.components().add("host1", "computer", None).unwrap();
    (temp_dir, registry)
}

fn ts(time: i64) -> Timestamp {
    Timestamp::new(time, "tester")
}

fn values(v: &str) -> Vec<String> {
    vec![v.to_string()]
}

#[test]
fn test_history_partitions_time() {
    let (_guard, registry) = registry();
    let properties = registry.properties();
    properties
        .set_property("host1", "OS", values("Linux"), ts(100), None, false)
        .unwrap();
    properties
        .set_property("host1", "OS", values("BSD"), ts(200), None, false)
        .unwrap();
    properties
        .set_property("host1", "OS", values("Plan9"), ts(300), None, false)
        .unwrap();

    let history = properties.get_properties("host1", TimeFilter::All).unwrap();
    assert_eq!(history.len(), 3);
    // Each interval ends exactly where the next begins.
    for pair in history.windows(2) {
        assert_eq!(pair[0].validity.end_time(), Some(pair[1].validity.start_time()));
    }

    // Point queries see exactly one OS at any covered moment.
    for (at, expected) in [(150, "Linux"), (250, "BSD"), (350, "Plan9")] {
        let at_time = properties
            .get_properties("host1", TimeFilter::At(at))
            .unwrap();
        assert_eq!(at_time.len(), 1);
        assert_eq!(at_time[0].property.values, values(expected));
    }
}

#[test]
fn test_different_types_are_independent() {
    let (_guard, registry) = registry();
    let properties = registry.properties();
    properties
        .set_property("host1", "OS", values("Linux"), ts(100), None, false)
        .unwrap();
    properties
        .set_property("host1", "cores", values("16"), ts(100), None, false)
        .unwrap();

    let at_150 = properties
        .get_properties("host1", TimeFilter::At(150))
        .unwrap();
    assert_eq!(at_150.len(), 2);

    // Closing one type leaves the other running.
    properties.unset_property("host1", "OS", ts(200)).unwrap();
    let at_250 = properties
        .get_properties("host1", TimeFilter::At(250))
        .unwrap();
    assert_eq!(at_250.len(), 1);
    assert_eq!(at_250[0].property.property_type.name, "cores");
}

// With an interval starting at 300 on record, each case states whether
// an earlier write with the given end and force flag is accepted.
#[test_case(None, false, false; "open ended without force")]
#[test_case(None, true, true; "open ended with force is auto closed")]
#[test_case(Some(250), false, false; "explicit end without force")]
#[test_case(Some(250), true, false; "force with an explicit end is ambiguous")]
#[test_case(Some(350), true, false; "explicit end past the later start")]
fn test_insert_before_existing(end: Option<i64>, force: bool, accepted: bool) {
    let (_guard, registry) = registry();
    registry
        .properties()
        .set_property("host1", "OS", values("BSD"), ts(300), None, false)
        .unwrap();

    let end = end.map(ts);
    let result = registry
        .properties()
        .set_property("host1", "OS", values("Linux"), ts(100), end, force);
    assert_eq!(result.is_ok(), accepted, "unexpected outcome: {result:?}");

    if accepted {
        // Whatever was inserted never reaches into the later interval.
        let history = registry
            .properties()
            .get_properties("host1", TimeFilter::All)
            .unwrap();
        let early = history
            .iter()
            .find(|a| a.validity.start_time() == 100)
            .unwrap();
        assert!(early.validity.end_time().unwrap() <= 300);
    }
}

#[test]
fn test_rejected_writes_leave_history_unchanged() {
    let (_guard, registry) = registry();
    let properties = registry.properties();
    properties
        .set_property("host1", "OS", values("Linux"), ts(100), Some(ts(300)), false)
        .unwrap();
    properties
        .set_property("host1", "OS", values("BSD"), ts(300), None, false)
        .unwrap();
    let before = properties.get_properties("host1", TimeFilter::All).unwrap();

    // A write inside the first interval with a later interval on record is
    // rejected without closing the running interval.
    let err = properties.set_property("host1", "OS", values("Plan9"), ts(200), None, false);
    assert!(matches!(err, Err(Error::SetBeforeExisting { .. })));
    assert_eq!(
        properties.get_properties("host1", TimeFilter::All).unwrap(),
        before
    );

    // The ambiguous forced write is rejected the same way.
    let err =
        properties.set_property("host1", "OS", values("Plan9"), ts(200), Some(ts(250)), true);
    assert!(matches!(err, Err(Error::OverlappingProperty(_))));
    assert_eq!(
        properties.get_properties("host1", TimeFilter::All).unwrap(),
        before
    );
}

#[test]
fn test_failed_replace_keeps_mistaken_record() {
    let (_guard, registry) = registry();
    let properties = registry.properties();
    properties
        .set_property("host1", "cores", values("16"), ts(100), None, false)
        .unwrap();
    let before = properties.get_properties("host1", TimeFilter::All).unwrap();

    // A replacement value failing the type's regex is rejected before the
    // mistaken record is disabled.
    let err = properties.replace_property("host1", "cores", values("many"), ts(100), None);
    assert!(matches!(err, Err(Error::Validation(_))));

    let after = properties.get_properties("host1", TimeFilter::All).unwrap();
    assert_eq!(after, before);
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].property.values, values("16"));
}

#[test]
fn test_range_query_spans_intervals() {
    let (_guard, registry) = registry();
    let properties = registry.properties();
    properties
        .set_property("host1", "OS", values("Linux"), ts(100), Some(ts(200)), false)
        .unwrap();
    properties
        .set_property("host1", "OS", values("BSD"), ts(400), None, false)
        .unwrap();

    let over = properties
        .get_properties("host1", TimeFilter::Range(150, 450))
        .unwrap();
    assert_eq!(over.len(), 2);

    // The gap between the intervals is empty.
    let gap = properties
        .get_properties("host1", TimeFilter::At(300))
        .unwrap();
    assert!(gap.is_empty());
}

#[test]
fn test_validation_failures_leave_no_trace() {
    let (_guard, registry) = registry();
    let properties = registry.properties();

    let err = properties.set_property("host1", "cores", values("many"), ts(100), None, false);
    assert!(matches!(err, Err(Error::Validation(_))));

    let err = properties.set_property(
        "host1",
        "OS",
        vec!["Linux".to_string(), "BSD".to_string()],
        ts(100),
        None,
        false,
    );
    assert!(matches!(err, Err(Error::Validation(_))));

    assert!(properties
        .get_properties("host1", TimeFilter::All)
        .unwrap()
        .is_empty());
}

#[test]
fn test_replace_property_rewrites_values_in_place() {
    let (_guard, registry) = registry();
    let properties = registry.properties();
    properties
        .set_property("host1", "OS", values("Lunix"), ts(100), Some(ts(200)), false)
        .unwrap();

    properties
        .replace_property("host1", "OS", values("Linux"), ts(100), Some(ts(200)))
        .unwrap();

    let history = properties.get_properties("host1", TimeFilter::All).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].property.values, values("Linux"));
    assert_eq!(history[0].validity.end_time(), Some(200));
}
