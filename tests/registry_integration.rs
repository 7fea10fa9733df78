//! Registry lifecycle integration tests.
//!
//! Exercises the catalog and component lifecycle end to end against the
//! SQLite store: strict and non-strict adds, soft replace with history,
//! disable cascades, and the permission gate.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use chronograph::models::{ComponentFilter, ListRange, NameFilter, OrderBy, OrderDirection};
use chronograph::services::Registry;
use chronograph::{Error, RegistryConfig, SqliteGraphStore};
use tempfile::TempDir;

fn open_registry(temp_dir: &TempDir) -> Registry {
    let store = SqliteGraphStore::new(temp_dir.path().join("registry.db"))
        .expect("failed to open sqlite store");
    Registry::new(store)
}

#[test]
fn test_catalog_and_component_lifecycle() {
    let temp_dir = TempDir::new().unwrap();
    let registry = open_registry(&temp_dir);

    registry
        .catalog()
        .add_component_type("router", "core routers")
        .unwrap();
    registry
        .catalog()
        .add_component_version("v2", "second revision", "router")
        .unwrap();

    let r1 = registry
        .components()
        .add("r1", "router", Some("v2"))
        .unwrap();
    assert_eq!(r1.component_type.name, "router");
    assert_eq!(r1.version.unwrap().name, "v2");

    // Strict duplicate fails; the non-strict add hands back the original.
    let err = registry.components().add("r1", "router", None);
    assert!(matches!(err, Err(Error::AlreadyExists { .. })));
    let outcome = registry.components().ensure("r1", "router", None).unwrap();
    assert!(!outcome.is_created());
    assert_eq!(outcome.into_inner().name, "r1");

    let count = registry
        .components()
        .count(&ComponentFilter::default())
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn test_unknown_references_are_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let registry = open_registry(&temp_dir);

    let err = registry.components().add("r1", "router", None);
    assert!(matches!(err, Err(Error::NotFound(_))));

    registry.catalog().add_component_type("router", "").unwrap();
    let err = registry.components().add("r1", "router", Some("v9"));
    assert!(matches!(err, Err(Error::NotFound(_))));
}

#[test]
fn test_replace_keeps_history_and_frees_the_name() {
    let temp_dir = TempDir::new().unwrap();
    let registry = open_registry(&temp_dir);

    registry.catalog().add_component_type("router", "").unwrap();
    for name in ["r1", "r2"] {
        registry.components().add(name, "router", None).unwrap();
    }
    registry
        .components()
        .connect(
            "r1",
            "r2",
            chronograph::models::Timestamp::new(100, "tester"),
            None,
        )
        .unwrap();

    let before = registry.stats().unwrap();
    registry
        .components()
        .replace("r1", "r1", "router", None, 500)
        .unwrap();

    // Nothing was hard-deleted: the old vertex is still in the store.
    let after = registry.stats().unwrap();
    assert!(after.vertex_count > before.vertex_count);

    // The same name resolves to the replacement, with the connection intact.
    let connections = registry
        .components()
        .get_connections("r1", chronograph::services::TimeFilter::At(150), None)
        .unwrap();
    assert_eq!(connections.len(), 1);
    assert_eq!(connections[0].peer_name, "r2");
}

#[test]
fn test_disable_cascades_and_listing_hides_it() {
    let temp_dir = TempDir::new().unwrap();
    let registry = open_registry(&temp_dir);

    registry.catalog().add_component_type("router", "").unwrap();
    for name in ["r1", "r2"] {
        registry.components().add(name, "router", None).unwrap();
    }
    registry
        .components()
        .connect(
            "r1",
            "r2",
            chronograph::models::Timestamp::new(100, "tester"),
            None,
        )
        .unwrap();

    registry.components().disable("r1", 200).unwrap();

    let listed = registry
        .components()
        .list(
            &ComponentFilter::default(),
            ListRange::default(),
            OrderBy::Name,
            OrderDirection::Ascending,
        )
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "r2");

    let stats = registry.stats().unwrap();
    assert!(stats.active_vertex_count < stats.vertex_count);
    assert_eq!(stats.active_edge_count, 1); // r2's type link survives
}

#[test]
fn test_listing_orders_and_paginates() {
    let temp_dir = TempDir::new().unwrap();
    let registry = open_registry(&temp_dir);

    registry.catalog().add_component_type("router", "").unwrap();
    for name in ["gamma", "alpha", "beta"] {
        registry.components().add(name, "router", None).unwrap();
    }

    let page = registry
        .components()
        .list(
            &ComponentFilter::default(),
            ListRange::new(1, 1),
            OrderBy::Name,
            OrderDirection::Ascending,
        )
        .unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].name, "beta");

    let descending = registry
        .components()
        .list(
            &ComponentFilter::default(),
            ListRange::default(),
            OrderBy::Name,
            OrderDirection::Descending,
        )
        .unwrap();
    let names: Vec<_> = descending.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["gamma", "beta", "alpha"]);

    let filtered = registry
        .catalog()
        .list_component_types(
            &NameFilter::containing("out"),
            ListRange::default(),
            OrderBy::Name,
            OrderDirection::Ascending,
        )
        .unwrap();
    assert_eq!(filtered.len(), 1);
}

#[test]
fn test_permission_gate_over_shared_database() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("registry.db");

    // Seed users and groups with enforcement off.
    {
        let store = SqliteGraphStore::new(&db_path).unwrap();
        let registry = Registry::new(store);
        registry.catalog().add_component_type("router", "").unwrap();
        registry.catalog().add_user("alice", "lab").unwrap();
        registry.catalog().add_user("bob", "lab").unwrap();
        registry
            .catalog()
            .add_user_group("operators", ["component;add", "component;connect"])
            .unwrap();
        registry
            .catalog()
            .assign_user_to_group("alice", "operators")
            .unwrap();
    }

    let config = RegistryConfig::default()
        .with_data_dir(temp_dir.path())
        .with_permissions(true);

    // Alice holds component;add through her group.
    let store = SqliteGraphStore::new(&db_path).unwrap();
    let as_alice = Registry::with_config(store, config.clone()).acting_as("alice");
    as_alice.components().add("r1", "router", None).unwrap();

    // component;disable is not in the group's list; exact match only.
    let err = as_alice.components().disable("r1", 100);
    assert!(matches!(err, Err(Error::Unauthorized(_))));

    // Bob has no group, and an anonymous caller is rejected outright.
    let store = SqliteGraphStore::new(&db_path).unwrap();
    let as_bob = Registry::with_config(store, config.clone()).acting_as("bob");
    assert!(matches!(
        as_bob.components().add("r2", "router", None),
        Err(Error::Unauthorized(_))
    ));

    let store = SqliteGraphStore::new(&db_path).unwrap();
    let anonymous = Registry::with_config(store, config);
    assert!(matches!(
        anonymous.components().add("r3", "router", None),
        Err(Error::Unauthorized(_))
    ));

    // Reads are never gated.
    assert!(anonymous.components().get("r1").is_ok());
}
