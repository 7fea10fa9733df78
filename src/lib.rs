//! # Chronograph
//!
//! A bitemporal asset and connectivity registry for hardware inventory.
//!
//! Chronograph tracks components, their types and versions, properties,
//! physical connections, and operational flags in a property graph. Nothing
//! is ever hard-deleted: entities are soft-replaced and soft-disabled over
//! time, so point-in-time and interval queries over properties and
//! connections can be answered for any moment in history.
//!
//! ## Features
//!
//! - Soft lifecycle on every vertex and edge (`Active` / `Disabled` /
//!   `Replaced`) with full history retained
//! - Half-open validity intervals on connections and property assignments,
//!   with overlap and duplicate detection
//! - Pluggable graph store (`SQLite` default, in-memory for tests) behind a
//!   narrow traversal trait
//! - Per-registry identity cache with reference identity per persisted id
//! - Static permission gate over mutating operations
//!
//! ## Example
//!
//! ```rust,ignore
//! use chronograph::services::Registry;
//! use chronograph::storage::SqliteGraphStore;
//!
//! let registry = Registry::new(SqliteGraphStore::new("inventory.db")?);
//! registry.catalog().add_component_type("router", "core routers")?;
//! let r1 = registry.components().add("r1", "router", None)?;
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
// multiple_crate_versions is inherently crate-level (detects duplicate transitive dependencies).
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

// Module declarations
pub mod cli;
pub mod config;
pub mod models;
pub mod observability;
pub mod services;
pub mod storage;

// Re-exports for convenience
pub use config::{CyclePolicy, RegistryConfig};
pub use models::{
    Component, ComponentType, ComponentVersion, EdgeCategory, ElementId, Flag, FlagSeverity,
    FlagType, LifecycleStatus, Property, PropertyType, Timestamp, User, UserGroup, Validity,
    VertexCategory,
};
pub use services::Registry;
pub use storage::{GraphStore, InMemoryGraphStore, SqliteGraphStore};

/// Error type for chronograph operations.
///
/// Uses `thiserror` for automatic `Display` and `Error` trait implementations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `AlreadyExists` | Adding an entity whose unique key is already active (strict mode) |
/// | `NotPersisted` | An operation requires a vertex that was never written to the store |
/// | `NotFound` | A referenced entity cannot be found in the store |
/// | `SelfConnection` | Connecting or sub-linking a component to itself |
/// | `AlreadyConnected` | A connection between the pair is already active at the start time |
/// | `AlreadyDisconnected` | Disconnecting a pair with no connection active at the end time |
/// | `OverlappingConnection` | The new interval would overlap a later active connection |
/// | `AlreadySubcomponent` | The subcomponent link already exists (strict mode) |
/// | `IsSubcomponentOfOther` | The link would create a containment cycle |
/// | `WrongComponentType` | The component's type is not allowed for the property type |
/// | `SameProperty` | Setting a property to the values already in effect at that time |
/// | `SetBeforeExisting` | Starting a property before an existing interval without `force` |
/// | `OverlappingProperty` | Property intervals would overlap, or `force` with an explicit end |
/// | `AlreadyEnded` | Closing a validity interval that already has a finite end |
/// | `Validation` | Value-count mismatch, regex mismatch, empty allowed-types list |
/// | `Unauthorized` | The acting user lacks the exact permission for a protected operation |
/// | `OperationFailed` | The underlying graph store fails (I/O, SQL, poisoned lock) |
#[derive(Debug, ThisError)]
pub enum Error {
    /// An entity with the same unique key is already active.
    ///
    /// Recoverable: fetch the existing entity instead of adding, or use the
    /// non-strict add which returns the persisted match.
    #[error("{kind} '{name}' already exists")]
    AlreadyExists {
        /// The entity kind.
        kind: &'static str,
        /// The unique key that collided.
        name: String,
    },

    /// An operation required a persisted vertex, but the element is virtual.
    #[error("{0} has not been added to the store")]
    NotPersisted(String),

    /// A referenced entity does not exist in the store.
    #[error("not found: {0}")]
    NotFound(String),

    /// A component cannot be connected or sub-linked to itself.
    #[error("component '{0}' cannot be connected to itself")]
    SelfConnection(String),

    /// The pair already has a connection active at the requested start time.
    #[error("components '{a}' and '{b}' are already connected at time {at}")]
    AlreadyConnected {
        /// First component name.
        a: String,
        /// Second component name.
        b: String,
        /// The contested start time.
        at: i64,
    },

    /// No connection between the pair is active at the requested end time.
    #[error("components '{a}' and '{b}' are not connected at time {at}")]
    AlreadyDisconnected {
        /// First component name.
        a: String,
        /// Second component name.
        b: String,
        /// The contested end time.
        at: i64,
    },

    /// The new connection interval would overlap an existing active one.
    #[error("connection between '{a}' and '{b}' would overlap an existing connection starting at {existing_start}")]
    OverlappingConnection {
        /// First component name.
        a: String,
        /// Second component name.
        b: String,
        /// Start time of the conflicting existing connection.
        existing_start: i64,
    },

    /// The subcomponent link already exists.
    #[error("'{child}' is already a subcomponent of '{parent}'")]
    AlreadySubcomponent {
        /// The containing component.
        parent: String,
        /// The contained component.
        child: String,
    },

    /// The link would create a containment cycle.
    #[error("'{parent}' is already a subcomponent of '{child}'; link would create a cycle")]
    IsSubcomponentOfOther {
        /// The would-be containing component.
        parent: String,
        /// The would-be contained component.
        child: String,
    },

    /// The component's type is not among the property type's allowed types.
    #[error("component type '{component_type}' is not allowed for property type '{property_type}'")]
    WrongComponentType {
        /// The component's type name.
        component_type: String,
        /// The property type name.
        property_type: String,
    },

    /// The identical values are already in effect at the requested time.
    #[error("property of type '{0}' already has these values at the requested time")]
    SameProperty(String),

    /// A property interval of the same type starts after the requested start.
    ///
    /// Raised without `force`; with `force` and no explicit end, the new
    /// interval is auto-closed at the next interval's start instead.
    #[error("a property of type '{property_type}' already starts at {existing_start}; use force to insert before it")]
    SetBeforeExisting {
        /// The property type name.
        property_type: String,
        /// Start time of the existing later interval.
        existing_start: i64,
    },

    /// Property intervals would overlap, or `force` was combined with an
    /// explicit end while an auto-close end was also being inferred.
    #[error("property of type '{0}' would overlap an existing interval")]
    OverlappingProperty(String),

    /// The validity interval already has a finite end (double close).
    #[error("{0} already has an end time")]
    AlreadyEnded(String),

    /// Input failed validation before any state change.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The acting user lacks the permission for a protected operation.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// An operation against the graph store failed.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

impl Error {
    /// Returns true for the temporal-conflict family.
    ///
    /// Temporal conflicts are routine, caller-correctable outcomes (pick
    /// different timestamps or flags), never process-fatal.
    #[must_use]
    pub const fn is_temporal_conflict(&self) -> bool {
        matches!(
            self,
            Self::AlreadyConnected { .. }
                | Self::AlreadyDisconnected { .. }
                | Self::OverlappingConnection { .. }
                | Self::OverlappingProperty(_)
                | Self::SetBeforeExisting { .. }
                | Self::SameProperty(_)
                | Self::AlreadyEnded(_)
        )
    }
}

/// Result type alias for chronograph operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns the current Unix timestamp in seconds.
///
/// Centralized so every lifecycle stamp in the crate agrees on the clock.
/// Falls back to 0 if the system clock is before the Unix epoch.
#[must_use]
pub fn current_timestamp() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
}
