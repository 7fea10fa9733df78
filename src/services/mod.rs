//! Domain services layered over the graph store.
//!
//! [`Registry`] is the entry point; it owns the store, the identity cache,
//! and the key locks, and hands out borrowing service views for the catalog,
//! components, properties, and flags. Strict operations raise errors on
//! conflicts; their non-strict counterparts report the routine cases through
//! outcome enums instead.

pub mod auth;
pub mod catalog;
pub mod component;
pub mod flag;
pub(crate) mod locks;
pub mod property;
mod registry;

pub use catalog::CatalogService;
pub use component::ComponentService;
pub use flag::FlagService;
pub use property::{PropertyAssignment, PropertyService};
pub use registry::Registry;

/// Outcome of a non-strict add: the entity, tagged by whether it was
/// created by this call or already present.
#[derive(Debug, Clone, PartialEq)]
pub enum AddOutcome<T> {
    /// The entity was created by this call.
    Created(T),
    /// An active entity with the same unique key already existed.
    Existing(T),
}

impl<T> AddOutcome<T> {
    /// Unwraps the entity, discarding the created/existing tag.
    pub fn into_inner(self) -> T {
        match self {
            Self::Created(inner) | Self::Existing(inner) => inner,
        }
    }

    /// Checks whether this call created the entity.
    #[must_use]
    pub const fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Outcome of a non-strict connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// A new connection edge was written; carries its id.
    Connected(i64),
    /// A connection was already active at the requested start time.
    AlreadyConnected,
}

/// Outcome of a non-strict subcomponent link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    /// A new containment edge was written; carries its id.
    Linked(i64),
    /// The containment link already existed.
    AlreadyPresent,
}

/// Temporal restriction for interval queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeFilter {
    /// Intervals containing the given time.
    At(i64),
    /// Intervals overlapping `[from, to)`.
    Range(i64, i64),
    /// No temporal restriction.
    All,
}
