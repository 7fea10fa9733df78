//! Data models for chronograph.
//!
//! This module contains the temporal primitives, the storage-level element
//! records, and the typed domain entities layered on top of them.

mod component;
mod element;
mod flag;
mod listing;
mod property;
mod timestamp;
mod user;

pub use component::{
    Component, ComponentSnapshot, ComponentType, ComponentVersion, Connection, ATTR_COMMENTS,
    ATTR_NAME,
};
pub use element::{
    AttrMap, AttrValue, EdgeCategory, EdgeRecord, ElementId, LifecycleStatus, VertexCategory,
    VertexRecord,
};
pub(crate) use flag::flag_window;
pub use flag::{Flag, FlagSeverity, FlagType};
pub use listing::{
    ComponentFilter, FlagFilter, ListRange, NameFilter, OrderBy, OrderDirection,
    PropertyTypeFilter, VersionFilter,
};
pub use property::{
    Property, PropertyType, ATTR_ALLOWED_REGEX, ATTR_N_VALUES, ATTR_UNITS, ATTR_VALUES,
};
pub use timestamp::{Timestamp, Validity};
pub use user::{User, UserGroup};
