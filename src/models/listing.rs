//! Paginated browsing: ranges, ordering, and per-kind list filters.
//!
//! `get_list`/`get_count` take a filter, an ordering, and a range slice.
//! Filters combine a substring match on the entity's own name with exact
//! matches on related-entity names (a component's type, a version's allowed
//! type), mirroring the positional filter tuples of the browse API.

use serde::{Deserialize, Serialize};

/// A range slice over an ordered listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListRange {
    /// Number of leading matches to skip.
    pub offset: usize,
    /// Maximum number of matches to return.
    pub limit: usize,
}

impl ListRange {
    /// Creates a range slice.
    #[must_use]
    pub const fn new(offset: usize, limit: usize) -> Self {
        Self { offset, limit }
    }
}

impl Default for ListRange {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 100,
        }
    }
}

/// Field to order a listing by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderBy {
    /// Order by entity name (ties broken by id).
    #[default]
    Name,
    /// Order by creation time (ties broken by name, then id).
    TimeAdded,
}

/// Direction of an ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderDirection {
    /// Ascending order.
    #[default]
    Ascending,
    /// Descending order.
    Descending,
}

impl OrderDirection {
    /// Returns the SQL keyword for the direction.
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC",
        }
    }
}

/// Filter for name-keyed catalog entities (types, severities, users, groups).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameFilter {
    /// Substring match on the entity name.
    pub name: Option<String>,
}

impl NameFilter {
    /// Creates a filter matching names containing `substring`.
    #[must_use]
    pub fn containing(substring: impl Into<String>) -> Self {
        Self {
            name: Some(substring.into()),
        }
    }
}

/// Filter for component listings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentFilter {
    /// Substring match on the component name.
    pub name: Option<String>,
    /// Exact match on the component's type name.
    pub type_name: Option<String>,
    /// Exact match on the component's version name.
    pub version_name: Option<String>,
}

/// Filter for component version listings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionFilter {
    /// Substring match on the version name.
    pub name: Option<String>,
    /// Exact match on the allowed type's name.
    pub type_name: Option<String>,
}

/// Filter for property type listings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyTypeFilter {
    /// Substring match on the property type name.
    pub name: Option<String>,
    /// Exact match on an allowed component type's name.
    pub allowed_type_name: Option<String>,
}

/// Filter for flag listings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagFilter {
    /// Substring match on the flag name.
    pub name: Option<String>,
    /// Exact match on the flag type's name.
    pub type_name: Option<String>,
    /// Exact match on the severity's name.
    pub severity_name: Option<String>,
}
