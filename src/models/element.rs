//! Storage-level graph elements: identities, lifecycle, categories, records.
//!
//! Every domain entity is a vertex and every relationship an edge in the
//! underlying property graph. This module defines the raw records the graph
//! store persists, before any domain typing is applied.
//!
//! # Lifecycle
//!
//! Elements are never hard-deleted. A vertex or edge moves through a tagged
//! lifecycle instead:
//!
//! | Status | Meaning |
//! |--------|---------|
//! | `Active` | The current view of history includes this element |
//! | `Disabled` | Soft-disabled at a recorded time |
//! | `Replaced` | Superseded by another vertex at a recorded time |
//!
//! The tagged variant replaces the boolean-plus-sentinel encoding: there is
//! no "disabled time that means not disabled", and a replaced vertex always
//! names its replacement.

use crate::models::timestamp::Validity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identity of a graph element.
///
/// `Virtual` means "constructed client-side, not yet written to the store";
/// a virtual element has no corresponding storage row. Persisted ids are
/// storage-assigned integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementId {
    /// Not yet persisted.
    Virtual,
    /// Storage-assigned id.
    Persisted(i64),
}

impl ElementId {
    /// Checks if the identity is virtual.
    #[must_use]
    pub const fn is_virtual(&self) -> bool {
        matches!(self, Self::Virtual)
    }

    /// Returns the storage-assigned id, if persisted.
    #[must_use]
    pub const fn persisted(&self) -> Option<i64> {
        match self {
            Self::Virtual => None,
            Self::Persisted(id) => Some(*id),
        }
    }
}

impl Default for ElementId {
    fn default() -> Self {
        Self::Virtual
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Virtual => write!(f, "virtual"),
            Self::Persisted(id) => write!(f, "#{id}"),
        }
    }
}

/// Soft lifecycle state of a vertex or edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LifecycleStatus {
    /// Current; included in the default view of history.
    Active,
    /// Soft-disabled at the recorded time.
    Disabled {
        /// Physical time of disabling, Unix seconds.
        at: i64,
    },
    /// Superseded by another vertex at the recorded time.
    Replaced {
        /// Physical time of replacement, Unix seconds.
        at: i64,
        /// Storage id of the replacement vertex.
        by: i64,
    },
}

impl LifecycleStatus {
    /// Checks if the element is active.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Returns the disable/replace time, if any.
    #[must_use]
    pub const fn ended_at(&self) -> Option<i64> {
        match self {
            Self::Active => None,
            Self::Disabled { at } | Self::Replaced { at, .. } => Some(*at),
        }
    }

    /// Returns the replacement vertex id, if replaced.
    #[must_use]
    pub const fn replacement(&self) -> Option<i64> {
        match self {
            Self::Replaced { by, .. } => Some(*by),
            _ => None,
        }
    }
}

impl Default for LifecycleStatus {
    fn default() -> Self {
        Self::Active
    }
}

/// Vertex category: the tag of the tagged union over all domain kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VertexCategory {
    /// A physical hardware component.
    Component,
    /// A kind of component (e.g. "router").
    ComponentType,
    /// A revision of a component type.
    ComponentVersion,
    /// A recorded property value set.
    Property,
    /// A kind of property (units, regex, value count).
    PropertyType,
    /// An operational flag instance.
    Flag,
    /// A kind of flag.
    FlagType,
    /// A severity level for flags.
    FlagSeverity,
    /// A registry user.
    User,
    /// A user group carrying permissions.
    UserGroup,
}

impl VertexCategory {
    /// Returns all vertex category variants.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Component,
            Self::ComponentType,
            Self::ComponentVersion,
            Self::Property,
            Self::PropertyType,
            Self::Flag,
            Self::FlagType,
            Self::FlagSeverity,
            Self::User,
            Self::UserGroup,
        ]
    }

    /// Returns the category as the string stored in the graph.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Component => "component",
            Self::ComponentType => "component_type",
            Self::ComponentVersion => "component_version",
            Self::Property => "property",
            Self::PropertyType => "property_type",
            Self::Flag => "flag",
            Self::FlagType => "flag_type",
            Self::FlagSeverity => "flag_severity",
            Self::User => "user",
            Self::UserGroup => "user_group",
        }
    }

    /// Parses a category from its stored string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::all().iter().copied().find(|c| c.as_str() == s)
    }
}

impl fmt::Display for VertexCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for VertexCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown vertex category: {s}"))
    }
}

/// Edge category: the kind of relationship an edge represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeCategory {
    /// Component → `ComponentType` assignment.
    ComponentType,
    /// Component → `ComponentVersion` link (at most one).
    Version,
    /// `ComponentVersion` → `ComponentType` allowed-type selection.
    VersionAllowedType,
    /// `PropertyType` → `ComponentType` allowed-type selection.
    PropertyAllowedType,
    /// Property → `PropertyType` assignment.
    PropertyType,
    /// Flag → `FlagType` assignment.
    FlagType,
    /// Flag → `FlagSeverity` assignment.
    FlagSeverity,
    /// Flag → Component attachment.
    FlagComponent,
    /// User → `UserGroup` membership.
    UserGroup,
    /// Component ↔ Component physical connection (timestamped).
    Connection,
    /// Property ↔ Component assignment over time (timestamped).
    PropertyAssignment,
    /// Component → Component structural containment (untimestamped).
    Subcomponent,
}

impl EdgeCategory {
    /// Returns all edge category variants.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::ComponentType,
            Self::Version,
            Self::VersionAllowedType,
            Self::PropertyAllowedType,
            Self::PropertyType,
            Self::FlagType,
            Self::FlagSeverity,
            Self::FlagComponent,
            Self::UserGroup,
            Self::Connection,
            Self::PropertyAssignment,
            Self::Subcomponent,
        ]
    }

    /// Returns the category as the string stored in the graph.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ComponentType => "component_type",
            Self::Version => "version",
            Self::VersionAllowedType => "version_allowed_type",
            Self::PropertyAllowedType => "property_allowed_type",
            Self::PropertyType => "property_type",
            Self::FlagType => "flag_type",
            Self::FlagSeverity => "flag_severity",
            Self::FlagComponent => "flag_component",
            Self::UserGroup => "user_group",
            Self::Connection => "rel_connection",
            Self::PropertyAssignment => "rel_property",
            Self::Subcomponent => "rel_subcomponent",
        }
    }

    /// Parses a category from its stored string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::all().iter().copied().find(|c| c.as_str() == s)
    }

    /// Checks whether the category is structural.
    ///
    /// Structural edges represent a selection the operator must re-make
    /// explicitly for a replacement vertex; they are excluded from the
    /// replace migration.
    #[must_use]
    pub const fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::ComponentType
                | Self::Version
                | Self::VersionAllowedType
                | Self::PropertyAllowedType
                | Self::FlagType
                | Self::FlagSeverity
        )
    }

    /// Checks whether edges of this category carry a validity interval.
    #[must_use]
    pub const fn is_timestamped(&self) -> bool {
        matches!(self, Self::Connection | Self::PropertyAssignment)
    }
}

impl fmt::Display for EdgeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EdgeCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown edge category: {s}"))
    }
}

/// A single attribute value on a vertex.
///
/// List values are first-class: the store persists them as repeated
/// properties, never as one serialized blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    /// A text value.
    Text(String),
    /// An integer value.
    Int(i64),
    /// An ordered multi-value.
    List(Vec<String>),
}

impl AttrValue {
    /// Returns the text value, if this is a text attribute.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer value, if this is an integer attribute.
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the list value, if this is a list attribute.
    #[must_use]
    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::List(v) => Some(v),
            _ => None,
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for AttrValue {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<Vec<String>> for AttrValue {
    fn from(v: Vec<String>) -> Self {
        Self::List(v)
    }
}

/// Ordered attribute bag for a vertex.
pub type AttrMap = BTreeMap<String, AttrValue>;

/// A vertex as stored in the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VertexRecord {
    /// Element identity.
    pub id: ElementId,
    /// Entity kind tag.
    pub category: VertexCategory,
    /// Physical time of creation, Unix seconds; stamped at persist.
    pub time_added: i64,
    /// Soft lifecycle state.
    pub status: LifecycleStatus,
    /// Domain attributes.
    pub attrs: AttrMap,
}

impl VertexRecord {
    /// Creates a virtual (unpersisted) vertex record.
    #[must_use]
    pub const fn new(category: VertexCategory, attrs: AttrMap) -> Self {
        Self {
            id: ElementId::Virtual,
            category,
            time_added: 0,
            status: LifecycleStatus::Active,
            attrs,
        }
    }

    /// Checks if the vertex is active.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Returns a text attribute by name.
    #[must_use]
    pub fn text_attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).and_then(AttrValue::as_text)
    }

    /// Returns an integer attribute by name.
    #[must_use]
    pub fn int_attr(&self, name: &str) -> Option<i64> {
        self.attrs.get(name).and_then(AttrValue::as_int)
    }

    /// Returns a list attribute by name.
    #[must_use]
    pub fn list_attr(&self, name: &str) -> Option<&[String]> {
        self.attrs.get(name).and_then(AttrValue::as_list)
    }
}

/// An edge as stored in the graph.
///
/// An edge does not own its endpoints: both must be persisted vertices
/// before the edge can be written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    /// Element identity.
    pub id: ElementId,
    /// Relationship kind tag.
    pub category: EdgeCategory,
    /// Source vertex id (the owner of the relationship).
    pub out_vertex: i64,
    /// Target vertex id.
    pub in_vertex: i64,
    /// Physical time of creation, Unix seconds; stamped at persist.
    pub time_added: i64,
    /// Soft lifecycle state.
    pub status: LifecycleStatus,
    /// Validity interval for timestamped categories, `None` otherwise.
    pub validity: Option<Validity>,
}

impl EdgeRecord {
    /// Creates a virtual untimestamped edge record.
    #[must_use]
    pub const fn new(category: EdgeCategory, out_vertex: i64, in_vertex: i64) -> Self {
        Self {
            id: ElementId::Virtual,
            category,
            out_vertex,
            in_vertex,
            time_added: 0,
            status: LifecycleStatus::Active,
            validity: None,
        }
    }

    /// Creates a virtual timestamped edge record.
    #[must_use]
    pub const fn timestamped(
        category: EdgeCategory,
        out_vertex: i64,
        in_vertex: i64,
        validity: Validity,
    ) -> Self {
        Self {
            id: ElementId::Virtual,
            category,
            out_vertex,
            in_vertex,
            time_added: 0,
            status: LifecycleStatus::Active,
            validity: Some(validity),
        }
    }

    /// Checks if the edge is active.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Checks if the edge touches the given vertex on either side.
    #[must_use]
    pub const fn touches(&self, vertex_id: i64) -> bool {
        self.out_vertex == vertex_id || self.in_vertex == vertex_id
    }

    /// Returns the endpoint opposite to `vertex_id`.
    ///
    /// Returns `None` if the edge does not touch `vertex_id`.
    #[must_use]
    pub const fn other_endpoint(&self, vertex_id: i64) -> Option<i64> {
        if self.out_vertex == vertex_id {
            Some(self.in_vertex)
        } else if self.in_vertex == vertex_id {
            Some(self.out_vertex)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::timestamp::Timestamp;

    #[test]
    fn test_element_id() {
        assert!(ElementId::Virtual.is_virtual());
        assert_eq!(ElementId::Virtual.persisted(), None);
        assert_eq!(ElementId::Persisted(7).persisted(), Some(7));
        assert_eq!(ElementId::Persisted(7).to_string(), "#7");
    }

    #[test]
    fn test_lifecycle_status() {
        assert!(LifecycleStatus::Active.is_active());
        assert_eq!(LifecycleStatus::Active.ended_at(), None);

        let disabled = LifecycleStatus::Disabled { at: 100 };
        assert!(!disabled.is_active());
        assert_eq!(disabled.ended_at(), Some(100));
        assert_eq!(disabled.replacement(), None);

        let replaced = LifecycleStatus::Replaced { at: 100, by: 42 };
        assert_eq!(replaced.ended_at(), Some(100));
        assert_eq!(replaced.replacement(), Some(42));
    }

    #[test]
    fn test_category_roundtrip() {
        for c in VertexCategory::all() {
            assert_eq!(VertexCategory::parse(c.as_str()), Some(*c));
        }
        for c in EdgeCategory::all() {
            assert_eq!(EdgeCategory::parse(c.as_str()), Some(*c));
        }
        assert_eq!(VertexCategory::parse("nonsense"), None);
    }

    #[test]
    fn test_structural_classification() {
        assert!(EdgeCategory::ComponentType.is_structural());
        assert!(EdgeCategory::Version.is_structural());
        assert!(EdgeCategory::VersionAllowedType.is_structural());
        assert!(EdgeCategory::PropertyAllowedType.is_structural());
        assert!(EdgeCategory::FlagType.is_structural());
        assert!(EdgeCategory::FlagSeverity.is_structural());

        assert!(!EdgeCategory::Connection.is_structural());
        assert!(!EdgeCategory::PropertyAssignment.is_structural());
        assert!(!EdgeCategory::Subcomponent.is_structural());
        assert!(!EdgeCategory::FlagComponent.is_structural());
        assert!(!EdgeCategory::UserGroup.is_structural());
        assert!(!EdgeCategory::PropertyType.is_structural());
    }

    #[test]
    fn test_timestamped_classification() {
        assert!(EdgeCategory::Connection.is_timestamped());
        assert!(EdgeCategory::PropertyAssignment.is_timestamped());
        assert!(!EdgeCategory::Subcomponent.is_timestamped());
    }

    #[test]
    fn test_edge_endpoints() {
        let e = EdgeRecord::timestamped(
            EdgeCategory::Connection,
            1,
            2,
            Validity::open(Timestamp::new(100, "tester")),
        );
        assert!(e.touches(1));
        assert!(e.touches(2));
        assert!(!e.touches(3));
        assert_eq!(e.other_endpoint(1), Some(2));
        assert_eq!(e.other_endpoint(2), Some(1));
        assert_eq!(e.other_endpoint(3), None);
    }

    #[test]
    fn test_vertex_attrs() {
        let mut attrs = AttrMap::new();
        attrs.insert("name".to_string(), "r1".into());
        attrs.insert("n_values".to_string(), 2i64.into());
        attrs.insert(
            "values".to_string(),
            vec!["a".to_string(), "b".to_string()].into(),
        );

        let v = VertexRecord::new(VertexCategory::Component, attrs);
        assert_eq!(v.text_attr("name"), Some("r1"));
        assert_eq!(v.int_attr("n_values"), Some(2));
        assert_eq!(v.list_attr("values").map(<[String]>::len), Some(2));
        assert_eq!(v.text_attr("missing"), None);
        assert!(v.id.is_virtual());
    }
}
