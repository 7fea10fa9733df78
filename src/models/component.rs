//! Component-family domain entities: types, versions, components.
//!
//! These are typed views over [`VertexRecord`]s. Decoding from a record
//! recovers the vertex-local attributes; cross-references carried by edges
//! (a component's type, its version) are resolved by the service layer and
//! attached here.

use crate::models::element::{
    AttrMap, ElementId, LifecycleStatus, VertexCategory, VertexRecord,
};
use crate::models::timestamp::Validity;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Attribute key for entity names.
pub const ATTR_NAME: &str = "name";
/// Attribute key for free-text comments.
pub const ATTR_COMMENTS: &str = "comments";

/// A kind of component, e.g. "router" or "antenna".
///
/// Names are unique among active component types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentType {
    /// Element identity.
    pub id: ElementId,
    /// Unique name among active component types.
    pub name: String,
    /// Free-text comments.
    pub comments: String,
    /// Physical time of creation, Unix seconds.
    pub time_added: i64,
    /// Soft lifecycle state.
    pub status: LifecycleStatus,
}

impl ComponentType {
    /// Creates a virtual component type.
    #[must_use]
    pub fn new(name: impl Into<String>, comments: impl Into<String>) -> Self {
        Self {
            id: ElementId::Virtual,
            name: name.into(),
            comments: comments.into(),
            time_added: 0,
            status: LifecycleStatus::Active,
        }
    }

    /// Encodes the vertex-local attributes.
    #[must_use]
    pub fn attrs(&self) -> AttrMap {
        let mut attrs = AttrMap::new();
        attrs.insert(ATTR_NAME.to_string(), self.name.clone().into());
        attrs.insert(ATTR_COMMENTS.to_string(), self.comments.clone().into());
        attrs
    }

    /// Decodes a component type from a vertex record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the record has the wrong category or
    /// is missing the name attribute.
    pub fn from_record(record: &VertexRecord) -> Result<Self> {
        expect_category(record, VertexCategory::ComponentType)?;
        Ok(Self {
            id: record.id,
            name: required_name(record)?,
            comments: record.text_attr(ATTR_COMMENTS).unwrap_or_default().to_string(),
            time_added: record.time_added,
            status: record.status,
        })
    }
}

/// A revision of a component type, unique by (name, allowed type).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentVersion {
    /// Element identity.
    pub id: ElementId,
    /// Version name, unique within the allowed type.
    pub name: String,
    /// Free-text comments.
    pub comments: String,
    /// The component type this version applies to.
    pub allowed_type: ComponentType,
    /// Physical time of creation, Unix seconds.
    pub time_added: i64,
    /// Soft lifecycle state.
    pub status: LifecycleStatus,
}

impl ComponentVersion {
    /// Creates a virtual component version for `allowed_type`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        comments: impl Into<String>,
        allowed_type: ComponentType,
    ) -> Self {
        Self {
            id: ElementId::Virtual,
            name: name.into(),
            comments: comments.into(),
            allowed_type,
            time_added: 0,
            status: LifecycleStatus::Active,
        }
    }

    /// Encodes the vertex-local attributes.
    #[must_use]
    pub fn attrs(&self) -> AttrMap {
        let mut attrs = AttrMap::new();
        attrs.insert(ATTR_NAME.to_string(), self.name.clone().into());
        attrs.insert(ATTR_COMMENTS.to_string(), self.comments.clone().into());
        attrs
    }

    /// Decodes a component version from a vertex record plus its resolved
    /// allowed-type edge target.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] on category or attribute mismatch.
    pub fn from_record(record: &VertexRecord, allowed_type: ComponentType) -> Result<Self> {
        expect_category(record, VertexCategory::ComponentVersion)?;
        Ok(Self {
            id: record.id,
            name: required_name(record)?,
            comments: record.text_attr(ATTR_COMMENTS).unwrap_or_default().to_string(),
            allowed_type,
            time_added: record.time_added,
            status: record.status,
        })
    }
}

/// A physical hardware component.
///
/// Names are unique among active components. Every component has a type;
/// the version link is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    /// Element identity.
    pub id: ElementId,
    /// Unique name among active components.
    pub name: String,
    /// The component's type.
    pub component_type: ComponentType,
    /// The component's version, if assigned.
    pub version: Option<ComponentVersion>,
    /// Physical time of creation, Unix seconds.
    pub time_added: i64,
    /// Soft lifecycle state.
    pub status: LifecycleStatus,
}

impl Component {
    /// Creates a virtual component of the given type.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        component_type: ComponentType,
        version: Option<ComponentVersion>,
    ) -> Self {
        Self {
            id: ElementId::Virtual,
            name: name.into(),
            component_type,
            version,
            time_added: 0,
            status: LifecycleStatus::Active,
        }
    }

    /// Encodes the vertex-local attributes.
    #[must_use]
    pub fn attrs(&self) -> AttrMap {
        let mut attrs = AttrMap::new();
        attrs.insert(ATTR_NAME.to_string(), self.name.clone().into());
        attrs
    }

    /// Decodes a component from a vertex record plus its resolved edges.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] on category or attribute mismatch.
    pub fn from_record(
        record: &VertexRecord,
        component_type: ComponentType,
        version: Option<ComponentVersion>,
    ) -> Result<Self> {
        expect_category(record, VertexCategory::Component)?;
        Ok(Self {
            id: record.id,
            name: required_name(record)?,
            component_type,
            version,
            time_added: record.time_added,
            status: record.status,
        })
    }
}

/// A component's connection to a peer, as reported by interval queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    /// Edge identity of the underlying `rel_connection`.
    pub edge_id: ElementId,
    /// The peer component's id.
    pub peer: i64,
    /// The peer component's name.
    pub peer_name: String,
    /// Period the connection is (or was) in effect.
    pub validity: Validity,
}

/// Serializable snapshot of a component with its current surroundings.
///
/// This is the browse/export surface: name and type plus the properties,
/// connections, flags, and containment links in effect at the snapshot time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentSnapshot {
    /// Component name.
    pub name: String,
    /// Type name.
    pub component_type: String,
    /// Version name, if assigned.
    pub version: Option<String>,
    /// Snapshot time, Unix seconds.
    pub at_time: i64,
    /// Properties in effect at the snapshot time: (type name, values).
    pub properties: Vec<(String, Vec<String>)>,
    /// Connections in effect at the snapshot time: peer names.
    pub connections: Vec<String>,
    /// Names of flags covering the snapshot time.
    pub flags: Vec<String>,
    /// Names of direct subcomponents.
    pub subcomponents: Vec<String>,
    /// Names of direct supercomponents.
    pub supercomponents: Vec<String>,
}

pub(crate) fn expect_category(record: &VertexRecord, expected: VertexCategory) -> Result<()> {
    if record.category == expected {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "expected a {expected} vertex, got {}",
            record.category
        )))
    }
}

pub(crate) fn required_name(record: &VertexRecord) -> Result<String> {
    record
        .text_attr(ATTR_NAME)
        .map(ToString::to_string)
        .ok_or_else(|| {
            Error::Validation(format!("{} vertex is missing a name", record.category))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_type_roundtrip() {
        let ct = ComponentType::new("router", "core routers");
        let mut record = VertexRecord::new(VertexCategory::ComponentType, ct.attrs());
        record.id = ElementId::Persisted(3);
        record.time_added = 50;

        let decoded = ComponentType::from_record(&record).unwrap();
        assert_eq!(decoded.name, "router");
        assert_eq!(decoded.comments, "core routers");
        assert_eq!(decoded.id, ElementId::Persisted(3));
        assert_eq!(decoded.time_added, 50);
    }

    #[test]
    fn test_wrong_category_rejected() {
        let record = VertexRecord::new(VertexCategory::Flag, AttrMap::new());
        assert!(ComponentType::from_record(&record).is_err());
    }

    #[test]
    fn test_missing_name_rejected() {
        let record = VertexRecord::new(VertexCategory::Component, AttrMap::new());
        let ct = ComponentType::new("router", "");
        assert!(Component::from_record(&record, ct, None).is_err());
    }

    #[test]
    fn test_component_assembly() {
        let ct = ComponentType::new("router", "");
        let version = ComponentVersion::new("v2", "", ct.clone());
        let component = Component::new("r1", ct, Some(version));
        assert_eq!(component.name, "r1");
        assert_eq!(component.component_type.name, "router");
        assert_eq!(component.version.as_ref().unwrap().name, "v2");
        assert!(component.id.is_virtual());
    }
}
