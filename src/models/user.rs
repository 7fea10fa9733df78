//! User and group domain entities.
//!
//! Users belong to groups via `user_group` edges; groups carry flat
//! permission strings. The authorization gate unions the permission sets of
//! a user's active groups and requires an exact match per protected
//! operation.

use crate::models::component::{expect_category, required_name, ATTR_NAME};
use crate::models::element::{AttrMap, ElementId, LifecycleStatus, VertexCategory, VertexRecord};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Attribute key for a user's institution.
const ATTR_INSTITUTION: &str = "institution";
/// Attribute key for a group's permission strings.
const ATTR_PERMISSIONS: &str = "permissions";

/// A registry user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Element identity.
    pub id: ElementId,
    /// Unique name among active users.
    pub name: String,
    /// Home institution, free text.
    pub institution: String,
    /// Physical time of creation, Unix seconds.
    pub time_added: i64,
    /// Soft lifecycle state.
    pub status: LifecycleStatus,
}

impl User {
    /// Creates a virtual user.
    #[must_use]
    pub fn new(name: impl Into<String>, institution: impl Into<String>) -> Self {
        Self {
            id: ElementId::Virtual,
            name: name.into(),
            institution: institution.into(),
            time_added: 0,
            status: LifecycleStatus::Active,
        }
    }

    /// Encodes the vertex-local attributes.
    #[must_use]
    pub fn attrs(&self) -> AttrMap {
        let mut attrs = AttrMap::new();
        attrs.insert(ATTR_NAME.to_string(), self.name.clone().into());
        attrs.insert(ATTR_INSTITUTION.to_string(), self.institution.clone().into());
        attrs
    }

    /// Decodes a user from a vertex record.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Validation`] on category or attribute
    /// mismatch.
    pub fn from_record(record: &VertexRecord) -> Result<Self> {
        expect_category(record, VertexCategory::User)?;
        Ok(Self {
            id: record.id,
            name: required_name(record)?,
            institution: record
                .text_attr(ATTR_INSTITUTION)
                .unwrap_or_default()
                .to_string(),
            time_added: record.time_added,
            status: record.status,
        })
    }
}

/// A user group carrying a flat set of permission strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserGroup {
    /// Element identity.
    pub id: ElementId,
    /// Unique name among active groups.
    pub name: String,
    /// Permission strings, e.g. `"component;connect"`.
    pub permissions: BTreeSet<String>,
    /// Physical time of creation, Unix seconds.
    pub time_added: i64,
    /// Soft lifecycle state.
    pub status: LifecycleStatus,
}

impl UserGroup {
    /// Creates a virtual group.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        permissions: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            id: ElementId::Virtual,
            name: name.into(),
            permissions: permissions.into_iter().map(Into::into).collect(),
            time_added: 0,
            status: LifecycleStatus::Active,
        }
    }

    /// Encodes the vertex-local attributes.
    ///
    /// Permissions are a list attribute (repeated rows in the store).
    #[must_use]
    pub fn attrs(&self) -> AttrMap {
        let mut attrs = AttrMap::new();
        attrs.insert(ATTR_NAME.to_string(), self.name.clone().into());
        attrs.insert(
            ATTR_PERMISSIONS.to_string(),
            self.permissions.iter().cloned().collect::<Vec<_>>().into(),
        );
        attrs
    }

    /// Decodes a group from a vertex record.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Validation`] on category or attribute
    /// mismatch.
    pub fn from_record(record: &VertexRecord) -> Result<Self> {
        expect_category(record, VertexCategory::UserGroup)?;
        Ok(Self {
            id: record.id,
            name: required_name(record)?,
            permissions: record
                .list_attr(ATTR_PERMISSIONS)
                .map(|p| p.iter().cloned().collect())
                .unwrap_or_default(),
            time_added: record.time_added,
            status: record.status,
        })
    }
}
