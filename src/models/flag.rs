//! Flag domain entities: flag types, severities, and flag instances.
//!
//! A flag marks an operational condition (outage, maintenance, data quality
//! issue) over a time window. Unlike connections and properties, the window
//! lives on the flag vertex itself; `flag_component` edges attach the flag
//! to zero or more components.

use crate::models::component::{expect_category, required_name, ATTR_COMMENTS, ATTR_NAME};
use crate::models::element::{AttrMap, ElementId, LifecycleStatus, VertexCategory, VertexRecord};
use crate::models::timestamp::{Timestamp, Validity};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Attribute keys for the flag window encoding.
const ATTR_START_TIME: &str = "start_time";
const ATTR_START_UID: &str = "start_uid";
const ATTR_START_EDIT_TIME: &str = "start_edit_time";
const ATTR_START_COMMENTS: &str = "start_comments";
const ATTR_END_TIME: &str = "end_time";
const ATTR_END_UID: &str = "end_uid";
const ATTR_END_EDIT_TIME: &str = "end_edit_time";
const ATTR_END_COMMENTS: &str = "end_comments";

/// A kind of flag, e.g. "outage" or "maintenance".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlagType {
    /// Element identity.
    pub id: ElementId,
    /// Unique name among active flag types.
    pub name: String,
    /// Free-text comments.
    pub comments: String,
    /// Physical time of creation, Unix seconds.
    pub time_added: i64,
    /// Soft lifecycle state.
    pub status: LifecycleStatus,
}

impl FlagType {
    /// Creates a virtual flag type.
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

    /// Decodes a flag type from a vertex record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] on category or attribute mismatch.
    pub fn from_record(record: &VertexRecord) -> Result<Self> {
        expect_category(record, VertexCategory::FlagType)?;
        Ok(Self {
            id: record.id,
            name: required_name(record)?,
            comments: record.text_attr(ATTR_COMMENTS).unwrap_or_default().to_string(),
            time_added: record.time_added,
            status: record.status,
        })
    }
}

/// A severity level for flags, e.g. "warning" or "critical".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlagSeverity {
    /// Element identity.
    pub id: ElementId,
    /// Unique name among active severities.
    pub name: String,
    /// Free-text comments.
    pub comments: String,
    /// Physical time of creation, Unix seconds.
    pub time_added: i64,
    /// Soft lifecycle state.
    pub status: LifecycleStatus,
}

impl FlagSeverity {
    /// Creates a virtual flag severity.
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

    /// Decodes a flag severity from a vertex record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] on category or attribute mismatch.
    pub fn from_record(record: &VertexRecord) -> Result<Self> {
        expect_category(record, VertexCategory::FlagSeverity)?;
        Ok(Self {
            id: record.id,
            name: required_name(record)?,
            comments: record.text_attr(ATTR_COMMENTS).unwrap_or_default().to_string(),
            time_added: record.time_added,
            status: record.status,
        })
    }
}

/// An operational flag over a time window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flag {
    /// Element identity.
    pub id: ElementId,
    /// Unique name among active flags.
    pub name: String,
    /// Free-text comments.
    pub comments: String,
    /// The window the flag covers; open-ended while in effect.
    pub window: Validity,
    /// The flag's type.
    pub flag_type: FlagType,
    /// The flag's severity.
    pub severity: FlagSeverity,
    /// Ids of the components the flag is attached to.
    pub components: Vec<i64>,
    /// Physical time of creation, Unix seconds.
    pub time_added: i64,
    /// Soft lifecycle state.
    pub status: LifecycleStatus,
}

impl Flag {
    /// Creates a virtual flag.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        comments: impl Into<String>,
        window: Validity,
        flag_type: FlagType,
        severity: FlagSeverity,
    ) -> Self {
        Self {
            id: ElementId::Virtual,
            name: name.into(),
            comments: comments.into(),
            window,
            flag_type,
            severity,
            components: Vec::new(),
            time_added: 0,
            status: LifecycleStatus::Active,
        }
    }

    /// Encodes the vertex-local attributes, including the flattened window.
    #[must_use]
    pub fn attrs(&self) -> AttrMap {
        let mut attrs = AttrMap::new();
        attrs.insert(ATTR_NAME.to_string(), self.name.clone().into());
        attrs.insert(ATTR_COMMENTS.to_string(), self.comments.clone().into());
        attrs.insert(ATTR_START_TIME.to_string(), self.window.start.time.into());
        attrs.insert(
            ATTR_START_UID.to_string(),
            self.window.start.uid.clone().into(),
        );
        attrs.insert(
            ATTR_START_EDIT_TIME.to_string(),
            self.window.start.edit_time.into(),
        );
        attrs.insert(
            ATTR_START_COMMENTS.to_string(),
            self.window.start.comments.clone().into(),
        );
        if let Some(end) = &self.window.end {
            attrs.insert(ATTR_END_TIME.to_string(), end.time.into());
            attrs.insert(ATTR_END_UID.to_string(), end.uid.clone().into());
            attrs.insert(ATTR_END_EDIT_TIME.to_string(), end.edit_time.into());
            attrs.insert(ATTR_END_COMMENTS.to_string(), end.comments.clone().into());
        }
        attrs
    }

    /// Decodes a flag from a vertex record plus its resolved edges.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] on category mismatch or a missing
    /// window start.
    pub fn from_record(
        record: &VertexRecord,
        flag_type: FlagType,
        severity: FlagSeverity,
        components: Vec<i64>,
    ) -> Result<Self> {
        expect_category(record, VertexCategory::Flag)?;
        let name = required_name(record)?;
        let start = decode_stamp(record, ATTR_START_TIME, ATTR_START_UID, ATTR_START_EDIT_TIME, ATTR_START_COMMENTS)
            .ok_or_else(|| Error::Validation(format!("flag '{name}' is missing a start time")))?;
        let end = decode_stamp(record, ATTR_END_TIME, ATTR_END_UID, ATTR_END_EDIT_TIME, ATTR_END_COMMENTS);
        Ok(Self {
            id: record.id,
            name,
            comments: record.text_attr(ATTR_COMMENTS).unwrap_or_default().to_string(),
            window: Validity { start, end },
            flag_type,
            severity,
            components,
            time_added: record.time_added,
            status: record.status,
        })
    }

    /// Checks if the flag covers the given time.
    #[must_use]
    pub fn covers(&self, timestamp: i64) -> bool {
        self.window.contains(timestamp)
    }
}

/// Decodes just the window from a flag vertex record.
///
/// Returns `None` if the record carries no start time.
pub(crate) fn flag_window(record: &VertexRecord) -> Option<Validity> {
    let start = decode_stamp(
        record,
        ATTR_START_TIME,
        ATTR_START_UID,
        ATTR_START_EDIT_TIME,
        ATTR_START_COMMENTS,
    )?;
    let end = decode_stamp(
        record,
        ATTR_END_TIME,
        ATTR_END_UID,
        ATTR_END_EDIT_TIME,
        ATTR_END_COMMENTS,
    );
    Some(Validity { start, end })
}

fn decode_stamp(
    record: &VertexRecord,
    time_key: &str,
    uid_key: &str,
    edit_key: &str,
    comments_key: &str,
) -> Option<Timestamp> {
    let time = record.int_attr(time_key)?;
    Some(Timestamp {
        time,
        uid: record.text_attr(uid_key).unwrap_or_default().to_string(),
        edit_time: record.int_attr(edit_key).unwrap_or_default(),
        comments: record.text_attr(comments_key).unwrap_or_default().to_string(),
    })
}
