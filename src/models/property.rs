//! Property domain entities: property types and recorded property values.
//!
//! A [`PropertyType`] describes the shape of a measurable attribute (units,
//! value count, allowed value pattern, which component types may carry it).
//! A [`Property`] is one recorded set of values of a given type; its period
//! of effect lives on the `rel_property` edge, not on the property vertex.

use crate::models::component::{expect_category, required_name, ATTR_COMMENTS, ATTR_NAME};
use crate::models::element::{AttrMap, ElementId, LifecycleStatus, VertexCategory, VertexRecord};
use crate::models::ComponentType;
use crate::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

/// Attribute key for measurement units.
pub const ATTR_UNITS: &str = "units";
/// Attribute key for the allowed value pattern.
pub const ATTR_ALLOWED_REGEX: &str = "allowed_regex";
/// Attribute key for the expected value count.
pub const ATTR_N_VALUES: &str = "n_values";
/// Attribute key for a property's recorded values.
pub const ATTR_VALUES: &str = "values";

/// Compiled-regex memoization shared by all property validations.
///
/// Property types repeat a small set of patterns across many values;
/// compiling each pattern once is enough.
static REGEX_CACHE: Lazy<Mutex<HashMap<String, Regex>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

fn compile_pattern(pattern: &str) -> Result<Regex> {
    let mut cache = REGEX_CACHE
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    if let Some(re) = cache.get(pattern) {
        return Ok(re.clone());
    }
    let re = Regex::new(pattern)
        .map_err(|e| Error::Validation(format!("invalid allowed_regex '{pattern}': {e}")))?;
    cache.insert(pattern.to_string(), re.clone());
    Ok(re)
}

/// A kind of property, e.g. "OS" or "attenuation".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyType {
    /// Element identity.
    pub id: ElementId,
    /// Unique name among active property types.
    pub name: String,
    /// Measurement units, free text.
    pub units: String,
    /// Pattern every value must match.
    pub allowed_regex: String,
    /// Number of values a property of this type carries.
    pub n_values: u32,
    /// Free-text comments.
    pub comments: String,
    /// Component types allowed to carry this property; never empty.
    pub allowed_types: Vec<ComponentType>,
    /// Physical time of creation, Unix seconds.
    pub time_added: i64,
    /// Soft lifecycle state.
    pub status: LifecycleStatus,
}

impl PropertyType {
    /// Creates a virtual property type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if `allowed_types` is empty, `n_values`
    /// is zero, or the regex does not compile. Nothing is persisted on
    /// failure.
    pub fn new(
        name: impl Into<String>,
        units: impl Into<String>,
        allowed_regex: impl Into<String>,
        n_values: u32,
        comments: impl Into<String>,
        allowed_types: Vec<ComponentType>,
    ) -> Result<Self> {
        let name = name.into();
        let allowed_regex = allowed_regex.into();
        if allowed_types.is_empty() {
            return Err(Error::Validation(format!(
                "property type '{name}' must allow at least one component type"
            )));
        }
        if n_values == 0 {
            return Err(Error::Validation(format!(
                "property type '{name}' must carry at least one value"
            )));
        }
        compile_pattern(&allowed_regex)?;
        Ok(Self {
            id: ElementId::Virtual,
            name,
            units: units.into(),
            allowed_regex,
            n_values,
            comments: comments.into(),
            allowed_types,
            time_added: 0,
            status: LifecycleStatus::Active,
        })
    }

    /// Encodes the vertex-local attributes.
    #[must_use]
    pub fn attrs(&self) -> AttrMap {
        let mut attrs = AttrMap::new();
        attrs.insert(ATTR_NAME.to_string(), self.name.clone().into());
        attrs.insert(ATTR_UNITS.to_string(), self.units.clone().into());
        attrs.insert(
            ATTR_ALLOWED_REGEX.to_string(),
            self.allowed_regex.clone().into(),
        );
        attrs.insert(ATTR_N_VALUES.to_string(), i64::from(self.n_values).into());
        attrs.insert(ATTR_COMMENTS.to_string(), self.comments.clone().into());
        attrs
    }

    /// Decodes a property type from a vertex record plus its resolved
    /// allowed-type edge targets.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] on category or attribute mismatch.
    pub fn from_record(record: &VertexRecord, allowed_types: Vec<ComponentType>) -> Result<Self> {
        expect_category(record, VertexCategory::PropertyType)?;
        let name = required_name(record)?;
        let n_values = record.int_attr(ATTR_N_VALUES).ok_or_else(|| {
            Error::Validation(format!("property type '{name}' is missing n_values"))
        })?;
        let n_values = u32::try_from(n_values).map_err(|_| {
            Error::Validation(format!("property type '{name}' has invalid n_values"))
        })?;
        Ok(Self {
            id: record.id,
            name,
            units: record.text_attr(ATTR_UNITS).unwrap_or_default().to_string(),
            allowed_regex: record
                .text_attr(ATTR_ALLOWED_REGEX)
                .unwrap_or(".*")
                .to_string(),
            n_values,
            comments: record.text_attr(ATTR_COMMENTS).unwrap_or_default().to_string(),
            allowed_types,
            time_added: record.time_added,
            status: record.status,
        })
    }

    /// Checks whether a component type may carry properties of this type.
    #[must_use]
    pub fn allows(&self, component_type: &ComponentType) -> bool {
        self.allowed_types.iter().any(|t| t.name == component_type.name)
    }
}

/// One recorded set of values of a property type.
///
/// A property vertex is immutable once written; corrections persist a new
/// vertex. The time window during which the values apply to a component is
/// carried by the `rel_property` edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    /// Element identity.
    pub id: ElementId,
    /// The property's type.
    pub property_type: PropertyType,
    /// Recorded values; length equals the type's `n_values`.
    pub values: Vec<String>,
    /// Physical time of creation, Unix seconds.
    pub time_added: i64,
    /// Soft lifecycle state.
    pub status: LifecycleStatus,
}

impl Property {
    /// Creates a virtual property, validating values against the type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the value count differs from the
    /// type's `n_values` or any value fails the allowed pattern. Nothing is
    /// persisted on failure.
    pub fn new(property_type: PropertyType, values: Vec<String>) -> Result<Self> {
        if values.len() != property_type.n_values as usize {
            return Err(Error::Validation(format!(
                "property of type '{}' expects {} values, got {}",
                property_type.name,
                property_type.n_values,
                values.len()
            )));
        }
        let re = compile_pattern(&property_type.allowed_regex)?;
        for value in &values {
            if !re.is_match(value) {
                return Err(Error::Validation(format!(
                    "value '{value}' does not match allowed pattern '{}' of property type '{}'",
                    property_type.allowed_regex, property_type.name
                )));
            }
        }
        Ok(Self {
            id: ElementId::Virtual,
            property_type,
            values,
            time_added: 0,
            status: LifecycleStatus::Active,
        })
    }

    /// Encodes the vertex-local attributes.
    ///
    /// Values are a list attribute; the store writes them as repeated
    /// properties, never as one serialized blob.
    #[must_use]
    pub fn attrs(&self) -> AttrMap {
        let mut attrs = AttrMap::new();
        attrs.insert(ATTR_VALUES.to_string(), self.values.clone().into());
        attrs
    }

    /// Decodes a property from a vertex record plus its resolved type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] on category mismatch or missing values.
    pub fn from_record(record: &VertexRecord, property_type: PropertyType) -> Result<Self> {
        expect_category(record, VertexCategory::Property)?;
        let values = record
            .list_attr(ATTR_VALUES)
            .map(<[String]>::to_vec)
            .ok_or_else(|| {
                Error::Validation(format!(
                    "property vertex of type '{}' is missing values",
                    property_type.name
                ))
            })?;
        Ok(Self {
            id: record.id,
            property_type,
            values,
            time_added: record.time_added,
            status: record.status,
        })
    }

    /// Checks whether another property carries the identical values.
    #[must_use]
    pub fn same_values(&self, other: &[String]) -> bool {
        self.values == other
    }
}
