//! Recorded property values and their validity windows.
//!
//! A component carries at most one property of a given type at any instant;
//! the intervals of same-type assignments partition time without overlap.
//! Values are immutable once written: changing a value means closing the
//! current interval and opening a new property vertex, so the full history
//! of what was recorded when survives.

use crate::models::{
    EdgeCategory, EdgeRecord, Property, Timestamp, Validity, VertexCategory, VertexRecord,
};
use crate::services::catalog::{load_property_type, CatalogService};
use crate::services::locks::LockKey;
use crate::services::registry::RegistryCore;
use crate::services::TimeFilter;
use crate::storage::EdgeQuery;
use crate::{current_timestamp, Error, Result};
use tracing::debug;

/// Service view over component properties.
pub struct PropertyService<'a> {
    pub(crate) core: &'a RegistryCore,
}

/// Loads a property together with its resolved type.
pub(crate) fn load_property(core: &RegistryCore, record: &VertexRecord) -> Result<Property> {
    let id = record
        .id
        .persisted()
        .ok_or_else(|| Error::NotPersisted("property".to_string()))?;
    let type_links = core
        .store
        .find_edges(&EdgeQuery::active(EdgeCategory::PropertyType).from(id))?;
    let type_link = type_links
        .first()
        .ok_or_else(|| Error::NotFound(format!("type of property #{id}")))?;
    let type_record = core.resolve_vertex(type_link.in_vertex)?;
    let property_type = load_property_type(core, &type_record)?;
    Property::from_record(record, property_type)
}

/// A property assignment as reported by history queries.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyAssignment {
    /// The recorded property.
    pub property: Property,
    /// Period the values are (or were) in effect.
    pub validity: Validity,
}

impl PropertyService<'_> {
    fn resolve_component(&self, name: &str) -> Result<(i64, VertexRecord)> {
        let record = self
            .core
            .require_named(VertexCategory::Component, name, "component")?;
        let id = record
            .id
            .persisted()
            .ok_or_else(|| Error::NotPersisted(format!("component '{name}'")))?;
        Ok((id, record))
    }

    /// Same-type assignment edges on a component, paired with their
    /// decoded properties.
    fn assignments_of_type(
        &self,
        component_id: i64,
        type_name: &str,
    ) -> Result<Vec<(EdgeRecord, Property)>> {
        let edges = self.core.store.find_edges(
            &EdgeQuery::active(EdgeCategory::PropertyAssignment).touching(component_id),
        )?;
        let mut matching = Vec::new();
        for edge in edges {
            let Some(property_id) = edge.other_endpoint(component_id) else {
                continue;
            };
            let property_record = self.core.resolve_vertex(property_id)?;
            if !property_record.is_active() {
                continue;
            }
            let property = load_property(self.core, &property_record)?;
            if property.property_type.name == type_name {
                matching.push((edge, property));
            }
        }
        Ok(matching)
    }

    /// Records property values on a component from `start`.
    ///
    /// If values of the same type are in effect at `start`, their interval
    /// is closed at `start` and the new values take over from there. An
    /// interval of the same type starting later blocks the write unless
    /// `force` is given, in which case an open-ended write is auto-closed
    /// at that interval's start.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WrongComponentType`] if the component's type may
    /// not carry the property, [`Error::SameProperty`] if the identical
    /// values are already in effect at `start`,
    /// [`Error::SetBeforeExisting`] or [`Error::OverlappingProperty`] on
    /// interval conflicts, and [`Error::Validation`] for malformed values.
    pub fn set_property(
        &self,
        component_name: &str,
        type_name: &str,
        values: Vec<String>,
        start: Timestamp,
        end: Option<Timestamp>,
        force: bool,
    ) -> Result<Property> {
        self.core.authorize("component", "set_property")?;
        let (component_id, component_record) = self.resolve_component(component_name)?;
        let component =
            crate::services::component::load_component(self.core, &component_record)?;
        let property_type = CatalogService { core: self.core }.get_property_type(type_name)?;
        let type_id = property_type
            .id
            .persisted()
            .ok_or_else(|| Error::NotPersisted(format!("property type '{type_name}'")))?;

        if !property_type.allows(&component.component_type) {
            return Err(Error::WrongComponentType {
                component_type: component.component_type.name,
                property_type: property_type.name,
            });
        }
        if let Some(ref end) = end {
            if end.time <= start.time {
                return Err(Error::Validation(format!(
                    "property end {} must be after start {}",
                    end.time, start.time
                )));
            }
        }
        // Validate the values before touching any state.
        let property = Property::new(property_type, values)?;

        let _guard = self
            .core
            .locks
            .lock(&LockKey::ComponentProperty(component_id, type_id));
        self.insert_property(
            component_id,
            component_name,
            type_name,
            type_id,
            property,
            start,
            end,
            force,
        )
    }

    /// Runs the interval conflict checks and the writes for a property
    /// insert. Callers hold the component-property stripe lock. Every
    /// conflict is resolved before the first write, so a rejected insert
    /// leaves the recorded history untouched.
    #[allow(clippy::too_many_arguments)]
    fn insert_property(
        &self,
        component_id: i64,
        component_name: &str,
        type_name: &str,
        type_id: i64,
        property: Property,
        start: Timestamp,
        end: Option<Timestamp>,
        force: bool,
    ) -> Result<Property> {
        let assignments = self.assignments_of_type(component_id, type_name)?;

        let current = assignments.iter().find(|(edge, _)| {
            edge.validity
                .as_ref()
                .is_some_and(|v| v.contains(start.time))
        });
        if let Some((_, existing)) = current {
            if existing.same_values(&property.values) {
                return Err(Error::SameProperty(type_name.to_string()));
            }
        }

        let earliest_future = assignments
            .iter()
            .filter_map(|(edge, _)| edge.validity.as_ref().map(Validity::start_time))
            .filter(|&s| s > start.time)
            .min();

        let end = match (earliest_future, end) {
            (None, end) => end,
            (Some(future_start), None) => {
                if !force {
                    return Err(Error::SetBeforeExisting {
                        property_type: type_name.to_string(),
                        existing_start: future_start,
                    });
                }
                // Forced insert before a later interval: auto-close at its
                // start so the two never overlap.
                Some(Timestamp::new(future_start, start.uid.clone()))
            },
            (Some(future_start), Some(_)) => {
                if !force {
                    return Err(Error::SetBeforeExisting {
                        property_type: type_name.to_string(),
                        existing_start: future_start,
                    });
                }
                // An explicit end while one is also being inferred is
                // ambiguous; refuse rather than pick one.
                return Err(Error::OverlappingProperty(type_name.to_string()));
            },
        };

        // Different values take over: close the running interval where the
        // new one begins.
        if let Some((edge, _)) = current {
            let edge_id = edge
                .id
                .persisted()
                .ok_or_else(|| Error::NotPersisted("property assignment".to_string()))?;
            self.core.store.set_edge_end(edge_id, &start)?;
        }

        let now = current_timestamp();
        let property_id = self
            .core
            .store
            .add_vertex(VertexCategory::Property, &property.attrs(), now)?;
        self.core.store.add_edge(
            &EdgeRecord::new(EdgeCategory::PropertyType, property_id, type_id),
            now,
        )?;
        let validity = match end {
            None => Validity::open(start),
            Some(end) => Validity::between(start, end),
        };
        self.core.store.add_edge(
            &EdgeRecord::timestamped(
                EdgeCategory::PropertyAssignment,
                property_id,
                component_id,
                validity,
            ),
            now,
        )?;
        debug!(
            component = component_name,
            property_type = type_name,
            property_id,
            "property set"
        );

        let record = self
            .core
            .store
            .get_vertex(property_id)?
            .ok_or_else(|| Error::NotFound(format!("property #{property_id}")))?;
        load_property(self.core, &record)
    }

    /// Closes the open interval of a same-type property at `end`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the component carries no property of
    /// the type, or [`Error::AlreadyEnded`] if every interval already has
    /// a finite end.
    pub fn unset_property(
        &self,
        component_name: &str,
        type_name: &str,
        end: Timestamp,
    ) -> Result<()> {
        self.core.authorize("component", "unset_property")?;
        let (component_id, _) = self.resolve_component(component_name)?;
        let property_type = CatalogService { core: self.core }.get_property_type(type_name)?;
        let type_id = property_type
            .id
            .persisted()
            .ok_or_else(|| Error::NotPersisted(format!("property type '{type_name}'")))?;

        let _guard = self
            .core
            .locks
            .lock(&LockKey::ComponentProperty(component_id, type_id));

        let assignments = self.assignments_of_type(component_id, type_name)?;
        if assignments.is_empty() {
            return Err(Error::NotFound(format!(
                "property of type '{type_name}' on component '{component_name}'"
            )));
        }
        let open = assignments
            .iter()
            .find(|(edge, _)| edge.validity.as_ref().is_some_and(Validity::is_open));
        let Some((edge, _)) = open else {
            return Err(Error::AlreadyEnded(format!(
                "property of type '{type_name}' on component '{component_name}'"
            )));
        };
        let edge_id = edge
            .id
            .persisted()
            .ok_or_else(|| Error::NotPersisted("property assignment".to_string()))?;
        self.core.store.set_edge_end(edge_id, &end)?;
        debug!(
            component = component_name,
            property_type = type_name,
            at = end.time,
            "property unset"
        );
        Ok(())
    }

    /// Corrects the values in effect at `start.time`.
    ///
    /// The mistaken property vertex is disabled rather than rewritten, so
    /// the erroneous record remains auditable; the corrected values are
    /// then set from `start` as usual.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no property of the type is in effect
    /// at `start.time`, or [`Error::Validation`] for malformed replacement
    /// values; a rejected correction leaves the mistaken record in place.
    pub fn replace_property(
        &self,
        component_name: &str,
        type_name: &str,
        values: Vec<String>,
        start: Timestamp,
        end: Option<Timestamp>,
    ) -> Result<Property> {
        self.core.authorize("component", "replace_property")?;
        let (component_id, component_record) = self.resolve_component(component_name)?;
        let component =
            crate::services::component::load_component(self.core, &component_record)?;
        let property_type = CatalogService { core: self.core }.get_property_type(type_name)?;
        let type_id = property_type
            .id
            .persisted()
            .ok_or_else(|| Error::NotPersisted(format!("property type '{type_name}'")))?;

        if !property_type.allows(&component.component_type) {
            return Err(Error::WrongComponentType {
                component_type: component.component_type.name,
                property_type: property_type.name,
            });
        }
        if let Some(ref end) = end {
            if end.time <= start.time {
                return Err(Error::Validation(format!(
                    "property end {} must be after start {}",
                    end.time, start.time
                )));
            }
        }
        // The replacement must validate before the mistaken record is
        // touched.
        let property = Property::new(property_type, values)?;

        let _guard = self
            .core
            .locks
            .lock(&LockKey::ComponentProperty(component_id, type_id));

        let assignments = self.assignments_of_type(component_id, type_name)?;
        let current = assignments.iter().find(|(edge, _)| {
            edge.validity
                .as_ref()
                .is_some_and(|v| v.contains(start.time))
        });
        let Some((_, mistaken)) = current else {
            return Err(Error::NotFound(format!(
                "property of type '{type_name}' on component '{component_name}' at time {}",
                start.time
            )));
        };
        let mistaken_id = mistaken
            .id
            .persisted()
            .ok_or_else(|| Error::NotPersisted("property".to_string()))?;
        self.core.disable_vertex(mistaken_id, start.time)?;

        self.insert_property(
            component_id,
            component_name,
            type_name,
            type_id,
            property,
            start,
            end,
            false,
        )
    }

    /// Queries a component's property history.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown component.
    pub fn get_properties(
        &self,
        component_name: &str,
        filter: TimeFilter,
    ) -> Result<Vec<PropertyAssignment>> {
        let (component_id, _) = self.resolve_component(component_name)?;

        let mut query =
            EdgeQuery::active(EdgeCategory::PropertyAssignment).touching(component_id);
        match filter {
            TimeFilter::At(t) => query = query.at_time(t),
            TimeFilter::Range(from_time, to_time) => {
                query = query.over_range(from_time, to_time);
            },
            TimeFilter::All => {},
        }

        let mut assignments = Vec::new();
        for edge in self.core.store.find_edges(&query)? {
            let Some(property_id) = edge.other_endpoint(component_id) else {
                continue;
            };
            let Some(validity) = edge.validity.clone() else {
                continue;
            };
            let property_record = self.core.resolve_vertex(property_id)?;
            if !property_record.is_active() {
                continue;
            }
            let property = load_property(self.core, &property_record)?;
            assignments.push(PropertyAssignment { property, validity });
        }
        assignments.sort_by(|a, b| {
            (&a.property.property_type.name, a.validity.start_time())
                .cmp(&(&b.property.property_type.name, b.validity.start_time()))
        });
        Ok(assignments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::Registry;
    use crate::storage::InMemoryGraphStore;

    fn registry_with_component() -> Registry {
        let registry = Registry::new(InMemoryGraphStore::new());
        registry.catalog().add_component_type("computer", "").unwrap();
        registry.catalog().add_component_type("antenna", "").unwrap();
        registry
            .catalog()
            .add_property_type("OS", "", ".*", 1, "", &["computer"])
            .unwrap();
        registry.components().add("host1", "computer", None).unwrap();
        registry
    }

    fn ts(time: i64) -> Timestamp {
        Timestamp::new(time, "tester")
    }

    fn values(v: &str) -> Vec<String> {
        vec![v.to_string()]
    }

    #[test]
    fn test_set_and_read_back() {
        let registry = registry_with_component();
        registry
            .properties()
            .set_property("host1", "OS", values("Linux"), ts(100), None, false)
            .unwrap();

        let at_150 = registry
            .properties()
            .get_properties("host1", TimeFilter::At(150))
            .unwrap();
        assert_eq!(at_150.len(), 1);
        assert_eq!(at_150[0].property.values, values("Linux"));
        assert!(at_150[0].validity.is_open());
    }

    #[test]
    fn test_wrong_component_type_rejected() {
        let registry = registry_with_component();
        registry.components().add("dish1", "antenna", None).unwrap();

        let err = registry
            .properties()
            .set_property("dish1", "OS", values("Linux"), ts(100), None, false);
        assert!(matches!(err, Err(Error::WrongComponentType { .. })));
    }

    #[test]
    fn test_same_values_rejected_different_values_take_over() {
        let registry = registry_with_component();
        registry
            .properties()
            .set_property("host1", "OS", values("Linux"), ts(100), None, false)
            .unwrap();

        let err = registry
            .properties()
            .set_property("host1", "OS", values("Linux"), ts(200), None, false);
        assert!(matches!(err, Err(Error::SameProperty(_))));

        registry
            .properties()
            .set_property("host1", "OS", values("BSD"), ts(200), None, false)
            .unwrap();

        // The first interval was closed where the second begins.
        let history = registry
            .properties()
            .get_properties("host1", TimeFilter::All)
            .unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].validity.end_time(), Some(200));
        assert_eq!(history[1].validity.start_time(), 200);
        assert!(history[1].validity.is_open());

        let at_150 = registry
            .properties()
            .get_properties("host1", TimeFilter::At(150))
            .unwrap();
        assert_eq!(at_150[0].property.values, values("Linux"));
        let at_250 = registry
            .properties()
            .get_properties("host1", TimeFilter::At(250))
            .unwrap();
        assert_eq!(at_250[0].property.values, values("BSD"));
    }

    #[test]
    fn test_insert_before_later_interval_needs_force() {
        let registry = registry_with_component();
        registry
            .properties()
            .set_property("host1", "OS", values("BSD"), ts(300), None, false)
            .unwrap();

        let err = registry
            .properties()
            .set_property("host1", "OS", values("Linux"), ts(100), None, false);
        assert!(matches!(
            err,
            Err(Error::SetBeforeExisting {
                existing_start: 300,
                ..
            })
        ));

        // Forced open-ended insert is auto-closed at the later start.
        registry
            .properties()
            .set_property("host1", "OS", values("Linux"), ts(100), None, true)
            .unwrap();
        let history = registry
            .properties()
            .get_properties("host1", TimeFilter::All)
            .unwrap();
        let early = history
            .iter()
            .find(|a| a.validity.start_time() == 100)
            .unwrap();
        assert_eq!(early.validity.end_time(), Some(300));
    }

    #[test]
    fn test_forced_insert_with_explicit_end_rejected() {
        let registry = registry_with_component();
        registry
            .properties()
            .set_property("host1", "OS", values("BSD"), ts(300), None, false)
            .unwrap();

        // Force infers an end, so supplying one too is ambiguous, even when
        // the explicit end would fit.
        for end in [250, 300, 350] {
            let err = registry.properties().set_property(
                "host1",
                "OS",
                values("Linux"),
                ts(100),
                Some(ts(end)),
                true,
            );
            assert!(matches!(err, Err(Error::OverlappingProperty(_))));
        }
    }

    #[test]
    fn test_rejected_insert_leaves_current_interval_untouched() {
        let registry = registry_with_component();
        registry
            .properties()
            .set_property("host1", "OS", values("Linux"), ts(100), Some(ts(300)), false)
            .unwrap();
        registry
            .properties()
            .set_property("host1", "OS", values("Next"), ts(300), None, false)
            .unwrap();

        // Inserting inside the first interval with a later interval present
        // is rejected, and must not close the running interval first.
        let err = registry
            .properties()
            .set_property("host1", "OS", values("BSD"), ts(200), None, false);
        assert!(matches!(
            err,
            Err(Error::SetBeforeExisting {
                existing_start: 300,
                ..
            })
        ));

        // Same on the forced ambiguous-end rejection.
        let err = registry.properties().set_property(
            "host1",
            "OS",
            values("BSD"),
            ts(200),
            Some(ts(250)),
            true,
        );
        assert!(matches!(err, Err(Error::OverlappingProperty(_))));

        let history = registry
            .properties()
            .get_properties("host1", TimeFilter::All)
            .unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].validity.end_time(), Some(300));
        assert_eq!(history[1].validity.start_time(), 300);
        assert!(history[1].validity.is_open());
    }

    #[test]
    fn test_unset_then_double_unset() {
        let registry = registry_with_component();
        registry
            .properties()
            .set_property("host1", "OS", values("Linux"), ts(100), None, false)
            .unwrap();
        registry
            .properties()
            .unset_property("host1", "OS", ts(200))
            .unwrap();

        let err = registry.properties().unset_property("host1", "OS", ts(250));
        assert!(matches!(err, Err(Error::AlreadyEnded(_))));

        let at_250 = registry
            .properties()
            .get_properties("host1", TimeFilter::At(250))
            .unwrap();
        assert!(at_250.is_empty());
    }

    #[test]
    fn test_unset_without_property_is_not_found() {
        let registry = registry_with_component();
        let err = registry.properties().unset_property("host1", "OS", ts(100));
        assert!(matches!(err, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_replace_property_hides_mistaken_record() {
        let registry = registry_with_component();
        registry
            .properties()
            .set_property("host1", "OS", values("Lunix"), ts(100), None, false)
            .unwrap();

        registry
            .properties()
            .replace_property("host1", "OS", values("Linux"), ts(100), None)
            .unwrap();

        let history = registry
            .properties()
            .get_properties("host1", TimeFilter::All)
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].property.values, values("Linux"));
        assert_eq!(history[0].validity.start_time(), 100);
    }

    #[test]
    fn test_invalid_replacement_keeps_mistaken_record() {
        let registry = registry_with_component();
        registry
            .catalog()
            .add_property_type("cores", "", r"^\d+$", 1, "", &["computer"])
            .unwrap();
        registry
            .properties()
            .set_property("host1", "cores", values("16"), ts(100), None, false)
            .unwrap();

        let err = registry
            .properties()
            .replace_property("host1", "cores", values("many"), ts(100), None);
        assert!(matches!(err, Err(Error::Validation(_))));

        // The mistaken record stays in effect on a rejected correction.
        let history = registry
            .properties()
            .get_properties("host1", TimeFilter::All)
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].property.values, values("16"));
        assert!(history[0].validity.is_open());
    }

    #[test]
    fn test_replace_property_without_current_is_not_found() {
        let registry = registry_with_component();
        let err = registry
            .properties()
            .replace_property("host1", "OS", values("Linux"), ts(100), None);
        assert!(matches!(err, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_value_validation_before_any_write() {
        let registry = registry_with_component();
        registry
            .catalog()
            .add_property_type("attenuation", "dB", r"^\d+$", 1, "", &["computer"])
            .unwrap();

        let err = registry.properties().set_property(
            "host1",
            "attenuation",
            values("forty-two"),
            ts(100),
            None,
            false,
        );
        assert!(matches!(err, Err(Error::Validation(_))));

        // Nothing was persisted.
        let history = registry
            .properties()
            .get_properties("host1", TimeFilter::All)
            .unwrap();
        assert!(history.is_empty());
    }
}
