//! Operational flags over time windows.
//!
//! A flag carries its window on the vertex itself and attaches to zero or
//! more components through untimestamped `flag_component` edges. Ending a
//! flag closes the window in place; the attachments stay as they are.

use crate::models::{
    flag_window, EdgeCategory, EdgeRecord, Flag, FlagFilter, ListRange, OrderBy, OrderDirection,
    Timestamp, Validity, VertexCategory, VertexRecord,
};
use crate::services::catalog::CatalogService;
use crate::services::registry::RegistryCore;
use crate::storage::{EdgeQuery, VertexQuery};
use crate::{current_timestamp, Error, Result};
use tracing::debug;

/// Service view over flags.
pub struct FlagService<'a> {
    pub(crate) core: &'a RegistryCore,
}

/// Decodes just the window from a flag vertex record.
pub(crate) fn window_of(record: &VertexRecord) -> Option<Validity> {
    flag_window(record)
}

/// Loads a flag together with its type, severity, and attachments.
pub(crate) fn load_flag(core: &RegistryCore, record: &VertexRecord) -> Result<Flag> {
    let id = record
        .id
        .persisted()
        .ok_or_else(|| Error::NotPersisted("flag".to_string()))?;

    let type_links = core
        .store
        .find_edges(&EdgeQuery::active(EdgeCategory::FlagType).from(id))?;
    let type_link = type_links
        .first()
        .ok_or_else(|| Error::NotFound(format!("type of flag #{id}")))?;
    let type_record = core.resolve_vertex(type_link.in_vertex)?;
    let flag_type = crate::models::FlagType::from_record(&type_record)?;

    let severity_links = core
        .store
        .find_edges(&EdgeQuery::active(EdgeCategory::FlagSeverity).from(id))?;
    let severity_link = severity_links
        .first()
        .ok_or_else(|| Error::NotFound(format!("severity of flag #{id}")))?;
    let severity_record = core.resolve_vertex(severity_link.in_vertex)?;
    let severity = crate::models::FlagSeverity::from_record(&severity_record)?;

    let mut components: Vec<i64> = core
        .store
        .find_edges(&EdgeQuery::active(EdgeCategory::FlagComponent).from(id))?
        .iter()
        .map(|edge| edge.in_vertex)
        .collect();
    components.sort_unstable();

    Flag::from_record(record, flag_type, severity, components)
}

impl FlagService<'_> {
    fn resolve(&self, name: &str) -> Result<(i64, VertexRecord)> {
        let record = self.core.require_named(VertexCategory::Flag, name, "flag")?;
        let id = record
            .id
            .persisted()
            .ok_or_else(|| Error::NotPersisted(format!("flag '{name}'")))?;
        Ok((id, record))
    }

    /// Raises a flag over `[start, end)` and attaches it to components.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyExists`] on a duplicate name,
    /// [`Error::NotFound`] for an unknown type, severity, or component,
    /// and [`Error::Validation`] for an end at or before the start.
    pub fn add_flag(
        &self,
        name: impl Into<String>,
        comments: impl Into<String>,
        start: Timestamp,
        end: Option<Timestamp>,
        type_name: &str,
        severity_name: &str,
        component_names: &[&str],
    ) -> Result<Flag> {
        self.core.authorize("flag", "add")?;
        let name = name.into();
        if self
            .core
            .find_active_named(VertexCategory::Flag, &name)?
            .is_some()
        {
            return Err(Error::AlreadyExists { kind: "flag", name });
        }
        if let Some(ref end) = end {
            if end.time <= start.time {
                return Err(Error::Validation(format!(
                    "flag end {} must be after start {}",
                    end.time, start.time
                )));
            }
        }

        let catalog = CatalogService { core: self.core };
        let flag_type = catalog.get_flag_type(type_name)?;
        let type_id = flag_type
            .id
            .persisted()
            .ok_or_else(|| Error::NotPersisted(format!("flag type '{type_name}'")))?;
        let severity = catalog.get_flag_severity(severity_name)?;
        let severity_id = severity
            .id
            .persisted()
            .ok_or_else(|| Error::NotPersisted(format!("flag severity '{severity_name}'")))?;

        // Resolve every attachment before writing anything.
        let mut component_ids = Vec::with_capacity(component_names.len());
        for component_name in component_names {
            let record = self.core.require_named(
                VertexCategory::Component,
                component_name,
                "component",
            )?;
            component_ids.push(record.id.persisted().ok_or_else(|| {
                Error::NotPersisted(format!("component '{component_name}'"))
            })?);
        }

        let window = match end {
            None => Validity::open(start),
            Some(end) => Validity::between(start, end),
        };
        let flag = Flag::new(name, comments, window, flag_type, severity);
        let now = current_timestamp();
        let id = self
            .core
            .store
            .add_vertex(VertexCategory::Flag, &flag.attrs(), now)?;
        self.core
            .store
            .add_edge(&EdgeRecord::new(EdgeCategory::FlagType, id, type_id), now)?;
        self.core.store.add_edge(
            &EdgeRecord::new(EdgeCategory::FlagSeverity, id, severity_id),
            now,
        )?;
        for component_id in component_ids {
            self.core.store.add_edge(
                &EdgeRecord::new(EdgeCategory::FlagComponent, id, component_id),
                now,
            )?;
        }
        debug!(name = %flag.name, id, "flag raised");

        let record = self
            .core
            .store
            .get_vertex(id)?
            .ok_or_else(|| Error::NotFound(format!("flag #{id}")))?;
        load_flag(self.core, &record)
    }

    /// Fetches a flag by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no active flag has that name.
    pub fn get_flag(&self, name: &str) -> Result<Flag> {
        let (_, record) = self.resolve(name)?;
        load_flag(self.core, &record)
    }

    /// Closes a flag's window at `end`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyEnded`] if the window already has a finite
    /// end, or [`Error::Validation`] for an end at or before the start.
    pub fn end_flag(&self, name: &str, end: Timestamp) -> Result<()> {
        self.core.authorize("flag", "end")?;
        let (id, record) = self.resolve(name)?;
        let mut flag = load_flag(self.core, &record)?;
        if !flag.window.is_open() {
            return Err(Error::AlreadyEnded(format!("flag '{name}'")));
        }
        if end.time <= flag.window.start.time {
            return Err(Error::Validation(format!(
                "flag end {} must be after start {}",
                end.time, flag.window.start.time
            )));
        }
        flag.window.end = Some(end);
        self.core.store.set_vertex_attrs(id, &flag.attrs())?;
        self.core.cache.invalidate(id);
        debug!(name, id, "flag ended");
        Ok(())
    }

    /// Soft-disables a flag raised in error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no active flag has that name.
    pub fn disable_flag(&self, name: &str, at: i64) -> Result<()> {
        self.core.authorize("flag", "disable")?;
        let (id, _) = self.resolve(name)?;
        self.core.disable_vertex(id, at)
    }

    /// Flags attached to a component whose windows cover `at_time`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown component.
    pub fn flags_of_component(&self, component_name: &str, at_time: i64) -> Result<Vec<Flag>> {
        let record = self.core.require_named(
            VertexCategory::Component,
            component_name,
            "component",
        )?;
        let component_id = record
            .id
            .persisted()
            .ok_or_else(|| Error::NotPersisted(format!("component '{component_name}'")))?;

        let mut flags = Vec::new();
        let attachments = self
            .core
            .store
            .find_edges(&EdgeQuery::active(EdgeCategory::FlagComponent).to(component_id))?;
        for edge in attachments {
            let flag_record = self.core.resolve_vertex(edge.out_vertex)?;
            if !flag_record.is_active() {
                continue;
            }
            if window_of(&flag_record).is_some_and(|window| window.contains(at_time)) {
                flags.push(load_flag(self.core, &flag_record)?);
            }
        }
        flags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(flags)
    }

    /// Lists flags.
    ///
    /// # Errors
    ///
    /// Returns an error if a referenced type or severity does not exist or
    /// the store query fails.
    pub fn list(
        &self,
        filter: &FlagFilter,
        range: ListRange,
        order_by: OrderBy,
        direction: OrderDirection,
    ) -> Result<Vec<Flag>> {
        let query = self
            .flag_query(filter)?
            .ordered(order_by, direction)
            .sliced(range.offset, range.limit);
        self.core
            .store
            .find_vertices(&query)?
            .iter()
            .map(|record| load_flag(self.core, record))
            .collect()
    }

    /// Counts flags matching the filter.
    ///
    /// # Errors
    ///
    /// Returns an error if a referenced type or severity does not exist or
    /// the store query fails.
    pub fn count(&self, filter: &FlagFilter) -> Result<usize> {
        let query = self.flag_query(filter)?;
        self.core.store.count_vertices(&query)
    }

    fn flag_query(&self, filter: &FlagFilter) -> Result<VertexQuery> {
        let mut query = VertexQuery::active(VertexCategory::Flag);
        if let Some(ref substring) = filter.name {
            query = query.with_name_containing(substring.clone());
        }
        if let Some(ref type_name) = filter.type_name {
            let flag_type = CatalogService { core: self.core }.get_flag_type(type_name)?;
            query = self.restrict_to_linked(query, EdgeCategory::FlagType, &flag_type.id)?;
        }
        if let Some(ref severity_name) = filter.severity_name {
            let severity =
                CatalogService { core: self.core }.get_flag_severity(severity_name)?;
            query = self.restrict_to_linked(query, EdgeCategory::FlagSeverity, &severity.id)?;
        }
        Ok(query)
    }

    fn restrict_to_linked(
        &self,
        mut query: VertexQuery,
        category: EdgeCategory,
        target: &crate::models::ElementId,
    ) -> Result<VertexQuery> {
        let target_id = target
            .persisted()
            .ok_or_else(|| Error::NotPersisted("linked catalog entity".to_string()))?;
        let ids: Vec<i64> = self
            .core
            .store
            .find_edges(&EdgeQuery::active(category).to(target_id))?
            .iter()
            .map(|edge| edge.out_vertex)
            .collect();
        let merged = match query.ids_in.take() {
            Some(existing) => existing.into_iter().filter(|id| ids.contains(id)).collect(),
            None => ids,
        };
        Ok(query.with_ids(merged))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::Registry;
    use crate::storage::InMemoryGraphStore;

    fn registry_with_catalog() -> Registry {
        let registry = Registry::new(InMemoryGraphStore::new());
        registry.catalog().add_component_type("router", "").unwrap();
        registry.components().add("r1", "router", None).unwrap();
        registry.components().add("r2", "router", None).unwrap();
        registry.catalog().add_flag_type("outage", "").unwrap();
        registry.catalog().add_flag_type("maintenance", "").unwrap();
        registry.catalog().add_flag_severity("critical", "").unwrap();
        registry.catalog().add_flag_severity("info", "").unwrap();
        registry
    }

    fn ts(time: i64) -> Timestamp {
        Timestamp::new(time, "tester")
    }

    #[test]
    fn test_add_and_fetch() {
        let registry = registry_with_catalog();
        let flag = registry
            .flags()
            .add_flag("out-1", "rack 4", ts(100), None, "outage", "critical", &["r1", "r2"])
            .unwrap();
        assert_eq!(flag.flag_type.name, "outage");
        assert_eq!(flag.severity.name, "critical");
        assert_eq!(flag.components.len(), 2);
        assert!(flag.window.is_open());

        let fetched = registry.flags().get_flag("out-1").unwrap();
        assert_eq!(fetched.name, "out-1");
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let registry = registry_with_catalog();
        registry
            .flags()
            .add_flag("out-1", "", ts(100), None, "outage", "critical", &[])
            .unwrap();
        let err = registry
            .flags()
            .add_flag("out-1", "", ts(200), None, "outage", "info", &[]);
        assert!(matches!(err, Err(Error::AlreadyExists { .. })));
    }

    #[test]
    fn test_unknown_component_rejected_before_write() {
        let registry = registry_with_catalog();
        let err = registry
            .flags()
            .add_flag("out-1", "", ts(100), None, "outage", "critical", &["ghost"]);
        assert!(matches!(err, Err(Error::NotFound(_))));
        assert!(registry.flags().get_flag("out-1").is_err());
    }

    #[test]
    fn test_end_flag_then_double_end() {
        let registry = registry_with_catalog();
        registry
            .flags()
            .add_flag("out-1", "", ts(100), None, "outage", "critical", &["r1"])
            .unwrap();
        registry.flags().end_flag("out-1", ts(200)).unwrap();

        let flag = registry.flags().get_flag("out-1").unwrap();
        assert_eq!(flag.window.end_time(), Some(200));

        let err = registry.flags().end_flag("out-1", ts(300));
        assert!(matches!(err, Err(Error::AlreadyEnded(_))));
    }

    #[test]
    fn test_flags_of_component_respects_window() {
        let registry = registry_with_catalog();
        registry
            .flags()
            .add_flag("out-1", "", ts(100), Some(ts(200)), "outage", "critical", &["r1"])
            .unwrap();
        registry
            .flags()
            .add_flag("maint-1", "", ts(150), None, "maintenance", "info", &["r1"])
            .unwrap();

        let at_150 = registry.flags().flags_of_component("r1", 150).unwrap();
        assert_eq!(at_150.len(), 2);

        let at_250 = registry.flags().flags_of_component("r1", 250).unwrap();
        assert_eq!(at_250.len(), 1);
        assert_eq!(at_250[0].name, "maint-1");

        assert!(registry.flags().flags_of_component("r2", 150).unwrap().is_empty());
    }

    #[test]
    fn test_list_filters_by_type_and_severity() {
        let registry = registry_with_catalog();
        registry
            .flags()
            .add_flag("out-1", "", ts(100), None, "outage", "critical", &[])
            .unwrap();
        registry
            .flags()
            .add_flag("maint-1", "", ts(100), None, "maintenance", "info", &[])
            .unwrap();

        let outages = registry
            .flags()
            .list(
                &FlagFilter {
                    type_name: Some("outage".to_string()),
                    ..FlagFilter::default()
                },
                ListRange::default(),
                OrderBy::Name,
                OrderDirection::Ascending,
            )
            .unwrap();
        assert_eq!(outages.len(), 1);
        assert_eq!(outages[0].name, "out-1");

        let critical = registry
            .flags()
            .count(&FlagFilter {
                severity_name: Some("critical".to_string()),
                ..FlagFilter::default()
            })
            .unwrap();
        assert_eq!(critical, 1);
    }

    #[test]
    fn test_disable_flag_hides_it() {
        let registry = registry_with_catalog();
        registry
            .flags()
            .add_flag("out-1", "", ts(100), None, "outage", "critical", &["r1"])
            .unwrap();
        registry.flags().disable_flag("out-1", 500).unwrap();

        assert!(registry.flags().get_flag("out-1").is_err());
        assert!(registry.flags().flags_of_component("r1", 150).unwrap().is_empty());
    }
}
