//! Catalog operations: the name-keyed reference entities.
//!
//! Component types, component versions, property types, flag types and
//! severities, users, and user groups all share the same shape: a vertex
//! with a unique name among active entries, added strictly (duplicate name
//! errors) or idempotently (duplicate returns the persisted match), browsed
//! with filters and range slices, and retired through replace or disable.

use crate::models::{
    AttrMap, ComponentType, ComponentVersion, EdgeCategory, EdgeRecord, FlagSeverity, FlagType,
    ListRange, NameFilter, OrderBy, OrderDirection, PropertyType, PropertyTypeFilter, User,
    UserGroup, VersionFilter, VertexCategory, VertexRecord,
};
use crate::services::registry::RegistryCore;
use crate::services::AddOutcome;
use crate::storage::{EdgeQuery, VertexQuery};
use crate::{current_timestamp, Error, Result};
use std::sync::Arc;
use tracing::debug;

/// Service view over the catalog entities.
pub struct CatalogService<'a> {
    pub(crate) core: &'a RegistryCore,
}

/// Loads a component version together with its allowed type.
pub(crate) fn load_component_version(
    core: &RegistryCore,
    record: &VertexRecord,
) -> Result<ComponentVersion> {
    let id = record
        .id
        .persisted()
        .ok_or_else(|| Error::NotPersisted("component version".to_string()))?;
    let links = core
        .store
        .find_edges(&EdgeQuery::active(EdgeCategory::VersionAllowedType).from(id))?;
    let link = links
        .first()
        .ok_or_else(|| Error::NotFound(format!("allowed type of component version #{id}")))?;
    let target = core.resolve_vertex(link.in_vertex)?;
    ComponentVersion::from_record(record, ComponentType::from_record(&target)?)
}

/// Loads a property type together with its allowed component types.
pub(crate) fn load_property_type(
    core: &RegistryCore,
    record: &VertexRecord,
) -> Result<PropertyType> {
    let id = record
        .id
        .persisted()
        .ok_or_else(|| Error::NotPersisted("property type".to_string()))?;
    let links = core
        .store
        .find_edges(&EdgeQuery::active(EdgeCategory::PropertyAllowedType).from(id))?;
    let mut allowed_types = Vec::with_capacity(links.len());
    for link in links {
        let target = core.resolve_vertex(link.in_vertex)?;
        allowed_types.push(ComponentType::from_record(&target)?);
    }
    PropertyType::from_record(record, allowed_types)
}

impl CatalogService<'_> {
    /// Persists a uniquely-named vertex, strict by default.
    fn add_named(
        &self,
        kind: &'static str,
        category: VertexCategory,
        name: &str,
        attrs: &AttrMap,
    ) -> Result<VertexRecord> {
        self.core.authorize(kind, "add")?;
        if self.core.find_active_named(category, name)?.is_some() {
            return Err(Error::AlreadyExists {
                kind,
                name: name.to_string(),
            });
        }
        let now = current_timestamp();
        let id = self.core.store.add_vertex(category, attrs, now)?;
        debug!(kind, name, id, "catalog entity added");
        let record = self
            .core
            .store
            .get_vertex(id)?
            .ok_or_else(|| Error::NotFound(format!("{kind} #{id}")))?;
        self.core.cache.put(Arc::new(record.clone()), Some(name));
        Ok(record)
    }

    fn name_query(
        category: VertexCategory,
        filter: &NameFilter,
        range: ListRange,
        order_by: OrderBy,
        direction: OrderDirection,
    ) -> VertexQuery {
        let mut query = VertexQuery::active(category)
            .ordered(order_by, direction)
            .sliced(range.offset, range.limit);
        if let Some(ref substring) = filter.name {
            query = query.with_name_containing(substring.clone());
        }
        query
    }

    /// Ids of active vertices linked to `target_id` by an edge of the given
    /// category (the edge's out side).
    fn ids_linked_to(&self, category: EdgeCategory, target_id: i64) -> Result<Vec<i64>> {
        Ok(self
            .core
            .store
            .find_edges(&EdgeQuery::active(category).to(target_id))?
            .iter()
            .map(|edge| edge.out_vertex)
            .collect())
    }

    // ========================================================================
    // Component types
    // ========================================================================

    /// Adds a component type; errors if the name is already active.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyExists`] on a duplicate name.
    pub fn add_component_type(
        &self,
        name: impl Into<String>,
        comments: impl Into<String>,
    ) -> Result<ComponentType> {
        let ct = ComponentType::new(name, comments);
        let record = self.add_named(
            "component_type",
            VertexCategory::ComponentType,
            &ct.name,
            &ct.attrs(),
        )?;
        ComponentType::from_record(&record)
    }

    /// Adds a component type, or returns the existing one with that name.
    ///
    /// # Errors
    ///
    /// Returns an error only on store or authorization failure.
    pub fn ensure_component_type(
        &self,
        name: impl Into<String>,
        comments: impl Into<String>,
    ) -> Result<AddOutcome<ComponentType>> {
        let name = name.into();
        if let Some(record) = self
            .core
            .find_active_named(VertexCategory::ComponentType, &name)?
        {
            return Ok(AddOutcome::Existing(ComponentType::from_record(&record)?));
        }
        self.add_component_type(name, comments).map(AddOutcome::Created)
    }

    /// Fetches a component type by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no active type has that name.
    pub fn get_component_type(&self, name: &str) -> Result<ComponentType> {
        let record =
            self.core
                .require_named(VertexCategory::ComponentType, name, "component type")?;
        ComponentType::from_record(&record)
    }

    /// Lists component types.
    ///
    /// # Errors
    ///
    /// Returns an error if the store query fails.
    pub fn list_component_types(
        &self,
        filter: &NameFilter,
        range: ListRange,
        order_by: OrderBy,
        direction: OrderDirection,
    ) -> Result<Vec<ComponentType>> {
        let query = Self::name_query(
            VertexCategory::ComponentType,
            filter,
            range,
            order_by,
            direction,
        );
        self.core
            .store
            .find_vertices(&query)?
            .iter()
            .map(ComponentType::from_record)
            .collect()
    }

    /// Counts component types matching the filter.
    ///
    /// # Errors
    ///
    /// Returns an error if the store query fails.
    pub fn count_component_types(&self, filter: &NameFilter) -> Result<usize> {
        let mut query = VertexQuery::active(VertexCategory::ComponentType);
        if let Some(ref substring) = filter.name {
            query = query.with_name_containing(substring.clone());
        }
        self.core.store.count_vertices(&query)
    }

    /// Replaces a component type with a fresh definition.
    ///
    /// The old type stays queryable and names its replacement. Structural
    /// edges onto the old type are not inherited; components keep pointing
    /// at their recorded history.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `name` is not an active type, or
    /// [`Error::AlreadyExists`] if the replacement name collides with a
    /// different active type.
    pub fn replace_component_type(
        &self,
        name: &str,
        new_name: impl Into<String>,
        new_comments: impl Into<String>,
        at: i64,
    ) -> Result<ComponentType> {
        self.core.authorize("component_type", "replace")?;
        let old =
            self.core
                .require_named(VertexCategory::ComponentType, name, "component type")?;
        let old_id = old
            .id
            .persisted()
            .ok_or_else(|| Error::NotPersisted(format!("component type '{name}'")))?;

        let new_name = new_name.into();
        if new_name != name
            && self
                .core
                .find_active_named(VertexCategory::ComponentType, &new_name)?
                .is_some()
        {
            return Err(Error::AlreadyExists {
                kind: "component_type",
                name: new_name,
            });
        }

        let replacement = ComponentType::new(new_name, new_comments);
        let new_id = self.core.store.add_vertex(
            VertexCategory::ComponentType,
            &replacement.attrs(),
            current_timestamp(),
        )?;
        self.core.replace_vertex(old_id, new_id, at)?;

        let record = self
            .core
            .store
            .get_vertex(new_id)?
            .ok_or_else(|| Error::NotFound(format!("component type #{new_id}")))?;
        ComponentType::from_record(&record)
    }

    /// Disables a component type, cascading to its incident edges.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no active type has that name.
    pub fn disable_component_type(&self, name: &str, at: i64) -> Result<()> {
        self.core.authorize("component_type", "disable")?;
        let record =
            self.core
                .require_named(VertexCategory::ComponentType, name, "component type")?;
        let id = record
            .id
            .persisted()
            .ok_or_else(|| Error::NotPersisted(format!("component type '{name}'")))?;
        self.core.disable_vertex(id, at)
    }

    // ========================================================================
    // Component versions
    // ========================================================================

    /// Adds a component version for an existing type.
    ///
    /// Version names are unique within their type, not globally.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the type does not exist, or
    /// [`Error::AlreadyExists`] if the (name, type) pair is already active.
    pub fn add_component_version(
        &self,
        name: impl Into<String>,
        comments: impl Into<String>,
        type_name: &str,
    ) -> Result<ComponentVersion> {
        self.core.authorize("component_version", "add")?;
        let name = name.into();
        let allowed_type = self.get_component_type(type_name)?;
        let type_id = allowed_type
            .id
            .persisted()
            .ok_or_else(|| Error::NotPersisted(format!("component type '{type_name}'")))?;

        if self.find_version_record(&name, type_id)?.is_some() {
            return Err(Error::AlreadyExists {
                kind: "component_version",
                name: format!("{name} ({type_name})"),
            });
        }

        let version = ComponentVersion::new(name, comments, allowed_type);
        let now = current_timestamp();
        let id = self.core.store.add_vertex(
            VertexCategory::ComponentVersion,
            &version.attrs(),
            now,
        )?;
        self.core.store.add_edge(
            &EdgeRecord::new(EdgeCategory::VersionAllowedType, id, type_id),
            now,
        )?;

        let record = self
            .core
            .store
            .get_vertex(id)?
            .ok_or_else(|| Error::NotFound(format!("component version #{id}")))?;
        load_component_version(self.core, &record)
    }

    /// Finds the active version vertex with this name under the given type.
    fn find_version_record(&self, name: &str, type_id: i64) -> Result<Option<VertexRecord>> {
        let candidates = self.core.store.find_vertices(
            &VertexQuery::active(VertexCategory::ComponentVersion).with_name(name),
        )?;
        for candidate in candidates {
            let Some(id) = candidate.id.persisted() else {
                continue;
            };
            let links = self
                .core
                .store
                .find_edges(&EdgeQuery::active(EdgeCategory::VersionAllowedType).from(id))?;
            if links.iter().any(|link| link.in_vertex == type_id) {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }

    /// Fetches a component version by name and type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no active version matches.
    pub fn get_component_version(&self, name: &str, type_name: &str) -> Result<ComponentVersion> {
        let allowed_type = self.get_component_type(type_name)?;
        let type_id = allowed_type
            .id
            .persisted()
            .ok_or_else(|| Error::NotPersisted(format!("component type '{type_name}'")))?;
        let record = self.find_version_record(name, type_id)?.ok_or_else(|| {
            Error::NotFound(format!("component version '{name}' of type '{type_name}'"))
        })?;
        ComponentVersion::from_record(&record, allowed_type)
    }

    /// Lists component versions.
    ///
    /// # Errors
    ///
    /// Returns an error if a referenced type does not exist or the store
    /// query fails.
    pub fn list_component_versions(
        &self,
        filter: &VersionFilter,
        range: ListRange,
        order_by: OrderBy,
        direction: OrderDirection,
    ) -> Result<Vec<ComponentVersion>> {
        let mut query = VertexQuery::active(VertexCategory::ComponentVersion)
            .ordered(order_by, direction)
            .sliced(range.offset, range.limit);
        if let Some(ref substring) = filter.name {
            query = query.with_name_containing(substring.clone());
        }
        if let Some(ref type_name) = filter.type_name {
            let allowed_type = self.get_component_type(type_name)?;
            let type_id = allowed_type
                .id
                .persisted()
                .ok_or_else(|| Error::NotPersisted(format!("component type '{type_name}'")))?;
            query = query.with_ids(self.ids_linked_to(EdgeCategory::VersionAllowedType, type_id)?);
        }

        self.core
            .store
            .find_vertices(&query)?
            .iter()
            .map(|record| load_component_version(self.core, record))
            .collect()
    }

    // ========================================================================
    // Property types
    // ========================================================================

    /// Adds a property type; all named allowed types must already exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] on an empty allowed-type list, a zero
    /// value count, or a broken regex; [`Error::NotFound`] for an unknown
    /// allowed type; [`Error::AlreadyExists`] on a duplicate name. Nothing
    /// is persisted on failure.
    pub fn add_property_type(
        &self,
        name: impl Into<String>,
        units: impl Into<String>,
        allowed_regex: impl Into<String>,
        n_values: u32,
        comments: impl Into<String>,
        allowed_type_names: &[&str],
    ) -> Result<PropertyType> {
        self.core.authorize("property_type", "add")?;
        let mut allowed_types = Vec::with_capacity(allowed_type_names.len());
        for type_name in allowed_type_names {
            allowed_types.push(self.get_component_type(type_name)?);
        }
        let property_type =
            PropertyType::new(name, units, allowed_regex, n_values, comments, allowed_types)?;

        if self
            .core
            .find_active_named(VertexCategory::PropertyType, &property_type.name)?
            .is_some()
        {
            return Err(Error::AlreadyExists {
                kind: "property_type",
                name: property_type.name,
            });
        }

        let now = current_timestamp();
        let id = self.core.store.add_vertex(
            VertexCategory::PropertyType,
            &property_type.attrs(),
            now,
        )?;
        for allowed in &property_type.allowed_types {
            let type_id = allowed.id.persisted().ok_or_else(|| {
                Error::NotPersisted(format!("component type '{}'", allowed.name))
            })?;
            self.core.store.add_edge(
                &EdgeRecord::new(EdgeCategory::PropertyAllowedType, id, type_id),
                now,
            )?;
        }

        let record = self
            .core
            .store
            .get_vertex(id)?
            .ok_or_else(|| Error::NotFound(format!("property type #{id}")))?;
        load_property_type(self.core, &record)
    }

    /// Fetches a property type by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no active property type has that name.
    pub fn get_property_type(&self, name: &str) -> Result<PropertyType> {
        let record =
            self.core
                .require_named(VertexCategory::PropertyType, name, "property type")?;
        load_property_type(self.core, &record)
    }

    /// Lists property types.
    ///
    /// # Errors
    ///
    /// Returns an error if a referenced type does not exist or the store
    /// query fails.
    pub fn list_property_types(
        &self,
        filter: &PropertyTypeFilter,
        range: ListRange,
        order_by: OrderBy,
        direction: OrderDirection,
    ) -> Result<Vec<PropertyType>> {
        let mut query = VertexQuery::active(VertexCategory::PropertyType)
            .ordered(order_by, direction)
            .sliced(range.offset, range.limit);
        if let Some(ref substring) = filter.name {
            query = query.with_name_containing(substring.clone());
        }
        if let Some(ref type_name) = filter.allowed_type_name {
            let allowed_type = self.get_component_type(type_name)?;
            let type_id = allowed_type
                .id
                .persisted()
                .ok_or_else(|| Error::NotPersisted(format!("component type '{type_name}'")))?;
            query = query.with_ids(self.ids_linked_to(EdgeCategory::PropertyAllowedType, type_id)?);
        }

        self.core
            .store
            .find_vertices(&query)?
            .iter()
            .map(|record| load_property_type(self.core, record))
            .collect()
    }

    /// Disables a property type, cascading to its incident edges.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no active property type has that name.
    pub fn disable_property_type(&self, name: &str, at: i64) -> Result<()> {
        self.core.authorize("property_type", "disable")?;
        let record =
            self.core
                .require_named(VertexCategory::PropertyType, name, "property type")?;
        let id = record
            .id
            .persisted()
            .ok_or_else(|| Error::NotPersisted(format!("property type '{name}'")))?;
        self.core.disable_vertex(id, at)
    }

    // ========================================================================
    // Flag types and severities
    // ========================================================================

    /// Adds a flag type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyExists`] on a duplicate name.
    pub fn add_flag_type(
        &self,
        name: impl Into<String>,
        comments: impl Into<String>,
    ) -> Result<FlagType> {
        let ft = FlagType::new(name, comments);
        let record =
            self.add_named("flag_type", VertexCategory::FlagType, &ft.name, &ft.attrs())?;
        FlagType::from_record(&record)
    }

    /// Fetches a flag type by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no active flag type has that name.
    pub fn get_flag_type(&self, name: &str) -> Result<FlagType> {
        let record = self.core.require_named(VertexCategory::FlagType, name, "flag type")?;
        FlagType::from_record(&record)
    }

    /// Adds a flag severity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyExists`] on a duplicate name.
    pub fn add_flag_severity(
        &self,
        name: impl Into<String>,
        comments: impl Into<String>,
    ) -> Result<FlagSeverity> {
        let severity = FlagSeverity::new(name, comments);
        let record = self.add_named(
            "flag_severity",
            VertexCategory::FlagSeverity,
            &severity.name,
            &severity.attrs(),
        )?;
        FlagSeverity::from_record(&record)
    }

    /// Fetches a flag severity by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no active severity has that name.
    pub fn get_flag_severity(&self, name: &str) -> Result<FlagSeverity> {
        let record =
            self.core
                .require_named(VertexCategory::FlagSeverity, name, "flag severity")?;
        FlagSeverity::from_record(&record)
    }

    /// Lists flag types.
    ///
    /// # Errors
    ///
    /// Returns an error if the store query fails.
    pub fn list_flag_types(
        &self,
        filter: &NameFilter,
        range: ListRange,
        order_by: OrderBy,
        direction: OrderDirection,
    ) -> Result<Vec<FlagType>> {
        let query =
            Self::name_query(VertexCategory::FlagType, filter, range, order_by, direction);
        self.core
            .store
            .find_vertices(&query)?
            .iter()
            .map(FlagType::from_record)
            .collect()
    }

    /// Lists flag severities.
    ///
    /// # Errors
    ///
    /// Returns an error if the store query fails.
    pub fn list_flag_severities(
        &self,
        filter: &NameFilter,
        range: ListRange,
        order_by: OrderBy,
        direction: OrderDirection,
    ) -> Result<Vec<FlagSeverity>> {
        let query = Self::name_query(
            VertexCategory::FlagSeverity,
            filter,
            range,
            order_by,
            direction,
        );
        self.core
            .store
            .find_vertices(&query)?
            .iter()
            .map(FlagSeverity::from_record)
            .collect()
    }

    // ========================================================================
    // Users and groups
    // ========================================================================

    /// Adds a user.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyExists`] on a duplicate name.
    pub fn add_user(
        &self,
        name: impl Into<String>,
        institution: impl Into<String>,
    ) -> Result<User> {
        let user = User::new(name, institution);
        let record = self.add_named("user", VertexCategory::User, &user.name, &user.attrs())?;
        User::from_record(&record)
    }

    /// Fetches a user by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no active user has that name.
    pub fn get_user(&self, name: &str) -> Result<User> {
        let record = self.core.require_named(VertexCategory::User, name, "user")?;
        User::from_record(&record)
    }

    /// Lists users.
    ///
    /// # Errors
    ///
    /// Returns an error if the store query fails.
    pub fn list_users(
        &self,
        filter: &NameFilter,
        range: ListRange,
        order_by: OrderBy,
        direction: OrderDirection,
    ) -> Result<Vec<User>> {
        let query = Self::name_query(VertexCategory::User, filter, range, order_by, direction);
        self.core
            .store
            .find_vertices(&query)?
            .iter()
            .map(User::from_record)
            .collect()
    }

    /// Adds a user group with its permission strings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyExists`] on a duplicate name.
    pub fn add_user_group(
        &self,
        name: impl Into<String>,
        permissions: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<UserGroup> {
        let group = UserGroup::new(name, permissions);
        let record = self.add_named(
            "user_group",
            VertexCategory::UserGroup,
            &group.name,
            &group.attrs(),
        )?;
        UserGroup::from_record(&record)
    }

    /// Fetches a user group by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no active group has that name.
    pub fn get_user_group(&self, name: &str) -> Result<UserGroup> {
        let record = self.core.require_named(VertexCategory::UserGroup, name, "user group")?;
        UserGroup::from_record(&record)
    }

    /// Puts a user into a group.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if either side is missing, or
    /// [`Error::AlreadyExists`] if the membership already exists.
    pub fn assign_user_to_group(&self, user_name: &str, group_name: &str) -> Result<()> {
        self.core.authorize("user_group", "assign")?;
        let user = self.core.require_named(VertexCategory::User, user_name, "user")?;
        let group = self
            .core
            .require_named(VertexCategory::UserGroup, group_name, "user group")?;
        let user_id = user
            .id
            .persisted()
            .ok_or_else(|| Error::NotPersisted(format!("user '{user_name}'")))?;
        let group_id = group
            .id
            .persisted()
            .ok_or_else(|| Error::NotPersisted(format!("user group '{group_name}'")))?;

        let existing = self
            .core
            .store
            .find_edges(&EdgeQuery::active(EdgeCategory::UserGroup).from(user_id))?;
        if existing.iter().any(|edge| edge.in_vertex == group_id) {
            return Err(Error::AlreadyExists {
                kind: "user_group membership",
                name: format!("{user_name} in {group_name}"),
            });
        }

        self.core.store.add_edge(
            &EdgeRecord::new(EdgeCategory::UserGroup, user_id, group_id),
            current_timestamp(),
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::Registry;
    use crate::storage::InMemoryGraphStore;

    fn registry() -> Registry {
        Registry::new(InMemoryGraphStore::new())
    }

    #[test]
    fn test_strict_add_rejects_duplicate() {
        let registry = registry();
        registry.catalog().add_component_type("router", "").unwrap();
        let err = registry.catalog().add_component_type("router", "");
        assert!(matches!(err, Err(Error::AlreadyExists { .. })));
    }

    #[test]
    fn test_ensure_returns_existing() {
        let registry = registry();
        let created = registry
            .catalog()
            .ensure_component_type("router", "")
            .unwrap();
        assert!(matches!(&created, AddOutcome::Created(_)));

        let existing = registry
            .catalog()
            .ensure_component_type("router", "ignored")
            .unwrap();
        let AddOutcome::Existing(ct) = existing else {
            panic!("expected the persisted match");
        };
        assert_eq!(ct.id, created.into_inner().id);

        // Exactly one active vertex carries the key.
        assert_eq!(
            registry
                .catalog()
                .count_component_types(&NameFilter::default())
                .unwrap(),
            1
        );
    }

    #[test]
    fn test_version_unique_per_type() {
        let registry = registry();
        registry.catalog().add_component_type("router", "").unwrap();
        registry.catalog().add_component_type("antenna", "").unwrap();

        registry
            .catalog()
            .add_component_version("v2", "", "router")
            .unwrap();
        // Same name under another type is fine.
        registry
            .catalog()
            .add_component_version("v2", "", "antenna")
            .unwrap();
        // Same (name, type) pair is not.
        let err = registry.catalog().add_component_version("v2", "", "router");
        assert!(matches!(err, Err(Error::AlreadyExists { .. })));

        let version = registry
            .catalog()
            .get_component_version("v2", "router")
            .unwrap();
        assert_eq!(version.allowed_type.name, "router");
    }

    #[test]
    fn test_property_type_roundtrip_with_allowed_types() {
        let registry = registry();
        registry.catalog().add_component_type("computer", "").unwrap();
        registry
            .catalog()
            .add_property_type("OS", "", ".*", 1, "", &["computer"])
            .unwrap();

        let pt = registry.catalog().get_property_type("OS").unwrap();
        assert_eq!(pt.n_values, 1);
        assert_eq!(pt.allowed_types.len(), 1);
        assert_eq!(pt.allowed_types[0].name, "computer");
    }

    #[test]
    fn test_property_type_requires_existing_allowed_type() {
        let registry = registry();
        let err = registry
            .catalog()
            .add_property_type("OS", "", ".*", 1, "", &["computer"]);
        assert!(matches!(err, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_replace_component_type_keeps_history() {
        let registry = registry();
        let old = registry.catalog().add_component_type("router", "").unwrap();
        let old_id = old.id.persisted().unwrap();

        let replacement = registry
            .catalog()
            .replace_component_type("router", "router", "updated wording", 500)
            .unwrap();
        let new_id = replacement.id.persisted().unwrap();

        // Old vertex remains fetchable and names its replacement.
        let old_record = registry.store().get_vertex(old_id).unwrap().unwrap();
        assert_eq!(old_record.status.replacement(), Some(new_id));

        // The name now resolves to the replacement.
        let current = registry.catalog().get_component_type("router").unwrap();
        assert_eq!(current.id.persisted(), Some(new_id));
        assert_eq!(current.comments, "updated wording");
    }

    #[test]
    fn test_list_versions_filtered_by_type() {
        let registry = registry();
        registry.catalog().add_component_type("router", "").unwrap();
        registry.catalog().add_component_type("antenna", "").unwrap();
        registry
            .catalog()
            .add_component_version("v1", "", "router")
            .unwrap();
        registry
            .catalog()
            .add_component_version("v1", "", "antenna")
            .unwrap();
        registry
            .catalog()
            .add_component_version("v2", "", "router")
            .unwrap();

        let routers = registry
            .catalog()
            .list_component_versions(
                &VersionFilter {
                    name: None,
                    type_name: Some("router".to_string()),
                },
                ListRange::default(),
                OrderBy::Name,
                OrderDirection::Ascending,
            )
            .unwrap();
        assert_eq!(routers.len(), 2);
        assert!(routers.iter().all(|v| v.allowed_type.name == "router"));
    }

    #[test]
    fn test_group_membership() {
        let registry = registry();
        registry.catalog().add_user("alice", "Observatory").unwrap();
        registry
            .catalog()
            .add_user_group("operators", ["component;connect"])
            .unwrap();

        registry
            .catalog()
            .assign_user_to_group("alice", "operators")
            .unwrap();
        let err = registry.catalog().assign_user_to_group("alice", "operators");
        assert!(matches!(err, Err(Error::AlreadyExists { .. })));
    }
}
