//! Component lifecycle, connectivity, and containment.
//!
//! Connections between components are timestamped edges whose validity
//! intervals must never overlap for the same unordered pair. Subcomponent
//! links are untimestamped containment edges. Every compound check-then-
//! write sequence here runs under the pair's key lock, so a concurrent
//! caller cannot slip a conflicting interval in between the check and the
//! insert.

use crate::config::CyclePolicy;
use crate::models::{
    Component, ComponentSnapshot, Connection, EdgeCategory, EdgeRecord, ListRange, NameFilter,
    OrderBy, OrderDirection, Timestamp, Validity, VertexCategory, VertexRecord,
    ComponentFilter, ATTR_NAME,
};
use crate::services::catalog::load_component_version;
use crate::services::flag::window_of;
use crate::services::locks::LockKey;
use crate::services::property::load_property;
use crate::services::registry::RegistryCore;
use crate::services::{AddOutcome, ConnectOutcome, LinkOutcome, TimeFilter};
use crate::storage::{EdgeQuery, VertexQuery};
use crate::{current_timestamp, Error, Result};
use std::collections::HashSet;
use tracing::debug;

/// Service view over components.
pub struct ComponentService<'a> {
    pub(crate) core: &'a RegistryCore,
}

/// Loads a component together with its type and optional version.
pub(crate) fn load_component(core: &RegistryCore, record: &VertexRecord) -> Result<Component> {
    let id = record
        .id
        .persisted()
        .ok_or_else(|| Error::NotPersisted("component".to_string()))?;

    let type_links = core
        .store
        .find_edges(&EdgeQuery::active(EdgeCategory::ComponentType).from(id))?;
    let type_link = type_links
        .first()
        .ok_or_else(|| Error::NotFound(format!("type of component #{id}")))?;
    let type_record = core.resolve_vertex(type_link.in_vertex)?;
    let component_type = crate::models::ComponentType::from_record(&type_record)?;

    let version_links = core
        .store
        .find_edges(&EdgeQuery::active(EdgeCategory::Version).from(id))?;
    let version = match version_links.first() {
        None => None,
        Some(link) => {
            let version_record = core.resolve_vertex(link.in_vertex)?;
            Some(load_component_version(core, &version_record)?)
        },
    };

    Component::from_record(record, component_type, version)
}

impl ComponentService<'_> {
    fn resolve(&self, name: &str) -> Result<(i64, VertexRecord)> {
        let record = self.core.require_named(VertexCategory::Component, name, "component")?;
        let id = record
            .id
            .persisted()
            .ok_or_else(|| Error::NotPersisted(format!("component '{name}'")))?;
        Ok((id, record))
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Adds a component of an existing type, optionally with a version.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyExists`] on a duplicate name, or
    /// [`Error::NotFound`] if the type or version does not exist.
    pub fn add(
        &self,
        name: impl Into<String>,
        type_name: &str,
        version_name: Option<&str>,
    ) -> Result<Component> {
        self.core.authorize("component", "add")?;
        let name = name.into();
        if self
            .core
            .find_active_named(VertexCategory::Component, &name)?
            .is_some()
        {
            return Err(Error::AlreadyExists {
                kind: "component",
                name,
            });
        }

        let component_type = crate::services::catalog::CatalogService { core: self.core }
            .get_component_type(type_name)?;
        let type_id = component_type
            .id
            .persisted()
            .ok_or_else(|| Error::NotPersisted(format!("component type '{type_name}'")))?;
        let version = match version_name {
            None => None,
            Some(v) => Some(
                crate::services::catalog::CatalogService { core: self.core }
                    .get_component_version(v, type_name)?,
            ),
        };

        let component = Component::new(name, component_type, version);
        let now = current_timestamp();
        let id = self
            .core
            .store
            .add_vertex(VertexCategory::Component, &component.attrs(), now)?;
        self.core.store.add_edge(
            &EdgeRecord::new(EdgeCategory::ComponentType, id, type_id),
            now,
        )?;
        if let Some(ref version) = component.version {
            let version_id = version
                .id
                .persisted()
                .ok_or_else(|| Error::NotPersisted(format!("version '{}'", version.name)))?;
            self.core
                .store
                .add_edge(&EdgeRecord::new(EdgeCategory::Version, id, version_id), now)?;
        }
        debug!(name = %component.name, id, "component added");

        let record = self
            .core
            .store
            .get_vertex(id)?
            .ok_or_else(|| Error::NotFound(format!("component #{id}")))?;
        load_component(self.core, &record)
    }

    /// Adds a component, or returns the existing one with that name.
    ///
    /// # Errors
    ///
    /// Returns an error only on store, lookup, or authorization failure.
    pub fn ensure(
        &self,
        name: impl Into<String>,
        type_name: &str,
        version_name: Option<&str>,
    ) -> Result<AddOutcome<Component>> {
        let name = name.into();
        if let Some(record) = self
            .core
            .find_active_named(VertexCategory::Component, &name)?
        {
            return Ok(AddOutcome::Existing(load_component(self.core, &record)?));
        }
        self.add(name, type_name, version_name).map(AddOutcome::Created)
    }

    /// Fetches a component by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no active component has that name.
    pub fn get(&self, name: &str) -> Result<Component> {
        let (_, record) = self.resolve(name)?;
        load_component(self.core, &record)
    }

    /// Checks whether an active component with this name is persisted.
    ///
    /// # Errors
    ///
    /// Returns an error if the store query fails.
    pub fn exists(&self, name: &str) -> Result<bool> {
        Ok(self
            .core
            .find_active_named(VertexCategory::Component, name)?
            .is_some())
    }

    /// Lists components.
    ///
    /// # Errors
    ///
    /// Returns an error if a referenced type does not exist or the store
    /// query fails.
    pub fn list(
        &self,
        filter: &ComponentFilter,
        range: ListRange,
        order_by: OrderBy,
        direction: OrderDirection,
    ) -> Result<Vec<Component>> {
        let query = self.component_query(filter)?;
        let query = query.ordered(order_by, direction).sliced(range.offset, range.limit);
        self.core
            .store
            .find_vertices(&query)?
            .iter()
            .map(|record| load_component(self.core, record))
            .collect()
    }

    /// Counts components matching the filter.
    ///
    /// # Errors
    ///
    /// Returns an error if a referenced type does not exist or the store
    /// query fails.
    pub fn count(&self, filter: &ComponentFilter) -> Result<usize> {
        let query = self.component_query(filter)?;
        self.core.store.count_vertices(&query)
    }

    fn component_query(&self, filter: &ComponentFilter) -> Result<VertexQuery> {
        let mut query = VertexQuery::active(VertexCategory::Component);
        if let Some(ref substring) = filter.name {
            query = query.with_name_containing(substring.clone());
        }
        if let Some(ref type_name) = filter.type_name {
            let catalog = crate::services::catalog::CatalogService { core: self.core };
            let component_type = catalog.get_component_type(type_name)?;
            let type_id = component_type
                .id
                .persisted()
                .ok_or_else(|| Error::NotPersisted(format!("component type '{type_name}'")))?;
            let ids: Vec<i64> = self
                .core
                .store
                .find_edges(&EdgeQuery::active(EdgeCategory::ComponentType).to(type_id))?
                .iter()
                .map(|edge| edge.out_vertex)
                .collect();
            query = query.with_ids(ids);
        }
        if let Some(ref version_name) = filter.version_name {
            let ids: Vec<i64> = self
                .core
                .store
                .find_edges(&EdgeQuery {
                    category: Some(EdgeCategory::Version),
                    active_only: true,
                    ..EdgeQuery::default()
                })?
                .iter()
                .filter(|edge| {
                    self.core
                        .resolve_vertex(edge.in_vertex)
                        .ok()
                        .and_then(|v| v.text_attr(ATTR_NAME).map(|n| n == version_name))
                        .unwrap_or(false)
                })
                .map(|edge| edge.out_vertex)
                .collect();
            let merged = match query.ids_in.take() {
                Some(existing) => existing.into_iter().filter(|id| ids.contains(id)).collect(),
                None => ids,
            };
            query = query.with_ids(merged);
        }
        Ok(query)
    }

    /// Assigns or reassigns a component's version.
    ///
    /// A previously assigned version link is disabled, keeping the history
    /// of what was assigned when.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the component or version is missing.
    pub fn set_version(&self, name: &str, version_name: &str) -> Result<()> {
        self.core.authorize("component", "set_version")?;
        let (id, record) = self.resolve(name)?;
        let component = load_component(self.core, &record)?;
        let version = crate::services::catalog::CatalogService { core: self.core }
            .get_component_version(version_name, &component.component_type.name)?;
        let version_id = version
            .id
            .persisted()
            .ok_or_else(|| Error::NotPersisted(format!("version '{version_name}'")))?;

        let now = current_timestamp();
        let existing = self
            .core
            .store
            .find_edges(&EdgeQuery::active(EdgeCategory::Version).from(id))?;
        for link in existing {
            if let Some(link_id) = link.id.persisted() {
                self.core
                    .store
                    .set_edge_status(link_id, crate::models::LifecycleStatus::Disabled { at: now })?;
            }
        }
        self.core
            .store
            .add_edge(&EdgeRecord::new(EdgeCategory::Version, id, version_id), now)?;
        self.core.cache.invalidate(id);
        Ok(())
    }

    /// Replaces a component with a fresh one, migrating its relationships.
    ///
    /// Connections, property assignments, flag attachments, and containment
    /// links move to the replacement with their intervals intact. The type
    /// and version links do not; they are assigned fresh from the arguments.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the component, type, or version is
    /// missing.
    pub fn replace(
        &self,
        name: &str,
        new_name: impl Into<String>,
        type_name: &str,
        version_name: Option<&str>,
        at: i64,
    ) -> Result<Component> {
        self.core.authorize("component", "replace")?;
        let (old_id, _) = self.resolve(name)?;
        let _guard = self.core.locks.lock(&LockKey::Vertex(old_id));

        let new_name = new_name.into();
        if new_name != name
            && self
                .core
                .find_active_named(VertexCategory::Component, &new_name)?
                .is_some()
        {
            return Err(Error::AlreadyExists {
                kind: "component",
                name: new_name,
            });
        }

        // Retire the old vertex first so the name is free for its successor.
        self.core
            .store
            .set_vertex_status(old_id, crate::models::LifecycleStatus::Disabled { at })?;
        self.core.cache.invalidate(old_id);

        let replacement = self.add(new_name, type_name, version_name)?;
        let new_id = replacement
            .id
            .persisted()
            .ok_or_else(|| Error::NotPersisted("replacement component".to_string()))?;
        self.core.replace_vertex(old_id, new_id, at)?;
        Ok(replacement)
    }

    /// Disables a component, cascading to every incident edge.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no active component has that name.
    pub fn disable(&self, name: &str, at: i64) -> Result<()> {
        self.core.authorize("component", "disable")?;
        let (id, _) = self.resolve(name)?;
        self.core.disable_vertex(id, at)
    }

    // ========================================================================
    // Connectivity
    // ========================================================================

    /// Connects two components over `[start, end)`; strict.
    ///
    /// Returns the id of the new connection edge.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SelfConnection`], [`Error::AlreadyConnected`] if a
    /// connection is active at the start time, or
    /// [`Error::OverlappingConnection`] if the interval would run into a
    /// later one.
    pub fn connect(
        &self,
        a: &str,
        b: &str,
        start: Timestamp,
        end: Option<Timestamp>,
    ) -> Result<i64> {
        match self.connect_inner(a, b, start, end, true)? {
            ConnectOutcome::Connected(edge_id) => Ok(edge_id),
            // Strict mode surfaces the conflict as an error inside
            // connect_inner; this arm is never taken.
            ConnectOutcome::AlreadyConnected => Err(Error::OperationFailed {
                operation: "connect".to_string(),
                cause: "strict connect returned a no-op".to_string(),
            }),
        }
    }

    /// Connects two components, treating "already connected" as a no-op.
    ///
    /// # Errors
    ///
    /// Overlap with a later interval is still an error; only the duplicate
    /// case is routine.
    pub fn try_connect(
        &self,
        a: &str,
        b: &str,
        start: Timestamp,
        end: Option<Timestamp>,
    ) -> Result<ConnectOutcome> {
        self.connect_inner(a, b, start, end, false)
    }

    fn connect_inner(
        &self,
        a: &str,
        b: &str,
        start: Timestamp,
        end: Option<Timestamp>,
        strict: bool,
    ) -> Result<ConnectOutcome> {
        self.core.authorize("component", "connect")?;
        if a == b {
            return Err(Error::SelfConnection(a.to_string()));
        }
        let (a_id, _) = self.resolve(a)?;
        let (b_id, _) = self.resolve(b)?;

        if let Some(ref end) = end {
            if end.time <= start.time {
                return Err(Error::Validation(format!(
                    "connection end {} must be after start {}",
                    end.time, start.time
                )));
            }
        }

        let _guard = self.core.locks.lock(&LockKey::pair(a_id, b_id));

        let at_start = self.core.store.find_edges(
            &EdgeQuery::active(EdgeCategory::Connection)
                .between(a_id, b_id)
                .at_time(start.time),
        )?;
        if !at_start.is_empty() {
            if strict {
                return Err(Error::AlreadyConnected {
                    a: a.to_string(),
                    b: b.to_string(),
                    at: start.time,
                });
            }
            return Ok(ConnectOutcome::AlreadyConnected);
        }

        let later = self.core.store.find_edges(
            &EdgeQuery::active(EdgeCategory::Connection)
                .between(a_id, b_id)
                .starting_at_or_after(start.time),
        )?;
        if let Some(earliest) = later
            .iter()
            .filter_map(|edge| edge.validity.as_ref().map(Validity::start_time))
            .min()
        {
            let conflict = Error::OverlappingConnection {
                a: a.to_string(),
                b: b.to_string(),
                existing_start: earliest,
            };
            match end {
                // An unbounded interval cannot be opened before a later one.
                None => return Err(conflict),
                Some(ref end) if end.time >= earliest => return Err(conflict),
                Some(_) => {},
            }
        }

        let validity = match end {
            None => Validity::open(start),
            Some(end) => Validity::between(start, end),
        };
        let edge = EdgeRecord::timestamped(EdgeCategory::Connection, a_id, b_id, validity);
        let edge_id = self.core.store.add_edge(&edge, current_timestamp())?;
        debug!(a, b, edge_id, "components connected");
        Ok(ConnectOutcome::Connected(edge_id))
    }

    /// Closes the connection active at `end.time` between two components.
    ///
    /// The end is written onto the existing edge; no new edge is created.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyDisconnected`] if no connection is active at
    /// that time.
    pub fn disconnect(&self, a: &str, b: &str, end: Timestamp) -> Result<()> {
        self.core.authorize("component", "disconnect")?;
        let (a_id, _) = self.resolve(a)?;
        let (b_id, _) = self.resolve(b)?;

        let _guard = self.core.locks.lock(&LockKey::pair(a_id, b_id));

        let active = self.core.store.find_edges(
            &EdgeQuery::active(EdgeCategory::Connection)
                .between(a_id, b_id)
                .at_time(end.time),
        )?;
        let Some(edge) = active.first() else {
            return Err(Error::AlreadyDisconnected {
                a: a.to_string(),
                b: b.to_string(),
                at: end.time,
            });
        };
        let edge_id = edge
            .id
            .persisted()
            .ok_or_else(|| Error::NotPersisted("connection edge".to_string()))?;
        self.core.store.set_edge_end(edge_id, &end)?;
        debug!(a, b, edge_id, at = end.time, "components disconnected");
        Ok(())
    }

    /// Queries a component's connections.
    ///
    /// `peers`, when given, restricts the result to connections with those
    /// components.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown component or peer.
    pub fn get_connections(
        &self,
        name: &str,
        filter: TimeFilter,
        peers: Option<&[&str]>,
    ) -> Result<Vec<Connection>> {
        let (id, _) = self.resolve(name)?;

        let mut query = EdgeQuery::active(EdgeCategory::Connection).touching(id);
        match filter {
            TimeFilter::At(t) => query = query.at_time(t),
            TimeFilter::Range(from_time, to_time) => {
                query = query.over_range(from_time, to_time);
            },
            TimeFilter::All => {},
        }

        let peer_ids: Option<HashSet<i64>> = match peers {
            None => None,
            Some(names) => {
                let mut ids = HashSet::with_capacity(names.len());
                for peer in names {
                    let (peer_id, _) = self.resolve(peer)?;
                    ids.insert(peer_id);
                }
                Some(ids)
            },
        };

        let mut connections = Vec::new();
        for edge in self.core.store.find_edges(&query)? {
            let Some(peer) = edge.other_endpoint(id) else {
                continue;
            };
            if let Some(ref allowed) = peer_ids {
                if !allowed.contains(&peer) {
                    continue;
                }
            }
            let Some(validity) = edge.validity.clone() else {
                continue;
            };
            let peer_record = self.core.resolve_vertex(peer)?;
            connections.push(Connection {
                edge_id: edge.id,
                peer,
                peer_name: peer_record.text_attr(ATTR_NAME).unwrap_or_default().to_string(),
                validity,
            });
        }
        Ok(connections)
    }

    // ========================================================================
    // Containment
    // ========================================================================

    /// Records that `child` is a subcomponent of `parent`; strict.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SelfConnection`] for a self-link,
    /// [`Error::IsSubcomponentOfOther`] if the link would create a cycle
    /// under the configured policy, or [`Error::AlreadySubcomponent`] if
    /// the link already exists.
    pub fn subcomponent_connect(&self, parent: &str, child: &str) -> Result<i64> {
        match self.subcomponent_inner(parent, child, true)? {
            LinkOutcome::Linked(edge_id) => Ok(edge_id),
            LinkOutcome::AlreadyPresent => Err(Error::OperationFailed {
                operation: "subcomponent_connect".to_string(),
                cause: "strict link returned a no-op".to_string(),
            }),
        }
    }

    /// Records a containment link, treating "already linked" as a no-op.
    ///
    /// # Errors
    ///
    /// Cycles remain errors; only the duplicate case is routine.
    pub fn try_subcomponent_connect(&self, parent: &str, child: &str) -> Result<LinkOutcome> {
        self.subcomponent_inner(parent, child, false)
    }

    fn subcomponent_inner(&self, parent: &str, child: &str, strict: bool) -> Result<LinkOutcome> {
        self.core.authorize("component", "subcomponent_connect")?;
        if parent == child {
            return Err(Error::SelfConnection(parent.to_string()));
        }
        let (parent_id, _) = self.resolve(parent)?;
        let (child_id, _) = self.resolve(child)?;

        let _guard = self.core.locks.lock(&LockKey::pair(parent_id, child_id));

        if self.would_cycle(parent_id, child_id)? {
            return Err(Error::IsSubcomponentOfOther {
                parent: parent.to_string(),
                child: child.to_string(),
            });
        }

        let existing = self.core.store.find_edges(
            &EdgeQuery::active(EdgeCategory::Subcomponent)
                .from(parent_id)
                .to(child_id),
        )?;
        if !existing.is_empty() {
            if strict {
                return Err(Error::AlreadySubcomponent {
                    parent: parent.to_string(),
                    child: child.to_string(),
                });
            }
            return Ok(LinkOutcome::AlreadyPresent);
        }

        let edge = EdgeRecord::new(EdgeCategory::Subcomponent, parent_id, child_id);
        let edge_id = self.core.store.add_edge(&edge, current_timestamp())?;
        Ok(LinkOutcome::Linked(edge_id))
    }

    /// Checks whether linking `child` under `parent` would close a cycle.
    fn would_cycle(&self, parent_id: i64, child_id: i64) -> Result<bool> {
        match self.core.config.cycle_policy {
            CyclePolicy::DirectOnly => {
                let reverse = self.core.store.find_edges(
                    &EdgeQuery::active(EdgeCategory::Subcomponent)
                        .from(child_id)
                        .to(parent_id),
                )?;
                Ok(!reverse.is_empty())
            },
            CyclePolicy::Transitive => {
                // Is parent already (transitively) contained in child?
                let mut visited = HashSet::new();
                let mut stack = vec![child_id];
                while let Some(current) = stack.pop() {
                    if current == parent_id {
                        return Ok(true);
                    }
                    if !visited.insert(current) {
                        continue;
                    }
                    let children = self
                        .core
                        .store
                        .find_edges(&EdgeQuery::active(EdgeCategory::Subcomponent).from(current))?;
                    stack.extend(children.iter().map(|edge| edge.in_vertex));
                }
                Ok(false)
            },
        }
    }

    /// Names of a component's direct subcomponents.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown component.
    pub fn subcomponents(&self, name: &str) -> Result<Vec<String>> {
        let (id, _) = self.resolve(name)?;
        self.containment_names(EdgeQuery::active(EdgeCategory::Subcomponent).from(id), false)
    }

    /// Names of the components directly containing this one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown component.
    pub fn supercomponents(&self, name: &str) -> Result<Vec<String>> {
        let (id, _) = self.resolve(name)?;
        self.containment_names(EdgeQuery::active(EdgeCategory::Subcomponent).to(id), true)
    }

    fn containment_names(&self, query: EdgeQuery, out_side: bool) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for edge in self.core.store.find_edges(&query)? {
            let target = if out_side { edge.out_vertex } else { edge.in_vertex };
            let record = self.core.resolve_vertex(target)?;
            names.push(record.text_attr(ATTR_NAME).unwrap_or_default().to_string());
        }
        names.sort();
        Ok(names)
    }

    // ========================================================================
    // Snapshots
    // ========================================================================

    /// Builds a serializable snapshot of a component at a point in time.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown component.
    pub fn snapshot(&self, name: &str, at_time: i64) -> Result<ComponentSnapshot> {
        let (id, record) = self.resolve(name)?;
        let component = load_component(self.core, &record)?;

        let mut properties = Vec::new();
        let assignments = self.core.store.find_edges(
            &EdgeQuery::active(EdgeCategory::PropertyAssignment)
                .touching(id)
                .at_time(at_time),
        )?;
        for edge in assignments {
            let Some(property_id) = edge.other_endpoint(id) else {
                continue;
            };
            let property_vertex = self.core.resolve_vertex(property_id)?;
            let property = load_property(self.core, &property_vertex)?;
            properties.push((property.property_type.name.clone(), property.values.clone()));
        }
        properties.sort();

        let mut connections: Vec<String> = self
            .get_connections(name, TimeFilter::At(at_time), None)?
            .into_iter()
            .map(|c| c.peer_name)
            .collect();
        connections.sort();

        let mut flags = Vec::new();
        let attachments = self
            .core
            .store
            .find_edges(&EdgeQuery::active(EdgeCategory::FlagComponent).to(id))?;
        for edge in attachments {
            let flag_record = self.core.resolve_vertex(edge.out_vertex)?;
            if !flag_record.is_active() {
                continue;
            }
            if window_of(&flag_record).is_some_and(|window| window.contains(at_time)) {
                flags.push(
                    flag_record
                        .text_attr(ATTR_NAME)
                        .unwrap_or_default()
                        .to_string(),
                );
            }
        }
        flags.sort();

        Ok(ComponentSnapshot {
            name: component.name,
            component_type: component.component_type.name,
            version: component.version.map(|v| v.name),
            at_time,
            properties,
            connections,
            flags,
            subcomponents: self.subcomponents(name)?,
            supercomponents: self.supercomponents(name)?,
        })
    }

    /// Lists components whose names contain the filter substring.
    ///
    /// Convenience wrapper for status tooling.
    ///
    /// # Errors
    ///
    /// Returns an error if the store query fails.
    pub fn list_named(&self, filter: &NameFilter, range: ListRange) -> Result<Vec<Component>> {
        self.list(
            &ComponentFilter {
                name: filter.name.clone(),
                ..ComponentFilter::default()
            },
            range,
            OrderBy::Name,
            OrderDirection::Ascending,
        )
    }
}
