//! The registry facade and the shared service core.
//!
//! [`Registry`] owns the graph store, the identity cache, the key locks, and
//! the configuration, and hands out per-domain service views. The crate-
//! private [`RegistryCore`] carries the plumbing every service shares: name
//! resolution through the cache, the authorization gate, and the vertex
//! lifecycle protocol (replace, disable).

use crate::config::RegistryConfig;
use crate::models::{EdgeRecord, LifecycleStatus, VertexCategory, VertexRecord};
use crate::services::auth;
use crate::services::catalog::CatalogService;
use crate::services::component::ComponentService;
use crate::services::flag::FlagService;
use crate::services::locks::KeyLocks;
use crate::services::property::PropertyService;
use crate::storage::{
    EdgeQuery, GraphStore, IdentityCache, SqliteGraphStore, StoreStats, VertexQuery,
};
use crate::{Error, Result};
use std::sync::Arc;
use tracing::instrument;

/// Shared plumbing behind every service view.
pub(crate) struct RegistryCore {
    pub(crate) store: Arc<dyn GraphStore>,
    pub(crate) cache: IdentityCache,
    pub(crate) locks: KeyLocks,
    pub(crate) config: RegistryConfig,
    pub(crate) acting_user: Option<String>,
}

impl RegistryCore {
    /// Runs the authorization gate for an operation, when enforcement is on.
    pub(crate) fn authorize(&self, kind: &str, operation: &str) -> Result<()> {
        if !self.config.enforce_permissions {
            return Ok(());
        }
        auth::authorize(
            self.store.as_ref(),
            self.acting_user.as_deref(),
            kind,
            operation,
        )
    }

    /// Finds the active vertex of a category with the given name, through
    /// the identity cache.
    pub(crate) fn find_active_named(
        &self,
        category: VertexCategory,
        name: &str,
    ) -> Result<Option<VertexRecord>> {
        if let Some(id) = self.cache.get_by_name(category.as_str(), name) {
            if let Some(cached) = self.cache.get(id) {
                if cached.is_active() {
                    return Ok(Some((*cached).clone()));
                }
            }
        }

        let found = self
            .store
            .find_vertices(&VertexQuery::active(category).with_name(name))?;
        let record = found.into_iter().next();
        if let Some(ref record) = record {
            self.cache.put(Arc::new(record.clone()), Some(name));
        }
        Ok(record)
    }

    /// Like [`Self::find_active_named`], but absence is an error.
    pub(crate) fn require_named(
        &self,
        category: VertexCategory,
        name: &str,
        kind: &str,
    ) -> Result<VertexRecord> {
        self.find_active_named(category, name)?
            .ok_or_else(|| Error::NotFound(format!("{kind} '{name}'")))
    }

    /// Resolves a vertex by id, through the identity cache.
    pub(crate) fn resolve_vertex(&self, id: i64) -> Result<Arc<VertexRecord>> {
        if let Some(cached) = self.cache.get(id) {
            return Ok(cached);
        }
        let record = self
            .store
            .get_vertex(id)?
            .ok_or_else(|| Error::NotFound(format!("vertex #{id}")))?;
        let name = record.text_attr(crate::models::ATTR_NAME).map(String::from);
        let record = Arc::new(record);
        self.cache.put(Arc::clone(&record), name.as_deref());
        Ok(record)
    }

    /// Soft-disables a vertex and cascades to every incident active edge.
    #[instrument(skip(self))]
    pub(crate) fn disable_vertex(&self, id: i64, at: i64) -> Result<()> {
        self.store
            .set_vertex_status(id, LifecycleStatus::Disabled { at })?;
        self.cache.invalidate(id);

        let incident = self.store.find_edges(&EdgeQuery {
            active_only: true,
            touching: Some(id),
            ..EdgeQuery::default()
        })?;
        for edge in incident {
            if let Some(edge_id) = edge.id.persisted() {
                self.store
                    .set_edge_status(edge_id, LifecycleStatus::Disabled { at })?;
            }
        }
        Ok(())
    }

    /// Runs the replace protocol: retire `old_id` in favor of `new_id`.
    ///
    /// The old vertex is marked replaced and stays queryable. Non-structural
    /// incident edges are re-created against the replacement with their
    /// properties preserved, then the old rows are dropped. Structural edges
    /// represent operator selections and are disabled in place instead, so
    /// the choice must be re-made explicitly for the replacement.
    #[instrument(skip(self))]
    pub(crate) fn replace_vertex(&self, old_id: i64, new_id: i64, at: i64) -> Result<()> {
        self.store
            .set_vertex_status(old_id, LifecycleStatus::Replaced { at, by: new_id })?;
        self.cache.invalidate(old_id);

        let incident = self.store.find_edges(&EdgeQuery {
            active_only: true,
            touching: Some(old_id),
            ..EdgeQuery::default()
        })?;
        for edge in incident {
            let Some(edge_id) = edge.id.persisted() else {
                continue;
            };
            if edge.category.is_structural() {
                self.store
                    .set_edge_status(edge_id, LifecycleStatus::Disabled { at })?;
                continue;
            }

            let mut rehomed = EdgeRecord {
                id: crate::models::ElementId::Virtual,
                ..edge.clone()
            };
            if rehomed.out_vertex == old_id {
                rehomed.out_vertex = new_id;
            }
            if rehomed.in_vertex == old_id {
                rehomed.in_vertex = new_id;
            }
            self.store.add_edge(&rehomed, edge.time_added)?;
            self.store.drop_edge(edge_id)?;
        }
        Ok(())
    }
}

/// The bitemporal asset registry.
///
/// Cheap to share behind an `Arc`; every method takes `&self`.
pub struct Registry {
    core: RegistryCore,
}

impl Registry {
    /// Creates a registry over a store, with default configuration.
    pub fn new(store: impl GraphStore + 'static) -> Self {
        Self::with_config(store, RegistryConfig::default())
    }

    /// Creates a registry over a store with explicit configuration.
    pub fn with_config(store: impl GraphStore + 'static, config: RegistryConfig) -> Self {
        Self {
            core: RegistryCore {
                store: Arc::new(store),
                cache: IdentityCache::new(),
                locks: KeyLocks::new(),
                config,
                acting_user: None,
            },
        }
    }

    /// Opens the configured `SQLite` database and builds a registry over it.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory cannot be created or the
    /// database cannot be opened.
    pub fn open(config: RegistryConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir).map_err(|e| Error::OperationFailed {
            operation: "create_data_dir".to_string(),
            cause: e.to_string(),
        })?;
        let store = SqliteGraphStore::new(config.db_path())?;
        Ok(Self::with_config(store, config))
    }

    /// Sets the acting user for permission checks.
    #[must_use]
    pub fn acting_as(mut self, user: impl Into<String>) -> Self {
        self.core.acting_user = Some(user.into());
        self
    }

    /// Catalog operations: types, versions, severities, users, groups.
    #[must_use]
    pub fn catalog(&self) -> CatalogService<'_> {
        CatalogService { core: &self.core }
    }

    /// Component lifecycle, connectivity, and containment operations.
    #[must_use]
    pub fn components(&self) -> ComponentService<'_> {
        ComponentService { core: &self.core }
    }

    /// Property interval operations.
    #[must_use]
    pub fn properties(&self) -> PropertyService<'_> {
        PropertyService { core: &self.core }
    }

    /// Flag operations.
    #[must_use]
    pub fn flags(&self) -> FlagService<'_> {
        FlagService { core: &self.core }
    }

    /// Aggregate store counts.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn stats(&self) -> Result<StoreStats> {
        self.core.store.stats()
    }

    /// Hard-deletes everything in the store. Test/reset tooling only.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn drop_all(&self) -> Result<()> {
        self.core.store.drop_all()?;
        self.core.cache.clear();
        Ok(())
    }

    /// The underlying graph store.
    #[must_use]
    pub fn store(&self) -> &dyn GraphStore {
        self.core.store.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AttrMap, EdgeCategory, Timestamp, Validity, ATTR_NAME};
    use crate::storage::InMemoryGraphStore;

    fn registry() -> Registry {
        Registry::new(InMemoryGraphStore::new())
    }

    fn named_attrs(name: &str) -> AttrMap {
        let mut attrs = AttrMap::new();
        attrs.insert(ATTR_NAME.to_string(), name.into());
        attrs
    }

    #[test]
    fn test_find_active_named_caches() {
        let registry = registry();
        let core = &registry.core;
        core.store
            .add_vertex(VertexCategory::ComponentType, &named_attrs("router"), 0)
            .unwrap();

        let first = core
            .find_active_named(VertexCategory::ComponentType, "router")
            .unwrap()
            .unwrap();
        assert!(core
            .cache
            .get_by_name(VertexCategory::ComponentType.as_str(), "router")
            .is_some());

        let second = core
            .find_active_named(VertexCategory::ComponentType, "router")
            .unwrap()
            .unwrap();
        assert_eq!(first.id, second.id);
    }

    #[test]
    fn test_disable_cascades_to_edges() {
        let registry = registry();
        let core = &registry.core;
        let a = core
            .store
            .add_vertex(VertexCategory::Component, &named_attrs("a"), 0)
            .unwrap();
        let b = core
            .store
            .add_vertex(VertexCategory::Component, &named_attrs("b"), 0)
            .unwrap();
        let edge_id = core
            .store
            .add_edge(
                &EdgeRecord::timestamped(
                    EdgeCategory::Connection,
                    a,
                    b,
                    Validity::open(Timestamp::new(10, "t")),
                ),
                0,
            )
            .unwrap();

        core.disable_vertex(a, 50).unwrap();

        let vertex = core.store.get_vertex(a).unwrap().unwrap();
        assert_eq!(vertex.status, LifecycleStatus::Disabled { at: 50 });
        let edge = core.store.get_edge(edge_id).unwrap().unwrap();
        assert_eq!(edge.status, LifecycleStatus::Disabled { at: 50 });
    }

    #[test]
    fn test_replace_rehomes_non_structural_edges_only() {
        let registry = registry();
        let core = &registry.core;
        let old = core
            .store
            .add_vertex(VertexCategory::Component, &named_attrs("old"), 0)
            .unwrap();
        let peer = core
            .store
            .add_vertex(VertexCategory::Component, &named_attrs("peer"), 0)
            .unwrap();
        let kind = core
            .store
            .add_vertex(VertexCategory::ComponentType, &named_attrs("router"), 0)
            .unwrap();
        let replacement = core
            .store
            .add_vertex(VertexCategory::Component, &named_attrs("new"), 0)
            .unwrap();

        let connection = core
            .store
            .add_edge(
                &EdgeRecord::timestamped(
                    EdgeCategory::Connection,
                    old,
                    peer,
                    Validity::open(Timestamp::new(10, "t").with_comments("rack 4")),
                ),
                0,
            )
            .unwrap();
        let type_edge = core
            .store
            .add_edge(&EdgeRecord::new(EdgeCategory::ComponentType, old, kind), 0)
            .unwrap();

        core.replace_vertex(old, replacement, 100).unwrap();

        // Old vertex remains queryable and names its replacement.
        let old_vertex = core.store.get_vertex(old).unwrap().unwrap();
        assert_eq!(
            old_vertex.status,
            LifecycleStatus::Replaced {
                at: 100,
                by: replacement
            }
        );

        // The connection edge was re-created against the replacement with
        // its interval comment intact, and the old row is gone.
        assert!(core.store.get_edge(connection).unwrap().is_none());
        let rehomed = core
            .store
            .find_edges(&EdgeQuery::active(EdgeCategory::Connection).touching(replacement))
            .unwrap();
        assert_eq!(rehomed.len(), 1);
        assert_eq!(
            rehomed[0].validity.as_ref().unwrap().start.comments,
            "rack 4"
        );

        // The structural type edge was disabled in place, not copied.
        let structural = core.store.get_edge(type_edge).unwrap().unwrap();
        assert_eq!(structural.status, LifecycleStatus::Disabled { at: 100 });
        assert!(core
            .store
            .find_edges(&EdgeQuery::active(EdgeCategory::ComponentType).touching(replacement))
            .unwrap()
            .is_empty());
    }
}
