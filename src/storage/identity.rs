//! Per-registry identity cache for resolved vertices.
//!
//! Repeated name lookups dominate registry traffic, so resolved vertices are
//! memoized here. The cache is owned by its registry and injected into the
//! services that need it; nothing in this crate holds a process-global cache.
//! Writers invalidate the entries they touch, so a stale read after an
//! external write to the same database file is the caller's problem, matching
//! the single-writer deployment model.

use crate::models::VertexRecord;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Cache of persisted vertices keyed by id, with a name index per category.
///
/// Lookups by `(category, name)` are the hot path; the name index maps those
/// pairs to vertex ids so only one map holds full records.
pub struct IdentityCache {
    records: RwLock<HashMap<i64, Arc<VertexRecord>>>,
    names: RwLock<HashMap<(&'static str, String), i64>>,
}

impl IdentityCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            names: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the cached vertex for `id`, if present.
    #[must_use]
    pub fn get(&self, id: i64) -> Option<Arc<VertexRecord>> {
        match self.records.read() {
            Ok(records) => records.get(&id).cloned(),
            Err(_) => None,
        }
    }

    /// Returns the cached vertex id for a `(category, name)` pair.
    #[must_use]
    pub fn get_by_name(&self, category: &'static str, name: &str) -> Option<i64> {
        match self.names.read() {
            Ok(names) => names.get(&(category, name.to_string())).copied(),
            Err(_) => None,
        }
    }

    /// Stores a resolved vertex, also indexing it under `name` when given.
    pub fn put(&self, record: Arc<VertexRecord>, name: Option<&str>) {
        let Some(id) = record.id.persisted() else {
            return;
        };
        if let Ok(mut records) = self.records.write() {
            records.insert(id, Arc::clone(&record));
        }
        if let Some(name) = name {
            if let Ok(mut names) = self.names.write() {
                names.insert((record.category.as_str(), name.to_string()), id);
            }
        }
    }

    /// Drops a vertex from the cache after a lifecycle or attribute write.
    pub fn invalidate(&self, id: i64) {
        if let Ok(mut records) = self.records.write() {
            records.remove(&id);
        }
        if let Ok(mut names) = self.names.write() {
            names.retain(|_, cached_id| *cached_id != id);
        }
    }

    /// Empties the cache. Used by reset tooling alongside `drop_all`.
    pub fn clear(&self) {
        if let Ok(mut records) = self.records.write() {
            records.clear();
        }
        if let Ok(mut names) = self.names.write() {
            names.clear();
        }
    }

    /// Number of cached records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().map_or(0, |records| records.len())
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for IdentityCache {
    fn default() -> Self {
        Self::new()
    }
}
