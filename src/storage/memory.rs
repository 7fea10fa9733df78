//! In-memory graph store for testing.
//!
//! Provides a fast, non-persistent implementation of [`GraphStore`] for use
//! in unit tests and development scenarios.

use crate::models::{
    AttrMap, EdgeRecord, ElementId, LifecycleStatus, OrderBy, OrderDirection, Timestamp,
    VertexCategory, VertexRecord, ATTR_NAME,
};
use crate::storage::graph::{
    edge_matches_temporal, EdgeQuery, GraphStore, StoreStats, VertexQuery,
};
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::RwLock;

/// In-memory graph store for testing.
///
/// Uses `RwLock` maps for thread-safe access with reader-writer semantics.
/// Ids are allocated from a single shared counter so vertex and edge ids
/// never collide. Data is not persisted between runs.
#[derive(Debug, Default)]
pub struct InMemoryGraphStore {
    vertices: RwLock<HashMap<i64, VertexRecord>>,
    edges: RwLock<HashMap<i64, EdgeRecord>>,
    next_id: AtomicI64,
}

impl InMemoryGraphStore {
    /// Creates a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            vertices: RwLock::new(HashMap::new()),
            edges: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    fn allocate_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    fn poisoned(operation: &str) -> Error {
        Error::OperationFailed {
            operation: operation.to_string(),
            cause: "lock poisoned".to_string(),
        }
    }

    /// Checks if a vertex matches the non-ordering parts of a query.
    fn vertex_matches_query(vertex: &VertexRecord, query: &VertexQuery) -> bool {
        if let Some(category) = query.category {
            if vertex.category != category {
                return false;
            }
        }
        if query.active_only && !vertex.is_active() {
            return false;
        }
        if let Some(ref name) = query.name_eq {
            if vertex.text_attr(ATTR_NAME) != Some(name.as_str()) {
                return false;
            }
        }
        if let Some(ref substring) = query.name_contains {
            let matched = vertex
                .text_attr(ATTR_NAME)
                .is_some_and(|n| n.to_lowercase().contains(&substring.to_lowercase()));
            if !matched {
                return false;
            }
        }
        if let Some(ref ids) = query.ids_in {
            let id = vertex.id.persisted().unwrap_or(-1);
            if !ids.contains(&id) {
                return false;
            }
        }
        true
    }

    /// Checks if an edge matches the query.
    fn edge_matches_query(edge: &EdgeRecord, query: &EdgeQuery) -> bool {
        if let Some(category) = query.category {
            if edge.category != category {
                return false;
            }
        }
        if query.active_only && !edge.is_active() {
            return false;
        }
        if let Some(vertex_id) = query.touching {
            if !edge.touches(vertex_id) {
                return false;
            }
        }
        if let Some((a, b)) = query.between {
            let forward = edge.out_vertex == a && edge.in_vertex == b;
            let backward = edge.out_vertex == b && edge.in_vertex == a;
            if !forward && !backward {
                return false;
            }
        }
        if let Some(out) = query.out_vertex {
            if edge.out_vertex != out {
                return false;
            }
        }
        if let Some(into) = query.in_vertex {
            if edge.in_vertex != into {
                return false;
            }
        }
        edge_matches_temporal(edge, query)
    }

    fn sort_vertices(results: &mut [VertexRecord], order_by: OrderBy, direction: OrderDirection) {
        let key = |v: &VertexRecord| {
            (
                v.time_added,
                v.text_attr(ATTR_NAME).unwrap_or_default().to_string(),
                v.id.persisted().unwrap_or(0),
            )
        };
        results.sort_by(|a, b| {
            let ordering = match order_by {
                OrderBy::Name => {
                    let an = a.text_attr(ATTR_NAME).unwrap_or_default();
                    let bn = b.text_attr(ATTR_NAME).unwrap_or_default();
                    an.cmp(bn).then_with(|| {
                        a.id.persisted()
                            .unwrap_or(0)
                            .cmp(&b.id.persisted().unwrap_or(0))
                    })
                },
                OrderBy::TimeAdded => key(a).cmp(&key(b)),
            };
            match direction {
                OrderDirection::Ascending => ordering,
                OrderDirection::Descending => ordering.reverse(),
            }
        });
    }
}

impl GraphStore for InMemoryGraphStore {
    fn add_vertex(
        &self,
        category: VertexCategory,
        attrs: &AttrMap,
        time_added: i64,
    ) -> Result<i64> {
        let id = self.allocate_id();
        let mut vertices = self
            .vertices
            .write()
            .map_err(|_| Self::poisoned("add_vertex"))?;
        vertices.insert(
            id,
            VertexRecord {
                id: ElementId::Persisted(id),
                category,
                time_added,
                status: LifecycleStatus::Active,
                attrs: attrs.clone(),
            },
        );
        Ok(id)
    }

    fn get_vertex(&self, id: i64) -> Result<Option<VertexRecord>> {
        let vertices = self
            .vertices
            .read()
            .map_err(|_| Self::poisoned("get_vertex"))?;
        Ok(vertices.get(&id).cloned())
    }

    fn find_vertices(&self, query: &VertexQuery) -> Result<Vec<VertexRecord>> {
        let vertices = self
            .vertices
            .read()
            .map_err(|_| Self::poisoned("find_vertices"))?;

        let mut results: Vec<VertexRecord> = vertices
            .values()
            .filter(|v| Self::vertex_matches_query(v, query))
            .cloned()
            .collect();

        Self::sort_vertices(&mut results, query.order_by, query.direction);

        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(results.into_iter().skip(offset).take(limit).collect())
    }

    fn count_vertices(&self, query: &VertexQuery) -> Result<usize> {
        let vertices = self
            .vertices
            .read()
            .map_err(|_| Self::poisoned("count_vertices"))?;
        Ok(vertices
            .values()
            .filter(|v| Self::vertex_matches_query(v, query))
            .count())
    }

    fn set_vertex_status(&self, id: i64, status: LifecycleStatus) -> Result<()> {
        let mut vertices = self
            .vertices
            .write()
            .map_err(|_| Self::poisoned("set_vertex_status"))?;
        let vertex = vertices
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("vertex #{id}")))?;
        vertex.status = status;
        Ok(())
    }

    fn set_vertex_attrs(&self, id: i64, attrs: &AttrMap) -> Result<()> {
        let mut vertices = self
            .vertices
            .write()
            .map_err(|_| Self::poisoned("set_vertex_attrs"))?;
        let vertex = vertices
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("vertex #{id}")))?;
        vertex.attrs = attrs.clone();
        Ok(())
    }

    fn add_edge(&self, edge: &EdgeRecord, time_added: i64) -> Result<i64> {
        {
            let vertices = self
                .vertices
                .read()
                .map_err(|_| Self::poisoned("add_edge"))?;
            for endpoint in [edge.out_vertex, edge.in_vertex] {
                if !vertices.contains_key(&endpoint) {
                    return Err(Error::NotFound(format!("vertex #{endpoint}")));
                }
            }
        }

        let id = self.allocate_id();
        let mut edges = self.edges.write().map_err(|_| Self::poisoned("add_edge"))?;
        let mut record = edge.clone();
        record.id = ElementId::Persisted(id);
        record.time_added = time_added;
        edges.insert(id, record);
        Ok(id)
    }

    fn get_edge(&self, id: i64) -> Result<Option<EdgeRecord>> {
        let edges = self.edges.read().map_err(|_| Self::poisoned("get_edge"))?;
        Ok(edges.get(&id).cloned())
    }

    fn find_edges(&self, query: &EdgeQuery) -> Result<Vec<EdgeRecord>> {
        let edges = self
            .edges
            .read()
            .map_err(|_| Self::poisoned("find_edges"))?;

        let mut results: Vec<EdgeRecord> = edges
            .values()
            .filter(|e| Self::edge_matches_query(e, query))
            .cloned()
            .collect();

        // Stable report order: earliest interval start, then id.
        results.sort_by_key(|e| {
            (
                e.validity.as_ref().map_or(i64::MIN, |v| v.start.time),
                e.id.persisted().unwrap_or(0),
            )
        });
        Ok(results)
    }

    fn set_edge_status(&self, id: i64, status: LifecycleStatus) -> Result<()> {
        let mut edges = self
            .edges
            .write()
            .map_err(|_| Self::poisoned("set_edge_status"))?;
        let edge = edges
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("edge #{id}")))?;
        edge.status = status;
        Ok(())
    }

    fn set_edge_end(&self, id: i64, end: &Timestamp) -> Result<()> {
        let mut edges = self
            .edges
            .write()
            .map_err(|_| Self::poisoned("set_edge_end"))?;
        let edge = edges
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("edge #{id}")))?;
        let validity = edge.validity.as_mut().ok_or_else(|| {
            Error::Validation(format!("edge #{id} ({}) is not timestamped", edge.category))
        })?;
        validity.end = Some(end.clone());
        Ok(())
    }

    fn drop_edge(&self, id: i64) -> Result<()> {
        let mut edges = self
            .edges
            .write()
            .map_err(|_| Self::poisoned("drop_edge"))?;
        edges.remove(&id);
        Ok(())
    }

    fn stats(&self) -> Result<StoreStats> {
        let vertices = self.vertices.read().map_err(|_| Self::poisoned("stats"))?;
        let edges = self.edges.read().map_err(|_| Self::poisoned("stats"))?;
        Ok(StoreStats {
            vertex_count: vertices.len(),
            active_vertex_count: vertices.values().filter(|v| v.is_active()).count(),
            edge_count: edges.len(),
            active_edge_count: edges.values().filter(|e| e.is_active()).count(),
        })
    }

    fn drop_all(&self) -> Result<()> {
        self.vertices
            .write()
            .map_err(|_| Self::poisoned("drop_all"))?
            .clear();
        self.edges
            .write()
            .map_err(|_| Self::poisoned("drop_all"))?
            .clear();
        Ok(())
    }
}
