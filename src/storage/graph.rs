//! Graph store trait: the contract every property-graph backend fulfills.
//!
//! The registry treats the store as an opaque transactional graph database
//! offering vertex/edge CRUD, pattern filtering, ordering, range slicing,
//! and counts, with read-your-writes consistency per call. Everything
//! temporal (overlap detection, lifecycle protocols) is layered above in
//! the service modules.
//!
//! # Available Implementations
//!
//! | Backend | Use Case | Features |
//! |---------|----------|----------|
//! | `SqliteGraphStore` | Default; embedded | WAL, per-op transactions, attr rows |
//! | `InMemoryGraphStore` | Testing | Fast, no persistence |
//!
//! # Implementor Notes
//!
//! - Methods take `&self` so backends can be shared via `Arc<dyn GraphStore>`;
//!   use interior mutability (`Mutex<Connection>`, `RwLock` maps)
//! - Each method is atomic on its own; compound check-then-write sequences
//!   are serialized by the service layer's key locks
//! - List attributes must be stored as repeated rows, never serialized blobs
//! - `drop_edge`/`drop_all` are hard deletes for the replace migration and
//!   test/reset tooling only; the modeled lifecycle never hard-deletes
//!   vertices

use crate::models::{
    AttrMap, EdgeCategory, EdgeRecord, LifecycleStatus, OrderBy, OrderDirection, Timestamp,
    VertexCategory, VertexRecord,
};
use crate::Result;

/// Query parameters for matching vertices.
#[derive(Debug, Clone, Default)]
pub struct VertexQuery {
    /// Filter by category.
    pub category: Option<VertexCategory>,
    /// Restrict to active vertices.
    pub active_only: bool,
    /// Exact match on the `name` attribute.
    pub name_eq: Option<String>,
    /// Substring match on the `name` attribute.
    pub name_contains: Option<String>,
    /// Restrict to these vertex ids (edge-derived constraints).
    pub ids_in: Option<Vec<i64>>,
    /// Ordering field; ties broken by name, then id.
    pub order_by: OrderBy,
    /// Ordering direction.
    pub direction: OrderDirection,
    /// Pagination offset.
    pub offset: Option<usize>,
    /// Maximum results to return.
    pub limit: Option<usize>,
}

impl VertexQuery {
    /// Creates a query for active vertices of a category.
    #[must_use]
    pub fn active(category: VertexCategory) -> Self {
        Self {
            category: Some(category),
            active_only: true,
            ..Self::default()
        }
    }

    /// Filters by exact name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name_eq = Some(name.into());
        self
    }

    /// Filters by name substring.
    #[must_use]
    pub fn with_name_containing(mut self, substring: impl Into<String>) -> Self {
        self.name_contains = Some(substring.into());
        self
    }

    /// Restricts the match to the given vertex ids.
    #[must_use]
    pub fn with_ids(mut self, ids: Vec<i64>) -> Self {
        self.ids_in = Some(ids);
        self
    }

    /// Sets the ordering.
    #[must_use]
    pub const fn ordered(mut self, order_by: OrderBy, direction: OrderDirection) -> Self {
        self.order_by = order_by;
        self.direction = direction;
        self
    }

    /// Sets the pagination range.
    #[must_use]
    pub const fn sliced(mut self, offset: usize, limit: usize) -> Self {
        self.offset = Some(offset);
        self.limit = Some(limit);
        self
    }
}

/// Query parameters for matching edges.
///
/// Temporal predicates apply to the validity interval of timestamped edges;
/// an untimestamped edge never matches a temporal predicate.
#[derive(Debug, Clone, Default)]
pub struct EdgeQuery {
    /// Filter by category.
    pub category: Option<EdgeCategory>,
    /// Restrict to active edges.
    pub active_only: bool,
    /// Match edges touching this vertex on either side.
    pub touching: Option<i64>,
    /// Match edges between this unordered vertex pair.
    pub between: Option<(i64, i64)>,
    /// Match edges with this exact source vertex.
    pub out_vertex: Option<i64>,
    /// Match edges with this exact target vertex.
    pub in_vertex: Option<i64>,
    /// Match timestamped edges whose interval contains this time.
    pub contains_time: Option<i64>,
    /// Match timestamped edges overlapping `[from, to)`.
    pub overlaps_range: Option<(i64, i64)>,
    /// Match timestamped edges starting at or after this time.
    pub starts_at_or_after: Option<i64>,
    /// Match timestamped edges starting strictly after this time.
    pub starts_after: Option<i64>,
}

impl EdgeQuery {
    /// Creates a query for active edges of a category.
    #[must_use]
    pub fn active(category: EdgeCategory) -> Self {
        Self {
            category: Some(category),
            active_only: true,
            ..Self::default()
        }
    }

    /// Matches edges touching `vertex_id` on either side.
    #[must_use]
    pub const fn touching(mut self, vertex_id: i64) -> Self {
        self.touching = Some(vertex_id);
        self
    }

    /// Matches edges between the unordered pair.
    #[must_use]
    pub const fn between(mut self, a: i64, b: i64) -> Self {
        self.between = Some((a, b));
        self
    }

    /// Matches edges with the exact source vertex.
    #[must_use]
    pub const fn from(mut self, vertex_id: i64) -> Self {
        self.out_vertex = Some(vertex_id);
        self
    }

    /// Matches edges with the exact target vertex.
    #[must_use]
    pub const fn to(mut self, vertex_id: i64) -> Self {
        self.in_vertex = Some(vertex_id);
        self
    }

    /// Matches intervals containing the given time.
    #[must_use]
    pub const fn at_time(mut self, timestamp: i64) -> Self {
        self.contains_time = Some(timestamp);
        self
    }

    /// Matches intervals overlapping `[from, to)`.
    #[must_use]
    pub const fn over_range(mut self, from_time: i64, to_time: i64) -> Self {
        self.overlaps_range = Some((from_time, to_time));
        self
    }

    /// Matches intervals starting at or after the given time.
    #[must_use]
    pub const fn starting_at_or_after(mut self, timestamp: i64) -> Self {
        self.starts_at_or_after = Some(timestamp);
        self
    }

    /// Matches intervals starting strictly after the given time.
    #[must_use]
    pub const fn starting_after(mut self, timestamp: i64) -> Self {
        self.starts_after = Some(timestamp);
        self
    }
}

/// Aggregate counts for a store, used by status tooling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Total vertices, active or not.
    pub vertex_count: usize,
    /// Active vertices.
    pub active_vertex_count: usize,
    /// Total edges, active or not.
    pub edge_count: usize,
    /// Active edges.
    pub active_edge_count: usize,
}

/// Trait for property-graph store backends.
pub trait GraphStore: Send + Sync {
    // ========================================================================
    // Vertex Operations
    // ========================================================================

    /// Writes a vertex and returns its storage-assigned id.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn add_vertex(
        &self,
        category: VertexCategory,
        attrs: &AttrMap,
        time_added: i64,
    ) -> Result<i64>;

    /// Retrieves a vertex by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup operation fails.
    fn get_vertex(&self, id: i64) -> Result<Option<VertexRecord>>;

    /// Queries vertices with filters, ordering, and range slicing.
    ///
    /// # Errors
    ///
    /// Returns an error if the query operation fails.
    fn find_vertices(&self, query: &VertexQuery) -> Result<Vec<VertexRecord>>;

    /// Counts vertices matching the query (ignoring any range slice).
    ///
    /// # Errors
    ///
    /// Returns an error if the count operation fails.
    fn count_vertices(&self, query: &VertexQuery) -> Result<usize>;

    /// Updates a vertex's lifecycle status in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the vertex does not exist or the write fails.
    fn set_vertex_status(&self, id: i64, status: LifecycleStatus) -> Result<()>;

    /// Replaces a vertex's attribute bag.
    ///
    /// Used when an attribute-carried fact changes on an existing vertex,
    /// such as closing a flag's window.
    ///
    /// # Errors
    ///
    /// Returns an error if the vertex does not exist or the write fails.
    fn set_vertex_attrs(&self, id: i64, attrs: &AttrMap) -> Result<()>;

    // ========================================================================
    // Edge Operations
    // ========================================================================

    /// Writes an edge and returns its storage-assigned id.
    ///
    /// Both endpoints must already be persisted vertices.
    ///
    /// # Errors
    ///
    /// Returns an error if an endpoint is missing or the write fails.
    fn add_edge(&self, edge: &EdgeRecord, time_added: i64) -> Result<i64>;

    /// Retrieves an edge by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup operation fails.
    fn get_edge(&self, id: i64) -> Result<Option<EdgeRecord>>;

    /// Queries edges with category, endpoint, and temporal filters.
    ///
    /// # Errors
    ///
    /// Returns an error if the query operation fails.
    fn find_edges(&self, query: &EdgeQuery) -> Result<Vec<EdgeRecord>>;

    /// Updates an edge's lifecycle status in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the edge does not exist or the write fails.
    fn set_edge_status(&self, id: i64, status: LifecycleStatus) -> Result<()>;

    /// Closes a timestamped edge's validity interval at `end`.
    ///
    /// Writes the end onto the existing edge; no new edge is created.
    ///
    /// # Errors
    ///
    /// Returns an error if the edge does not exist, is not timestamped, or
    /// the write fails.
    fn set_edge_end(&self, id: i64, end: &Timestamp) -> Result<()>;

    /// Hard-deletes an edge row.
    ///
    /// Used only by the replace migration after an edge has been re-created
    /// against the replacement vertex.
    ///
    /// # Errors
    ///
    /// Returns an error if the deletion fails.
    fn drop_edge(&self, id: i64) -> Result<()>;

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Returns aggregate counts.
    ///
    /// # Errors
    ///
    /// Returns an error if the count queries fail.
    fn stats(&self) -> Result<StoreStats>;

    /// Hard-deletes everything. Test/reset tooling only.
    ///
    /// # Errors
    ///
    /// Returns an error if the deletion fails.
    fn drop_all(&self) -> Result<()>;
}

/// Evaluates the temporal predicates of an edge query against an edge.
///
/// Shared by backends that filter in Rust; the `SQLite` backend compiles the
/// same predicates to SQL.
#[must_use]
pub fn edge_matches_temporal(edge: &EdgeRecord, query: &EdgeQuery) -> bool {
    let Some(validity) = &edge.validity else {
        // Untimestamped edges never match temporal predicates.
        return query.contains_time.is_none()
            && query.overlaps_range.is_none()
            && query.starts_at_or_after.is_none()
            && query.starts_after.is_none();
    };

    if let Some(at) = query.contains_time {
        if !validity.contains(at) {
            return false;
        }
    }
    if let Some((from_time, to_time)) = query.overlaps_range {
        if !validity.overlaps_range(from_time, to_time) {
            return false;
        }
    }
    if let Some(t) = query.starts_at_or_after {
        if validity.start.time < t {
            return false;
        }
    }
    if let Some(t) = query.starts_after {
        if validity.start.time <= t {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Validity;

    fn connection(start: i64, end: Option<i64>) -> EdgeRecord {
        let validity = match end {
            None => Validity::open(Timestamp::new(start, "t")),
            Some(e) => Validity::between(Timestamp::new(start, "t"), Timestamp::new(e, "t")),
        };
        EdgeRecord::timestamped(EdgeCategory::Connection, 1, 2, validity)
    }

    #[test]
    fn test_temporal_predicates() {
        let edge = connection(100, Some(200));

        assert!(edge_matches_temporal(&edge, &EdgeQuery::default().at_time(150)));
        assert!(!edge_matches_temporal(&edge, &EdgeQuery::default().at_time(200)));
        assert!(edge_matches_temporal(&edge, &EdgeQuery::default().over_range(150, 300)));
        assert!(!edge_matches_temporal(&edge, &EdgeQuery::default().over_range(200, 300)));
        assert!(edge_matches_temporal(
            &edge,
            &EdgeQuery::default().starting_at_or_after(100)
        ));
        assert!(!edge_matches_temporal(
            &edge,
            &EdgeQuery::default().starting_after(100)
        ));
    }

    #[test]
    fn test_untimestamped_edges_skip_temporal_queries() {
        let edge = EdgeRecord::new(EdgeCategory::Subcomponent, 1, 2);
        assert!(edge_matches_temporal(&edge, &EdgeQuery::default()));
        assert!(!edge_matches_temporal(&edge, &EdgeQuery::default().at_time(100)));
    }
}
