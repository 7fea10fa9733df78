//! `SQLite` graph store backend.
//!
//! Persists vertices, repeated attribute rows, and edges using `SQLite`.
//! List attributes become one row per value (ordered by `ord`), never a
//! serialized blob. Multi-row writes run inside a transaction so each store
//! call is atomic on its own.

// Allow cast_possible_truncation and cast_sign_loss for SQLite i64 to usize conversions.
// SQLite returns i64, but counts and offsets are inherently non-negative and small.
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
// Allow cast_possible_wrap - usize to i64 casts for SQLite parameters won't wrap
// for offsets and limits.
#![allow(clippy::cast_possible_wrap)]

use crate::models::{
    AttrMap, AttrValue, EdgeCategory, EdgeRecord, ElementId, LifecycleStatus, OrderBy, Timestamp,
    Validity, VertexCategory, VertexRecord, ATTR_NAME,
};
use crate::storage::graph::{EdgeQuery, GraphStore, StoreStats, VertexQuery};
use crate::{Error, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::instrument;

/// Helper to acquire the connection lock with poison recovery.
fn acquire_lock(mutex: &Mutex<Connection>) -> MutexGuard<'_, Connection> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("graph sqlite mutex was poisoned, recovering");
            metrics::counter!("graph_sqlite_mutex_poison_recovery_total").increment(1);
            poisoned.into_inner()
        },
    }
}

fn op_failed(operation: &str, e: impl std::fmt::Display) -> Error {
    Error::OperationFailed {
        operation: operation.to_string(),
        cause: e.to_string(),
    }
}

/// `SQLite`-based graph store.
///
/// # Concurrency Model
///
/// Uses a `Mutex<Connection>` for thread-safe access. WAL mode and
/// `busy_timeout` handle concurrent access gracefully. Each trait method is
/// one critical section; compound check-then-write sequences are serialized
/// above this layer by the service key locks.
///
/// # Schema
///
/// Three tables store the graph:
/// - `graph_vertices`: vertex rows with lifecycle columns
/// - `graph_vertex_attrs`: repeated attribute rows (one per list element)
/// - `graph_edges`: directed edges with lifecycle and validity columns
pub struct SqliteGraphStore {
    /// Connection to the `SQLite` database.
    conn: Mutex<Connection>,
    /// Path to the database (None for in-memory).
    db_path: Option<PathBuf>,
}

impl SqliteGraphStore {
    /// Creates a new `SQLite` graph store at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn new(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        let conn = Connection::open(&db_path).map_err(|e| op_failed("open_graph_sqlite", e))?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path: Some(db_path),
        };

        store.initialize()?;
        Ok(store)
    }

    /// Creates an in-memory `SQLite` graph store (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| op_failed("open_graph_sqlite_memory", e))?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path: None,
        };

        store.initialize()?;
        Ok(store)
    }

    /// Returns the database path.
    #[must_use]
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Initializes the database schema.
    fn initialize(&self) -> Result<()> {
        let conn = acquire_lock(&self.conn);

        // Enable WAL mode for better concurrent read performance
        let _ = conn.pragma_update(None, "journal_mode", "WAL");
        let _ = conn.pragma_update(None, "synchronous", "NORMAL");
        let _ = conn.pragma_update(None, "busy_timeout", "5000");
        let _ = conn.pragma_update(None, "foreign_keys", "ON");

        conn.execute(
            "CREATE TABLE IF NOT EXISTS graph_vertices (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                category TEXT NOT NULL,
                time_added INTEGER NOT NULL,
                status TEXT NOT NULL DEFAULT 'active',
                status_time INTEGER,
                replacement INTEGER
            )",
            [],
        )
        .map_err(|e| op_failed("create_graph_vertices_table", e))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS graph_vertex_attrs (
                vertex_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                ord INTEGER NOT NULL DEFAULT 0,
                kind TEXT NOT NULL,
                text_value TEXT,
                int_value INTEGER,
                PRIMARY KEY (vertex_id, name, ord),
                FOREIGN KEY (vertex_id) REFERENCES graph_vertices(id) ON DELETE CASCADE
            )",
            [],
        )
        .map_err(|e| op_failed("create_graph_vertex_attrs_table", e))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS graph_edges (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                category TEXT NOT NULL,
                out_vertex INTEGER NOT NULL,
                in_vertex INTEGER NOT NULL,
                time_added INTEGER NOT NULL,
                status TEXT NOT NULL DEFAULT 'active',
                status_time INTEGER,
                replacement INTEGER,
                start_time INTEGER,
                start_uid TEXT,
                start_edit_time INTEGER,
                start_comments TEXT,
                end_time INTEGER,
                end_uid TEXT,
                end_edit_time INTEGER,
                end_comments TEXT,
                FOREIGN KEY (out_vertex) REFERENCES graph_vertices(id),
                FOREIGN KEY (in_vertex) REFERENCES graph_vertices(id)
            )",
            [],
        )
        .map_err(|e| op_failed("create_graph_edges_table", e))?;

        Self::create_indexes(&conn);

        Ok(())
    }

    /// Creates indexes for optimized queries.
    fn create_indexes(conn: &Connection) {
        let _ = conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_graph_vertices_category
             ON graph_vertices(category, status)",
            [],
        );
        let _ = conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_graph_vertex_attrs_name
             ON graph_vertex_attrs(name, text_value)",
            [],
        );
        let _ = conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_graph_edges_category
             ON graph_edges(category, status)",
            [],
        );
        let _ = conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_graph_edges_out ON graph_edges(out_vertex)",
            [],
        );
        let _ = conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_graph_edges_in ON graph_edges(in_vertex)",
            [],
        );
        let _ = conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_graph_edges_start ON graph_edges(start_time)",
            [],
        );
    }

    /// Encodes a lifecycle status into its three columns.
    const fn encode_status(status: LifecycleStatus) -> (&'static str, Option<i64>, Option<i64>) {
        match status {
            LifecycleStatus::Active => ("active", None, None),
            LifecycleStatus::Disabled { at } => ("disabled", Some(at), None),
            LifecycleStatus::Replaced { at, by } => ("replaced", Some(at), Some(by)),
        }
    }

    /// Decodes a lifecycle status from its three columns.
    fn decode_status(
        status: &str,
        status_time: Option<i64>,
        replacement: Option<i64>,
    ) -> LifecycleStatus {
        match (status, status_time, replacement) {
            ("disabled", Some(at), _) => LifecycleStatus::Disabled { at },
            ("replaced", Some(at), Some(by)) => LifecycleStatus::Replaced { at, by },
            _ => LifecycleStatus::Active,
        }
    }

    /// Loads the attribute rows of a vertex into an [`AttrMap`].
    fn load_attrs(conn: &Connection, vertex_id: i64) -> rusqlite::Result<AttrMap> {
        let mut stmt = conn.prepare(
            "SELECT name, ord, kind, text_value, int_value
             FROM graph_vertex_attrs WHERE vertex_id = ?1
             ORDER BY name, ord",
        )?;
        let mut rows = stmt.query(params![vertex_id])?;

        let mut attrs = AttrMap::new();
        while let Some(row) = rows.next()? {
            let name: String = row.get("name")?;
            let kind: String = row.get("kind")?;
            match kind.as_str() {
                "int" => {
                    let value: i64 = row.get("int_value")?;
                    attrs.insert(name, AttrValue::Int(value));
                },
                "list" => {
                    let value: String = row.get("text_value")?;
                    match attrs.entry(name).or_insert_with(|| AttrValue::List(Vec::new())) {
                        AttrValue::List(values) => values.push(value),
                        // A list row can only land in a list attribute.
                        _ => unreachable!("list row mixed with scalar attribute"),
                    }
                },
                _ => {
                    let value: String = row.get("text_value")?;
                    attrs.insert(name, AttrValue::Text(value));
                },
            }
        }
        Ok(attrs)
    }

    /// Writes the attribute rows of a vertex.
    fn write_attrs(conn: &Connection, vertex_id: i64, attrs: &AttrMap) -> rusqlite::Result<()> {
        let mut stmt = conn.prepare(
            "INSERT INTO graph_vertex_attrs (vertex_id, name, ord, kind, text_value, int_value)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for (name, value) in attrs {
            match value {
                AttrValue::Text(s) => {
                    stmt.execute(params![vertex_id, name, 0, "text", s, Option::<i64>::None])?;
                },
                AttrValue::Int(n) => {
                    stmt.execute(params![vertex_id, name, 0, "int", Option::<String>::None, n])?;
                },
                AttrValue::List(values) => {
                    for (ord, v) in values.iter().enumerate() {
                        stmt.execute(params![
                            vertex_id,
                            name,
                            ord as i64,
                            "list",
                            v,
                            Option::<i64>::None
                        ])?;
                    }
                },
            }
        }
        Ok(())
    }

    /// Parses a vertex from a database row (attrs loaded separately).
    fn parse_vertex_row(row: &Row<'_>) -> rusqlite::Result<(i64, VertexRecord)> {
        let id: i64 = row.get("id")?;
        let category_str: String = row.get("category")?;
        let time_added: i64 = row.get("time_added")?;
        let status: String = row.get("status")?;
        let status_time: Option<i64> = row.get("status_time")?;
        let replacement: Option<i64> = row.get("replacement")?;

        let category = VertexCategory::parse(&category_str).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                format!("unknown vertex category: {category_str}").into(),
            )
        })?;

        Ok((
            id,
            VertexRecord {
                id: ElementId::Persisted(id),
                category,
                time_added,
                status: Self::decode_status(&status, status_time, replacement),
                attrs: AttrMap::new(),
            },
        ))
    }

    /// Parses an edge from a database row.
    fn parse_edge_row(row: &Row<'_>) -> rusqlite::Result<EdgeRecord> {
        let id: i64 = row.get("id")?;
        let category_str: String = row.get("category")?;
        let out_vertex: i64 = row.get("out_vertex")?;
        let in_vertex: i64 = row.get("in_vertex")?;
        let time_added: i64 = row.get("time_added")?;
        let status: String = row.get("status")?;
        let status_time: Option<i64> = row.get("status_time")?;
        let replacement: Option<i64> = row.get("replacement")?;
        let start_time: Option<i64> = row.get("start_time")?;

        let category = EdgeCategory::parse(&category_str).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                format!("unknown edge category: {category_str}").into(),
            )
        })?;

        let validity = match start_time {
            None => None,
            Some(time) => {
                let start = Timestamp {
                    time,
                    uid: row.get::<_, Option<String>>("start_uid")?.unwrap_or_default(),
                    edit_time: row
                        .get::<_, Option<i64>>("start_edit_time")?
                        .unwrap_or_default(),
                    comments: row
                        .get::<_, Option<String>>("start_comments")?
                        .unwrap_or_default(),
                };
                let end = match row.get::<_, Option<i64>>("end_time")? {
                    None => None,
                    Some(end_time) => Some(Timestamp {
                        time: end_time,
                        uid: row.get::<_, Option<String>>("end_uid")?.unwrap_or_default(),
                        edit_time: row
                            .get::<_, Option<i64>>("end_edit_time")?
                            .unwrap_or_default(),
                        comments: row
                            .get::<_, Option<String>>("end_comments")?
                            .unwrap_or_default(),
                    }),
                };
                Some(Validity { start, end })
            },
        };

        Ok(EdgeRecord {
            id: ElementId::Persisted(id),
            category,
            out_vertex,
            in_vertex,
            time_added,
            status: Self::decode_status(&status, status_time, replacement),
            validity,
        })
    }

    /// Builds WHERE clause conditions for vertex queries.
    fn build_vertex_where_clause(query: &VertexQuery) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut sql_params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(category) = query.category {
            conditions.push("v.category = ?".to_string());
            sql_params.push(Box::new(category.as_str().to_string()));
        }
        if query.active_only {
            conditions.push("v.status = 'active'".to_string());
        }
        if let Some(ref name) = query.name_eq {
            conditions.push(
                "EXISTS (SELECT 1 FROM graph_vertex_attrs a
                 WHERE a.vertex_id = v.id AND a.name = 'name' AND a.text_value = ?)"
                    .to_string(),
            );
            sql_params.push(Box::new(name.clone()));
        }
        if let Some(ref substring) = query.name_contains {
            conditions.push(
                "EXISTS (SELECT 1 FROM graph_vertex_attrs a
                 WHERE a.vertex_id = v.id AND a.name = 'name'
                 AND lower(a.text_value) LIKE '%' || lower(?) || '%')"
                    .to_string(),
            );
            sql_params.push(Box::new(substring.clone()));
        }
        if let Some(ref ids) = query.ids_in {
            if ids.is_empty() {
                conditions.push("0".to_string());
            } else {
                let placeholders = vec!["?"; ids.len()].join(", ");
                conditions.push(format!("v.id IN ({placeholders})"));
                for id in ids {
                    sql_params.push(Box::new(*id));
                }
            }
        }

        let clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };
        (clause, sql_params)
    }

    /// Builds the ORDER BY clause for vertex queries with the tie-break chain.
    fn build_vertex_order_clause(query: &VertexQuery) -> String {
        let direction = query.direction.as_sql();
        let name_expr = "(SELECT a.text_value FROM graph_vertex_attrs a
             WHERE a.vertex_id = v.id AND a.name = 'name' AND a.ord = 0)";
        match query.order_by {
            OrderBy::Name => format!("ORDER BY {name_expr} {direction}, v.id {direction}"),
            OrderBy::TimeAdded => format!(
                "ORDER BY v.time_added {direction}, {name_expr} {direction}, v.id {direction}"
            ),
        }
    }

    /// Builds WHERE clause conditions for edge queries.
    fn build_edge_where_clause(query: &EdgeQuery) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut sql_params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(category) = query.category {
            conditions.push("category = ?".to_string());
            sql_params.push(Box::new(category.as_str().to_string()));
        }
        if query.active_only {
            conditions.push("status = 'active'".to_string());
        }
        if let Some(vertex_id) = query.touching {
            conditions.push("(out_vertex = ? OR in_vertex = ?)".to_string());
            sql_params.push(Box::new(vertex_id));
            sql_params.push(Box::new(vertex_id));
        }
        if let Some((a, b)) = query.between {
            conditions.push(
                "((out_vertex = ? AND in_vertex = ?) OR (out_vertex = ? AND in_vertex = ?))"
                    .to_string(),
            );
            sql_params.push(Box::new(a));
            sql_params.push(Box::new(b));
            sql_params.push(Box::new(b));
            sql_params.push(Box::new(a));
        }
        if let Some(out) = query.out_vertex {
            conditions.push("out_vertex = ?".to_string());
            sql_params.push(Box::new(out));
        }
        if let Some(into) = query.in_vertex {
            conditions.push("in_vertex = ?".to_string());
            sql_params.push(Box::new(into));
        }
        if let Some(at) = query.contains_time {
            conditions
                .push("start_time IS NOT NULL AND start_time <= ? AND (end_time IS NULL OR end_time > ?)".to_string());
            sql_params.push(Box::new(at));
            sql_params.push(Box::new(at));
        }
        if let Some((from_time, to_time)) = query.overlaps_range {
            conditions.push(
                "start_time IS NOT NULL AND start_time < ? AND (end_time IS NULL OR end_time > ?)"
                    .to_string(),
            );
            sql_params.push(Box::new(to_time));
            sql_params.push(Box::new(from_time));
        }
        if let Some(t) = query.starts_at_or_after {
            conditions.push("start_time IS NOT NULL AND start_time >= ?".to_string());
            sql_params.push(Box::new(t));
        }
        if let Some(t) = query.starts_after {
            conditions.push("start_time IS NOT NULL AND start_time > ?".to_string());
            sql_params.push(Box::new(t));
        }

        let clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };
        (clause, sql_params)
    }
}

impl GraphStore for SqliteGraphStore {
    #[instrument(skip(self, attrs))]
    fn add_vertex(
        &self,
        category: VertexCategory,
        attrs: &AttrMap,
        time_added: i64,
    ) -> Result<i64> {
        let mut conn = acquire_lock(&self.conn);
        let tx = conn.transaction().map_err(|e| op_failed("add_vertex", e))?;

        tx.execute(
            "INSERT INTO graph_vertices (category, time_added, status) VALUES (?1, ?2, 'active')",
            params![category.as_str(), time_added],
        )
        .map_err(|e| op_failed("add_vertex", e))?;
        let id = tx.last_insert_rowid();

        Self::write_attrs(&tx, id, attrs).map_err(|e| op_failed("add_vertex_attrs", e))?;
        tx.commit().map_err(|e| op_failed("add_vertex", e))?;
        Ok(id)
    }

    fn get_vertex(&self, id: i64) -> Result<Option<VertexRecord>> {
        let conn = acquire_lock(&self.conn);
        let parsed = conn
            .query_row(
                "SELECT id, category, time_added, status, status_time, replacement
                 FROM graph_vertices WHERE id = ?1",
                params![id],
                Self::parse_vertex_row,
            )
            .optional()
            .map_err(|e| op_failed("get_vertex", e))?;

        let Some((vertex_id, mut vertex)) = parsed else {
            return Ok(None);
        };
        vertex.attrs =
            Self::load_attrs(&conn, vertex_id).map_err(|e| op_failed("get_vertex_attrs", e))?;
        Ok(Some(vertex))
    }

    fn find_vertices(&self, query: &VertexQuery) -> Result<Vec<VertexRecord>> {
        let conn = acquire_lock(&self.conn);
        let (where_clause, sql_params) = Self::build_vertex_where_clause(query);
        let order_clause = Self::build_vertex_order_clause(query);

        let limit = query.limit.map_or(-1, |l| l as i64);
        let offset = query.offset.unwrap_or(0) as i64;
        let sql = format!(
            "SELECT v.id, v.category, v.time_added, v.status, v.status_time, v.replacement
             FROM graph_vertices v {where_clause} {order_clause} LIMIT {limit} OFFSET {offset}"
        );

        let mut stmt = conn.prepare(&sql).map_err(|e| op_failed("find_vertices", e))?;
        let param_refs: Vec<&dyn rusqlite::ToSql> =
            sql_params.iter().map(AsRef::as_ref).collect();
        let parsed: Vec<(i64, VertexRecord)> = stmt
            .query_map(param_refs.as_slice(), Self::parse_vertex_row)
            .map_err(|e| op_failed("find_vertices", e))?
            .collect::<rusqlite::Result<_>>()
            .map_err(|e| op_failed("find_vertices", e))?;
        drop(stmt);

        let mut results = Vec::with_capacity(parsed.len());
        for (vertex_id, mut vertex) in parsed {
            vertex.attrs = Self::load_attrs(&conn, vertex_id)
                .map_err(|e| op_failed("find_vertices_attrs", e))?;
            results.push(vertex);
        }
        Ok(results)
    }

    fn count_vertices(&self, query: &VertexQuery) -> Result<usize> {
        let conn = acquire_lock(&self.conn);
        let (where_clause, sql_params) = Self::build_vertex_where_clause(query);
        let sql = format!("SELECT COUNT(*) FROM graph_vertices v {where_clause}");

        let param_refs: Vec<&dyn rusqlite::ToSql> =
            sql_params.iter().map(AsRef::as_ref).collect();
        let count: i64 = conn
            .query_row(&sql, param_refs.as_slice(), |row| row.get(0))
            .map_err(|e| op_failed("count_vertices", e))?;
        Ok(count as usize)
    }

    #[instrument(skip(self))]
    fn set_vertex_status(&self, id: i64, status: LifecycleStatus) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        let (status_str, status_time, replacement) = Self::encode_status(status);
        let changed = conn
            .execute(
                "UPDATE graph_vertices SET status = ?1, status_time = ?2, replacement = ?3
                 WHERE id = ?4",
                params![status_str, status_time, replacement, id],
            )
            .map_err(|e| op_failed("set_vertex_status", e))?;
        if changed == 0 {
            return Err(Error::NotFound(format!("vertex #{id}")));
        }
        Ok(())
    }

    #[instrument(skip(self, attrs))]
    fn set_vertex_attrs(&self, id: i64, attrs: &AttrMap) -> Result<()> {
        let mut conn = acquire_lock(&self.conn);
        let tx = conn
            .transaction()
            .map_err(|e| op_failed("set_vertex_attrs", e))?;

        let exists: i64 = tx
            .query_row(
                "SELECT COUNT(*) FROM graph_vertices WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .map_err(|e| op_failed("set_vertex_attrs", e))?;
        if exists == 0 {
            return Err(Error::NotFound(format!("vertex #{id}")));
        }

        tx.execute(
            "DELETE FROM graph_vertex_attrs WHERE vertex_id = ?1",
            params![id],
        )
        .map_err(|e| op_failed("set_vertex_attrs", e))?;
        Self::write_attrs(&tx, id, attrs).map_err(|e| op_failed("set_vertex_attrs", e))?;
        tx.commit().map_err(|e| op_failed("set_vertex_attrs", e))?;
        Ok(())
    }

    #[instrument(skip(self, edge))]
    fn add_edge(&self, edge: &EdgeRecord, time_added: i64) -> Result<i64> {
        let mut conn = acquire_lock(&self.conn);
        let tx = conn.transaction().map_err(|e| op_failed("add_edge", e))?;

        for endpoint in [edge.out_vertex, edge.in_vertex] {
            let exists: i64 = tx
                .query_row(
                    "SELECT COUNT(*) FROM graph_vertices WHERE id = ?1",
                    params![endpoint],
                    |row| row.get(0),
                )
                .map_err(|e| op_failed("add_edge", e))?;
            if exists == 0 {
                return Err(Error::NotFound(format!("vertex #{endpoint}")));
            }
        }

        let (status_str, status_time, replacement) = Self::encode_status(edge.status);
        let (start, end) = match &edge.validity {
            None => (None, None),
            Some(v) => (Some(&v.start), v.end.as_ref()),
        };

        tx.execute(
            "INSERT INTO graph_edges (
                category, out_vertex, in_vertex, time_added,
                status, status_time, replacement,
                start_time, start_uid, start_edit_time, start_comments,
                end_time, end_uid, end_edit_time, end_comments
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                edge.category.as_str(),
                edge.out_vertex,
                edge.in_vertex,
                time_added,
                status_str,
                status_time,
                replacement,
                start.map(|t| t.time),
                start.map(|t| t.uid.clone()),
                start.map(|t| t.edit_time),
                start.map(|t| t.comments.clone()),
                end.map(|t| t.time),
                end.map(|t| t.uid.clone()),
                end.map(|t| t.edit_time),
                end.map(|t| t.comments.clone()),
            ],
        )
        .map_err(|e| op_failed("add_edge", e))?;
        let id = tx.last_insert_rowid();
        tx.commit().map_err(|e| op_failed("add_edge", e))?;
        Ok(id)
    }

    fn get_edge(&self, id: i64) -> Result<Option<EdgeRecord>> {
        let conn = acquire_lock(&self.conn);
        conn.query_row(
            "SELECT * FROM graph_edges WHERE id = ?1",
            params![id],
            Self::parse_edge_row,
        )
        .optional()
        .map_err(|e| op_failed("get_edge", e))
    }

    fn find_edges(&self, query: &EdgeQuery) -> Result<Vec<EdgeRecord>> {
        let conn = acquire_lock(&self.conn);
        let (where_clause, sql_params) = Self::build_edge_where_clause(query);
        let sql = format!(
            "SELECT * FROM graph_edges {where_clause}
             ORDER BY COALESCE(start_time, -9223372036854775808), id"
        );

        let mut stmt = conn.prepare(&sql).map_err(|e| op_failed("find_edges", e))?;
        let param_refs: Vec<&dyn rusqlite::ToSql> =
            sql_params.iter().map(AsRef::as_ref).collect();
        let results = stmt
            .query_map(param_refs.as_slice(), Self::parse_edge_row)
            .map_err(|e| op_failed("find_edges", e))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| op_failed("find_edges", e))?;
        Ok(results)
    }

    #[instrument(skip(self))]
    fn set_edge_status(&self, id: i64, status: LifecycleStatus) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        let (status_str, status_time, replacement) = Self::encode_status(status);
        let changed = conn
            .execute(
                "UPDATE graph_edges SET status = ?1, status_time = ?2, replacement = ?3
                 WHERE id = ?4",
                params![status_str, status_time, replacement, id],
            )
            .map_err(|e| op_failed("set_edge_status", e))?;
        if changed == 0 {
            return Err(Error::NotFound(format!("edge #{id}")));
        }
        Ok(())
    }

    #[instrument(skip(self, end))]
    fn set_edge_end(&self, id: i64, end: &Timestamp) -> Result<()> {
        let conn = acquire_lock(&self.conn);

        let start_time: Option<Option<i64>> = conn
            .query_row(
                "SELECT start_time FROM graph_edges WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| op_failed("set_edge_end", e))?;
        match start_time {
            None => return Err(Error::NotFound(format!("edge #{id}"))),
            Some(None) => {
                return Err(Error::Validation(format!("edge #{id} is not timestamped")))
            },
            Some(Some(_)) => {},
        }

        conn.execute(
            "UPDATE graph_edges
             SET end_time = ?1, end_uid = ?2, end_edit_time = ?3, end_comments = ?4
             WHERE id = ?5",
            params![end.time, end.uid, end.edit_time, end.comments, id],
        )
        .map_err(|e| op_failed("set_edge_end", e))?;
        Ok(())
    }

    fn drop_edge(&self, id: i64) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        conn.execute("DELETE FROM graph_edges WHERE id = ?1", params![id])
            .map_err(|e| op_failed("drop_edge", e))?;
        Ok(())
    }

    fn stats(&self) -> Result<StoreStats> {
        let conn = acquire_lock(&self.conn);
        let count = |sql: &str| -> Result<usize> {
            let n: i64 = conn
                .query_row(sql, [], |row| row.get(0))
                .map_err(|e| op_failed("stats", e))?;
            Ok(n as usize)
        };
        Ok(StoreStats {
            vertex_count: count("SELECT COUNT(*) FROM graph_vertices")?,
            active_vertex_count: count(
                "SELECT COUNT(*) FROM graph_vertices WHERE status = 'active'",
            )?,
            edge_count: count("SELECT COUNT(*) FROM graph_edges")?,
            active_edge_count: count("SELECT COUNT(*) FROM graph_edges WHERE status = 'active'")?,
        })
    }

    fn drop_all(&self) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        for sql in [
            "DELETE FROM graph_edges",
            "DELETE FROM graph_vertex_attrs",
            "DELETE FROM graph_vertices",
        ] {
            conn.execute(sql, []).map_err(|e| op_failed("drop_all", e))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named_attrs(name: &str) -> AttrMap {
        let mut attrs = AttrMap::new();
        attrs.insert(ATTR_NAME.to_string(), name.into());
        attrs
    }

    #[test]
    fn test_vertex_roundtrip_with_list_attrs() {
        let store = SqliteGraphStore::in_memory().unwrap();
        let mut attrs = named_attrs("p1");
        attrs.insert("n_values".to_string(), 2i64.into());
        attrs.insert(
            "values".to_string(),
            vec!["Linux".to_string(), "6.1".to_string()].into(),
        );

        let id = store
            .add_vertex(VertexCategory::Property, &attrs, 100)
            .unwrap();
        let vertex = store.get_vertex(id).unwrap().unwrap();

        assert_eq!(vertex.text_attr(ATTR_NAME), Some("p1"));
        assert_eq!(vertex.int_attr("n_values"), Some(2));
        assert_eq!(
            vertex.list_attr("values"),
            Some(&["Linux".to_string(), "6.1".to_string()][..])
        );
        assert_eq!(vertex.time_added, 100);
    }

    #[test]
    fn test_status_lifecycle_roundtrip() {
        let store = SqliteGraphStore::in_memory().unwrap();
        let id = store
            .add_vertex(VertexCategory::Component, &named_attrs("r1"), 0)
            .unwrap();

        store
            .set_vertex_status(id, LifecycleStatus::Replaced { at: 50, by: 99 })
            .unwrap();
        let vertex = store.get_vertex(id).unwrap().unwrap();
        assert_eq!(vertex.status, LifecycleStatus::Replaced { at: 50, by: 99 });

        let active = store
            .find_vertices(&VertexQuery::active(VertexCategory::Component))
            .unwrap();
        assert!(active.is_empty());
    }

    #[test]
    fn test_name_filters_and_ordering() {
        let store = SqliteGraphStore::in_memory().unwrap();
        for name in ["beta", "alpha", "gamma"] {
            store
                .add_vertex(VertexCategory::ComponentType, &named_attrs(name), 0)
                .unwrap();
        }

        let all = store
            .find_vertices(&VertexQuery::active(VertexCategory::ComponentType))
            .unwrap();
        let names: Vec<_> = all
            .iter()
            .map(|v| v.text_attr(ATTR_NAME).unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["alpha", "beta", "gamma"]);

        let exact = store
            .find_vertices(
                &VertexQuery::active(VertexCategory::ComponentType).with_name("beta"),
            )
            .unwrap();
        assert_eq!(exact.len(), 1);

        let substring = store
            .find_vertices(
                &VertexQuery::active(VertexCategory::ComponentType).with_name_containing("A"),
            )
            .unwrap();
        assert_eq!(substring.len(), 3); // case-insensitive

        assert_eq!(
            store
                .count_vertices(&VertexQuery::active(VertexCategory::ComponentType))
                .unwrap(),
            3
        );
    }

    #[test]
    fn test_edge_validity_roundtrip() {
        let store = SqliteGraphStore::in_memory().unwrap();
        let a = store
            .add_vertex(VertexCategory::Component, &named_attrs("a"), 0)
            .unwrap();
        let b = store
            .add_vertex(VertexCategory::Component, &named_attrs("b"), 0)
            .unwrap();

        let edge = EdgeRecord::timestamped(
            EdgeCategory::Connection,
            a,
            b,
            Validity::open(Timestamp::new(100, "alice").with_comments("rack 4")),
        );
        let edge_id = store.add_edge(&edge, 5).unwrap();

        let loaded = store.get_edge(edge_id).unwrap().unwrap();
        let validity = loaded.validity.clone().unwrap();
        assert_eq!(validity.start.time, 100);
        assert_eq!(validity.start.uid, "alice");
        assert_eq!(validity.start.comments, "rack 4");
        assert!(validity.is_open());

        store
            .set_edge_end(edge_id, &Timestamp::new(200, "bob"))
            .unwrap();
        let closed = store.get_edge(edge_id).unwrap().unwrap();
        assert_eq!(closed.validity.unwrap().end_time(), Some(200));

        // Interval queries match the unordered pair in both directions.
        let hits = store
            .find_edges(
                &EdgeQuery::active(EdgeCategory::Connection)
                    .between(b, a)
                    .at_time(150),
            )
            .unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_edge_rejects_missing_endpoint() {
        let store = SqliteGraphStore::in_memory().unwrap();
        let a = store
            .add_vertex(VertexCategory::Component, &named_attrs("a"), 0)
            .unwrap();
        let edge = EdgeRecord::new(EdgeCategory::Subcomponent, a, 12345);
        assert!(matches!(store.add_edge(&edge, 0), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_set_edge_end_rejects_untimestamped() {
        let store = SqliteGraphStore::in_memory().unwrap();
        let a = store
            .add_vertex(VertexCategory::Component, &named_attrs("a"), 0)
            .unwrap();
        let b = store
            .add_vertex(VertexCategory::Component, &named_attrs("b"), 0)
            .unwrap();
        let edge_id = store
            .add_edge(&EdgeRecord::new(EdgeCategory::Subcomponent, a, b), 0)
            .unwrap();

        assert!(matches!(
            store.set_edge_end(edge_id, &Timestamp::new(10, "t")),
            Err(Error::Validation(_))
        ));
    }
}
