//! Storage backends for the registry graph.
//!
//! The [`GraphStore`] trait is the single seam between the temporal service
//! layer and persistence. Two backends ship: `SQLite` (default, embedded,
//! WAL journaling) and in-memory (testing). The [`IdentityCache`] memoizes
//! resolved vertices per registry instance.

pub mod graph;
pub mod identity;
pub mod memory;
pub mod sqlite;

pub use graph::{EdgeQuery, GraphStore, StoreStats, VertexQuery};
pub use identity::IdentityCache;
pub use memory::InMemoryGraphStore;
pub use sqlite::SqliteGraphStore;
