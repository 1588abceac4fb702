//! Linkweave Store: relationship graph + SQLite vector index.

pub mod embedding;
pub mod graph;
pub mod schema;
pub mod sqlite;
pub mod types;
pub mod vector;

pub use graph::{
    normalize_entity, GraphDeletion, GraphReader, GraphStats, GraphStore, GraphUpdate,
    Neighborhood, NodeId, NodeKind,
};
pub use sqlite::{content_hash, SqliteVectorIndex};
pub use types::*;
pub use vector::VectorIndex;
