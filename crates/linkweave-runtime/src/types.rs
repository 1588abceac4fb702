//! Runtime types.

use serde::Serialize;

use linkweave_core::Durability;

/// Outcome of deleting a document from both stores.
#[derive(Debug, Clone, Serialize)]
pub struct DeleteReport {
    pub doc_id: String,
    pub vector_deleted: bool,
    pub graph_deleted: bool,
    /// Entities pruned because this was their last document.
    pub removed_entities: Vec<String>,
    /// Absent when the document was not in the graph.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub durability: Option<Durability>,
}
