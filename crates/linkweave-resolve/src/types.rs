//! Response types for hybrid and graph queries.

use serde::Serialize;

use linkweave_store::{Metadata, NodeId};

/// Which retrieval signal first surfaced a fused result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSource {
    VectorSearch,
    GraphExpansion,
}

/// A vector search hit annotated with its graph connectivity.
#[derive(Debug, Clone, Serialize)]
pub struct VectorHit {
    pub doc_id: String,
    pub document: String,
    pub metadata: Metadata,
    pub distance: f64,
    pub relevance_score: f64,
    /// Distinct documents this hit reaches through a shared entity.
    pub graph_neighbor_count: usize,
    pub graph_score: f64,
    pub graph_score_normalized: f64,
}

/// A document found only through the graph.
#[derive(Debug, Clone, Serialize)]
pub struct GraphExpansionHit {
    pub doc_id: String,
    pub document: String,
    pub metadata: Metadata,
    pub graph_score: f64,
}

/// An entity crossed during expansion and the candidate documents it links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntitySummary {
    pub entity: String,
    pub related_document_count: usize,
    pub related_documents: Vec<String>,
}

/// One entry of the fused ranking. `relevance_score` is the hybrid score.
#[derive(Debug, Clone, Serialize)]
pub struct HybridResult {
    pub doc_id: String,
    pub document: String,
    pub metadata: Metadata,
    pub source: ResultSource,
    pub relevance_score: f64,
    pub vector_score: f64,
    pub vector_score_normalized: f64,
    pub graph_score: f64,
    pub graph_score_normalized: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HybridResponse {
    pub query: String,
    pub vector_hits: Vec<VectorHit>,
    pub vector_hits_count: usize,
    pub graph_expansion: Vec<GraphExpansionHit>,
    pub graph_expansion_count: usize,
    pub entities: Vec<EntitySummary>,
    pub entities_count: usize,
    pub hybrid_results: Vec<HybridResult>,
    pub hybrid_results_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct NeighborsResponse {
    pub doc_id: String,
    pub depth: usize,
    pub total_neighbors: usize,
    pub document_neighbors: Vec<NodeId>,
    pub document_neighbors_count: usize,
    pub entity_neighbors: Vec<NodeId>,
    pub entity_neighbors_count: usize,
    pub all_neighbors: Vec<String>,
}
