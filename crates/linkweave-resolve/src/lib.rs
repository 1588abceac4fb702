//! Query side of linkweave: hybrid fusion, graph neighbourhoods,
//! document relationships, and plain semantic search.

pub mod hybrid;
pub mod neighbors;
pub mod relations;
pub mod search;
pub mod types;

#[cfg(test)]
mod test_support;

pub use hybrid::{min_max_normalize, HybridSearcher};
pub use neighbors::graph_neighbors;
pub use relations::{GraphRelations, LlmRelations, RelationStrategy, Relationships, StrategyKind};
pub use search::{
    get_document, list_documents, semantic_search, similar_documents, DocumentList, DocumentView,
    SearchHit, SearchResponse,
};
pub use types::*;
