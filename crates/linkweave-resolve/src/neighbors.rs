//! Graph neighbourhood of a document.

use linkweave_core::{Error, Result};
use linkweave_store::{GraphStore, NodeId};

use crate::types::NeighborsResponse;

pub const MAX_NEIGHBOR_DEPTH: usize = 2;

/// BFS neighbours of `doc_id` partitioned by node type. `depth == 0` is
/// rejected; larger depths are clamped to [`MAX_NEIGHBOR_DEPTH`].
pub fn graph_neighbors(graph: &GraphStore, doc_id: &str, depth: usize) -> Result<NeighborsResponse> {
    if doc_id.trim().is_empty() {
        return Err(Error::InvalidArgument("doc_id must not be empty".into()));
    }
    if depth == 0 {
        return Err(Error::InvalidArgument("depth must be at least 1".into()));
    }
    let depth = depth.min(MAX_NEIGHBOR_DEPTH);

    let hood = graph.neighbors(&NodeId::document(doc_id), depth)?;
    let all_neighbors: Vec<String> = hood
        .documents
        .iter()
        .chain(&hood.entities)
        .cloned()
        .collect();
    let document_neighbors: Vec<NodeId> = hood.documents.into_iter().map(NodeId::Document).collect();
    let entity_neighbors: Vec<NodeId> = hood.entities.into_iter().map(NodeId::Entity).collect();

    Ok(NeighborsResponse {
        doc_id: doc_id.to_string(),
        depth,
        total_neighbors: all_neighbors.len(),
        document_neighbors_count: document_neighbors.len(),
        document_neighbors,
        entity_neighbors_count: entity_neighbors.len(),
        entity_neighbors,
        all_neighbors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Fixture;

    #[test]
    fn test_depth_one_is_direct_entities() {
        let f = Fixture::scenario();
        let response = graph_neighbors(&f.graph, "d1", 1).unwrap();
        assert_eq!(response.entity_neighbors_count, 3);
        assert_eq!(response.document_neighbors_count, 0);
        assert_eq!(response.all_neighbors, vec!["learning", "machine", "python"]);
        assert_eq!(response.entity_neighbors[2], NodeId::entity("python"));
    }

    #[test]
    fn test_depth_two_reaches_documents() {
        let f = Fixture::scenario();
        let response = graph_neighbors(&f.graph, "d1", 2).unwrap();
        assert_eq!(response.document_neighbors, vec![NodeId::document("d2")]);
        assert_eq!(response.total_neighbors, 4);

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["document_neighbors"][0]["node_id"], "d2");
        assert_eq!(json["document_neighbors"][0]["node_type"], "document");
    }

    #[test]
    fn test_depth_is_clamped() {
        let f = Fixture::scenario();
        let response = graph_neighbors(&f.graph, "d1", 10).unwrap();
        assert_eq!(response.depth, MAX_NEIGHBOR_DEPTH);
    }

    #[test]
    fn test_errors() {
        let f = Fixture::scenario();
        assert!(matches!(graph_neighbors(&f.graph, "nonexistent", 1), Err(Error::NotFound(_))));
        assert!(matches!(graph_neighbors(&f.graph, "d1", 0), Err(Error::InvalidArgument(_))));
        assert!(matches!(graph_neighbors(&f.graph, "", 1), Err(Error::InvalidArgument(_))));
    }
}
