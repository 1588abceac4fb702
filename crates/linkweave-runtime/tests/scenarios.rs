//! End-to-end scenarios through the engine with real stores on disk.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use linkweave_core::{Error, LinkweaveConfig, Result};
use linkweave_infer::HashingEmbedder;
use linkweave_ingest::{DocumentInput, KeywordExtractor};
use linkweave_reason::{AnalysisDocument, AnalyzedEntity, Mention, RelationAnalysis, RelationAnalyzer};
use linkweave_resolve::{ResultSource, StrategyKind};
use linkweave_runtime::Engine;
use linkweave_store::{GraphStore, NodeId, SqliteVectorIndex};
use tempfile::TempDir;

fn engine_at(root: &Path) -> Engine {
    let config = LinkweaveConfig::with_defaults(root).unwrap();
    let index = Arc::new(
        SqliteVectorIndex::open(&config.data_paths.vectordb, config.embedding_dim).unwrap(),
    );
    let graph = Arc::new(GraphStore::open(&config.data_paths.graph_file));
    let embedder = Arc::new(HashingEmbedder::new(config.embedding_dim));
    Engine::new(config, embedder, index, graph, Arc::new(KeywordExtractor::default()))
}

fn seed(engine: &Engine) {
    for (id, text) in [
        ("d1", "machine learning uses python"),
        ("d2", "python for data science"),
        ("d3", "cooking recipes"),
    ] {
        assert!(engine.ingest(DocumentInput::new(id, text)).unwrap().is_complete());
    }
}

#[test]
fn test_three_document_scenario() {
    let dir = TempDir::new().unwrap();
    let engine = engine_at(dir.path());
    seed(&engine);

    let d1 = engine.graph_neighbors("d1", 1).unwrap();
    assert_eq!(d1.all_neighbors, vec!["learning", "machine", "python"]);

    let python = engine.graph().neighbors(&NodeId::entity("python"), 1).unwrap();
    assert_eq!(python.documents, vec!["d1", "d2"]);

    let hybrid = engine.hybrid_search("python", 5, 1).unwrap();
    assert!(hybrid.graph_expansion.is_empty());
    let ranked: Vec<&str> = hybrid.hybrid_results.iter().map(|r| r.doc_id.as_str()).collect();
    assert_eq!(ranked, vec!["d1", "d2", "d3"]);
    assert!(hybrid
        .hybrid_results
        .iter()
        .all(|r| r.source == ResultSource::VectorSearch));

    let report = engine.delete_document("d3").unwrap();
    assert_eq!(report.removed_entities, vec!["cooking", "recipes"]);
    assert!(!engine.graph().node_exists(&NodeId::entity("cooking")));
    assert!(!engine.graph().node_exists(&NodeId::entity("recipes")));
    assert_eq!(engine.graph().document_entities("d2").unwrap(), vec!["data", "python", "science"]);

    assert!(matches!(engine.graph_neighbors("nonexistent", 1), Err(Error::NotFound(_))));
}

#[test]
fn test_state_survives_restart() {
    let dir = TempDir::new().unwrap();
    {
        let engine = engine_at(dir.path());
        seed(&engine);
        engine.delete_document("d3").unwrap();
    }

    let engine = engine_at(dir.path());
    assert_eq!(engine.list_documents().unwrap().documents, vec!["d1", "d2"]);
    let stats = engine.stats();
    assert_eq!(stats.total_documents, 2);
    assert_eq!(stats.document_node_count, 2);
    assert_eq!(stats.entity_node_count, 5);
    assert_eq!(stats.total_edges, 6);
    assert_eq!(
        engine.get_document("d2").unwrap().document,
        "python for data science"
    );
}

#[test]
fn test_reingest_replaces_entities() {
    let dir = TempDir::new().unwrap();
    let engine = engine_at(dir.path());
    seed(&engine);

    let report = engine
        .ingest(DocumentInput::new("d1", "machine vision"))
        .unwrap();
    assert_eq!(report.removed_entities, vec!["learning"]);

    let stats = engine.stats();
    assert_eq!(stats.total_documents, 3);
    let d1 = engine.graph_neighbors("d1", 2).unwrap();
    assert_eq!(d1.document_neighbors_count, 0);
    assert_eq!(engine.get_document("d1").unwrap().document, "machine vision");
}

#[test]
fn test_batch_ingest_is_per_item() {
    let dir = TempDir::new().unwrap();
    let engine = engine_at(dir.path());

    let batch = engine.ingest_many(vec![
        DocumentInput::new("a", "rust ownership"),
        DocumentInput::new("b", ""),
        DocumentInput::new("c", "rust borrowing"),
    ]);
    assert_eq!(batch.total, 3);
    assert_eq!(batch.successful, 2);
    assert_eq!(batch.failed, 1);
    assert_eq!(engine.graph_neighbors("a", 2).unwrap().document_neighbors_count, 1);
}

struct EchoAnalyzer;

#[async_trait]
impl RelationAnalyzer for EchoAnalyzer {
    async fn analyze(
        &self,
        _focus: &AnalysisDocument,
        related: &[AnalysisDocument],
    ) -> Result<RelationAnalysis> {
        Ok(RelationAnalysis {
            entities: related
                .iter()
                .map(|doc| AnalyzedEntity {
                    id: format!("e-{}", doc.doc_id),
                    entity_type: "TOPIC".into(),
                    mentions: vec![Mention {
                        doc_id: doc.doc_id.clone(),
                        text: String::new(),
                    }],
                })
                .collect(),
            relations: Vec::new(),
        })
    }
}

#[tokio::test]
async fn test_relationships_by_strategy() {
    let dir = TempDir::new().unwrap();
    let engine = engine_at(dir.path());
    seed(&engine);

    let graph = engine.relationships("d2").await.unwrap();
    assert_eq!(graph.strategy, StrategyKind::Graph);
    assert_eq!(graph.related_documents, vec!["d1"]);

    let engine = engine.with_analyzer(Arc::new(EchoAnalyzer));
    assert_eq!(engine.relation_strategy(), StrategyKind::Llm);
    let llm = engine.relationships("d2").await.unwrap();
    assert_eq!(llm.strategy, StrategyKind::Llm);
    assert_eq!(llm.entities, vec!["e-d1", "e-d3"]);
    assert_eq!(llm.related_documents, vec!["d1", "d3"]);

    assert!(matches!(engine.relationships("ghost").await, Err(Error::NotFound(_))));
}
