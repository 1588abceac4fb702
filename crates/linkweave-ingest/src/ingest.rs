//! Document ingestion: text → embedding → vector index → entities → graph.
//!
//! The graph side of an ingest is one [`GraphStore::replace_document`] call,
//! so a document's graph state is either fully updated or untouched. A
//! failure after the vector write is reported as a degraded success instead
//! of an error, since the vector record has already landed.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::extract::EntityExtractor;
use linkweave_core::{Durability, Error, Result};
use linkweave_infer::EmbedderBackend;
use linkweave_store::{content_hash, GraphStore, Metadata, VectorIndex, VectorRecord};

/// One document to ingest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentInput {
    #[serde(default)]
    pub doc_id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl DocumentInput {
    pub fn new(doc_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            doc_id: doc_id.into(),
            text: text.into(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.doc_id.trim().is_empty() || self.text.trim().is_empty() {
            return Err(Error::InvalidArgument("missing doc_id or text".into()));
        }
        Ok(())
    }
}

/// Pipeline step that failed after the vector record was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestStage {
    EntityExtraction,
    GraphUpdate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum IngestStatus {
    Complete,
    /// Vector record stored; the graph was left untouched for this document.
    /// Retrying the ingest repairs it.
    Degraded { stage: IngestStage, reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub doc_id: String,
    pub status: IngestStatus,
    pub entities_extracted: usize,
    pub entities: Vec<String>,
    /// Entities pruned because the re-ingest dropped their last document.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub removed_entities: Vec<String>,
    pub metadata: Metadata,
    pub embedding_dim: usize,
    pub content_hash: String,
    /// Whether the graph snapshot reached disk. Absent when the graph was not updated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub durability: Option<Durability>,
}

impl IngestReport {
    pub fn is_complete(&self) -> bool {
        self.status == IngestStatus::Complete
    }
}

/// Per-document outcome inside a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BatchItemOutcome {
    Ingested(IngestReport),
    Failed {
        doc_id: Option<String>,
        kind: String,
        error: String,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchIngestReport {
    pub total: usize,
    pub successful: usize,
    pub degraded: usize,
    pub failed: usize,
    pub details: Vec<BatchItemOutcome>,
}

/// Borrows the collaborators for the duration of an ingest.
pub struct Ingester<'a> {
    embedder: &'a dyn EmbedderBackend,
    index: &'a dyn VectorIndex,
    extractor: &'a dyn EntityExtractor,
    graph: &'a GraphStore,
}

impl<'a> Ingester<'a> {
    pub fn new(
        embedder: &'a dyn EmbedderBackend,
        index: &'a dyn VectorIndex,
        extractor: &'a dyn EntityExtractor,
        graph: &'a GraphStore,
    ) -> Self {
        Self {
            embedder,
            index,
            extractor,
            graph,
        }
    }

    /// Ingest one document. Errors mean nothing was written.
    pub fn ingest(&self, doc: DocumentInput) -> Result<IngestReport> {
        doc.validate()?;
        let DocumentInput {
            doc_id,
            text,
            metadata,
        } = doc;

        let embedding = self.embedder.embed(&text)?.embedding;
        let embedding_dim = embedding.len();
        let hash = content_hash(&text);

        self.index.upsert(VectorRecord {
            id: doc_id.clone(),
            embedding,
            text: text.clone(),
            metadata: metadata.clone(),
        })?;

        let mut report = IngestReport {
            doc_id: doc_id.clone(),
            status: IngestStatus::Complete,
            entities_extracted: 0,
            entities: Vec::new(),
            removed_entities: Vec::new(),
            metadata,
            embedding_dim,
            content_hash: hash,
            durability: None,
        };

        let entities = match self.extractor.extract(&text) {
            Ok(entities) => entities,
            Err(e) => {
                warn!("Entity extraction failed for {}: {}", doc_id, e);
                report.status = IngestStatus::Degraded {
                    stage: IngestStage::EntityExtraction,
                    reason: e.to_string(),
                };
                return Ok(report);
            }
        };

        match self.graph.replace_document(&doc_id, &entities) {
            Ok(update) => {
                report.entities_extracted = update.entities.len();
                report.entities = update.entities;
                report.removed_entities = update.removed_entities;
                report.durability = Some(update.durability);
                info!(
                    "Ingested document {} ({} entities, {} edges added, {} removed)",
                    doc_id, report.entities_extracted, update.added_edges, update.removed_edges
                );
            }
            Err(e) => {
                warn!("Graph update failed for {}: {}", doc_id, e);
                report.entities_extracted = entities.len();
                report.entities = entities;
                report.status = IngestStatus::Degraded {
                    stage: IngestStage::GraphUpdate,
                    reason: e.to_string(),
                };
            }
        }
        Ok(report)
    }

    /// Ingest each document independently; one failure never stops the batch.
    pub fn ingest_batch(&self, docs: Vec<DocumentInput>) -> BatchIngestReport {
        let mut batch = BatchIngestReport {
            total: docs.len(),
            ..Default::default()
        };

        for doc in docs {
            let doc_id = Some(doc.doc_id.clone()).filter(|id| !id.trim().is_empty());
            match self.ingest(doc) {
                Ok(report) => {
                    if report.is_complete() {
                        batch.successful += 1;
                    } else {
                        batch.degraded += 1;
                    }
                    batch.details.push(BatchItemOutcome::Ingested(report));
                }
                Err(e) => {
                    batch.failed += 1;
                    batch.details.push(BatchItemOutcome::Failed {
                        doc_id,
                        kind: e.kind().to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            "Batch ingest: {} total, {} ok, {} degraded, {} failed",
            batch.total, batch.successful, batch.degraded, batch.failed
        );
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::KeywordExtractor;
    use linkweave_infer::HashingEmbedder;
    use linkweave_store::{NodeId, SqliteVectorIndex};
    use tempfile::TempDir;

    const DIM: usize = 64;

    struct Fixture {
        embedder: HashingEmbedder,
        index: SqliteVectorIndex,
        graph: GraphStore,
        _dir: TempDir,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        Fixture {
            embedder: HashingEmbedder::new(DIM),
            index: SqliteVectorIndex::open(dir.path().join("vectordb"), DIM).unwrap(),
            graph: GraphStore::new(dir.path().join("graph.json")),
            _dir: dir,
        }
    }

    struct BrokenExtractor;

    impl EntityExtractor for BrokenExtractor {
        fn extract(&self, _text: &str) -> Result<Vec<String>> {
            Err(Error::UpstreamUnavailable("extractor offline".into()))
        }
    }

    #[test]
    fn test_ingest_writes_vector_and_graph() {
        let f = fixture();
        let extractor = KeywordExtractor::default();
        let ingester = Ingester::new(&f.embedder, &f.index, &extractor, &f.graph);

        let report = ingester
            .ingest(DocumentInput::new("d1", "machine learning uses python"))
            .unwrap();
        assert!(report.is_complete());
        assert_eq!(report.entities, vec!["machine", "learning", "python"]);
        assert_eq!(report.entities_extracted, 3);
        assert_eq!(report.embedding_dim, DIM);
        assert_eq!(report.durability, Some(Durability::Persisted));

        assert_eq!(f.index.get("d1").unwrap().text, "machine learning uses python");
        assert_eq!(
            f.graph.neighbors(&NodeId::document("d1"), 1).unwrap().entities,
            vec!["learning", "machine", "python"]
        );
    }

    #[test]
    fn test_reingest_replaces_entities() {
        let f = fixture();
        let extractor = KeywordExtractor::default();
        let ingester = Ingester::new(&f.embedder, &f.index, &extractor, &f.graph);

        ingester.ingest(DocumentInput::new("d1", "cooking recipes")).unwrap();
        let report = ingester.ingest(DocumentInput::new("d1", "baking bread")).unwrap();

        assert_eq!(report.removed_entities, vec!["cooking", "recipes"]);
        assert_eq!(f.graph.document_entities("d1").unwrap(), vec!["baking", "bread"]);
        assert_eq!(f.index.count().unwrap(), 1);
        assert_eq!(f.index.get("d1").unwrap().text, "baking bread");
    }

    #[test]
    fn test_invalid_input_writes_nothing() {
        let f = fixture();
        let extractor = KeywordExtractor::default();
        let ingester = Ingester::new(&f.embedder, &f.index, &extractor, &f.graph);

        assert!(matches!(
            ingester.ingest(DocumentInput::new("", "text")),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            ingester.ingest(DocumentInput::new("d1", "   ")),
            Err(Error::InvalidArgument(_))
        ));
        assert_eq!(f.index.count().unwrap(), 0);
        assert_eq!(f.graph.stats().total_nodes, 0);
    }

    #[test]
    fn test_extraction_failure_is_degraded() {
        let f = fixture();
        let ingester = Ingester::new(&f.embedder, &f.index, &BrokenExtractor, &f.graph);

        let report = ingester.ingest(DocumentInput::new("d1", "some text")).unwrap();
        assert!(matches!(
            report.status,
            IngestStatus::Degraded {
                stage: IngestStage::EntityExtraction,
                ..
            }
        ));
        assert!(report.durability.is_none());
        // Vector landed, graph untouched.
        assert!(f.index.get("d1").is_ok());
        assert!(!f.graph.contains_document("d1"));
    }

    #[test]
    fn test_batch_reports_each_item() {
        let f = fixture();
        let extractor = KeywordExtractor::default();
        let ingester = Ingester::new(&f.embedder, &f.index, &extractor, &f.graph);

        let mut meta = Metadata::new();
        meta.insert("lang".into(), serde_json::json!("en"));
        let batch = ingester.ingest_batch(vec![
            DocumentInput::new("d1", "machine learning uses python").with_metadata(meta),
            DocumentInput::new("", "orphan text"),
            DocumentInput::new("d2", "python for data science"),
        ]);

        assert_eq!(batch.total, 3);
        assert_eq!(batch.successful, 2);
        assert_eq!(batch.failed, 1);
        assert_eq!(batch.degraded, 0);
        match &batch.details[1] {
            BatchItemOutcome::Failed { doc_id, kind, .. } => {
                assert!(doc_id.is_none());
                assert_eq!(kind, "invalid_argument");
            }
            other => panic!("expected failure, got {:?}", other),
        }

        let json = serde_json::to_value(&batch).unwrap();
        assert_eq!(json["details"][0]["outcome"], "ingested");
        assert_eq!(json["details"][0]["metadata"]["lang"], "en");
        assert_eq!(json["details"][0]["status"]["state"], "complete");
    }
}
