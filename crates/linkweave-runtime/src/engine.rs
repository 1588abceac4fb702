//! Engine — owns the stores and collaborators and exposes the core operations.
//!
//! One engine per process. Every collaborator is constructed explicitly and
//! injected, so tests can swap any of them for a double.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::stats::{ServiceStatus, StatsCache, StatsSnapshot};
use crate::types::DeleteReport;
use linkweave_core::{Error, LinkweaveConfig, Result};
use linkweave_infer::{create_embedder, CachingEmbedder, EmbedderBackend, QueryCache};
use linkweave_ingest::{BatchIngestReport, DocumentInput, EntityExtractor, IngestReport, Ingester, KeywordExtractor};
use linkweave_reason::{LlmAnalyzer, RelationAnalyzer};
use linkweave_resolve::{
    graph_neighbors, DocumentList, DocumentView, GraphRelations, HybridResponse, HybridSearcher,
    LlmRelations, NeighborsResponse, RelationStrategy, Relationships, SearchResponse, StrategyKind,
};
use linkweave_store::{GraphStore, SqliteVectorIndex, VectorIndex};

pub struct Engine {
    config: LinkweaveConfig,
    /// Embeds document text on ingest.
    embedder: Arc<dyn EmbedderBackend>,
    /// Embeds queries, memoized.
    query_embedder: CachingEmbedder,
    index: Arc<dyn VectorIndex>,
    graph: Arc<GraphStore>,
    extractor: Arc<dyn EntityExtractor>,
    relations: Arc<dyn RelationStrategy>,
    stats: StatsCache,
    /// Held across every ingest and delete so the vector index and the graph
    /// always change together.
    writes: Mutex<()>,
}

impl Engine {
    /// Wire up the engine from explicit collaborators. Relationships use the
    /// graph strategy until [`Engine::with_analyzer`] is called.
    pub fn new(
        config: LinkweaveConfig,
        embedder: Arc<dyn EmbedderBackend>,
        index: Arc<dyn VectorIndex>,
        graph: Arc<GraphStore>,
        extractor: Arc<dyn EntityExtractor>,
    ) -> Self {
        let stats = StatsCache::new(config.stats_ttl);
        Self {
            query_embedder: CachingEmbedder::new(embedder.clone(), QueryCache::default()),
            relations: Arc::new(GraphRelations::new(graph.clone())),
            config,
            embedder,
            index,
            graph,
            extractor,
            stats,
            writes: Mutex::new(()),
        }
    }

    /// Answer relationship queries through `analyzer`, falling back to the
    /// graph when it fails.
    pub fn with_analyzer(mut self, analyzer: Arc<dyn RelationAnalyzer>) -> Self {
        self.relations = Arc::new(LlmRelations::new(
            self.graph.clone(),
            self.index.clone(),
            analyzer,
        ));
        self
    }

    /// Open the on-disk stores under `config.data_paths` and pick the best
    /// available embedder and relation strategy.
    pub fn open(config: LinkweaveConfig) -> Result<Self> {
        let paths = &config.data_paths;
        let index = Arc::new(SqliteVectorIndex::open(&paths.vectordb, config.embedding_dim)?);
        let graph = Arc::new(GraphStore::open(&paths.graph_file));
        let embedder = create_embedder(&paths.models, config.embedding_dim);
        let extractor = Arc::new(KeywordExtractor::new(config.max_entities));

        let stats = graph.stats();
        info!(
            "Engine ready: {} documents indexed, graph has {} nodes / {} edges",
            index.count().unwrap_or(0),
            stats.total_nodes,
            stats.total_edges
        );

        let engine = Self::new(config, embedder, index, graph, extractor);
        Ok(match LlmAnalyzer::from_env() {
            Some(analyzer) => engine.with_analyzer(Arc::new(analyzer)),
            None => {
                info!("No LLM API key configured; relationships use the graph only");
                engine
            }
        })
    }

    pub fn config(&self) -> &LinkweaveConfig {
        &self.config
    }

    pub fn graph(&self) -> &GraphStore {
        &self.graph
    }

    pub fn relation_strategy(&self) -> StrategyKind {
        self.relations.kind()
    }

    fn ingester(&self) -> Ingester<'_> {
        Ingester::new(&*self.embedder, &*self.index, &*self.extractor, &self.graph)
    }

    // ---------------------------------------------------------------
    // Writes
    // ---------------------------------------------------------------

    pub fn ingest(&self, doc: DocumentInput) -> Result<IngestReport> {
        let _writing = self.writes.lock();
        let result = self.ingester().ingest(doc);
        self.stats.invalidate();
        result
    }

    pub fn ingest_many(&self, docs: Vec<DocumentInput>) -> BatchIngestReport {
        let _writing = self.writes.lock();
        let report = self.ingester().ingest_batch(docs);
        self.stats.invalidate();
        report
    }

    /// Delete from both stores. A document missing from one store is
    /// tolerated; missing from both is `NotFound`.
    pub fn delete_document(&self, doc_id: &str) -> Result<DeleteReport> {
        if doc_id.trim().is_empty() {
            return Err(Error::InvalidArgument("doc_id must not be empty".into()));
        }
        let _writing = self.writes.lock();

        let vector_deleted = match self.index.delete(doc_id) {
            Ok(()) => true,
            Err(Error::NotFound(_)) => false,
            Err(e) => return Err(e),
        };
        let deletion = match self.graph.delete_document_node(doc_id) {
            Ok(deletion) => Some(deletion),
            Err(Error::NotFound(_)) => None,
            Err(e) => return Err(e),
        };
        self.stats.invalidate();

        if !vector_deleted && deletion.is_none() {
            return Err(Error::NotFound(format!("document {}", doc_id)));
        }
        if !vector_deleted || deletion.is_none() {
            warn!(
                "Document {} was only partially present (vector: {}, graph: {})",
                doc_id,
                vector_deleted,
                deletion.is_some()
            );
        }

        let graph_deleted = deletion.is_some();
        let (removed_entities, durability) = match deletion {
            Some(d) => (d.removed_entities, Some(d.durability)),
            None => (Vec::new(), None),
        };
        Ok(DeleteReport {
            doc_id: doc_id.to_string(),
            vector_deleted,
            graph_deleted,
            removed_entities,
            durability,
        })
    }

    // ---------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------

    pub fn semantic_search(&self, query: &str, top_k: usize) -> Result<SearchResponse> {
        linkweave_resolve::semantic_search(&self.query_embedder, &*self.index, query, top_k)
    }

    pub fn hybrid_search(&self, query: &str, top_k: usize, depth: usize) -> Result<HybridResponse> {
        HybridSearcher::new(&self.query_embedder, &*self.index, &self.graph, self.config.fusion)
            .search(query, top_k, depth)
    }

    pub fn get_document(&self, doc_id: &str) -> Result<DocumentView> {
        linkweave_resolve::get_document(&*self.index, doc_id)
    }

    pub fn list_documents(&self) -> Result<DocumentList> {
        linkweave_resolve::list_documents(&*self.index)
    }

    pub fn graph_neighbors(&self, doc_id: &str, depth: usize) -> Result<NeighborsResponse> {
        graph_neighbors(&self.graph, doc_id, depth)
    }

    pub async fn relationships(&self, doc_id: &str) -> Result<Relationships> {
        self.relations.relationships(doc_id).await
    }

    /// Aggregate counts, served from the stats cache while fresh.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.get_or_compute(|| {
            let graph = self.graph.stats();
            let (total_documents, status) = match self.index.count() {
                Ok(count) => (count, ServiceStatus::Operational),
                Err(e) => {
                    warn!("Vector index count unavailable: {}", e);
                    (graph.document_nodes, ServiceStatus::Degraded)
                }
            };
            StatsSnapshot {
                total_documents,
                total_nodes: graph.total_nodes,
                total_edges: graph.total_edges,
                document_node_count: graph.document_nodes,
                entity_node_count: graph.entity_nodes,
                status,
                generated_at: Utc::now(),
            }
        })
    }
}
