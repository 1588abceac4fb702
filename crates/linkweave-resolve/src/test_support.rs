//! Shared fixture: real embedder, SQLite index and graph in a temp dir.

use std::sync::Arc;

use linkweave_infer::HashingEmbedder;
use linkweave_ingest::{DocumentInput, Ingester, KeywordExtractor};
use linkweave_store::{GraphStore, SqliteVectorIndex, VectorIndex};
use tempfile::TempDir;

pub const DIM: usize = 384;

pub struct Fixture {
    pub embedder: HashingEmbedder,
    pub index: Arc<SqliteVectorIndex>,
    pub graph: Arc<GraphStore>,
    _dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        Self {
            embedder: HashingEmbedder::new(DIM),
            index: Arc::new(SqliteVectorIndex::open(dir.path().join("vectordb"), DIM).unwrap()),
            graph: Arc::new(GraphStore::new(dir.path().join("graph.json"))),
            _dir: dir,
        }
    }

    /// The three-document corpus used across the query tests.
    pub fn scenario() -> Self {
        let f = Self::new();
        f.ingest("d1", "machine learning uses python");
        f.ingest("d2", "python for data science");
        f.ingest("d3", "cooking recipes");
        f
    }

    pub fn ingest(&self, doc_id: &str, text: &str) {
        let extractor = KeywordExtractor::default();
        let ingester = Ingester::new(&self.embedder, &*self.index, &extractor, &self.graph);
        ingester.ingest(DocumentInput::new(doc_id, text)).unwrap();
    }

    pub fn index_dyn(&self) -> Arc<dyn VectorIndex> {
        self.index.clone()
    }
}
