//! Semantic search, similar documents, and document lookup over the vector index.

use serde::Serialize;
use tracing::debug;

use linkweave_core::{Error, Result};
use linkweave_infer::EmbedderBackend;
use linkweave_store::{Metadata, VectorIndex, VectorMatch};

pub const DEFAULT_SEARCH_TOP_K: usize = 5;
pub const MAX_SEARCH_TOP_K: usize = 50;

/// One semantic search hit.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub doc_id: String,
    pub document: String,
    pub metadata: Metadata,
    pub distance: f64,
    /// `1 - distance`.
    pub relevance_score: f64,
}

impl From<VectorMatch> for SearchHit {
    fn from(m: VectorMatch) -> Self {
        let relevance_score = m.similarity();
        Self {
            doc_id: m.id,
            document: m.text,
            metadata: m.metadata,
            distance: m.distance,
            relevance_score,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub results_count: usize,
    pub results: Vec<SearchHit>,
}

/// A stored document as exposed to callers.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentView {
    pub doc_id: String,
    pub document: String,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentList {
    pub count: usize,
    pub documents: Vec<String>,
}

pub(crate) fn require_query(query: &str) -> Result<()> {
    if query.trim().is_empty() {
        return Err(Error::InvalidArgument("query must not be empty".into()));
    }
    Ok(())
}

/// Embed `query` and return its nearest documents, best first.
pub(crate) fn vector_matches(
    embedder: &dyn EmbedderBackend,
    index: &dyn VectorIndex,
    query: &str,
    top_k: usize,
) -> Result<Vec<VectorMatch>> {
    require_query(query)?;
    let embedding = embedder.embed(query)?.embedding;
    index.query(&embedding, top_k)
}

pub fn semantic_search(
    embedder: &dyn EmbedderBackend,
    index: &dyn VectorIndex,
    query: &str,
    top_k: usize,
) -> Result<SearchResponse> {
    let top_k = top_k.clamp(1, MAX_SEARCH_TOP_K);
    let results: Vec<SearchHit> = vector_matches(embedder, index, query, top_k)?
        .into_iter()
        .map(SearchHit::from)
        .collect();
    debug!("Semantic search {:?}: {} results", query, results.len());
    Ok(SearchResponse {
        query: query.to_string(),
        results_count: results.len(),
        results,
    })
}

/// Neighbours of a stored document by its own embedding, excluding itself.
pub fn similar_documents(
    index: &dyn VectorIndex,
    doc_id: &str,
    top_k: usize,
) -> Result<Vec<VectorMatch>> {
    let doc = index.get(doc_id)?;
    let mut hits = index.query(&doc.embedding, top_k.saturating_add(1))?;
    hits.retain(|h| h.id != doc_id);
    hits.truncate(top_k);
    Ok(hits)
}

pub fn get_document(index: &dyn VectorIndex, doc_id: &str) -> Result<DocumentView> {
    if doc_id.trim().is_empty() {
        return Err(Error::InvalidArgument("doc_id must not be empty".into()));
    }
    let doc = index.get(doc_id)?;
    Ok(DocumentView {
        doc_id: doc.id,
        document: doc.text,
        metadata: doc.metadata,
    })
}

pub fn list_documents(index: &dyn VectorIndex) -> Result<DocumentList> {
    let documents = index.list_ids()?;
    Ok(DocumentList {
        count: documents.len(),
        documents,
    })
}
