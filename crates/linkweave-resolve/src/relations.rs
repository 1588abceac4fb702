//! Document relationships: which entities a document carries and which other
//! documents share them.
//!
//! Two [`RelationStrategy`] implementations answer with the same shape:
//! [`GraphRelations`] reads the graph directly, [`LlmRelations`] asks a
//! [`RelationAnalyzer`] to resolve entities across candidate documents and
//! falls back to the graph answer whenever that fails.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use crate::search::similar_documents;
use linkweave_core::{Error, Result};
use linkweave_reason::{
    analyzer::truncate_chars, AnalysisDocument, AnalyzedEntity, AnalyzedRelation,
    RelationAnalysis, RelationAnalyzer,
};
use linkweave_store::{GraphStore, VectorIndex};

const MAX_FOCUS_CHARS: usize = 3000;
const MAX_RELATED_DOCS: usize = 8;
const MAX_RELATED_CHARS: usize = 1500;
const SIMILAR_CANDIDATES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Graph,
    Llm,
}

#[derive(Debug, Clone, Serialize)]
pub struct Relationships {
    pub doc_id: String,
    pub strategy: StrategyKind,
    pub entities: Vec<String>,
    pub entities_count: usize,
    pub related_via_entities: BTreeMap<String, Vec<String>>,
    pub related_documents: Vec<String>,
    pub related_documents_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_entities: Option<Vec<AnalyzedEntity>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_relations: Option<Vec<AnalyzedRelation>>,
}

impl Relationships {
    fn new(
        doc_id: &str,
        strategy: StrategyKind,
        entities: Vec<String>,
        related_via_entities: BTreeMap<String, Vec<String>>,
        related_documents: BTreeSet<String>,
    ) -> Self {
        Self {
            doc_id: doc_id.to_string(),
            strategy,
            entities_count: entities.len(),
            entities,
            related_via_entities,
            related_documents_count: related_documents.len(),
            related_documents: related_documents.into_iter().collect(),
            ai_entities: None,
            ai_relations: None,
        }
    }
}

#[async_trait]
pub trait RelationStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    async fn relationships(&self, doc_id: &str) -> Result<Relationships>;
}

fn require_doc_id(doc_id: &str) -> Result<()> {
    if doc_id.trim().is_empty() {
        return Err(Error::InvalidArgument("doc_id must not be empty".into()));
    }
    Ok(())
}

/// Run synchronous graph and index work on the blocking pool.
async fn off_runtime<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| Error::Internal(format!("relationship task failed: {}", e)))?
}

/// Exact entity matches through the graph.
pub struct GraphRelations {
    graph: Arc<GraphStore>,
}

impl GraphRelations {
    pub fn new(graph: Arc<GraphStore>) -> Self {
        Self { graph }
    }
}

fn graph_relationships(graph: &GraphStore, doc_id: &str) -> Result<Relationships> {
    require_doc_id(doc_id)?;
    let reader = graph.read();
    if !reader.contains_document(doc_id) {
        return Err(Error::NotFound(format!("document {} not in graph", doc_id)));
    }

    let entities = reader.document_entities(doc_id);
    let mut via = BTreeMap::new();
    let mut related = BTreeSet::new();
    for entity in &entities {
        let docs: Vec<String> = reader
            .entity_documents(entity)
            .into_iter()
            .filter(|d| d != doc_id)
            .collect();
        related.extend(docs.iter().cloned());
        via.insert(entity.clone(), docs);
    }
    Ok(Relationships::new(doc_id, StrategyKind::Graph, entities, via, related))
}

#[async_trait]
impl RelationStrategy for GraphRelations {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Graph
    }

    async fn relationships(&self, doc_id: &str) -> Result<Relationships> {
        let graph = self.graph.clone();
        let doc_id = doc_id.to_string();
        off_runtime(move || graph_relationships(&graph, &doc_id)).await
    }
}

/// Cross-document entity resolution by an external analyzer.
pub struct LlmRelations {
    graph: Arc<GraphStore>,
    index: Arc<dyn VectorIndex>,
    analyzer: Arc<dyn RelationAnalyzer>,
    fallback: GraphRelations,
}

impl LlmRelations {
    pub fn new(
        graph: Arc<GraphStore>,
        index: Arc<dyn VectorIndex>,
        analyzer: Arc<dyn RelationAnalyzer>,
    ) -> Self {
        Self {
            fallback: GraphRelations::new(graph.clone()),
            graph,
            index,
            analyzer,
        }
    }

    async fn analyze(&self, doc_id: &str) -> Result<Relationships> {
        require_doc_id(doc_id)?;
        let graph = self.graph.clone();
        let index = self.index.clone();
        let id = doc_id.to_string();
        let gathered = off_runtime(move || gather(&graph, &*index, &id)).await?;

        let Some((focus, related)) = gathered else {
            return Ok(adapt(doc_id, RelationAnalysis::default()));
        };
        let analysis = self.analyzer.analyze(&focus, &related).await?;
        Ok(adapt(doc_id, analysis))
    }
}

/// Graph-related documents first, then semantic neighbours, without
/// duplicates or the document itself.
fn candidates(graph: &GraphStore, index: &dyn VectorIndex, doc_id: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut ordered = Vec::new();
    {
        let reader = graph.read();
        for entity in reader.document_entities(doc_id) {
            for other in reader.entity_documents(&entity) {
                if other != doc_id && seen.insert(other.clone()) {
                    ordered.push(other);
                }
            }
        }
    }
    match similar_documents(index, doc_id, SIMILAR_CANDIDATES) {
        Ok(similar) => {
            for m in similar {
                if m.id != doc_id && seen.insert(m.id.clone()) {
                    ordered.push(m.id);
                }
            }
        }
        Err(e) => debug!("No semantic candidates for {}: {}", doc_id, e),
    }
    ordered
}

fn related_documents(graph: &GraphStore, index: &dyn VectorIndex, doc_id: &str) -> Vec<AnalysisDocument> {
    candidates(graph, index, doc_id)
        .into_iter()
        .take(MAX_RELATED_DOCS)
        .filter_map(|id| match index.get(&id) {
            Ok(doc) if !doc.text.trim().is_empty() => Some(AnalysisDocument {
                doc_id: id,
                text: truncate_chars(&doc.text, MAX_RELATED_CHARS),
            }),
            _ => None,
        })
        .collect()
}

/// The focus document and its related documents, or `None` when nothing is
/// related and the analyzer need not be asked.
fn gather(
    graph: &GraphStore,
    index: &dyn VectorIndex,
    doc_id: &str,
) -> Result<Option<(AnalysisDocument, Vec<AnalysisDocument>)>> {
    let focus = index.get(doc_id)?;
    if focus.text.trim().is_empty() {
        return Err(Error::NotFound(format!("document {} has no text", doc_id)));
    }
    let related = related_documents(graph, index, doc_id);
    if related.is_empty() {
        return Ok(None);
    }
    let focus = AnalysisDocument {
        doc_id: doc_id.to_string(),
        text: truncate_chars(&focus.text, MAX_FOCUS_CHARS),
    };
    Ok(Some((focus, related)))
}

/// Map an analysis onto the relationships shape. Each entity is labelled by
/// its first non-empty mention text and relates the other documents that
/// mention it.
fn adapt(doc_id: &str, analysis: RelationAnalysis) -> Relationships {
    let mut entities: Vec<String> = Vec::new();
    let mut via: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for entity in &analysis.entities {
        let Some(label) = entity.label() else {
            continue;
        };
        if !entities.contains(&label) {
            entities.push(label.clone());
        }
        let docs: BTreeSet<String> = entity
            .mentions
            .iter()
            .map(|m| m.doc_id.trim())
            .filter(|d| !d.is_empty() && *d != doc_id)
            .map(str::to_string)
            .collect();
        if !docs.is_empty() {
            via.entry(label).or_default().extend(docs);
        }
    }

    let related: BTreeSet<String> = via.values().flatten().cloned().collect();
    let via = via
        .into_iter()
        .map(|(label, docs)| (label, docs.into_iter().collect()))
        .collect();
    let mut result = Relationships::new(doc_id, StrategyKind::Llm, entities, via, related);
    result.ai_entities = Some(analysis.entities);
    result.ai_relations = Some(analysis.relations);
    result
}

#[async_trait]
impl RelationStrategy for LlmRelations {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Llm
    }

    async fn relationships(&self, doc_id: &str) -> Result<Relationships> {
        match self.analyze(doc_id).await {
            Ok(result) => Ok(result),
            Err(e) => {
                warn!("LLM relationships for {} unavailable, using graph: {}", doc_id, e);
                self.fallback.relationships(doc_id).await
            }
        }
    }
}
