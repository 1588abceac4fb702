//! Hybrid fusion: vector hits expanded through shared entities, with both
//! signals min-max normalized and blended by [`FusionWeights`].

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info};

use crate::search::vector_matches;
use crate::types::*;
use linkweave_core::{Error, FusionWeights, Result};
use linkweave_infer::EmbedderBackend;
use linkweave_store::{GraphStore, Metadata, VectorIndex};

pub const DEFAULT_HYBRID_TOP_K: usize = 5;
pub const MAX_HYBRID_TOP_K: usize = 20;
pub const MAX_HYBRID_DEPTH: usize = 3;
pub const MAX_ENTITY_SUMMARIES: usize = 20;

/// Scale each value to `(v - min) / (max - min)`. A map whose values all tie
/// (including the all-zero case) normalizes to 0 everywhere.
pub fn min_max_normalize(values: &BTreeMap<String, f64>) -> BTreeMap<String, f64> {
    let min = values.values().copied().fold(f64::INFINITY, f64::min);
    let max = values.values().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    values
        .iter()
        .map(|(id, &v)| {
            let norm = if range > 0.0 { (v - min) / range } else { 0.0 };
            (id.clone(), norm)
        })
        .collect()
}

/// Graph side of a hybrid query, accumulated into ordered maps so the result
/// never depends on traversal order.
#[derive(Debug, Default)]
struct Expansion {
    /// Candidate document -> number of (document, entity, candidate) paths.
    path_counts: BTreeMap<String, usize>,
    /// Seed -> documents it reaches at the first level.
    seed_reach: BTreeMap<String, BTreeSet<String>>,
    entity_documents: BTreeMap<String, BTreeSet<String>>,
}

impl Expansion {
    /// Level 1 expands every seed. Each further level expands only documents
    /// first discovered at the previous level and counts paths to documents
    /// not yet visited.
    fn run(graph: &GraphStore, seeds: &[String], depth: usize) -> Self {
        let reader = graph.read();
        let mut expansion = Self::default();
        let mut visited: BTreeSet<String> = seeds.iter().cloned().collect();
        let mut frontier: Vec<String> = seeds.to_vec();

        for level in 0..depth {
            if frontier.is_empty() {
                break;
            }
            let mut discovered = BTreeSet::new();
            for doc in &frontier {
                for entity in reader.document_entities(doc) {
                    let linked = reader.entity_documents(&entity);
                    for other in &linked {
                        if other == doc || (level > 0 && visited.contains(other)) {
                            continue;
                        }
                        *expansion.path_counts.entry(other.clone()).or_default() += 1;
                        let docs = expansion.entity_documents.entry(entity.clone()).or_default();
                        docs.insert(doc.clone());
                        docs.insert(other.clone());
                        if level == 0 {
                            expansion
                                .seed_reach
                                .entry(doc.clone())
                                .or_default()
                                .insert(other.clone());
                        }
                        if !visited.contains(other) {
                            discovered.insert(other.clone());
                        }
                    }
                }
            }
            visited.extend(discovered.iter().cloned());
            frontier = discovered.into_iter().collect();
        }
        expansion
    }

    /// Forget documents that did not make it into the candidate set. An entity
    /// stays only while it still links at least two candidates.
    fn retain_candidates<V>(&mut self, candidates: &BTreeMap<String, V>) {
        for reached in self.seed_reach.values_mut() {
            reached.retain(|id| candidates.contains_key(id));
        }
        for docs in self.entity_documents.values_mut() {
            docs.retain(|id| candidates.contains_key(id));
        }
        self.entity_documents.retain(|_, docs| docs.len() >= 2);
    }

    fn entity_summaries(&self) -> Vec<EntitySummary> {
        let mut summaries: Vec<EntitySummary> = self
            .entity_documents
            .iter()
            .map(|(entity, docs)| EntitySummary {
                entity: entity.clone(),
                related_document_count: docs.len(),
                related_documents: docs.iter().cloned().collect(),
            })
            .collect();
        summaries.sort_by(|a, b| {
            b.related_document_count
                .cmp(&a.related_document_count)
                .then_with(|| a.entity.cmp(&b.entity))
        });
        summaries.truncate(MAX_ENTITY_SUMMARIES);
        summaries
    }
}

/// Text and metadata of a candidate, plus its raw vector similarity.
struct Candidate {
    document: String,
    metadata: Metadata,
    vector_score: f64,
    source: ResultSource,
}

/// Runs hybrid queries against borrowed collaborators.
pub struct HybridSearcher<'a> {
    embedder: &'a dyn EmbedderBackend,
    index: &'a dyn VectorIndex,
    graph: &'a GraphStore,
    weights: FusionWeights,
}

impl<'a> HybridSearcher<'a> {
    pub fn new(
        embedder: &'a dyn EmbedderBackend,
        index: &'a dyn VectorIndex,
        graph: &'a GraphStore,
        weights: FusionWeights,
    ) -> Self {
        Self {
            embedder,
            index,
            graph,
            weights,
        }
    }

    /// `top_k` is clamped to `1..=20` and `depth` to at most 3; `depth == 0`
    /// is rejected. A vector index failure fails the whole query.
    pub fn search(&self, query: &str, top_k: usize, depth: usize) -> Result<HybridResponse> {
        if depth == 0 {
            return Err(Error::InvalidArgument("depth must be at least 1".into()));
        }
        let top_k = top_k.clamp(1, MAX_HYBRID_TOP_K);
        let depth = depth.min(MAX_HYBRID_DEPTH);

        let hits = vector_matches(self.embedder, self.index, query, top_k)?;
        let seeds: Vec<String> = hits.iter().map(|h| h.id.clone()).collect();
        let mut expansion = Expansion::run(self.graph, &seeds, depth);

        let mut candidates: BTreeMap<String, Candidate> = BTreeMap::new();
        for hit in &hits {
            candidates.insert(
                hit.id.clone(),
                Candidate {
                    document: hit.text.clone(),
                    metadata: hit.metadata.clone(),
                    vector_score: hit.similarity(),
                    source: ResultSource::VectorSearch,
                },
            );
        }
        for doc_id in expansion.path_counts.keys() {
            if candidates.contains_key(doc_id) {
                continue;
            }
            match self.index.get(doc_id) {
                Ok(doc) => {
                    candidates.insert(
                        doc_id.clone(),
                        Candidate {
                            document: doc.text,
                            metadata: doc.metadata,
                            vector_score: 0.0,
                            source: ResultSource::GraphExpansion,
                        },
                    );
                }
                // Graph knows it but the vector record is gone.
                Err(Error::NotFound(_)) => debug!("Skipping graph candidate {} without a vector record", doc_id),
                Err(e) => return Err(e),
            }
        }

        expansion.retain_candidates(&candidates);

        let graph_score = |id: &str| expansion.path_counts.get(id).copied().unwrap_or(0) as f64;
        let vector_raw: BTreeMap<String, f64> = candidates
            .iter()
            .map(|(id, c)| (id.clone(), c.vector_score))
            .collect();
        let graph_raw: BTreeMap<String, f64> = candidates
            .keys()
            .map(|id| (id.clone(), graph_score(id)))
            .collect();
        let vector_norm = min_max_normalize(&vector_raw);
        let graph_norm = min_max_normalize(&graph_raw);

        let mut hybrid_results: Vec<HybridResult> = candidates
            .iter()
            .map(|(id, c)| {
                let v_norm = vector_norm.get(id).copied().unwrap_or(0.0);
                let g_norm = graph_norm.get(id).copied().unwrap_or(0.0);
                HybridResult {
                    doc_id: id.clone(),
                    document: c.document.clone(),
                    metadata: c.metadata.clone(),
                    source: c.source,
                    relevance_score: self.weights.vector * v_norm + self.weights.graph * g_norm,
                    vector_score: c.vector_score,
                    vector_score_normalized: v_norm,
                    graph_score: graph_score(id),
                    graph_score_normalized: g_norm,
                }
            })
            .collect();
        hybrid_results.sort_by(rank_order);

        let vector_hits: Vec<VectorHit> = hits
            .into_iter()
            .map(|hit| {
                let relevance_score = hit.similarity();
                VectorHit {
                    graph_neighbor_count: expansion.seed_reach.get(&hit.id).map_or(0, BTreeSet::len),
                    graph_score: graph_score(&hit.id),
                    graph_score_normalized: graph_norm.get(&hit.id).copied().unwrap_or(0.0),
                    doc_id: hit.id,
                    document: hit.text,
                    metadata: hit.metadata,
                    distance: hit.distance,
                    relevance_score,
                }
            })
            .collect();

        let graph_expansion: Vec<GraphExpansionHit> = candidates
            .into_iter()
            .filter(|(_, c)| c.source == ResultSource::GraphExpansion)
            .map(|(id, c)| GraphExpansionHit {
                graph_score: graph_score(&id),
                doc_id: id,
                document: c.document,
                metadata: c.metadata,
            })
            .collect();

        let entities = expansion.entity_summaries();

        info!(
            "Hybrid search {:?}: {} vector hits, {} graph-only, {} fused",
            query,
            vector_hits.len(),
            graph_expansion.len(),
            hybrid_results.len()
        );

        Ok(HybridResponse {
            query: query.to_string(),
            vector_hits_count: vector_hits.len(),
            vector_hits,
            graph_expansion_count: graph_expansion.len(),
            graph_expansion,
            entities_count: entities.len(),
            entities,
            hybrid_results_count: hybrid_results.len(),
            hybrid_results,
        })
    }
}

/// Hybrid score desc, then raw vector similarity desc, then id asc.
fn rank_order(a: &HybridResult, b: &HybridResult) -> Ordering {
    b.relevance_score
        .total_cmp(&a.relevance_score)
        .then_with(|| b.vector_score.total_cmp(&a.vector_score))
        .then_with(|| a.doc_id.cmp(&b.doc_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Fixture;
    use linkweave_store::{StoredDocument, VectorMatch, VectorRecord};
    use ndarray::Array1;

    fn ids(results: &[HybridResult]) -> Vec<&str> {
        results.iter().map(|r| r.doc_id.as_str()).collect()
    }

    fn searcher(f: &Fixture) -> HybridSearcher<'_> {
        HybridSearcher::new(&f.embedder, &*f.index, &f.graph, FusionWeights::default())
    }

    #[test]
    fn test_min_max_normalize() {
        let values: BTreeMap<String, f64> =
            [("a".to_string(), 2.0), ("b".to_string(), 4.0), ("c".to_string(), 3.0)].into();
        let norm = min_max_normalize(&values);
        assert_eq!(norm["a"], 0.0);
        assert_eq!(norm["b"], 1.0);
        assert_eq!(norm["c"], 0.5);
    }

    #[test]
    fn test_min_max_ties_normalize_to_zero() {
        let tied: BTreeMap<String, f64> = [("a".to_string(), 0.4), ("b".to_string(), 0.4)].into();
        assert!(min_max_normalize(&tied).values().all(|&v| v == 0.0));

        let zeros: BTreeMap<String, f64> = [("a".to_string(), 0.0), ("b".to_string(), 0.0)].into();
        assert!(min_max_normalize(&zeros).values().all(|&v| v == 0.0));

        assert!(min_max_normalize(&BTreeMap::new()).is_empty());
    }

    #[test]
    fn test_scenario_python_query() {
        let f = Fixture::scenario();
        let response = searcher(&f).search("python", 5, 1).unwrap();

        assert_eq!(response.vector_hits_count, 3);
        assert_eq!(response.vector_hits.last().map(|h| h.doc_id.as_str()), Some("d3"));
        assert!(response.graph_expansion.is_empty());
        assert_eq!(ids(&response.hybrid_results), vec!["d1", "d2", "d3"]);

        let top = &response.hybrid_results[0];
        assert_eq!(top.source, ResultSource::VectorSearch);
        assert_eq!(top.graph_score, 1.0);
        assert!((top.relevance_score - 1.0).abs() < 1e-9);
        assert_eq!(response.hybrid_results[2].relevance_score, 0.0);

        assert_eq!(
            response.entities,
            vec![EntitySummary {
                entity: "python".into(),
                related_document_count: 2,
                related_documents: vec!["d1".into(), "d2".into()],
            }]
        );
        let d1 = response.vector_hits.iter().find(|h| h.doc_id == "d1").unwrap();
        assert_eq!(d1.graph_neighbor_count, 1);
    }

    #[test]
    fn test_graph_only_discovery() {
        let f = Fixture::scenario();
        let response = searcher(&f).search("machine learning", 1, 1).unwrap();

        assert_eq!(response.vector_hits_count, 1);
        assert_eq!(response.vector_hits[0].doc_id, "d1");
        assert_eq!(response.graph_expansion_count, 1);
        assert_eq!(response.graph_expansion[0].doc_id, "d2");
        assert_eq!(response.graph_expansion[0].document, "python for data science");

        assert_eq!(ids(&response.hybrid_results), vec!["d1", "d2"]);
        let d2 = &response.hybrid_results[1];
        assert_eq!(d2.source, ResultSource::GraphExpansion);
        assert_eq!(d2.vector_score, 0.0);
        assert!((d2.relevance_score - 0.3).abs() < 1e-9);
        assert!((response.hybrid_results[0].relevance_score - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_deeper_expansion_follows_new_documents() {
        let f = Fixture::scenario();
        f.ingest("d4", "data pipelines");

        let shallow = searcher(&f).search("machine learning", 1, 1).unwrap();
        assert_eq!(shallow.graph_expansion.len(), 1);

        let deep = searcher(&f).search("machine learning", 1, 2).unwrap();
        let found: Vec<&str> = deep.graph_expansion.iter().map(|h| h.doc_id.as_str()).collect();
        assert_eq!(found, vec!["d2", "d4"]);
        // d1 is already visited, so d2 -> python -> d1 is not counted again.
        assert_eq!(deep.hybrid_results[0].doc_id, "d1");
        assert_eq!(deep.hybrid_results[0].graph_score, 0.0);
    }

    #[test]
    fn test_fusion_is_deterministic() {
        let f = Fixture::scenario();
        f.ingest("d4", "python data pipelines");
        let s = searcher(&f);
        let first = s.search("python data", 5, 2).unwrap();
        let second = s.search("python data", 5, 2).unwrap();
        assert_eq!(ids(&first.hybrid_results), ids(&second.hybrid_results));
        for (a, b) in first.hybrid_results.iter().zip(&second.hybrid_results) {
            assert_eq!(a.relevance_score, b.relevance_score);
        }
    }

    #[test]
    fn test_limits() {
        let f = Fixture::scenario();
        let s = searcher(&f);
        assert!(matches!(s.search("python", 5, 0), Err(Error::InvalidArgument(_))));
        assert!(matches!(s.search("  ", 5, 1), Err(Error::InvalidArgument(_))));
        assert_eq!(s.search("python", 0, 1).unwrap().vector_hits_count, 1);
        assert!(s.search("python", 5, 99).is_ok());
    }

    #[test]
    fn test_isolated_seed_contributes_nothing() {
        let f = Fixture::new();
        f.ingest("solo", "quantum chromodynamics");
        let response = searcher(&f).search("quantum", 5, 2).unwrap();
        assert_eq!(ids(&response.hybrid_results), vec!["solo"]);
        assert!(response.entities.is_empty());
        assert_eq!(response.hybrid_results[0].graph_score_normalized, 0.0);
    }

    #[test]
    fn test_unindexed_graph_document_left_out_of_summaries() {
        let f = Fixture::scenario();
        f.index.delete("d2").unwrap();

        let response = searcher(&f).search("machine learning", 1, 1).unwrap();
        assert_eq!(ids(&response.hybrid_results), vec!["d1"]);
        assert!(response.graph_expansion.is_empty());
        assert!(response.entities.is_empty());
        assert_eq!(response.vector_hits[0].graph_neighbor_count, 0);
    }

    struct OfflineIndex;

    impl VectorIndex for OfflineIndex {
        fn upsert(&self, _record: VectorRecord) -> Result<()> {
            Err(Error::UpstreamUnavailable("offline".into()))
        }
        fn query(&self, _embedding: &Array1<f32>, _top_k: usize) -> Result<Vec<VectorMatch>> {
            Err(Error::UpstreamUnavailable("offline".into()))
        }
        fn get(&self, _id: &str) -> Result<StoredDocument> {
            Err(Error::UpstreamUnavailable("offline".into()))
        }
        fn delete(&self, _id: &str) -> Result<()> {
            Err(Error::UpstreamUnavailable("offline".into()))
        }
        fn count(&self) -> Result<usize> {
            Err(Error::UpstreamUnavailable("offline".into()))
        }
        fn list_ids(&self) -> Result<Vec<String>> {
            Err(Error::UpstreamUnavailable("offline".into()))
        }
    }

    #[test]
    fn test_vector_failure_fails_whole_query() {
        let f = Fixture::scenario();
        let s = HybridSearcher::new(&f.embedder, &OfflineIndex, &f.graph, FusionWeights::default());
        assert!(matches!(s.search("python", 5, 1), Err(Error::UpstreamUnavailable(_))));
    }
}
