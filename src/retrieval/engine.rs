//! RecallEngine — the hierarchical, graph-guided and fused top-level
//! searches built from the pipeline stages.
//!
//! ```text
//! hierarchical  = NodeLocator -> MemoryLocator -> CandidateRanker
//! graph_guided  = NodeLocator -> GraphExpander -> MemoryLocator -> composite
//! hybrid        = RRF(hierarchical, graph_guided)
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use crate::cancel::CancelToken;
use crate::config::RecallConfig;
use crate::constants::{DEFAULT_LIMIT, FUSION_CANDIDATE_FACTOR};
use crate::memory::{MemoryType, MetadataFilters};
use crate::node::{KnowledgeNode, NodeType};
use crate::processing::classifier::QueryClassifier;
use crate::processing::embeddings::{cosine_distance, similarity_from_distance, Embedder};
use crate::retrieval::candidate_ranker::CandidateRanker;
use crate::retrieval::fusion::reciprocal_rank_fusion;
use crate::retrieval::graph_expander::GraphExpander;
use crate::retrieval::memory_locator::MemoryLocator;
use crate::retrieval::node_locator::{NodeLocator, NodeQuery, ScoredNode};
use crate::retrieval::router::QueryRouter;
use crate::retrieval::strategies::StrategySet;
use crate::retrieval::{resolve_query_embedding, sort_hits, HitDetail, SearchHit};
use crate::storage::GraphStore;
use crate::RecallResult;

/// One top-level search request.
#[derive(Debug, Clone, Serialize)]
pub struct EngineQuery {
    pub user_id: String,
    pub query: String,
    #[serde(skip)]
    pub query_embedding: Option<Vec<f32>>,
    pub memory_type: Option<MemoryType>,
    pub node_types: Option<Vec<NodeType>>,
    pub limit: usize,
    /// Equality-only metadata filters applied to the final list.
    pub filters: MetadataFilters,
}

impl EngineQuery {
    pub fn new(user_id: &str, query: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            query: query.to_string(),
            query_embedding: None,
            memory_type: None,
            node_types: None,
            limit: DEFAULT_LIMIT,
            filters: MetadataFilters::new(),
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

pub struct RecallEngine {
    store: Arc<dyn GraphStore>,
    embedder: Arc<dyn Embedder>,
    config: RecallConfig,
    node_locator: NodeLocator,
    expander: GraphExpander,
    memory_locator: MemoryLocator,
    ranker: CandidateRanker,
}

impl RecallEngine {
    pub fn new(store: Arc<dyn GraphStore>, embedder: Arc<dyn Embedder>, config: RecallConfig) -> Self {
        Self {
            node_locator: NodeLocator::new(store.clone()),
            expander: GraphExpander::new(store.clone()),
            memory_locator: MemoryLocator::new(store.clone()),
            ranker: CandidateRanker::new(store.clone()),
            store,
            embedder,
            config,
        }
    }

    pub fn config(&self) -> &RecallConfig {
        &self.config
    }

    /// Strategy router over the same store and embedder.
    pub fn router(&self, classifier: Option<Arc<dyn QueryClassifier>>) -> QueryRouter {
        let set = StrategySet::new(self.store.clone(), self.embedder.clone(), &self.config);
        QueryRouter::new(set, classifier, self.config.fusion.tolerate_partial_failure)
    }

    /// Node Locator with the configured `top_k` and threshold.
    pub fn locate_nodes(
        &self,
        q: &EngineQuery,
        query_embedding: Option<&[f32]>,
        cancel: &CancelToken,
    ) -> RecallResult<Vec<ScoredNode>> {
        self.node_locator.find_relevant_nodes(
            &NodeQuery {
                user_id: &q.user_id,
                query_text: &q.query,
                query_embedding,
                node_types: q.node_types.as_deref(),
                top_k: self.config.nodes.top_k,
                similarity_threshold: self.config.nodes.similarity_threshold,
            },
            cancel,
        )
    }

    /// Vector ranking restricted to memories attached to the query's nodes.
    ///
    /// Empty when no node matches: there is no fallback to a full scan.
    pub fn hierarchical_search(&self, q: &EngineQuery, cancel: &CancelToken) -> RecallResult<Vec<SearchHit>> {
        if q.limit == 0 {
            return Ok(vec![]);
        }
        let Some(embedding) = self.query_embedding(q, cancel)? else {
            tracing::warn!(user = %q.user_id, "Hierarchical search skipped: no query embedding");
            return Ok(vec![]);
        };

        let nodes = self.locate_nodes(q, Some(&embedding), cancel)?;
        if nodes.is_empty() {
            tracing::info!(user = %q.user_id, "Hierarchical search: no relevant nodes");
            return Ok(vec![]);
        }
        let node_ids: Vec<String> = nodes.iter().map(|s| s.node.id.clone()).collect();

        let candidates =
            self.memory_locator
                .memories_for_nodes(&q.user_id, &node_ids, q.memory_type, None, cancel)?;
        let ranked = self.ranker.rank_within_candidates(
            &q.user_id,
            &embedding,
            &candidates,
            candidates.len(),
            cancel,
        )?;

        let mut hits: Vec<SearchHit> = ranked
            .into_iter()
            .filter(|(m, _)| m.metadata.matches(&q.filters))
            .map(|(memory, distance)| {
                SearchHit::new(
                    memory,
                    similarity_from_distance(distance),
                    HitDetail::Hierarchical { distance },
                )
            })
            .collect();
        sort_hits(&mut hits);
        hits.truncate(q.limit);

        tracing::info!(
            user = %q.user_id,
            nodes = node_ids.len(),
            candidates = candidates.len(),
            hits = hits.len(),
            "Hierarchical search done"
        );
        Ok(hits)
    }

    /// Locate seed nodes for the query, then run the graph-guided pipeline.
    ///
    /// Without a usable embedding the seeds come from name matching and
    /// the vector term of the composite is zero.
    pub fn graph_guided_search(&self, q: &EngineQuery, cancel: &CancelToken) -> RecallResult<Vec<SearchHit>> {
        if q.limit == 0 {
            return Ok(vec![]);
        }
        let embedding = self.query_embedding(q, cancel)?;
        let seeds: Vec<KnowledgeNode> = self
            .locate_nodes(q, embedding.as_deref(), cancel)?
            .into_iter()
            .map(|s| s.node)
            .collect();
        if seeds.is_empty() {
            tracing::info!(user = %q.user_id, "Graph-guided search: no seed nodes");
            return Ok(vec![]);
        }
        self.graph_guided_from_seeds(q, &seeds, embedding.as_deref(), cancel)
    }

    /// Expand `seeds`, collect associated memories, and score each as
    /// `vector_weight × similarity + graph_weight × contribution`, where
    /// contribution is the best `node score × association relevance`.
    pub fn graph_guided_from_seeds(
        &self,
        q: &EngineQuery,
        seeds: &[KnowledgeNode],
        query_embedding: Option<&[f32]>,
        cancel: &CancelToken,
    ) -> RecallResult<Vec<SearchHit>> {
        let graph_cfg = &self.config.graph;
        let expansion = self.expander.expand(
            seeds,
            graph_cfg.depth,
            graph_cfg.edge_types.as_deref(),
            graph_cfg.decay_factor,
            cancel,
        )?;
        let mut node_ids: Vec<String> = expansion.keys().cloned().collect();
        node_ids.sort();

        let rows = self
            .memory_locator
            .associated(&q.user_id, &node_ids, q.memory_type, cancel)?;

        // memory id -> (row index, contribution, node id)
        let mut best: HashMap<String, (usize, f64, String)> = HashMap::new();
        for (idx, row) in rows.iter().enumerate() {
            let Some(expanded) = expansion.get(&row.node_id) else {
                continue;
            };
            let contribution = expanded.score * row.relevance_score;
            let replace = best
                .get(&row.memory.id)
                .map_or(true, |(_, seen, _)| contribution > *seen);
            if replace {
                best.insert(row.memory.id.clone(), (idx, contribution, row.node_id.clone()));
            }
        }

        let scoring = &self.config.scoring;
        let mut hits: Vec<SearchHit> = best
            .into_values()
            .filter_map(|(idx, contribution, node_id)| {
                let memory = &rows[idx].memory;
                if !memory.metadata.matches(&q.filters) {
                    return None;
                }
                let vector_similarity = match (query_embedding, memory.embedding.as_deref()) {
                    (Some(query), Some(stored)) if query.len() == stored.len() => {
                        similarity_from_distance(cosine_distance(query, stored))
                    }
                    _ => 0.0,
                };
                let score = scoring.vector_weight * vector_similarity + scoring.graph_weight * contribution;
                tracing::trace!(
                    memory_id = %memory.id,
                    vector_similarity,
                    contribution,
                    score,
                    "Graph-guided candidate scored"
                );
                Some(SearchHit::new(
                    memory.clone(),
                    score,
                    HitDetail::GraphGuided {
                        vector_similarity,
                        graph_contribution: contribution,
                        node_id,
                    },
                ))
            })
            .collect();
        sort_hits(&mut hits);
        hits.truncate(q.limit);

        tracing::info!(
            user = %q.user_id,
            seeds = seeds.len(),
            expanded = expansion.len(),
            hits = hits.len(),
            "Graph-guided search done"
        );
        Ok(hits)
    }

    /// Reciprocal-rank fusion of the hierarchical and graph-guided lists.
    /// Both branches run concurrently, each capped at twice the limit.
    pub fn hybrid_search(&self, q: &EngineQuery, cancel: &CancelToken) -> RecallResult<Vec<SearchHit>> {
        if q.limit == 0 {
            return Ok(vec![]);
        }
        cancel.check()?;

        // Filters apply to the fused union, not to each branch
        let mut branch = q.clone();
        branch.limit = q.limit.saturating_mul(FUSION_CANDIDATE_FACTOR);
        branch.filters = MetadataFilters::new();
        if branch.query_embedding.is_none() {
            branch.query_embedding = self.query_embedding(q, cancel)?;
        }

        let (hierarchical, graph_guided) = rayon::join(
            || self.hierarchical_search(&branch, cancel),
            || self.graph_guided_search(&branch, cancel),
        );
        let hierarchical = self.branch_result("hierarchical", hierarchical)?;
        let graph_guided = self.branch_result("graph_guided", graph_guided)?;

        let mut fused: Vec<SearchHit> = reciprocal_rank_fusion(hierarchical, graph_guided)
            .into_iter()
            .filter(|h| h.memory.metadata.matches(&q.filters))
            .collect();
        fused.truncate(q.limit);

        tracing::info!(user = %q.user_id, hits = fused.len(), "Hybrid search done");
        Ok(fused)
    }

    fn branch_result(
        &self,
        branch: &str,
        result: RecallResult<Vec<SearchHit>>,
    ) -> RecallResult<Vec<SearchHit>> {
        match result {
            Ok(hits) => Ok(hits),
            Err(e) if e.is_cancellation() || !self.config.fusion.tolerate_partial_failure => Err(e),
            Err(e) => {
                tracing::warn!(branch = %branch, error = %e, "Fusion branch failed, continuing without it");
                Ok(vec![])
            }
        }
    }

    fn query_embedding(&self, q: &EngineQuery, cancel: &CancelToken) -> RecallResult<Option<Vec<f32>>> {
        resolve_query_embedding(
            &q.query,
            q.query_embedding.as_deref(),
            self.embedder.as_ref(),
            cancel,
        )
    }
}
