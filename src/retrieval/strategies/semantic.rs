use std::sync::Arc;

use crate::cancel::CancelToken;
use crate::processing::embeddings::{similarity_from_distance, Embedder};
use crate::retrieval::{resolve_query_embedding, HitDetail, SearchHit, SearchParams, Strategy, StrategyKind};
use crate::storage::GraphStore;
use crate::RecallResult;

/// Full-user-scope cosine search.
pub struct SemanticStrategy {
    store: Arc<dyn GraphStore>,
    embedder: Arc<dyn Embedder>,
    /// Minimum similarity (1 - distance/2).
    threshold: f64,
}

impl SemanticStrategy {
    pub fn new(store: Arc<dyn GraphStore>, embedder: Arc<dyn Embedder>, threshold: f64) -> Self {
        Self { store, embedder, threshold }
    }
}

impl Strategy for SemanticStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Semantic
    }

    fn search(&self, params: &SearchParams, cancel: &CancelToken) -> RecallResult<Vec<SearchHit>> {
        let Some(embedding) = resolve_query_embedding(
            &params.query,
            params.query_embedding.as_deref(),
            self.embedder.as_ref(),
            cancel,
        )?
        else {
            tracing::warn!(user = %params.user_id, "Semantic search skipped: no query embedding");
            return Ok(vec![]);
        };

        let ranked = self.store.memories_by_distance(
            &params.user_id,
            &embedding,
            params.memory_type,
            None,
            params.limit,
            cancel,
        )?;

        let hits: Vec<SearchHit> = ranked
            .into_iter()
            .filter_map(|(memory, distance)| {
                let similarity = similarity_from_distance(distance);
                (similarity >= self.threshold)
                    .then(|| SearchHit::new(memory, similarity, HitDetail::Semantic { distance }))
            })
            .collect();

        tracing::debug!(user = %params.user_id, hits = hits.len(), "Semantic search done");
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memories::MemoryStorage;
    use crate::test_helpers::{setup_store, FailingEmbedder, FixedEmbedder, MemoryBuilder};

    #[test]
    fn test_threshold_and_order() {
        let store = setup_store();
        {
            let conn = store.lock().unwrap();
            MemoryStorage::insert(&conn, &MemoryBuilder::new().id("exact").embedding(vec![1.0, 0.0]).build()).unwrap();
            MemoryStorage::insert(&conn, &MemoryBuilder::new().id("ortho").embedding(vec![0.0, 1.0]).build()).unwrap();
            MemoryStorage::insert(&conn, &MemoryBuilder::new().id("away").embedding(vec![-1.0, 0.1]).build()).unwrap();
        }
        let strategy = SemanticStrategy::new(store.clone(), Arc::new(FixedEmbedder::new(vec![1.0, 0.0])), 0.3);
        let hits = strategy
            .search(&SearchParams::new("u1", "anything", 10), &CancelToken::new())
            .unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.memory.id.as_str()).collect();
        assert_eq!(ids, vec!["exact", "ortho"]);
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        assert!((hits[1].score - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_embedding_failure_yields_empty() {
        let store = setup_store();
        {
            let conn = store.lock().unwrap();
            MemoryStorage::insert(&conn, &MemoryBuilder::new().id("m").embedding(vec![1.0, 0.0]).build()).unwrap();
        }
        let strategy = SemanticStrategy::new(store.clone(), Arc::new(FailingEmbedder::new(2)), 0.3);
        let hits = strategy
            .search(&SearchParams::new("u1", "anything", 10), &CancelToken::new())
            .unwrap();
        assert!(hits.is_empty());
    }
}
