//! Node Locator — finds knowledge nodes relevant to a query.
//!
//! Embedding mode scores by cosine similarity; text mode blends name
//! similarity with the node's importance. Every returned node has its
//! access counter bumped in the store.

use std::sync::Arc;

use serde::Serialize;

use crate::cancel::CancelToken;
use crate::constants::{NODE_IMPORTANCE_WEIGHT, NODE_TEXT_SIMILARITY_WEIGHT};
use crate::node::{KnowledgeNode, NodeType};
use crate::processing::embeddings::similarity_from_distance;
use crate::processing::text::text_similarity;
use crate::storage::GraphStore;
use crate::RecallResult;

#[derive(Debug, Clone, Serialize)]
pub struct ScoredNode {
    pub node: KnowledgeNode,
    pub score: f64,
}

#[derive(Debug, Clone)]
pub struct NodeQuery<'a> {
    pub user_id: &'a str,
    pub query_text: &'a str,
    pub query_embedding: Option<&'a [f32]>,
    pub node_types: Option<&'a [NodeType]>,
    pub top_k: usize,
    /// Embedding mode only.
    pub similarity_threshold: f64,
}

pub struct NodeLocator {
    store: Arc<dyn GraphStore>,
}

impl NodeLocator {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    pub fn find_relevant_nodes(
        &self,
        q: &NodeQuery<'_>,
        cancel: &CancelToken,
    ) -> RecallResult<Vec<ScoredNode>> {
        if q.top_k == 0 {
            return Ok(vec![]);
        }

        let mut found = match q.query_embedding {
            Some(embedding) => self.by_embedding(q, embedding, cancel)?,
            None => self.by_text(q, cancel)?,
        };

        for scored in found.iter_mut() {
            match self.store.record_node_access(&scored.node.id, cancel) {
                Ok(()) => scored.node.record_access(),
                Err(e) if e.is_cancellation() => return Err(e),
                Err(e) => {
                    tracing::warn!(node_id = %scored.node.id, error = %e, "Failed to record node access");
                }
            }
        }

        tracing::debug!(
            user = %q.user_id,
            mode = if q.query_embedding.is_some() { "embedding" } else { "text" },
            found = found.len(),
            "Relevant nodes located"
        );
        Ok(found)
    }

    fn by_embedding(
        &self,
        q: &NodeQuery<'_>,
        embedding: &[f32],
        cancel: &CancelToken,
    ) -> RecallResult<Vec<ScoredNode>> {
        let ranked = self
            .store
            .nodes_by_distance(q.user_id, embedding, q.node_types, cancel)?;
        Ok(ranked
            .into_iter()
            .map(|(node, distance)| ScoredNode {
                node,
                score: similarity_from_distance(distance),
            })
            .filter(|s| s.score >= q.similarity_threshold)
            .take(q.top_k)
            .collect())
    }

    fn by_text(&self, q: &NodeQuery<'_>, cancel: &CancelToken) -> RecallResult<Vec<ScoredNode>> {
        let pattern = q.query_text.trim();
        if pattern.is_empty() {
            return Ok(vec![]);
        }
        let nodes = self
            .store
            .nodes_by_name(q.user_id, pattern, q.node_types, cancel)?;
        let mut scored: Vec<ScoredNode> = nodes
            .into_iter()
            .map(|node| {
                let score = NODE_TEXT_SIMILARITY_WEIGHT * text_similarity(&node.name, pattern)
                    + NODE_IMPORTANCE_WEIGHT * node.importance_score;
                ScoredNode { node, score }
            })
            .collect();
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.node.id.cmp(&b.node.id))
        });
        scored.truncate(q.top_k);
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::nodes::NodeStorage;
    use crate::test_helpers::{setup_store, NodeBuilder};

    fn query<'a>(text: &'a str, emb: Option<&'a [f32]>) -> NodeQuery<'a> {
        NodeQuery {
            user_id: "u1",
            query_text: text,
            query_embedding: emb,
            node_types: None,
            top_k: 10,
            similarity_threshold: 0.5,
        }
    }

    #[test]
    fn test_embedding_mode_sorted_and_thresholded() {
        let store = setup_store();
        {
            let conn = store.lock().unwrap();
            NodeStorage::insert(&conn, &NodeBuilder::new().id("same").embedding(vec![1.0, 0.0]).build()).unwrap();
            NodeStorage::insert(&conn, &NodeBuilder::new().id("ortho").embedding(vec![0.0, 1.0]).build()).unwrap();
            NodeStorage::insert(&conn, &NodeBuilder::new().id("close").embedding(vec![0.8, 0.6]).build()).unwrap();
            NodeStorage::insert(&conn, &NodeBuilder::new().id("opposite").embedding(vec![-1.0, 0.0]).build()).unwrap();
        }
        let locator = NodeLocator::new(store.clone());
        let found = locator
            .find_relevant_nodes(&query("", Some(&[1.0, 0.0][..])), &CancelToken::new())
            .unwrap();
        let ids: Vec<&str> = found.iter().map(|s| s.node.id.as_str()).collect();
        // ortho: 1 - 1/2 = 0.5 is exactly on the threshold
        assert_eq!(ids, vec!["same", "close", "ortho"]);
        assert!(found.windows(2).all(|w| w[0].score >= w[1].score));
        assert!(found.iter().all(|s| s.score >= 0.5));
    }

    #[test]
    fn test_text_mode_blends_importance() {
        let store = setup_store();
        {
            let conn = store.lock().unwrap();
            NodeStorage::insert(&conn, &NodeBuilder::new().id("exact").name("Rust").importance(0.5).build()).unwrap();
            NodeStorage::insert(&conn, &NodeBuilder::new().id("long").name("Rust async runtimes").importance(1.0).build()).unwrap();
            NodeStorage::insert(&conn, &NodeBuilder::new().id("other").name("Python").build()).unwrap();
        }
        let locator = NodeLocator::new(store.clone());
        let found = locator
            .find_relevant_nodes(&query("rust", None), &CancelToken::new())
            .unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].node.id, "exact");
        assert!((found[0].score - (0.7 * 1.0 + 0.3 * 0.5)).abs() < 1e-9);
    }

    #[test]
    fn test_text_mode_matches_non_ascii_names() {
        let store = setup_store();
        {
            let conn = store.lock().unwrap();
            NodeStorage::insert(&conn, &NodeBuilder::new().id("uber").name("Über Rust").build()).unwrap();
            NodeStorage::insert(&conn, &NodeBuilder::new().id("other").name("Gardening").build()).unwrap();
        }
        let locator = NodeLocator::new(store.clone());
        let found = locator
            .find_relevant_nodes(&query("über", None), &CancelToken::new())
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].node.id, "uber");
        assert!(found[0].score > 0.0);
    }

    #[test]
    fn test_access_recorded_for_returned_nodes() {
        let store = setup_store();
        {
            let conn = store.lock().unwrap();
            NodeStorage::insert(&conn, &NodeBuilder::new().id("hit").name("Climbing").build()).unwrap();
            NodeStorage::insert(&conn, &NodeBuilder::new().id("miss").name("Cooking").build()).unwrap();
        }
        let locator = NodeLocator::new(store.clone());
        let found = locator
            .find_relevant_nodes(&query("climb", None), &CancelToken::new())
            .unwrap();
        assert_eq!(found[0].node.access_count, 1);
        assert!((found[0].node.importance_score - 0.51).abs() < 1e-9);

        let conn = store.lock().unwrap();
        assert_eq!(NodeStorage::get(&conn, "hit").unwrap().unwrap().access_count, 1);
        assert_eq!(NodeStorage::get(&conn, "miss").unwrap().unwrap().access_count, 0);
    }

    #[test]
    fn test_top_k_caps_results() {
        let store = setup_store();
        {
            let conn = store.lock().unwrap();
            for i in 0..5 {
                NodeStorage::insert(&conn, &NodeBuilder::new().id(&format!("n{i}")).embedding(vec![1.0, 0.0]).build()).unwrap();
            }
        }
        let locator = NodeLocator::new(store.clone());
        let mut q = query("", Some(&[1.0, 0.0][..]));
        q.top_k = 2;
        let found = locator.find_relevant_nodes(&q, &CancelToken::new()).unwrap();
        let ids: Vec<&str> = found.iter().map(|s| s.node.id.as_str()).collect();
        assert_eq!(ids, vec!["n0", "n1"]);
    }
}
