//! Graph Expander — layered BFS over typed knowledge edges with score decay.
//!
//! Layer 0 is the seed set at 1.0. Each hop multiplies by
//! `decay_factor × edge.weight`. A node's recorded score only ever goes up.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use crate::cancel::CancelToken;
use crate::edge::EdgeType;
use crate::node::KnowledgeNode;
use crate::storage::GraphStore;
use crate::RecallResult;

#[derive(Debug, Clone, Serialize)]
pub struct ExpandedNode {
    pub node: KnowledgeNode,
    /// Best score seen for this node.
    pub score: f64,
    /// Hop at which the best score was recorded.
    pub hop: usize,
}

pub type Expansion = HashMap<String, ExpandedNode>;

pub struct GraphExpander {
    store: Arc<dyn GraphStore>,
}

impl GraphExpander {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    pub fn expand(
        &self,
        seeds: &[KnowledgeNode],
        depth: usize,
        edge_types: Option<&[EdgeType]>,
        decay_factor: f64,
        cancel: &CancelToken,
    ) -> RecallResult<Expansion> {
        let mut visited: Expansion = HashMap::new();

        // Layer 0
        let mut layer: HashMap<String, (KnowledgeNode, f64)> = seeds
            .iter()
            .map(|n| (n.id.clone(), (n.clone(), 1.0)))
            .collect();

        if depth < 1 || seeds.is_empty() {
            for (id, (node, score)) in layer {
                visited.insert(id, ExpandedNode { node, score, hop: 0 });
            }
            return Ok(visited);
        }

        for hop in 0..=depth {
            cancel.check()?;

            for (id, (node, score)) in &layer {
                let improves = visited.get(id).map_or(true, |seen| *score > seen.score);
                if improves {
                    visited.insert(
                        id.clone(),
                        ExpandedNode {
                            node: node.clone(),
                            score: *score,
                            hop,
                        },
                    );
                }
            }

            if hop == depth || layer.is_empty() {
                break;
            }

            layer = self.next_layer(&layer, edge_types, decay_factor, cancel)?;
            tracing::trace!(hop = hop + 1, reached = layer.len(), "Graph layer expanded");
        }

        tracing::debug!(
            seeds = seeds.len(),
            depth = depth,
            reached = visited.len(),
            "Graph expansion complete"
        );
        Ok(visited)
    }

    /// Children of `layer`; a child reached from several parents keeps
    /// its best score.
    fn next_layer(
        &self,
        layer: &HashMap<String, (KnowledgeNode, f64)>,
        edge_types: Option<&[EdgeType]>,
        decay_factor: f64,
        cancel: &CancelToken,
    ) -> RecallResult<HashMap<String, (KnowledgeNode, f64)>> {
        let mut parent_ids: Vec<String> = layer.keys().cloned().collect();
        parent_ids.sort();
        let edges = self.store.edges_from(&parent_ids, edge_types, cancel)?;

        let mut child_scores: HashMap<String, f64> = HashMap::new();
        for edge in &edges {
            let Some((_, parent_score)) = layer.get(&edge.source_id) else {
                continue;
            };
            let child_score = parent_score * decay_factor * edge.weight;
            child_scores
                .entry(edge.target_id.clone())
                .and_modify(|s| *s = s.max(child_score))
                .or_insert(child_score);
        }

        if child_scores.is_empty() {
            return Ok(HashMap::new());
        }

        let mut child_ids: Vec<String> = child_scores.keys().cloned().collect();
        child_ids.sort();
        let nodes = self.store.nodes_by_ids(&child_ids, cancel)?;
        if nodes.len() < child_ids.len() {
            tracing::warn!(
                expected = child_ids.len(),
                loaded = nodes.len(),
                "Some edge targets could not be loaded, skipping them"
            );
        }

        Ok(nodes
            .into_iter()
            .filter_map(|node| {
                let score = *child_scores.get(&node.id)?;
                Some((node.id.clone(), (node, score)))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::edges::EdgeStorage;
    use crate::storage::nodes::NodeStorage;
    use crate::storage::SqliteGraphStore;
    use crate::test_helpers::{setup_store, EdgeBuilder, NodeBuilder};

    fn add_nodes(store: &SqliteGraphStore, ids: &[&str]) -> Vec<KnowledgeNode> {
        let conn = store.lock().unwrap();
        ids.iter()
            .map(|id| {
                let n = NodeBuilder::new().id(id).name(id).build();
                NodeStorage::insert(&conn, &n).unwrap();
                n
            })
            .collect()
    }

    fn add_edge(store: &SqliteGraphStore, from: &str, to: &str, weight: f64, t: EdgeType) {
        let conn = store.lock().unwrap();
        EdgeStorage::insert(&conn, &EdgeBuilder::new(from, to).weight(weight).edge_type(t).build()).unwrap();
    }

    #[test]
    fn test_depth_zero_returns_seeds() {
        let store = setup_store();
        let nodes = add_nodes(&store, &["a", "b"]);
        add_edge(&store, "a", "b", 1.0, EdgeType::RelatedTo);
        let expander = GraphExpander::new(store.clone());

        let out = expander.expand(&nodes[..1], 0, None, 0.7, &CancelToken::new()).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out["a"].score, 1.0);
    }

    #[test]
    fn test_decay_per_hop() {
        let store = setup_store();
        let nodes = add_nodes(&store, &["a", "b", "c", "d"]);
        add_edge(&store, "a", "b", 0.8, EdgeType::SubtopicOf);
        add_edge(&store, "b", "c", 0.5, EdgeType::SubtopicOf);
        add_edge(&store, "c", "d", 1.0, EdgeType::SubtopicOf);
        let expander = GraphExpander::new(store.clone());

        let out = expander.expand(&nodes[..1], 2, None, 0.7, &CancelToken::new()).unwrap();
        assert_eq!(out.len(), 3, "d is beyond depth 2");
        assert!((out["b"].score - 0.56).abs() < 1e-9);
        assert!((out["c"].score - 0.196).abs() < 1e-9);
        assert_eq!(out["c"].hop, 2);
    }

    #[test]
    fn test_scores_never_downgrade() {
        let store = setup_store();
        let nodes = add_nodes(&store, &["a", "b", "c"]);
        // a -> b strong, a -> c -> b weaker second path, b -> a cycle
        add_edge(&store, "a", "b", 1.0, EdgeType::RelatedTo);
        add_edge(&store, "a", "c", 0.5, EdgeType::RelatedTo);
        add_edge(&store, "c", "b", 1.0, EdgeType::RelatedTo);
        add_edge(&store, "b", "a", 1.0, EdgeType::RelatedTo);
        let expander = GraphExpander::new(store.clone());

        let out = expander.expand(&nodes[..1], 3, None, 0.7, &CancelToken::new()).unwrap();
        assert_eq!(out["a"].score, 1.0);
        assert_eq!(out["a"].hop, 0);
        assert!((out["b"].score - 0.7).abs() < 1e-9);
        assert_eq!(out["b"].hop, 1);
    }

    #[test]
    fn test_edge_type_filter() {
        let store = setup_store();
        let nodes = add_nodes(&store, &["a", "b", "c"]);
        add_edge(&store, "a", "b", 1.0, EdgeType::PartOf);
        add_edge(&store, "a", "c", 1.0, EdgeType::Precedes);
        let expander = GraphExpander::new(store.clone());

        let out = expander
            .expand(&nodes[..1], 1, Some(&[EdgeType::PartOf][..]), 0.7, &CancelToken::new())
            .unwrap();
        assert!(out.contains_key("b"));
        assert!(!out.contains_key("c"));
    }

    #[test]
    fn test_multiple_parents_keep_best_child_score() {
        let store = setup_store();
        let nodes = add_nodes(&store, &["a", "b", "c"]);
        add_edge(&store, "a", "c", 0.2, EdgeType::RelatedTo);
        add_edge(&store, "b", "c", 0.9, EdgeType::RelatedTo);
        let expander = GraphExpander::new(store.clone());

        let out = expander.expand(&nodes[..2], 1, None, 0.5, &CancelToken::new()).unwrap();
        assert!((out["c"].score - 0.45).abs() < 1e-9);
    }
}
