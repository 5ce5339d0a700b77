//! Independent retrieval strategies plus the weighted mix over them.

pub mod categorical;
pub mod graph;
pub mod keyword;
pub mod semantic;
pub mod temporal;
pub mod weighted;

use std::sync::Arc;

use crate::config::RecallConfig;
use crate::processing::embeddings::Embedder;
use crate::retrieval::{Strategy, StrategyKind};
use crate::storage::GraphStore;

pub use categorical::CategoricalStrategy;
pub use graph::MemoryGraphStrategy;
pub use keyword::KeywordStrategy;
pub use semantic::SemanticStrategy;
pub use temporal::{parse_relative_time, recency_score, TemporalStrategy};
pub use weighted::WeightedHybridStrategy;

/// The five base strategies. Clones share the same instances.
#[derive(Clone)]
pub struct StrategySet {
    semantic: Arc<dyn Strategy>,
    keyword: Arc<dyn Strategy>,
    categorical: Arc<dyn Strategy>,
    temporal: Arc<dyn Strategy>,
    graph: Arc<dyn Strategy>,
}

impl StrategySet {
    pub fn new(store: Arc<dyn GraphStore>, embedder: Arc<dyn Embedder>, config: &RecallConfig) -> Self {
        Self {
            semantic: Arc::new(SemanticStrategy::new(
                store.clone(),
                embedder,
                config.semantic.threshold,
            )),
            keyword: Arc::new(KeywordStrategy::new(store.clone())),
            categorical: Arc::new(CategoricalStrategy::new(store.clone())),
            temporal: Arc::new(TemporalStrategy::new(store.clone())),
            graph: Arc::new(MemoryGraphStrategy::new(store, config.memory_graph.max_depth)),
        }
    }

    /// `None` for `Hybrid`, which is built per call from a weight map.
    pub fn get(&self, kind: StrategyKind) -> Option<Arc<dyn Strategy>> {
        match kind {
            StrategyKind::Semantic => Some(self.semantic.clone()),
            StrategyKind::Keyword => Some(self.keyword.clone()),
            StrategyKind::Categorical => Some(self.categorical.clone()),
            StrategyKind::Temporal => Some(self.temporal.clone()),
            StrategyKind::Graph => Some(self.graph.clone()),
            StrategyKind::Hybrid => None,
        }
    }
}
