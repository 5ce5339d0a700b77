use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use crate::cancel::CancelToken;
use crate::memory::Memory;
use crate::retrieval::{sort_hits, HitDetail, SearchHit, SearchParams, Strategy, StrategyKind};
use crate::storage::GraphStore;
use crate::{RecallError, RecallResult};

/// BFS over the `relationships` stored in each memory's metadata, starting
/// at a root memory. score = 1 / (depth + 1); the root itself is depth 0.
///
/// This walks memory-to-memory links only; knowledge edges are the
/// expander's business.
pub struct MemoryGraphStrategy {
    store: Arc<dyn GraphStore>,
    max_depth: usize,
}

struct Visit {
    memory: Memory,
    depth: usize,
    via: Option<String>,
    relation: Option<String>,
}

impl MemoryGraphStrategy {
    pub fn new(store: Arc<dyn GraphStore>, max_depth: usize) -> Self {
        Self { store, max_depth }
    }
}

impl Strategy for MemoryGraphStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Graph
    }

    fn search(&self, params: &SearchParams, cancel: &CancelToken) -> RecallResult<Vec<SearchHit>> {
        let root_id = params.root_memory_id.as_deref().ok_or_else(|| {
            RecallError::InvalidInput("Graph search needs a root memory id".into())
        })?;
        let root = self
            .store
            .memory_by_id(&params.user_id, root_id, cancel)?
            .ok_or_else(|| RecallError::MemoryNotFound(root_id.to_string()))?;

        let mut seen: HashSet<String> = HashSet::from([root.id.clone()]);
        let mut queue = VecDeque::from([Visit {
            memory: root,
            depth: 0,
            via: None,
            relation: None,
        }]);
        let mut hits = Vec::new();

        while let Some(visit) = queue.pop_front() {
            if visit.depth < self.max_depth {
                for rel in &visit.memory.metadata.relationships {
                    if !seen.insert(rel.memory_id.clone()) {
                        continue;
                    }
                    match self.store.memory_by_id(&params.user_id, &rel.memory_id, cancel)? {
                        Some(next) => queue.push_back(Visit {
                            memory: next,
                            depth: visit.depth + 1,
                            via: Some(visit.memory.id.clone()),
                            relation: rel.relation.clone(),
                        }),
                        None => {
                            tracing::debug!(from = %visit.memory.id, to = %rel.memory_id, "Dangling memory relationship");
                        }
                    }
                }
            }

            if params
                .memory_type
                .map_or(true, |t| t == visit.memory.memory_type)
            {
                let score = 1.0 / (visit.depth as f64 + 1.0);
                hits.push(SearchHit::new(
                    visit.memory,
                    score,
                    HitDetail::MemoryGraph {
                        depth: visit.depth,
                        via: visit.via,
                        relation: visit.relation,
                    },
                ));
            }
        }

        sort_hits(&mut hits);
        hits.truncate(params.limit);
        tracing::debug!(user = %params.user_id, root = %root_id, hits = hits.len(), "Memory graph search done");
        Ok(hits)
    }
}
