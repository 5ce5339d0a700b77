//! Candidate Ranker — precise vector ranking restricted to a candidate set.

use std::collections::HashSet;
use std::sync::Arc;

use crate::cancel::CancelToken;
use crate::memory::Memory;
use crate::storage::GraphStore;
use crate::RecallResult;

pub struct CandidateRanker {
    store: Arc<dyn GraphStore>,
}

impl CandidateRanker {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    /// (memory, cosine distance) ascending, never outside `candidates`.
    pub fn rank_within_candidates(
        &self,
        user_id: &str,
        query_embedding: &[f32],
        candidates: &[Memory],
        limit: usize,
        cancel: &CancelToken,
    ) -> RecallResult<Vec<(Memory, f64)>> {
        if candidates.is_empty() || limit == 0 {
            return Ok(vec![]);
        }
        let ids: Vec<String> = candidates.iter().map(|m| m.id.clone()).collect();
        let allowed: HashSet<&str> = ids.iter().map(String::as_str).collect();

        let ranked = self.store.memories_by_distance(
            user_id,
            query_embedding,
            None,
            Some(ids.as_slice()),
            limit,
            cancel,
        )?;

        let before = ranked.len();
        let ranked: Vec<(Memory, f64)> = ranked
            .into_iter()
            .filter(|(m, _)| allowed.contains(m.id.as_str()))
            .collect();
        if ranked.len() != before {
            tracing::warn!(
                dropped = before - ranked.len(),
                "Store returned memories outside the candidate set"
            );
        }

        tracing::debug!(candidates = candidates.len(), ranked = ranked.len(), "Candidates ranked");
        Ok(ranked)
    }
}
