use std::sync::Arc;

use crate::cancel::CancelToken;
use crate::processing::text::fold_case;
use crate::retrieval::{HitDetail, SearchHit, SearchParams, Strategy, StrategyKind};
use crate::storage::GraphStore;
use crate::{RecallError, RecallResult};

/// Category overlap. score = |matched| / |query categories|.
///
/// Memories with no matching category are excluded. With `match_all`, only
/// memories carrying every query category are kept.
pub struct CategoricalStrategy {
    store: Arc<dyn GraphStore>,
}

impl CategoricalStrategy {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }
}

/// Query categories, trimmed, lowercased and deduplicated in order.
fn normalise(categories: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for c in categories {
        let c = fold_case(c);
        if !c.is_empty() && !out.contains(&c) {
            out.push(c);
        }
    }
    out
}

impl Strategy for CategoricalStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Categorical
    }

    fn search(&self, params: &SearchParams, cancel: &CancelToken) -> RecallResult<Vec<SearchHit>> {
        let wanted = normalise(&params.categories);
        if wanted.is_empty() {
            return Err(RecallError::InvalidInput(
                "Categorical search needs at least one category".into(),
            ));
        }

        // Newest first from the store
        let candidates = self.store.memories_with_categories(
            &params.user_id,
            &wanted,
            params.memory_type,
            cancel,
        )?;

        let mut hits: Vec<SearchHit> = candidates
            .into_iter()
            .filter_map(|memory| {
                let matched: Vec<String> = wanted
                    .iter()
                    .filter(|c| memory.metadata.has_category(c))
                    .cloned()
                    .collect();
                if matched.is_empty() || (params.match_all && matched.len() < wanted.len()) {
                    return None;
                }
                let score = matched.len() as f64 / wanted.len() as f64;
                Some(SearchHit::new(memory, score, HitDetail::Categorical { matched }))
            })
            .collect();

        if params.match_all {
            // All scores are 1.0; keep recency order
            hits.sort_by(|a, b| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| b.memory.created_at.cmp(&a.memory.created_at))
            });
        }
        hits.truncate(params.limit);

        tracing::debug!(
            user = %params.user_id,
            categories = ?wanted,
            match_all = params.match_all,
            hits = hits.len(),
            "Categorical search done"
        );
        Ok(hits)
    }
}
