use std::collections::HashMap;
use std::sync::Arc;

use rayon::prelude::*;

use crate::cancel::CancelToken;
use crate::retrieval::fusion::{validate_weights, weighted_fusion};
use crate::retrieval::strategies::StrategySet;
use crate::retrieval::{SearchHit, SearchParams, Strategy, StrategyKind};
use crate::{RecallError, RecallResult};

/// Mix used when neither the caller nor the classifier names one.
pub fn default_hybrid_weights() -> HashMap<StrategyKind, f64> {
    HashMap::from([(StrategyKind::Semantic, 0.7), (StrategyKind::Keyword, 0.3)])
}

/// Weighted score fusion over a fixed subset of the base strategies.
///
/// Weights are checked when the strategy is built, so a bad mix fails
/// before any store query runs.
pub struct WeightedHybridStrategy {
    members: Vec<(StrategyKind, f64, Arc<dyn Strategy>)>,
    tolerate_partial_failure: bool,
}

impl WeightedHybridStrategy {
    pub fn new(
        weights: &HashMap<StrategyKind, f64>,
        set: &StrategySet,
        tolerate_partial_failure: bool,
    ) -> RecallResult<Self> {
        validate_weights(weights)?;
        let mut members = Vec::with_capacity(weights.len());
        for (&kind, &weight) in weights {
            let strategy = set.get(kind).ok_or_else(|| {
                RecallError::InvalidInput(format!("No strategy registered for {}", kind))
            })?;
            members.push((kind, weight, strategy));
        }
        members.sort_by_key(|(kind, _, _)| *kind);
        Ok(Self { members, tolerate_partial_failure })
    }

    pub fn weights(&self) -> Vec<(StrategyKind, f64)> {
        self.members.iter().map(|(k, w, _)| (*k, *w)).collect()
    }
}

impl Strategy for WeightedHybridStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Hybrid
    }

    fn search(&self, params: &SearchParams, cancel: &CancelToken) -> RecallResult<Vec<SearchHit>> {
        cancel.check()?;
        let mut sub_params = params.clone();
        sub_params.weights = None;

        let outcomes: Vec<(StrategyKind, f64, RecallResult<Vec<SearchHit>>)> = self
            .members
            .par_iter()
            .map(|(kind, weight, strategy)| (*kind, *weight, strategy.search(&sub_params, cancel)))
            .collect();

        let mut results = Vec::with_capacity(outcomes.len());
        for (kind, weight, outcome) in outcomes {
            match outcome {
                Ok(hits) => results.push((kind, weight, hits)),
                Err(e) if e.is_cancellation() || !self.tolerate_partial_failure => return Err(e),
                Err(e) => {
                    tracing::warn!(strategy = %kind, error = %e, "Strategy failed, continuing without it");
                }
            }
        }

        let mut fused = weighted_fusion(results);
        fused.truncate(params.limit);
        tracing::debug!(
            user = %params.user_id,
            strategies = self.members.len(),
            hits = fused.len(),
            "Weighted hybrid search done"
        );
        Ok(fused)
    }
}
