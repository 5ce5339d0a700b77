//! Query Router — picks a strategy (caller's choice or classifier's) and
//! dispatches to it.
//!
//! Classifier problems never reach the caller: a failed, unusable, or
//! missing classification falls back to semantic search at confidence 0.5.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cancel::CancelToken;
use crate::constants::FALLBACK_CONFIDENCE;
use crate::processing::classifier::{Classification, QueryClassifier};
use crate::retrieval::fusion::validate_weights;
use crate::retrieval::strategies::weighted::{default_hybrid_weights, WeightedHybridStrategy};
use crate::retrieval::strategies::{parse_relative_time, StrategySet};
use crate::retrieval::{SearchHit, SearchParams, Strategy, StrategyKind};
use crate::{RecallError, RecallResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    Explicit,
    Classifier,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteDecision {
    pub strategy: StrategyKind,
    pub confidence: f64,
    pub explanation: String,
    pub source: DecisionSource,
}

impl RouteDecision {
    fn fallback(note: String) -> Self {
        Self {
            strategy: StrategyKind::Semantic,
            confidence: FALLBACK_CONFIDENCE,
            explanation: note,
            source: DecisionSource::Fallback,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RouteOutcome {
    pub decision: RouteDecision,
    pub hits: Vec<SearchHit>,
}

pub struct QueryRouter {
    strategies: StrategySet,
    classifier: Option<Arc<dyn QueryClassifier>>,
    counters: [AtomicU64; 6],
    tolerate_partial_failure: bool,
}

impl QueryRouter {
    pub fn new(
        strategies: StrategySet,
        classifier: Option<Arc<dyn QueryClassifier>>,
        tolerate_partial_failure: bool,
    ) -> Self {
        Self {
            strategies,
            classifier,
            counters: Default::default(),
            tolerate_partial_failure,
        }
    }

    /// Route and run one query. `explicit` bypasses the classifier.
    pub fn route(
        &self,
        caller_params: &SearchParams,
        explicit: Option<StrategyKind>,
        cancel: &CancelToken,
    ) -> RecallResult<RouteOutcome> {
        cancel.check()?;
        let mut params = caller_params.clone();

        let decision = match explicit {
            Some(strategy) => RouteDecision {
                strategy,
                confidence: 1.0,
                explanation: "Strategy chosen by caller".to_string(),
                source: DecisionSource::Explicit,
            },
            None => self.decide(&mut params, cancel)?,
        };

        tracing::info!(
            user = %params.user_id,
            strategy = %decision.strategy,
            confidence = decision.confidence,
            source = ?decision.source,
            "Query routed"
        );

        match self.dispatch(decision.strategy, &params, cancel) {
            Ok(hits) => Ok(RouteOutcome { decision, hits }),
            // A classifier answer that fails at run time is a classifier failure
            Err(e) if decision.source == DecisionSource::Classifier && !e.is_cancellation() => {
                tracing::warn!(
                    strategy = %decision.strategy,
                    error = %e,
                    "Classifier-chosen strategy failed, falling back to semantic"
                );
                let decision = RouteDecision::fallback(format!(
                    "Classifier chose {} but it failed ({}), using semantic search",
                    decision.strategy, e
                ));
                let hits = self.dispatch(decision.strategy, caller_params, cancel)?;
                Ok(RouteOutcome { decision, hits })
            }
            Err(e) => Err(e),
        }
    }

    /// Per-strategy invocation counts since construction.
    pub fn invocation_counts(&self) -> BTreeMap<StrategyKind, u64> {
        StrategyKind::ALL
            .iter()
            .map(|k| (*k, self.counters[k.index()].load(Ordering::Relaxed)))
            .collect()
    }

    fn decide(&self, params: &mut SearchParams, cancel: &CancelToken) -> RecallResult<RouteDecision> {
        let Some(classifier) = &self.classifier else {
            return Ok(RouteDecision::fallback(
                "No classifier configured, using semantic search".to_string(),
            ));
        };

        let classification = match classifier.classify(&params.query, cancel) {
            Ok(c) => c,
            Err(e) if e.is_cancellation() => return Err(e),
            Err(e) => {
                tracing::warn!(error = %e, "Query classification failed, falling back to semantic");
                return Ok(RouteDecision::fallback(format!(
                    "Classification failed ({}), using semantic search",
                    e
                )));
            }
        };

        let mut merged = params.clone();
        merge_classification(&mut merged, &classification);
        if let Some(problem) = unusable(classification.strategy, &merged, Utc::now()) {
            tracing::warn!(
                strategy = %classification.strategy,
                problem = %problem,
                "Classification unusable, falling back to semantic"
            );
            return Ok(RouteDecision::fallback(format!(
                "Classifier chose {} but {}, using semantic search",
                classification.strategy, problem
            )));
        }

        *params = merged;
        Ok(RouteDecision {
            strategy: classification.strategy,
            confidence: classification.confidence,
            explanation: classification.explanation,
            source: DecisionSource::Classifier,
        })
    }

    fn dispatch(
        &self,
        kind: StrategyKind,
        params: &SearchParams,
        cancel: &CancelToken,
    ) -> RecallResult<Vec<SearchHit>> {
        self.counters[kind.index()].fetch_add(1, Ordering::Relaxed);
        match kind {
            StrategyKind::Hybrid => {
                let weights = params.weights.clone().unwrap_or_else(default_hybrid_weights);
                let hybrid = WeightedHybridStrategy::new(
                    &weights,
                    &self.strategies,
                    self.tolerate_partial_failure,
                )?;
                hybrid.search(params, cancel)
            }
            base => {
                let strategy = self.strategies.get(base).ok_or_else(|| {
                    RecallError::InvalidInput(format!("No strategy registered for {}", base))
                })?;
                strategy.search(params, cancel)
            }
        }
    }
}

/// Fill caller-unset parameters from the classifier's suggestions.
fn merge_classification(params: &mut SearchParams, c: &Classification) {
    if params.keywords.is_empty() {
        params.keywords = c.params.keywords.clone();
    }
    if params.categories.is_empty() {
        params.categories = c.params.categories.clone();
    }
    if params.time_range.is_none() && params.relative_time.is_none() {
        params.relative_time = c.params.relative_time.clone();
    }
    if params.root_memory_id.is_none() {
        params.root_memory_id = c.params.relationship_focus.clone();
    }
    if params.weights.is_none() {
        params.weights = c.params.weights.clone();
    }
}

/// Why a classifier-chosen strategy cannot run with these params, if so.
fn unusable(kind: StrategyKind, params: &SearchParams, now: DateTime<Utc>) -> Option<String> {
    match kind {
        StrategyKind::Categorical if params.categories.is_empty() => {
            Some("no categories were given".to_string())
        }
        StrategyKind::Temporal => match (&params.time_range, &params.relative_time) {
            (Some((start, end)), _) if start > end => Some("its time range is inverted".to_string()),
            (Some(_), _) => None,
            (None, Some(expr)) => parse_relative_time(expr, now)
                .err()
                .map(|e| format!("its time window is unusable ({})", e)),
            (None, None) => Some("no time window was given".to_string()),
        },
        StrategyKind::Graph if params.root_memory_id.is_none() => {
            Some("no root memory was given".to_string())
        }
        StrategyKind::Hybrid => params
            .weights
            .as_ref()
            .and_then(|w| validate_weights(w).err())
            .map(|e| format!("its weights are invalid ({})", e)),
        _ => None,
    }
}
