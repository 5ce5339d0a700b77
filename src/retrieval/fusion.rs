//! Result fusion: weighted score sums and reciprocal-rank fusion.
//!
//! The two are distinct operations. Weighted fusion mixes raw strategy
//! scores; RRF only looks at positions in each ranked list.

use std::collections::HashMap;

use crate::constants::{RRF_K, WEIGHT_SUM_TOLERANCE};
use crate::retrieval::{sort_hits, HitDetail, SearchHit, StrategyContribution, StrategyKind};
use crate::{RecallError, RecallResult};

/// RRF contribution of a 0-based rank: 1 / (60 + rank).
pub fn rrf_contribution(rank: usize) -> f64 {
    1.0 / (RRF_K + rank as f64)
}

/// Fuse the hierarchical and graph-guided lists by reciprocal rank.
/// Output is the union of both lists, sorted by fused score.
pub fn reciprocal_rank_fusion(hierarchical: Vec<SearchHit>, graph_guided: Vec<SearchHit>) -> Vec<SearchHit> {
    struct Acc {
        hit: SearchHit,
        score: f64,
        hierarchical_rank: Option<usize>,
        graph_rank: Option<usize>,
    }

    let mut acc: HashMap<String, Acc> = HashMap::new();
    let lists = [(true, hierarchical), (false, graph_guided)];
    for (is_hierarchical, list) in lists {
        for (rank, hit) in list.into_iter().enumerate() {
            let entry = acc.entry(hit.memory.id.clone()).or_insert_with(|| Acc {
                hit,
                score: 0.0,
                hierarchical_rank: None,
                graph_rank: None,
            });
            // A list may repeat a memory; only its best rank counts
            let slot = if is_hierarchical {
                &mut entry.hierarchical_rank
            } else {
                &mut entry.graph_rank
            };
            if slot.is_none() {
                *slot = Some(rank);
                entry.score += rrf_contribution(rank);
            }
        }
    }

    let mut fused: Vec<SearchHit> = acc
        .into_values()
        .map(|a| SearchHit {
            memory: a.hit.memory,
            score: a.score,
            detail: HitDetail::Fused {
                hierarchical_rank: a.hierarchical_rank,
                graph_rank: a.graph_rank,
            },
        })
        .collect();
    sort_hits(&mut fused);
    fused
}

/// Checks a strategy -> weight map: non-negative, no nested hybrid, and a
/// sum of 1.0 within tolerance.
pub fn validate_weights(weights: &HashMap<StrategyKind, f64>) -> RecallResult<()> {
    if weights.is_empty() {
        return Err(RecallError::InvalidInput("No strategy weights given".into()));
    }
    if weights.contains_key(&StrategyKind::Hybrid) {
        return Err(RecallError::InvalidInput(
            "Hybrid cannot be weighted inside itself".into(),
        ));
    }
    if let Some((kind, w)) = weights.iter().find(|(_, w)| !w.is_finite() || **w < 0.0) {
        return Err(RecallError::InvalidInput(format!(
            "Weight for {} must be a non-negative number, got {}",
            kind, w
        )));
    }
    let sum: f64 = weights.values().sum();
    if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
        return Err(RecallError::InvalidWeights { sum });
    }
    Ok(())
}

/// Σ strategyScore × weight per memory, sorted descending.
pub fn weighted_fusion(results: Vec<(StrategyKind, f64, Vec<SearchHit>)>) -> Vec<SearchHit> {
    let mut acc: HashMap<String, (SearchHit, f64, Vec<StrategyContribution>)> = HashMap::new();
    for (strategy, weight, hits) in results {
        for hit in hits {
            let score = hit.score;
            let entry = acc
                .entry(hit.memory.id.clone())
                .or_insert_with(|| (hit, 0.0, Vec::new()));
            entry.1 += score * weight;
            entry.2.push(StrategyContribution { strategy, score, weight });
        }
    }

    let mut fused: Vec<SearchHit> = acc
        .into_values()
        .map(|(hit, score, mut contributions)| {
            contributions.sort_by_key(|c| c.strategy);
            SearchHit {
                memory: hit.memory,
                score,
                detail: HitDetail::Weighted { contributions },
            }
        })
        .collect();
    sort_hits(&mut fused);
    fused
}
