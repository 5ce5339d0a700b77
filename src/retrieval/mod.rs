//! Graph-guided memory retrieval.
//!
//! Pipeline stages (`node_locator`, `graph_expander`, `memory_locator`,
//! `candidate_ranker`), the strategy set, the query router, the two fusion
//! algorithms, and `RecallEngine` which wires them together.

pub mod candidate_ranker;
pub mod engine;
pub mod fusion;
pub mod graph_expander;
pub mod memory_locator;
pub mod node_locator;
pub mod router;
pub mod strategies;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cancel::CancelToken;
use crate::memory::{Memory, MemoryType, RecallRecord};
use crate::processing::embeddings::{ensure_dimension, Embedder};
use crate::RecallResult;

pub use engine::{EngineQuery, RecallEngine};
pub use router::{QueryRouter, RouteDecision, RouteOutcome};

// ============================================================================
// Strategy kinds
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Semantic,
    Keyword,
    Categorical,
    Temporal,
    Graph,
    /// Weighted score fusion over a subset of the others.
    Hybrid,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 6] = [
        Self::Semantic,
        Self::Keyword,
        Self::Categorical,
        Self::Temporal,
        Self::Graph,
        Self::Hybrid,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Semantic => "semantic",
            Self::Keyword => "keyword",
            Self::Categorical => "categorical",
            Self::Temporal => "temporal",
            Self::Graph => "graph",
            Self::Hybrid => "hybrid",
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            Self::Semantic => 0,
            Self::Keyword => 1,
            Self::Categorical => 2,
            Self::Temporal => 3,
            Self::Graph => 4,
            Self::Hybrid => 5,
        }
    }

    /// Lenient parse: unknown names map to `Semantic`.
    pub fn parse_or_semantic(s: &str) -> Self {
        s.parse().unwrap_or_else(|e: String| {
            tracing::debug!(error = %e, "Defaulting to semantic strategy");
            Self::Semantic
        })
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StrategyKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "semantic" => Ok(Self::Semantic),
            "keyword" => Ok(Self::Keyword),
            "categorical" => Ok(Self::Categorical),
            "temporal" => Ok(Self::Temporal),
            "graph" => Ok(Self::Graph),
            "hybrid" | "weighted_hybrid" => Ok(Self::Hybrid),
            _ => Err(format!("Unknown strategy type: {}", s)),
        }
    }
}

// ============================================================================
// Hits
// ============================================================================

/// Score contributed by one strategy to a weighted fusion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyContribution {
    pub strategy: StrategyKind,
    pub score: f64,
    pub weight: f64,
}

/// How a hit was produced. One variant per producer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HitDetail {
    Semantic { distance: f64 },
    Keyword { terms: Vec<String>, rank: f64 },
    Categorical { matched: Vec<String> },
    Temporal { age_hours: f64 },
    MemoryGraph {
        depth: usize,
        via: Option<String>,
        relation: Option<String>,
    },
    Weighted { contributions: Vec<StrategyContribution> },
    Hierarchical { distance: f64 },
    GraphGuided {
        vector_similarity: f64,
        graph_contribution: f64,
        node_id: String,
    },
    Fused {
        hierarchical_rank: Option<usize>,
        graph_rank: Option<usize>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub memory: Memory,
    pub score: f64,
    pub detail: HitDetail,
}

impl SearchHit {
    pub fn new(memory: Memory, score: f64, detail: HitDetail) -> Self {
        Self { memory, score, detail }
    }

    pub fn to_record(&self) -> RecallRecord {
        RecallRecord::from_memory(&self.memory, self.score)
    }
}

/// Descending score, ties by memory id ascending.
pub fn sort_hits(hits: &mut [SearchHit]) {
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.memory.id.cmp(&b.memory.id))
    });
}

pub fn to_records(hits: &[SearchHit]) -> Vec<RecallRecord> {
    hits.iter().map(SearchHit::to_record).collect()
}

// ============================================================================
// Strategy parameters
// ============================================================================

/// Inputs shared by every strategy. Strategy-specific fields are ignored by
/// the strategies that do not use them.
#[derive(Debug, Clone, Default)]
pub struct SearchParams {
    pub user_id: String,
    pub query: String,
    pub query_embedding: Option<Vec<f32>>,
    pub memory_type: Option<MemoryType>,
    pub limit: usize,
    /// Keyword: explicit terms instead of the query text.
    pub keywords: Vec<String>,
    /// Categorical
    pub categories: Vec<String>,
    pub match_all: bool,
    /// Temporal: absolute window, or a relative expression like "3 days".
    pub time_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    pub relative_time: Option<String>,
    /// Graph: root memory id.
    pub root_memory_id: Option<String>,
    /// Hybrid: strategy -> weight.
    pub weights: Option<HashMap<StrategyKind, f64>>,
}

impl SearchParams {
    pub fn new(user_id: &str, query: &str, limit: usize) -> Self {
        Self {
            user_id: user_id.to_string(),
            query: query.to_string(),
            limit,
            ..Default::default()
        }
    }
}

/// Common contract of the strategy set.
pub trait Strategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    fn search(&self, params: &SearchParams, cancel: &CancelToken) -> RecallResult<Vec<SearchHit>>;
}

/// Caller's embedding if usable, otherwise the embedder's.
///
/// `Ok(None)` when no usable embedding could be produced; only cancellation
/// is returned as an error.
pub(crate) fn resolve_query_embedding(
    query: &str,
    supplied: Option<&[f32]>,
    embedder: &dyn Embedder,
    cancel: &CancelToken,
) -> RecallResult<Option<Vec<f32>>> {
    let dim = embedder.dimension();
    if let Some(v) = supplied {
        return match ensure_dimension(v, dim) {
            Ok(()) => Ok(Some(v.to_vec())),
            Err(e) => {
                tracing::warn!(error = %e, "Supplied query embedding rejected");
                Ok(None)
            }
        };
    }
    match embedder
        .embed(query, cancel)
        .and_then(|v| ensure_dimension(&v, dim).map(|_| v))
    {
        Ok(v) => Ok(Some(v)),
        Err(e) if e.is_cancellation() => Err(e),
        Err(e) => {
            tracing::warn!(error = %e, "Query embedding failed");
            Ok(None)
        }
    }
}
