//! Retrieval configuration — numeric knobs for every stage of the pipeline.
//!
//! Loaded from `{data_dir}/config.json`. Missing sections fall back to
//! defaults; out-of-range values are clamped by `validate()` with a warning.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::constants::*;
use crate::edge::EdgeType;

// ============================================================================
// NODE LOCATOR
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSearchConfig {
    pub top_k: usize,
    /// Minimum similarity (embedding mode only).
    pub similarity_threshold: f64,
}

impl Default for NodeSearchConfig {
    fn default() -> Self {
        Self {
            top_k: NODE_TOP_K_DEFAULT,
            similarity_threshold: NODE_SIMILARITY_THRESHOLD_DEFAULT,
        }
    }
}

// ============================================================================
// GRAPH EXPANDER
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphExpansionConfig {
    pub depth: usize,
    /// Per-hop multiplier, in [0,1].
    pub decay_factor: f64,
    /// None = follow every edge type.
    #[serde(default)]
    pub edge_types: Option<Vec<EdgeType>>,
}

impl Default for GraphExpansionConfig {
    fn default() -> Self {
        Self {
            depth: GRAPH_DEPTH_DEFAULT,
            decay_factor: GRAPH_DECAY_DEFAULT,
            edge_types: None,
        }
    }
}

// ============================================================================
// COMPOSITE SCORING (graph-guided search)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeScoringConfig {
    pub vector_weight: f64,
    pub graph_weight: f64,
}

impl Default for CompositeScoringConfig {
    fn default() -> Self {
        Self {
            vector_weight: VECTOR_WEIGHT_DEFAULT,
            graph_weight: GRAPH_WEIGHT_DEFAULT,
        }
    }
}

// ============================================================================
// STRATEGIES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticConfig {
    /// Recall threshold on similarity = 1 - distance/2.
    pub threshold: f64,
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self { threshold: SEMANTIC_THRESHOLD_DEFAULT }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryGraphConfig {
    pub max_depth: usize,
}

impl Default for MemoryGraphConfig {
    fn default() -> Self {
        Self { max_depth: MEMORY_GRAPH_DEPTH_DEFAULT }
    }
}

// ============================================================================
// FUSION
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionConfig {
    /// false (default): any failed sub-query fails the whole call.
    /// true: failed branches log a warning and contribute nothing.
    pub tolerate_partial_failure: bool,
    pub default_limit: usize,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            tolerate_partial_failure: false,
            default_limit: DEFAULT_LIMIT,
        }
    }
}

// ============================================================================
// CLASSIFIER
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Model tier passed to the `claude` CLI.
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model: "haiku".to_string(),
            timeout_secs: CLASSIFIER_TIMEOUT_SECS,
            max_retries: CLASSIFIER_MAX_RETRIES,
        }
    }
}

// ============================================================================
// ROOT
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecallConfig {
    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: usize,
    #[serde(default)]
    pub nodes: NodeSearchConfig,
    #[serde(default)]
    pub graph: GraphExpansionConfig,
    #[serde(default)]
    pub scoring: CompositeScoringConfig,
    #[serde(default)]
    pub semantic: SemanticConfig,
    #[serde(default)]
    pub memory_graph: MemoryGraphConfig,
    #[serde(default)]
    pub fusion: FusionConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
}

fn default_embedding_dim() -> usize {
    DEFAULT_EMBEDDING_DIM
}

impl Default for RecallConfig {
    fn default() -> Self {
        Self {
            embedding_dim: default_embedding_dim(),
            nodes: NodeSearchConfig::default(),
            graph: GraphExpansionConfig::default(),
            scoring: CompositeScoringConfig::default(),
            semantic: SemanticConfig::default(),
            memory_graph: MemoryGraphConfig::default(),
            fusion: FusionConfig::default(),
            classifier: ClassifierConfig::default(),
        }
    }
}

impl RecallConfig {
    /// Load from `{data_dir}/config.json`. Defaults if missing or invalid.
    pub fn load() -> Self {
        Self::load_from(&crate::storage::path_utils::config_path())
    }

    pub fn load_from(path: &Path) -> Self {
        let mut cfg = match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Invalid recall config, using defaults"
                );
                Self::default()
            }),
            Err(_) => Self::default(),
        };
        cfg.validate();
        cfg
    }

    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config dir: {}", e))?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;
        std::fs::write(path, json).map_err(|e| format!("Failed to write config: {}", e))?;
        Ok(())
    }

    /// Validate and clamp all values to sensible ranges.
    pub fn validate(&mut self) {
        clamp_01(&mut self.nodes.similarity_threshold, "nodes.similarity_threshold");
        clamp_01(&mut self.graph.decay_factor, "graph.decay_factor");
        clamp_01(&mut self.semantic.threshold, "semantic.threshold");
        clamp_01(&mut self.scoring.vector_weight, "scoring.vector_weight");
        clamp_01(&mut self.scoring.graph_weight, "scoring.graph_weight");

        if self.embedding_dim == 0 {
            tracing::warn!(field = "embedding_dim", "Must be > 0, resetting to default");
            self.embedding_dim = DEFAULT_EMBEDDING_DIM;
        }
        if self.nodes.top_k == 0 {
            tracing::warn!(field = "nodes.top_k", "Must be > 0, resetting to default");
            self.nodes.top_k = NODE_TOP_K_DEFAULT;
        }
        if self.fusion.default_limit == 0 {
            tracing::warn!(field = "fusion.default_limit", "Must be > 0, resetting to default");
            self.fusion.default_limit = DEFAULT_LIMIT;
        }

        let sum = self.scoring.vector_weight + self.scoring.graph_weight;
        if sum <= 0.0 {
            tracing::warn!("scoring weights are both zero, resetting to defaults");
            self.scoring = CompositeScoringConfig::default();
        } else if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            tracing::warn!(
                vector = self.scoring.vector_weight,
                graph = self.scoring.graph_weight,
                "scoring weights do not sum to 1, normalising"
            );
            self.scoring.vector_weight /= sum;
            self.scoring.graph_weight /= sum;
        }
    }
}

fn clamp_01(val: &mut f64, name: &str) {
    if *val < 0.0 || *val > 1.0 {
        tracing::warn!(field = name, value = *val, "Config out of range [0,1] — clamping");
        *val = val.clamp(0.0, 1.0);
    }
}
