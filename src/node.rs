use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{IMPORTANCE_ACCESS_DIVISOR, IMPORTANCE_BASE};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Topic,
    Project,
    Person,
    Category,
    Event,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Topic => "topic",
            Self::Project => "project",
            Self::Person => "person",
            Self::Category => "category",
            Self::Event => "event",
        }
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for NodeType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "topic" => Ok(Self::Topic),
            "project" => Ok(Self::Project),
            "person" => Ok(Self::Person),
            "category" => Ok(Self::Category),
            "event" => Ok(Self::Event),
            _ => Err(format!("Unknown node type: {}", s)),
        }
    }
}

/// A node of a user's knowledge graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeNode {
    #[serde(default = "crate::id_gen::node_id")]
    pub id: String,
    pub user_id: String,
    pub node_type: NodeType,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Absent, or exactly `embedding_dim` long.
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    /// Popularity heuristic in [0,1].
    #[serde(default = "default_importance")]
    pub importance_score: f64,
    #[serde(default)]
    pub access_count: u32,
    #[serde(default = "crate::time_utils::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "crate::time_utils::now")]
    pub updated_at: DateTime<Utc>,
}

fn default_importance() -> f64 {
    IMPORTANCE_BASE
}

/// Importance after `access_count` reads: min(1.0, 0.5 + count/100).
pub fn importance_for_access_count(access_count: u32) -> f64 {
    (IMPORTANCE_BASE + access_count as f64 / IMPORTANCE_ACCESS_DIVISOR).min(1.0)
}

impl KnowledgeNode {
    /// Apply one read: bump the counter and recompute importance.
    pub fn record_access(&mut self) {
        self.access_count = self.access_count.saturating_add(1);
        self.importance_score = importance_for_access_count(self.access_count);
    }

    /// True when the embedding is absent or has exactly `dim` components.
    pub fn embedding_dim_ok(&self, dim: usize) -> bool {
        self.embedding.as_ref().map_or(true, |e| e.len() == dim)
    }
}
