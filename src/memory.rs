use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::processing::text::fold_case;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    Personal,
    Project,
    Task,
}

impl MemoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Personal => "personal",
            Self::Project => "project",
            Self::Task => "task",
        }
    }
}

impl std::fmt::Display for MemoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MemoryType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "personal" => Ok(Self::Personal),
            "project" => Ok(Self::Project),
            "task" => Ok(Self::Task),
            _ => Err(format!("Unknown memory type: {}", s)),
        }
    }
}

/// Link from one memory to another, stored in the memory's own metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryRelation {
    pub memory_id: String,
    #[serde(default)]
    pub relation: Option<String>,
}

/// Typed view over the memory metadata map.
///
/// `categories` and `relationships` are the two keys retrieval reads;
/// anything else round-trips untouched through `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MemoryMetadata {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relationships: Vec<MemoryRelation>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Equality-only metadata filters: key -> expected value.
pub type MetadataFilters = HashMap<String, serde_json::Value>;

impl MemoryMetadata {
    /// Metadata value for `key`, including the typed fields.
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        match key {
            "categories" => serde_json::to_value(&self.categories).ok(),
            "relationships" => serde_json::to_value(&self.relationships).ok(),
            _ => self.extra.get(key).cloned(),
        }
    }

    /// Every filter key must be present and equal.
    pub fn matches(&self, filters: &MetadataFilters) -> bool {
        filters
            .iter()
            .all(|(key, expected)| self.get(key).as_ref() == Some(expected))
    }

    /// Case-insensitive category membership (Unicode fold).
    pub fn has_category(&self, category: &str) -> bool {
        let wanted = fold_case(category);
        self.categories.iter().any(|c| fold_case(c) == wanted)
    }
}

/// A stored memory record. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    #[serde(default = "crate::id_gen::memory_id")]
    pub id: String,
    pub user_id: String,
    pub memory_type: MemoryType,
    pub content: String,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub metadata: MemoryMetadata,
    #[serde(default = "crate::time_utils::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "crate::time_utils::now")]
    pub accessed_at: DateTime<Utc>,
}

/// Link between a memory and a knowledge node. Unique per (memory, node).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryNodeAssociation {
    pub memory_id: String,
    pub node_id: String,
    /// In [0,1].
    pub relevance_score: f64,
}

/// Caller-facing result row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecallRecord {
    pub memory_id: String,
    pub content: String,
    pub score: f64,
    pub memory_type: MemoryType,
    pub categories: Vec<String>,
    pub metadata: MemoryMetadata,
    pub created_at: DateTime<Utc>,
}

impl RecallRecord {
    pub fn from_memory(memory: &Memory, score: f64) -> Self {
        Self {
            memory_id: memory.id.clone(),
            content: memory.content.clone(),
            score,
            memory_type: memory.memory_type,
            categories: memory.metadata.categories.clone(),
            metadata: memory.metadata.clone(),
            created_at: memory.created_at,
        }
    }
}
