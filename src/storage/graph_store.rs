//! Query contract between the retrieval engine and its storage.
//!
//! The engine never touches SQL directly; everything it reads goes through
//! this trait so that a different backend (or a test double) can stand in.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cancel::CancelToken;
use crate::edge::{EdgeType, KnowledgeEdge};
use crate::memory::{Memory, MemoryNodeAssociation, MemoryType};
use crate::node::{KnowledgeNode, NodeType};
use crate::RecallResult;

/// A memory reached through one of its node associations.
#[derive(Debug, Clone, Serialize)]
pub struct AssociatedMemory {
    pub memory: Memory,
    pub node_id: String,
    pub relevance_score: f64,
}

pub trait GraphStore: Send + Sync {
    /// Nodes with an embedding, as (node, cosine distance) ascending.
    fn nodes_by_distance(
        &self,
        user_id: &str,
        query: &[f32],
        node_types: Option<&[NodeType]>,
        cancel: &CancelToken,
    ) -> RecallResult<Vec<(KnowledgeNode, f64)>>;

    /// Nodes whose name contains `pattern` (case-insensitive).
    fn nodes_by_name(
        &self,
        user_id: &str,
        pattern: &str,
        node_types: Option<&[NodeType]>,
        cancel: &CancelToken,
    ) -> RecallResult<Vec<KnowledgeNode>>;

    fn nodes_by_ids(&self, ids: &[String], cancel: &CancelToken) -> RecallResult<Vec<KnowledgeNode>>;

    /// Atomic accessCount += 1 with importance recomputed.
    fn record_node_access(&self, node_id: &str, cancel: &CancelToken) -> RecallResult<()>;

    fn edges_from(
        &self,
        source_ids: &[String],
        edge_types: Option<&[EdgeType]>,
        cancel: &CancelToken,
    ) -> RecallResult<Vec<KnowledgeEdge>>;

    fn associations_for_nodes(
        &self,
        node_ids: &[String],
        cancel: &CancelToken,
    ) -> RecallResult<Vec<MemoryNodeAssociation>>;

    fn associations_for_memory(
        &self,
        memory_id: &str,
        cancel: &CancelToken,
    ) -> RecallResult<Vec<MemoryNodeAssociation>>;

    /// One row per (memory, node) pair; relevance desc, then created desc.
    fn memories_for_nodes(
        &self,
        user_id: &str,
        node_ids: &[String],
        memory_type: Option<MemoryType>,
        cancel: &CancelToken,
    ) -> RecallResult<Vec<AssociatedMemory>>;

    /// (memory, cosine distance) ascending, ties by id. `candidates`
    /// restricts the scan to that id set.
    fn memories_by_distance(
        &self,
        user_id: &str,
        query: &[f32],
        memory_type: Option<MemoryType>,
        candidates: Option<&[String]>,
        limit: usize,
        cancel: &CancelToken,
    ) -> RecallResult<Vec<(Memory, f64)>>;

    /// Full-text match; score is a positive rank, higher is better.
    fn memories_full_text(
        &self,
        user_id: &str,
        fts_query: &str,
        memory_type: Option<MemoryType>,
        limit: usize,
        cancel: &CancelToken,
    ) -> RecallResult<Vec<(Memory, f64)>>;

    /// Created within `[start, end]`, newest first.
    fn memories_in_window(
        &self,
        user_id: &str,
        start: &DateTime<Utc>,
        end: &DateTime<Utc>,
        memory_type: Option<MemoryType>,
        limit: usize,
        cancel: &CancelToken,
    ) -> RecallResult<Vec<Memory>>;

    /// At least one category in common (case-insensitive), newest first.
    fn memories_with_categories(
        &self,
        user_id: &str,
        categories: &[String],
        memory_type: Option<MemoryType>,
        cancel: &CancelToken,
    ) -> RecallResult<Vec<Memory>>;

    fn memory_by_id(
        &self,
        user_id: &str,
        memory_id: &str,
        cancel: &CancelToken,
    ) -> RecallResult<Option<Memory>>;
}
