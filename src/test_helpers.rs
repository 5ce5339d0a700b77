//! Shared test utilities — builders, DB setup, fake collaborators.
//!
//! Available only under `#[cfg(test)]`.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;

use crate::cancel::CancelToken;
use crate::edge::{EdgeType, KnowledgeEdge};
use crate::memory::{Memory, MemoryMetadata, MemoryNodeAssociation, MemoryRelation, MemoryType};
use crate::node::{KnowledgeNode, NodeType};
use crate::processing::classifier::{Classification, ClassificationParams, QueryClassifier};
use crate::processing::embeddings::Embedder;
use crate::retrieval::StrategyKind;
use crate::storage::associations::AssociationStorage;
use crate::storage::{AssociatedMemory, GraphStore, SqliteGraphStore};
use crate::{RecallError, RecallResult};

const TEST_USER: &str = "u1";

// ============================================================================
// Database
// ============================================================================

/// Migrated in-memory connection.
pub fn setup_db() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
    crate::storage::migrations::migrate_recall_db(&conn).unwrap();
    conn
}

/// Migrated in-memory graph store.
pub fn setup_store() -> Arc<SqliteGraphStore> {
    Arc::new(SqliteGraphStore::from_connection(setup_db()))
}

pub fn hours_ago(hours: i64) -> DateTime<Utc> {
    Utc::now() - Duration::hours(hours)
}

pub fn associate(conn: &Connection, memory_id: &str, node_id: &str, relevance: f64) {
    AssociationStorage::insert(
        conn,
        &MemoryNodeAssociation {
            memory_id: memory_id.to_string(),
            node_id: node_id.to_string(),
            relevance_score: relevance,
        },
    )
    .unwrap();
}

// ============================================================================
// NodeBuilder
// ============================================================================

pub struct NodeBuilder {
    node: KnowledgeNode,
}

impl NodeBuilder {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            node: KnowledgeNode {
                id: uuid::Uuid::new_v4().to_string(),
                user_id: TEST_USER.to_string(),
                node_type: NodeType::Topic,
                name: "Test node".to_string(),
                description: None,
                embedding: None,
                metadata: serde_json::Map::new(),
                importance_score: 0.5,
                access_count: 0,
                created_at: now,
                updated_at: now,
            },
        }
    }

    pub fn id(mut self, id: &str) -> Self {
        self.node.id = id.to_string();
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        self.node.name = name.to_string();
        self
    }

    pub fn user(mut self, user_id: &str) -> Self {
        self.node.user_id = user_id.to_string();
        self
    }

    pub fn node_type(mut self, t: NodeType) -> Self {
        self.node.node_type = t;
        self
    }

    pub fn embedding(mut self, v: Vec<f32>) -> Self {
        self.node.embedding = Some(v);
        self
    }

    pub fn importance(mut self, score: f64) -> Self {
        self.node.importance_score = score;
        self
    }

    pub fn access_count(mut self, count: u32) -> Self {
        self.node.access_count = count;
        self
    }

    pub fn build(self) -> KnowledgeNode {
        self.node
    }
}

// ============================================================================
// EdgeBuilder
// ============================================================================

pub struct EdgeBuilder {
    edge: KnowledgeEdge,
}

impl EdgeBuilder {
    pub fn new(source_id: &str, target_id: &str) -> Self {
        Self {
            edge: KnowledgeEdge {
                id: uuid::Uuid::new_v4().to_string(),
                user_id: TEST_USER.to_string(),
                source_id: source_id.to_string(),
                target_id: target_id.to_string(),
                edge_type: EdgeType::RelatedTo,
                weight: 1.0,
                metadata: serde_json::Map::new(),
                created_at: Utc::now(),
            },
        }
    }

    pub fn weight(mut self, w: f64) -> Self {
        self.edge.weight = w;
        self
    }

    pub fn edge_type(mut self, t: EdgeType) -> Self {
        self.edge.edge_type = t;
        self
    }

    pub fn user(mut self, user_id: &str) -> Self {
        self.edge.user_id = user_id.to_string();
        self
    }

    pub fn build(self) -> KnowledgeEdge {
        self.edge
    }
}

// ============================================================================
// MemoryBuilder
// ============================================================================

pub struct MemoryBuilder {
    memory: Memory,
}

impl MemoryBuilder {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            memory: Memory {
                id: uuid::Uuid::new_v4().to_string(),
                user_id: TEST_USER.to_string(),
                memory_type: MemoryType::Personal,
                content: "Test memory".to_string(),
                embedding: None,
                metadata: MemoryMetadata::default(),
                created_at: now,
                accessed_at: now,
            },
        }
    }

    pub fn id(mut self, id: &str) -> Self {
        self.memory.id = id.to_string();
        self
    }

    pub fn content(mut self, c: &str) -> Self {
        self.memory.content = c.to_string();
        self
    }

    pub fn user(mut self, user_id: &str) -> Self {
        self.memory.user_id = user_id.to_string();
        self
    }

    pub fn memory_type(mut self, t: MemoryType) -> Self {
        self.memory.memory_type = t;
        self
    }

    pub fn embedding(mut self, v: Vec<f32>) -> Self {
        self.memory.embedding = Some(v);
        self
    }

    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.memory.created_at = at;
        self.memory.accessed_at = at;
        self
    }

    pub fn categories(mut self, cats: &[&str]) -> Self {
        self.memory.metadata.categories = cats.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Relationship links to other memories, without a relation label.
    pub fn related(mut self, ids: &[&str]) -> Self {
        self.memory.metadata.relationships = ids
            .iter()
            .map(|id| MemoryRelation {
                memory_id: id.to_string(),
                relation: None,
            })
            .collect();
        self
    }

    pub fn metadata_value(mut self, key: &str, value: serde_json::Value) -> Self {
        self.memory.metadata.extra.insert(key.to_string(), value);
        self
    }

    pub fn build(self) -> Memory {
        self.memory
    }
}

// ============================================================================
// Fake collaborators
// ============================================================================

/// Returns the same vector for every text.
pub struct FixedEmbedder {
    vector: Vec<f32>,
}

impl FixedEmbedder {
    pub fn new(vector: Vec<f32>) -> Self {
        Self { vector }
    }
}

impl Embedder for FixedEmbedder {
    fn embed(&self, _text: &str, cancel: &CancelToken) -> RecallResult<Vec<f32>> {
        cancel.check()?;
        Ok(self.vector.clone())
    }

    fn dimension(&self) -> usize {
        self.vector.len()
    }
}

/// Always fails with an embedding error (after honouring cancellation).
pub struct FailingEmbedder {
    dim: usize,
}

impl FailingEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

impl Embedder for FailingEmbedder {
    fn embed(&self, _text: &str, cancel: &CancelToken) -> RecallResult<Vec<f32>> {
        cancel.check()?;
        Err(RecallError::Embedding("embedding provider unavailable".into()))
    }

    fn dimension(&self) -> usize {
        self.dim
    }
}

/// Returns a canned classification. Tweak `classification.params` to add
/// suggested parameters.
pub struct FixedClassifier {
    pub classification: Classification,
}

impl FixedClassifier {
    pub fn new(strategy: StrategyKind, confidence: f64) -> Self {
        Self {
            classification: Classification {
                strategy,
                confidence,
                explanation: format!("test classifier picked {}", strategy),
                params: ClassificationParams::default(),
            },
        }
    }
}

impl QueryClassifier for FixedClassifier {
    fn classify(&self, _query: &str, cancel: &CancelToken) -> RecallResult<Classification> {
        cancel.check()?;
        Ok(self.classification.clone())
    }
}

pub struct FailingClassifier;

impl QueryClassifier for FailingClassifier {
    fn classify(&self, _query: &str, cancel: &CancelToken) -> RecallResult<Classification> {
        cancel.check()?;
        Err(RecallError::Classifier("classifier unavailable".into()))
    }
}

/// Store operation that [`OutageStore`] fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutage {
    /// Vector ranking: breaks hierarchical search only.
    MemoriesByDistance,
    /// Edge traversal: breaks graph-guided expansion only.
    EdgesFrom,
}

/// Delegates to a real store except for one operation, which fails with a
/// storage error.
pub struct OutageStore {
    inner: Arc<SqliteGraphStore>,
    outage: StoreOutage,
}

impl OutageStore {
    pub fn new(inner: Arc<SqliteGraphStore>, outage: StoreOutage) -> Self {
        Self { inner, outage }
    }

    fn fail_if(&self, op: StoreOutage) -> RecallResult<()> {
        if self.outage == op {
            return Err(RecallError::Storage(format!("{:?} unavailable", op)));
        }
        Ok(())
    }
}

impl GraphStore for OutageStore {
    fn nodes_by_distance(
        &self,
        user_id: &str,
        query: &[f32],
        node_types: Option<&[NodeType]>,
        cancel: &CancelToken,
    ) -> RecallResult<Vec<(KnowledgeNode, f64)>> {
        self.inner.nodes_by_distance(user_id, query, node_types, cancel)
    }

    fn nodes_by_name(
        &self,
        user_id: &str,
        pattern: &str,
        node_types: Option<&[NodeType]>,
        cancel: &CancelToken,
    ) -> RecallResult<Vec<KnowledgeNode>> {
        self.inner.nodes_by_name(user_id, pattern, node_types, cancel)
    }

    fn nodes_by_ids(&self, ids: &[String], cancel: &CancelToken) -> RecallResult<Vec<KnowledgeNode>> {
        self.inner.nodes_by_ids(ids, cancel)
    }

    fn record_node_access(&self, node_id: &str, cancel: &CancelToken) -> RecallResult<()> {
        self.inner.record_node_access(node_id, cancel)
    }

    fn edges_from(
        &self,
        source_ids: &[String],
        edge_types: Option<&[EdgeType]>,
        cancel: &CancelToken,
    ) -> RecallResult<Vec<KnowledgeEdge>> {
        self.fail_if(StoreOutage::EdgesFrom)?;
        self.inner.edges_from(source_ids, edge_types, cancel)
    }

    fn associations_for_nodes(
        &self,
        node_ids: &[String],
        cancel: &CancelToken,
    ) -> RecallResult<Vec<MemoryNodeAssociation>> {
        self.inner.associations_for_nodes(node_ids, cancel)
    }

    fn associations_for_memory(
        &self,
        memory_id: &str,
        cancel: &CancelToken,
    ) -> RecallResult<Vec<MemoryNodeAssociation>> {
        self.inner.associations_for_memory(memory_id, cancel)
    }

    fn memories_for_nodes(
        &self,
        user_id: &str,
        node_ids: &[String],
        memory_type: Option<MemoryType>,
        cancel: &CancelToken,
    ) -> RecallResult<Vec<AssociatedMemory>> {
        self.inner.memories_for_nodes(user_id, node_ids, memory_type, cancel)
    }

    fn memories_by_distance(
        &self,
        user_id: &str,
        query: &[f32],
        memory_type: Option<MemoryType>,
        candidates: Option<&[String]>,
        limit: usize,
        cancel: &CancelToken,
    ) -> RecallResult<Vec<(Memory, f64)>> {
        self.fail_if(StoreOutage::MemoriesByDistance)?;
        self.inner
            .memories_by_distance(user_id, query, memory_type, candidates, limit, cancel)
    }

    fn memories_full_text(
        &self,
        user_id: &str,
        fts_query: &str,
        memory_type: Option<MemoryType>,
        limit: usize,
        cancel: &CancelToken,
    ) -> RecallResult<Vec<(Memory, f64)>> {
        self.inner.memories_full_text(user_id, fts_query, memory_type, limit, cancel)
    }

    fn memories_in_window(
        &self,
        user_id: &str,
        start: &DateTime<Utc>,
        end: &DateTime<Utc>,
        memory_type: Option<MemoryType>,
        limit: usize,
        cancel: &CancelToken,
    ) -> RecallResult<Vec<Memory>> {
        self.inner
            .memories_in_window(user_id, start, end, memory_type, limit, cancel)
    }

    fn memories_with_categories(
        &self,
        user_id: &str,
        categories: &[String],
        memory_type: Option<MemoryType>,
        cancel: &CancelToken,
    ) -> RecallResult<Vec<Memory>> {
        self.inner
            .memories_with_categories(user_id, categories, memory_type, cancel)
    }

    fn memory_by_id(
        &self,
        user_id: &str,
        memory_id: &str,
        cancel: &CancelToken,
    ) -> RecallResult<Option<Memory>> {
        self.inner.memory_by_id(user_id, memory_id, cancel)
    }
}
