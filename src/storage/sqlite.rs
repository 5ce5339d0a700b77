//! SQLite-backed `GraphStore`.
//!
//! One connection behind a mutex. Vector ordering is computed in process
//! over the user's embedded rows; everything else is pushed down to SQL.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::cancel::CancelToken;
use crate::edge::{EdgeType, KnowledgeEdge};
use crate::memory::{Memory, MemoryNodeAssociation, MemoryType};
use crate::node::{KnowledgeNode, NodeType};
use crate::processing::embeddings::cosine_distance;
use crate::storage::associations::AssociationStorage;
use crate::storage::edges::EdgeStorage;
use crate::storage::graph_store::{AssociatedMemory, GraphStore};
use crate::storage::memories::MemoryStorage;
use crate::storage::nodes::NodeStorage;
use crate::storage::{database, migrations};
use crate::{RecallError, RecallResult};

pub struct SqliteGraphStore {
    conn: Mutex<Connection>,
}

impl SqliteGraphStore {
    /// Open (creating if needed) and migrate the database at `path`.
    pub fn open(path: &Path) -> RecallResult<Self> {
        let conn = database::open_connection(path)?;
        migrations::migrate_recall_db(&conn)?;
        tracing::info!(path = %path.display(), "Graph store opened");
        Ok(Self::from_connection(conn))
    }

    /// Fresh migrated in-memory store.
    pub fn open_in_memory() -> RecallResult<Self> {
        let conn = database::open_in_memory()?;
        migrations::migrate_recall_db(&conn)?;
        Ok(Self::from_connection(conn))
    }

    /// Wrap an already migrated connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn: Mutex::new(conn) }
    }

    /// Direct access for writers (importer, tests).
    pub fn lock(&self) -> RecallResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RecallError::Storage(format!("Connection lock poisoned: {}", e)))
    }

    fn with_conn<T>(
        &self,
        cancel: &CancelToken,
        f: impl FnOnce(&Connection) -> RecallResult<T>,
    ) -> RecallResult<T> {
        cancel.check()?;
        let conn = self.lock()?;
        f(&conn)
    }
}

/// Pair each item with its cosine distance to `query`, ascending, ties by id.
/// Items whose embedding has a different dimension are dropped.
fn rank_by_distance<T>(
    items: Vec<T>,
    query: &[f32],
    embedding: impl Fn(&T) -> Option<&[f32]>,
    id: impl Fn(&T) -> &str,
) -> Vec<(T, f64)> {
    let mut ranked: Vec<(T, f64)> = items
        .into_iter()
        .filter_map(|item| {
            let d = match embedding(&item) {
                Some(e) if e.len() == query.len() => cosine_distance(query, e),
                Some(e) => {
                    tracing::debug!(id = id(&item), dim = e.len(), expected = query.len(), "Embedding dimension mismatch, skipping");
                    return None;
                }
                None => return None,
            };
            Some((item, d))
        })
        .collect();
    ranked.sort_by(|a, b| {
        a.1.partial_cmp(&b.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| id(&a.0).cmp(id(&b.0)))
    });
    ranked
}

impl GraphStore for SqliteGraphStore {
    fn nodes_by_distance(
        &self,
        user_id: &str,
        query: &[f32],
        node_types: Option<&[NodeType]>,
        cancel: &CancelToken,
    ) -> RecallResult<Vec<(KnowledgeNode, f64)>> {
        let nodes = self.with_conn(cancel, |c| NodeStorage::list_with_embedding(c, user_id, node_types))?;
        Ok(rank_by_distance(
            nodes,
            query,
            |n| n.embedding.as_deref(),
            |n| n.id.as_str(),
        ))
    }

    fn nodes_by_name(
        &self,
        user_id: &str,
        pattern: &str,
        node_types: Option<&[NodeType]>,
        cancel: &CancelToken,
    ) -> RecallResult<Vec<KnowledgeNode>> {
        self.with_conn(cancel, |c| NodeStorage::list_by_name(c, user_id, pattern, node_types))
    }

    fn nodes_by_ids(&self, ids: &[String], cancel: &CancelToken) -> RecallResult<Vec<KnowledgeNode>> {
        self.with_conn(cancel, |c| NodeStorage::list_by_ids(c, ids))
    }

    fn record_node_access(&self, node_id: &str, cancel: &CancelToken) -> RecallResult<()> {
        let found = self.with_conn(cancel, |c| NodeStorage::record_access(c, node_id))?;
        if !found {
            tracing::warn!(node_id = %node_id, "Access recorded for missing node");
        }
        Ok(())
    }

    fn edges_from(
        &self,
        source_ids: &[String],
        edge_types: Option<&[EdgeType]>,
        cancel: &CancelToken,
    ) -> RecallResult<Vec<KnowledgeEdge>> {
        self.with_conn(cancel, |c| EdgeStorage::list_from(c, source_ids, edge_types))
    }

    fn associations_for_nodes(
        &self,
        node_ids: &[String],
        cancel: &CancelToken,
    ) -> RecallResult<Vec<MemoryNodeAssociation>> {
        self.with_conn(cancel, |c| AssociationStorage::list_for_nodes(c, node_ids))
    }

    fn associations_for_memory(
        &self,
        memory_id: &str,
        cancel: &CancelToken,
    ) -> RecallResult<Vec<MemoryNodeAssociation>> {
        self.with_conn(cancel, |c| AssociationStorage::list_for_memory(c, memory_id))
    }

    fn memories_for_nodes(
        &self,
        user_id: &str,
        node_ids: &[String],
        memory_type: Option<MemoryType>,
        cancel: &CancelToken,
    ) -> RecallResult<Vec<AssociatedMemory>> {
        self.with_conn(cancel, |c| {
            AssociationStorage::memories_for_nodes(c, user_id, node_ids, memory_type)
        })
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
        let memories = self.with_conn(cancel, |c| {
            MemoryStorage::list_with_embedding(c, user_id, memory_type, candidates)
        })?;
        let mut ranked = rank_by_distance(
            memories,
            query,
            |m| m.embedding.as_deref(),
            |m| m.id.as_str(),
        );
        ranked.truncate(limit);
        Ok(ranked)
    }

    fn memories_full_text(
        &self,
        user_id: &str,
        fts_query: &str,
        memory_type: Option<MemoryType>,
        limit: usize,
        cancel: &CancelToken,
    ) -> RecallResult<Vec<(Memory, f64)>> {
        self.with_conn(cancel, |c| {
            MemoryStorage::search_full_text(c, user_id, fts_query, memory_type, Some(limit))
        })
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
        self.with_conn(cancel, |c| {
            MemoryStorage::list_in_window(c, user_id, start, end, memory_type, Some(limit))
        })
    }

    fn memories_with_categories(
        &self,
        user_id: &str,
        categories: &[String],
        memory_type: Option<MemoryType>,
        cancel: &CancelToken,
    ) -> RecallResult<Vec<Memory>> {
        self.with_conn(cancel, |c| {
            MemoryStorage::list_with_any_category(c, user_id, categories, memory_type)
        })
    }

    fn memory_by_id(
        &self,
        user_id: &str,
        memory_id: &str,
        cancel: &CancelToken,
    ) -> RecallResult<Option<Memory>> {
        self.with_conn(cancel, |c| MemoryStorage::get(c, user_id, memory_id))
    }
}
