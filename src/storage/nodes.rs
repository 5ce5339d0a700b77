use crate::node::{KnowledgeNode, NodeType};
use crate::processing::text::contains_folded;
use crate::storage::{embedding_from_blob, embedding_to_blob, in_chunks, placeholders, text_values};
use crate::time_utils;
use crate::{RecallError, RecallResult};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

pub struct NodeStorage;

// ── Row mapping ──

/// `None` when the stored type string is not a known node type.
fn node_from_row(row: &Row) -> rusqlite::Result<Option<KnowledgeNode>> {
    let id: String = row.get("id")?;
    let type_str: String = row.get("node_type")?;
    let node_type = match type_str.parse::<NodeType>() {
        Ok(t) => t,
        Err(e) => {
            tracing::warn!(node_id = %id, error = %e, "Skipping node with unknown type");
            return Ok(None);
        }
    };
    let metadata_json: String = row.get("metadata")?;
    let embedding_blob: Option<Vec<u8>> = row.get("embedding")?;
    let created_str: String = row.get("created_at")?;
    let updated_str: String = row.get("updated_at")?;

    Ok(Some(KnowledgeNode {
        id,
        user_id: row.get("user_id")?,
        node_type,
        name: row.get("name")?,
        description: row.get("description")?,
        embedding: embedding_blob.map(|b| embedding_from_blob(&b)),
        metadata: serde_json::from_str(&metadata_json).unwrap_or_default(),
        importance_score: row.get("importance_score")?,
        access_count: row.get::<_, u32>("access_count")?,
        created_at: time_utils::from_sqlite(&created_str).unwrap_or_else(|_| chrono::Utc::now()),
        updated_at: time_utils::from_sqlite(&updated_str).unwrap_or_else(|_| chrono::Utc::now()),
    }))
}

fn type_values(types: &[NodeType]) -> Vec<Value> {
    types.iter().map(|t| Value::Text(t.as_str().to_string())).collect()
}

impl NodeStorage {
    pub fn insert(conn: &Connection, node: &KnowledgeNode) -> RecallResult<()> {
        conn.execute(
            "INSERT INTO knowledge_nodes (
                id, user_id, node_type, name, description, embedding, metadata,
                importance_score, access_count, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                node.id,
                node.user_id,
                node.node_type.as_str(),
                node.name,
                node.description,
                node.embedding.as_deref().map(embedding_to_blob),
                serde_json::to_string(&node.metadata).unwrap_or_else(|_| "{}".into()),
                node.importance_score,
                node.access_count,
                time_utils::to_sqlite(&node.created_at),
                time_utils::to_sqlite(&node.updated_at),
            ],
        )
        .map_err(|e| RecallError::Storage(format!("Insert node failed: {}", e)))?;

        tracing::debug!(node_id = %node.id, node_type = %node.node_type, name = %node.name, "Node inserted");
        Ok(())
    }

    pub fn get(conn: &Connection, id: &str) -> RecallResult<Option<KnowledgeNode>> {
        let mut stmt = conn.prepare("SELECT * FROM knowledge_nodes WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], node_from_row)?;
        match rows.next() {
            Some(row) => Ok(row?),
            None => Ok(None),
        }
    }

    /// Nodes of a user that carry an embedding, optionally restricted by type.
    pub fn list_with_embedding(
        conn: &Connection,
        user_id: &str,
        node_types: Option<&[NodeType]>,
    ) -> RecallResult<Vec<KnowledgeNode>> {
        let mut sql = String::from(
            "SELECT * FROM knowledge_nodes WHERE user_id = ?1 AND embedding IS NOT NULL",
        );
        let mut values = vec![Value::Text(user_id.to_string())];
        if let Some(types) = node_types.filter(|t| !t.is_empty()) {
            sql.push_str(&format!(" AND node_type IN ({})", placeholders(2, types.len())));
            values.extend(type_values(types));
        }
        Self::query(conn, &sql, values)
    }

    /// Case-insensitive substring match on the node name. Folding happens
    /// in Rust so non-ASCII names match too.
    pub fn list_by_name(
        conn: &Connection,
        user_id: &str,
        pattern: &str,
        node_types: Option<&[NodeType]>,
    ) -> RecallResult<Vec<KnowledgeNode>> {
        let mut sql = String::from("SELECT * FROM knowledge_nodes WHERE user_id = ?1");
        let mut values = vec![Value::Text(user_id.to_string())];
        if let Some(types) = node_types.filter(|t| !t.is_empty()) {
            sql.push_str(&format!(" AND node_type IN ({})", placeholders(2, types.len())));
            values.extend(type_values(types));
        }
        let mut nodes = Self::query(conn, &sql, values)?;
        nodes.retain(|n| contains_folded(&n.name, pattern));
        Ok(nodes)
    }

    pub fn list_by_ids(conn: &Connection, ids: &[String]) -> RecallResult<Vec<KnowledgeNode>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        in_chunks(ids, |chunk| {
            let sql = format!(
                "SELECT * FROM knowledge_nodes WHERE id IN ({})",
                placeholders(1, chunk.len())
            );
            Self::query(conn, &sql, text_values(chunk))
        })
    }

    /// accessCount += 1 and importance recomputed in one statement.
    /// Returns false when the node does not exist.
    pub fn record_access(conn: &Connection, id: &str) -> RecallResult<bool> {
        let changed = conn
            .execute(
                "UPDATE knowledge_nodes SET
                    access_count = access_count + 1,
                    importance_score = MIN(1.0, 0.5 + (access_count + 1) / 100.0)
                 WHERE id = ?1",
                params![id],
            )
            .map_err(|e| RecallError::Storage(format!("Record node access failed: {}", e)))?;
        Ok(changed > 0)
    }

    pub fn count(conn: &Connection, user_id: &str) -> RecallResult<usize> {
        let c: usize = conn
            .query_row(
                "SELECT COUNT(*) FROM knowledge_nodes WHERE user_id = ?1",
                params![user_id],
                |r| r.get(0),
            )
            .map_err(|e| RecallError::Storage(e.to_string()))?;
        Ok(c)
    }

    fn query(conn: &Connection, sql: &str, values: Vec<Value>) -> RecallResult<Vec<KnowledgeNode>> {
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| RecallError::Storage(e.to_string()))?;
        let rows = stmt
            .query_map(params_from_iter(values), node_from_row)
            .map_err(|e| RecallError::Storage(e.to_string()))?;
        let mut nodes = Vec::new();
        for row in rows {
            if let Some(node) = row? {
                nodes.push(node);
            }
        }
        Ok(nodes)
    }
}
