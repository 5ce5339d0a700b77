use crate::edge::{EdgeType, KnowledgeEdge};
use crate::storage::{in_chunks, placeholders, text_values};
use crate::time_utils;
use crate::{RecallError, RecallResult};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

pub struct EdgeStorage;

fn edge_from_row(row: &Row) -> rusqlite::Result<Option<KnowledgeEdge>> {
    let id: String = row.get("id")?;
    let type_str: String = row.get("edge_type")?;
    let edge_type = match type_str.parse::<EdgeType>() {
        Ok(t) => t,
        Err(e) => {
            tracing::warn!(edge_id = %id, error = %e, "Skipping edge with unknown type");
            return Ok(None);
        }
    };
    let metadata_json: String = row.get("metadata")?;
    let created_str: String = row.get("created_at")?;

    Ok(Some(KnowledgeEdge {
        id,
        user_id: row.get("user_id")?,
        source_id: row.get("source_id")?,
        target_id: row.get("target_id")?,
        edge_type,
        weight: row.get("weight")?,
        metadata: serde_json::from_str(&metadata_json).unwrap_or_default(),
        created_at: time_utils::from_sqlite(&created_str).unwrap_or_else(|_| chrono::Utc::now()),
    }))
}

impl EdgeStorage {
    /// Both endpoints must exist and belong to the edge's user.
    pub fn insert(conn: &Connection, edge: &KnowledgeEdge) -> RecallResult<()> {
        let expected: i64 = if edge.source_id == edge.target_id { 1 } else { 2 };
        let owned: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM knowledge_nodes WHERE id IN (?1, ?2) AND user_id = ?3",
                params![edge.source_id, edge.target_id, edge.user_id],
                |r| r.get(0),
            )
            .map_err(|e| RecallError::Storage(e.to_string()))?;
        if owned != expected {
            return Err(RecallError::InvalidInput(format!(
                "Edge {} endpoints must both belong to user {}",
                edge.id, edge.user_id
            )));
        }

        conn.execute(
            "INSERT INTO knowledge_edges (
                id, user_id, source_id, target_id, edge_type, weight, metadata, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                edge.id,
                edge.user_id,
                edge.source_id,
                edge.target_id,
                edge.edge_type.as_str(),
                edge.weight.clamp(0.0, 1.0),
                serde_json::to_string(&edge.metadata).unwrap_or_else(|_| "{}".into()),
                time_utils::to_sqlite(&edge.created_at),
            ],
        )
        .map_err(|e| RecallError::Storage(format!("Insert edge failed: {}", e)))?;

        tracing::debug!(
            edge_id = %edge.id,
            source = %edge.source_id,
            target = %edge.target_id,
            edge_type = %edge.edge_type,
            "Edge inserted"
        );
        Ok(())
    }

    /// Outgoing edges of `source_ids`, optionally restricted to `edge_types`.
    /// Ordered by source, then weight descending.
    pub fn list_from(
        conn: &Connection,
        source_ids: &[String],
        edge_types: Option<&[EdgeType]>,
    ) -> RecallResult<Vec<KnowledgeEdge>> {
        if source_ids.is_empty() {
            return Ok(vec![]);
        }
        let mut edges = in_chunks(source_ids, |chunk| Self::list_from_chunk(conn, chunk, edge_types))?;
        if source_ids.len() > super::MAX_IN_VALUES {
            edges.sort_by(|a, b| {
                a.source_id
                    .cmp(&b.source_id)
                    .then_with(|| b.weight.partial_cmp(&a.weight).unwrap_or(std::cmp::Ordering::Equal))
                    .then_with(|| a.id.cmp(&b.id))
            });
        }
        Ok(edges)
    }

    fn list_from_chunk(
        conn: &Connection,
        source_ids: &[String],
        edge_types: Option<&[EdgeType]>,
    ) -> RecallResult<Vec<KnowledgeEdge>> {
        let mut sql = format!(
            "SELECT * FROM knowledge_edges WHERE source_id IN ({})",
            placeholders(1, source_ids.len())
        );
        let mut values = text_values(source_ids);
        if let Some(types) = edge_types.filter(|t| !t.is_empty()) {
            sql.push_str(&format!(
                " AND edge_type IN ({})",
                placeholders(source_ids.len() + 1, types.len())
            ));
            values.extend(types.iter().map(|t| Value::Text(t.as_str().to_string())));
        }
        sql.push_str(" ORDER BY source_id, weight DESC, id");

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| RecallError::Storage(e.to_string()))?;
        let rows = stmt
            .query_map(params_from_iter(values), edge_from_row)
            .map_err(|e| RecallError::Storage(e.to_string()))?;
        let mut edges = Vec::new();
        for row in rows {
            if let Some(edge) = row? {
                edges.push(edge);
            }
        }
        Ok(edges)
    }

    pub fn count(conn: &Connection, user_id: &str) -> RecallResult<usize> {
        let c: usize = conn
            .query_row(
                "SELECT COUNT(*) FROM knowledge_edges WHERE user_id = ?1",
                params![user_id],
                |r| r.get(0),
            )
            .map_err(|e| RecallError::Storage(e.to_string()))?;
        Ok(c)
    }
}
