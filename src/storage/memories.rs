use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

use crate::memory::{Memory, MemoryMetadata, MemoryType};
use crate::storage::{embedding_from_blob, embedding_to_blob, in_chunks, placeholders, text_values};
use crate::time_utils;
use crate::{RecallError, RecallResult};

pub struct MemoryStorage;

// ── Row mapping ──

/// `None` when the stored memory type is not recognised.
pub(crate) fn memory_from_row(row: &Row) -> rusqlite::Result<Option<Memory>> {
    let id: String = row.get("id")?;
    let type_str: String = row.get("memory_type")?;
    let memory_type = match type_str.parse::<MemoryType>() {
        Ok(t) => t,
        Err(e) => {
            tracing::warn!(memory_id = %id, error = %e, "Skipping memory with unknown type");
            return Ok(None);
        }
    };
    let metadata_json: String = row.get("metadata")?;
    let embedding_blob: Option<Vec<u8>> = row.get("embedding")?;
    let created_str: String = row.get("created_at")?;
    let accessed_str: String = row.get("accessed_at")?;

    Ok(Some(Memory {
        id,
        user_id: row.get("user_id")?,
        memory_type,
        content: row.get("content")?,
        embedding: embedding_blob.map(|b| embedding_from_blob(&b)),
        metadata: serde_json::from_str::<MemoryMetadata>(&metadata_json).unwrap_or_default(),
        created_at: time_utils::from_sqlite(&created_str).unwrap_or_else(|_| chrono::Utc::now()),
        accessed_at: time_utils::from_sqlite(&accessed_str).unwrap_or_else(|_| chrono::Utc::now()),
    }))
}

/// Runs `sql` and maps every row through `f`, dropping `None`s.
pub(crate) fn collect_rows<T, F>(
    conn: &Connection,
    sql: &str,
    values: Vec<Value>,
    f: F,
) -> RecallResult<Vec<T>>
where
    F: FnMut(&Row) -> rusqlite::Result<Option<T>>,
{
    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| RecallError::Storage(e.to_string()))?;
    let rows = stmt
        .query_map(params_from_iter(values), f)
        .map_err(|e| RecallError::Storage(e.to_string()))?;
    let mut out = Vec::new();
    for row in rows {
        if let Some(item) = row? {
            out.push(item);
        }
    }
    Ok(out)
}

/// `WHERE user_id = ?1 [AND memory_type = ?2]` and its values.
fn user_scope(user_id: &str, memory_type: Option<MemoryType>) -> (String, Vec<Value>) {
    let mut clause = String::from("m.user_id = ?1");
    let mut values = vec![Value::Text(user_id.to_string())];
    if let Some(t) = memory_type {
        clause.push_str(" AND m.memory_type = ?2");
        values.push(Value::Text(t.as_str().to_string()));
    }
    (clause, values)
}

fn limit_clause(limit: Option<usize>) -> String {
    limit.map(|l| format!(" LIMIT {}", l)).unwrap_or_default()
}

impl MemoryStorage {
    pub fn insert(conn: &Connection, memory: &Memory) -> RecallResult<()> {
        conn.execute(
            "INSERT INTO memories (
                id, user_id, memory_type, content, embedding, metadata, created_at, accessed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                memory.id,
                memory.user_id,
                memory.memory_type.as_str(),
                memory.content,
                memory.embedding.as_deref().map(embedding_to_blob),
                serde_json::to_string(&memory.metadata).unwrap_or_else(|_| "{}".into()),
                time_utils::to_sqlite(&memory.created_at),
                time_utils::to_sqlite(&memory.accessed_at),
            ],
        )
        .map_err(|e| RecallError::Storage(format!("Insert memory failed: {}", e)))?;

        tracing::debug!(memory_id = %memory.id, memory_type = %memory.memory_type, "Memory inserted");
        Ok(())
    }

    pub fn get(conn: &Connection, user_id: &str, id: &str) -> RecallResult<Option<Memory>> {
        let mut found = collect_rows(
            conn,
            "SELECT * FROM memories WHERE user_id = ?1 AND id = ?2",
            vec![Value::Text(user_id.to_string()), Value::Text(id.to_string())],
            memory_from_row,
        )?;
        Ok(found.pop())
    }

    /// Memories carrying an embedding. `candidates` restricts to an id set
    /// (an empty set yields nothing).
    pub fn list_with_embedding(
        conn: &Connection,
        user_id: &str,
        memory_type: Option<MemoryType>,
        candidates: Option<&[String]>,
    ) -> RecallResult<Vec<Memory>> {
        let (scope, values) = user_scope(user_id, memory_type);
        let sql = format!(
            "SELECT m.* FROM memories m WHERE {} AND m.embedding IS NOT NULL",
            scope
        );
        let Some(ids) = candidates else {
            return collect_rows(conn, &sql, values, memory_from_row);
        };
        if ids.is_empty() {
            return Ok(vec![]);
        }
        in_chunks(ids, |chunk| {
            let chunk_sql = format!(
                "{} AND m.id IN ({})",
                sql,
                placeholders(values.len() + 1, chunk.len())
            );
            let mut chunk_values = values.clone();
            chunk_values.extend(text_values(chunk));
            collect_rows(conn, &chunk_sql, chunk_values, memory_from_row)
        })
    }

    /// FTS5 match over content. Score is `-bm25` (higher is better),
    /// ordered descending then by id.
    pub fn search_full_text(
        conn: &Connection,
        user_id: &str,
        fts_query: &str,
        memory_type: Option<MemoryType>,
        limit: Option<usize>,
    ) -> RecallResult<Vec<(Memory, f64)>> {
        let (scope, mut values) = user_scope(user_id, memory_type);
        let match_idx = values.len() + 1;
        values.push(Value::Text(fts_query.to_string()));
        let sql = format!(
            "SELECT m.*, -bm25(memories_fts) AS text_rank
             FROM memories_fts
             JOIN memories m ON m.rowid = memories_fts.rowid
             WHERE memories_fts MATCH ?{} AND {}
             ORDER BY text_rank DESC, m.id ASC{}",
            match_idx,
            scope,
            limit_clause(limit)
        );
        collect_rows(conn, &sql, values, |row| {
            let rank: f64 = row.get("text_rank")?;
            Ok(memory_from_row(row)?.map(|m| (m, rank)))
        })
    }

    /// Memories created within `[start, end]`, newest first.
    pub fn list_in_window(
        conn: &Connection,
        user_id: &str,
        start: &DateTime<Utc>,
        end: &DateTime<Utc>,
        memory_type: Option<MemoryType>,
        limit: Option<usize>,
    ) -> RecallResult<Vec<Memory>> {
        let (scope, mut values) = user_scope(user_id, memory_type);
        let start_idx = values.len() + 1;
        values.push(Value::Text(time_utils::to_sqlite(start)));
        values.push(Value::Text(time_utils::to_sqlite(end)));
        let sql = format!(
            "SELECT m.* FROM memories m
             WHERE {} AND m.created_at >= ?{} AND m.created_at <= ?{}
             ORDER BY m.created_at DESC, m.id ASC{}",
            scope,
            start_idx,
            start_idx + 1,
            limit_clause(limit)
        );
        collect_rows(conn, &sql, values, memory_from_row)
    }

    /// Memories whose `categories` metadata shares at least one entry with
    /// `categories` (case-insensitive, Unicode fold), newest first.
    ///
    /// SQL only narrows to memories that carry categories; the comparison
    /// itself runs through [`MemoryMetadata::has_category`].
    pub fn list_with_any_category(
        conn: &Connection,
        user_id: &str,
        categories: &[String],
        memory_type: Option<MemoryType>,
    ) -> RecallResult<Vec<Memory>> {
        if categories.is_empty() {
            return Ok(vec![]);
        }
        let (scope, values) = user_scope(user_id, memory_type);
        let sql = format!(
            "SELECT m.* FROM memories m
             WHERE {} AND json_array_length(m.metadata, '$.categories') > 0
             ORDER BY m.created_at DESC, m.id ASC",
            scope
        );
        let mut found = collect_rows(conn, &sql, values, memory_from_row)?;
        found.retain(|m| categories.iter().any(|c| m.metadata.has_category(c)));
        Ok(found)
    }

    pub fn count(conn: &Connection, user_id: &str) -> RecallResult<usize> {
        let c: usize = conn
            .query_row(
                "SELECT COUNT(*) FROM memories WHERE user_id = ?1",
                params![user_id],
                |r| r.get(0),
            )
            .map_err(|e| RecallError::Storage(e.to_string()))?;
        Ok(c)
    }
}
