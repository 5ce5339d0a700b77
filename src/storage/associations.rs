use std::cmp::Ordering;

use rusqlite::types::Value;
use rusqlite::{params, Connection, Row};

use crate::memory::{MemoryNodeAssociation, MemoryType};
use crate::storage::graph_store::AssociatedMemory;
use crate::storage::memories::{collect_rows, memory_from_row};
use crate::storage::{in_chunks, placeholders, text_values, MAX_IN_VALUES};
use crate::{RecallError, RecallResult};

pub struct AssociationStorage;

fn association_from_row(row: &Row) -> rusqlite::Result<Option<MemoryNodeAssociation>> {
    Ok(Some(MemoryNodeAssociation {
        memory_id: row.get("memory_id")?,
        node_id: row.get("node_id")?,
        relevance_score: row.get("relevance_score")?,
    }))
}

impl AssociationStorage {
    /// Upsert: a (memory, node) pair keeps one relevance score.
    pub fn insert(conn: &Connection, assoc: &MemoryNodeAssociation) -> RecallResult<()> {
        conn.execute(
            "INSERT INTO memory_node_associations (memory_id, node_id, relevance_score)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(memory_id, node_id) DO UPDATE SET relevance_score = excluded.relevance_score",
            params![
                assoc.memory_id,
                assoc.node_id,
                assoc.relevance_score.clamp(0.0, 1.0)
            ],
        )
        .map_err(|e| RecallError::Storage(format!("Insert association failed: {}", e)))?;
        Ok(())
    }

    pub fn list_for_memory(
        conn: &Connection,
        memory_id: &str,
    ) -> RecallResult<Vec<MemoryNodeAssociation>> {
        collect_rows(
            conn,
            "SELECT * FROM memory_node_associations WHERE memory_id = ?1
             ORDER BY relevance_score DESC, node_id",
            vec![Value::Text(memory_id.to_string())],
            association_from_row,
        )
    }

    pub fn list_for_nodes(
        conn: &Connection,
        node_ids: &[String],
    ) -> RecallResult<Vec<MemoryNodeAssociation>> {
        if node_ids.is_empty() {
            return Ok(vec![]);
        }
        let mut rows = in_chunks(node_ids, |chunk| {
            let sql = format!(
                "SELECT * FROM memory_node_associations WHERE node_id IN ({})
                 ORDER BY relevance_score DESC, memory_id",
                placeholders(1, chunk.len())
            );
            collect_rows(conn, &sql, text_values(chunk), association_from_row)
        })?;
        if node_ids.len() > MAX_IN_VALUES {
            rows.sort_by(|a, b| {
                b.relevance_score
                    .partial_cmp(&a.relevance_score)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| a.memory_id.cmp(&b.memory_id))
            });
        }
        Ok(rows)
    }

    /// Join of associations and memories for a node set.
    /// One row per (memory, node) pair, ordered by relevance descending,
    /// then memory creation descending.
    pub fn memories_for_nodes(
        conn: &Connection,
        user_id: &str,
        node_ids: &[String],
        memory_type: Option<MemoryType>,
    ) -> RecallResult<Vec<AssociatedMemory>> {
        if node_ids.is_empty() {
            return Ok(vec![]);
        }
        let mut rows = in_chunks(node_ids, |chunk| {
            Self::memories_for_chunk(conn, user_id, chunk, memory_type)
        })?;
        if node_ids.len() > MAX_IN_VALUES {
            rows.sort_by(|a, b| {
                b.relevance_score
                    .partial_cmp(&a.relevance_score)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| b.memory.created_at.cmp(&a.memory.created_at))
                    .then_with(|| a.memory.id.cmp(&b.memory.id))
            });
        }
        Ok(rows)
    }

    fn memories_for_chunk(
        conn: &Connection,
        user_id: &str,
        node_ids: &[String],
        memory_type: Option<MemoryType>,
    ) -> RecallResult<Vec<AssociatedMemory>> {
        let mut values = vec![Value::Text(user_id.to_string())];
        let mut sql = format!(
            "SELECT m.*, a.node_id AS assoc_node_id, a.relevance_score AS assoc_relevance
             FROM memory_node_associations a
             JOIN memories m ON m.id = a.memory_id
             WHERE m.user_id = ?1 AND a.node_id IN ({})",
            placeholders(2, node_ids.len())
        );
        values.extend(text_values(node_ids));
        if let Some(t) = memory_type {
            sql.push_str(&format!(" AND m.memory_type = ?{}", values.len() + 1));
            values.push(Value::Text(t.as_str().to_string()));
        }
        sql.push_str(" ORDER BY a.relevance_score DESC, m.created_at DESC, m.id ASC");

        collect_rows(conn, &sql, values, |row| {
            let node_id: String = row.get("assoc_node_id")?;
            let relevance_score: f64 = row.get("assoc_relevance")?;
            Ok(memory_from_row(row)?.map(|memory| AssociatedMemory {
                memory,
                node_id,
                relevance_score,
            }))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memories::MemoryStorage;
    use crate::storage::nodes::NodeStorage;
    use crate::test_helpers::{associate, hours_ago, setup_db, MemoryBuilder, NodeBuilder};

    #[test]
    fn test_memories_for_nodes_ordering() {
        let conn = setup_db();
        NodeStorage::insert(&conn, &NodeBuilder::new().id("n1").build()).unwrap();
        NodeStorage::insert(&conn, &NodeBuilder::new().id("n2").build()).unwrap();
        MemoryStorage::insert(&conn, &MemoryBuilder::new().id("old").created_at(hours_ago(5)).build()).unwrap();
        MemoryStorage::insert(&conn, &MemoryBuilder::new().id("new").created_at(hours_ago(1)).build()).unwrap();
        MemoryStorage::insert(&conn, &MemoryBuilder::new().id("top").created_at(hours_ago(9)).build()).unwrap();
        associate(&conn, "old", "n1", 0.5);
        associate(&conn, "new", "n1", 0.5);
        associate(&conn, "top", "n2", 0.9);

        let rows = AssociationStorage::memories_for_nodes(
            &conn,
            "u1",
            &["n1".to_string(), "n2".to_string()],
            None,
        )
        .unwrap();
        let ids: Vec<&str> = rows.iter().map(|r| r.memory.id.as_str()).collect();
        assert_eq!(ids, vec!["top", "new", "old"]);
        assert_eq!(rows[0].node_id, "n2");
    }

    #[test]
    fn test_type_filter_and_user_scope() {
        let conn = setup_db();
        NodeStorage::insert(&conn, &NodeBuilder::new().id("n").build()).unwrap();
        MemoryStorage::insert(&conn, &MemoryBuilder::new().id("task").memory_type(MemoryType::Task).build()).unwrap();
        MemoryStorage::insert(&conn, &MemoryBuilder::new().id("personal").build()).unwrap();
        MemoryStorage::insert(&conn, &MemoryBuilder::new().id("foreign").user("u2").build()).unwrap();
        for m in ["task", "personal", "foreign"] {
            associate(&conn, m, "n", 1.0);
        }

        let tasks = AssociationStorage::memories_for_nodes(&conn, "u1", &["n".to_string()], Some(MemoryType::Task)).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].memory.id, "task");

        let all = AssociationStorage::memories_for_nodes(&conn, "u1", &["n".to_string()], None).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_memories_for_many_nodes_keeps_global_order() {
        let conn = setup_db();
        let node_ids: Vec<String> = (0..700).map(|i| format!("n{i:03}")).collect();
        for id in &node_ids {
            NodeStorage::insert(&conn, &NodeBuilder::new().id(id).build()).unwrap();
        }
        MemoryStorage::insert(&conn, &MemoryBuilder::new().id("early").build()).unwrap();
        MemoryStorage::insert(&conn, &MemoryBuilder::new().id("late").build()).unwrap();
        associate(&conn, "early", "n001", 0.3);
        associate(&conn, "late", "n650", 0.9);

        let rows = AssociationStorage::memories_for_nodes(&conn, "u1", &node_ids, None).unwrap();
        let ids: Vec<&str> = rows.iter().map(|r| r.memory.id.as_str()).collect();
        assert_eq!(ids, vec!["late", "early"]);
    }

    #[test]
    fn test_insert_is_upsert() {
        let conn = setup_db();
        NodeStorage::insert(&conn, &NodeBuilder::new().id("n").build()).unwrap();
        MemoryStorage::insert(&conn, &MemoryBuilder::new().id("m").build()).unwrap();
        associate(&conn, "m", "n", 0.2);
        associate(&conn, "m", "n", 0.8);
        let rows = AssociationStorage::list_for_memory(&conn, "m").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].relevance_score, 0.8);
        assert_eq!(AssociationStorage::list_for_nodes(&conn, &["n".to_string()]).unwrap().len(), 1);
    }
}
