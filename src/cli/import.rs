use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::{Context, Result};
use graph_recall::edge::KnowledgeEdge;
use graph_recall::memory::{Memory, MemoryNodeAssociation};
use graph_recall::node::KnowledgeNode;
use graph_recall::storage::associations::AssociationStorage;
use graph_recall::storage::edges::EdgeStorage;
use graph_recall::storage::memories::MemoryStorage;
use graph_recall::storage::nodes::NodeStorage;
use rusqlite::Connection;
use serde::Deserialize;

use super::{open_session, print_json};

/// JSON graph snapshot. Ids and timestamps may be omitted.
#[derive(Debug, Default, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub nodes: Vec<KnowledgeNode>,
    #[serde(default)]
    pub edges: Vec<KnowledgeEdge>,
    #[serde(default)]
    pub memories: Vec<Memory>,
    #[serde(default)]
    pub associations: Vec<MemoryNodeAssociation>,
}

/// `import FILE`: load a snapshot in one transaction. With `embed`, nodes
/// and memories lacking an embedding get one from the configured embedder.
pub fn run(file: &Path, db: Option<&Path>, embed: bool) -> Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let mut snapshot: Snapshot = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid snapshot JSON in {}", file.display()))?;

    let session = open_session(db, None)?;

    if embed {
        for node in snapshot.nodes.iter_mut().filter(|n| n.embedding.is_none()) {
            let text = match &node.description {
                Some(d) => format!("{} {}", node.name, d),
                None => node.name.clone(),
            };
            node.embedding = Some(
                session
                    .embedder
                    .embed(&text, &session.cancel)
                    .with_context(|| format!("Failed to embed node {}", node.id))?,
            );
        }
        for memory in snapshot.memories.iter_mut().filter(|m| m.embedding.is_none()) {
            memory.embedding = Some(
                session
                    .embedder
                    .embed(&memory.content, &session.cancel)
                    .with_context(|| format!("Failed to embed memory {}", memory.id))?,
            );
        }
    }

    let conn = session.store.lock()?;
    let tx = conn.unchecked_transaction().context("Failed to begin import")?;
    for node in &snapshot.nodes {
        NodeStorage::insert(&tx, node).with_context(|| format!("Node {}", node.id))?;
    }
    for edge in &snapshot.edges {
        EdgeStorage::insert(&tx, edge).with_context(|| format!("Edge {}", edge.id))?;
    }
    for memory in &snapshot.memories {
        MemoryStorage::insert(&tx, memory).with_context(|| format!("Memory {}", memory.id))?;
    }
    for assoc in &snapshot.associations {
        AssociationStorage::insert(&tx, assoc)
            .with_context(|| format!("Association {} -> {}", assoc.memory_id, assoc.node_id))?;
    }
    tx.commit().context("Failed to commit import")?;

    let users: BTreeSet<&str> = snapshot
        .nodes
        .iter()
        .map(|n| n.user_id.as_str())
        .chain(snapshot.memories.iter().map(|m| m.user_id.as_str()))
        .collect();
    let totals = user_totals(&conn, &users)?;

    tracing::info!(
        file = %file.display(),
        nodes = snapshot.nodes.len(),
        edges = snapshot.edges.len(),
        memories = snapshot.memories.len(),
        associations = snapshot.associations.len(),
        "Snapshot imported"
    );
    print_json(&serde_json::json!({
        "nodes": snapshot.nodes.len(),
        "edges": snapshot.edges.len(),
        "memories": snapshot.memories.len(),
        "associations": snapshot.associations.len(),
        "totals": totals,
    }))
}

/// Stored node, edge and memory counts for each user touched by an import.
fn user_totals(conn: &Connection, users: &BTreeSet<&str>) -> Result<BTreeMap<String, serde_json::Value>> {
    let mut totals = BTreeMap::new();
    for user in users {
        totals.insert(
            user.to_string(),
            serde_json::json!({
                "nodes": NodeStorage::count(conn, user)?,
                "edges": EdgeStorage::count(conn, user)?,
                "memories": MemoryStorage::count(conn, user)?,
            }),
        );
    }
    Ok(totals)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_totals_count_stored_rows() {
        let conn = migrated_db();
        let snapshot: Snapshot = serde_json::from_str(
            r#"{
                "nodes": [{"id": "a", "user_id": "u1", "node_type": "topic", "name": "Rust"},
                          {"id": "b", "user_id": "u1", "node_type": "topic", "name": "Tokio"}],
                "edges": [{"user_id": "u1", "source_id": "a", "target_id": "b", "edge_type": "related_to", "weight": 0.5}],
                "memories": [{"user_id": "u2", "memory_type": "task", "content": "ship it"}]
            }"#,
        )
        .unwrap();
        for n in &snapshot.nodes {
            NodeStorage::insert(&conn, n).unwrap();
        }
        for e in &snapshot.edges {
            EdgeStorage::insert(&conn, e).unwrap();
        }
        for m in &snapshot.memories {
            MemoryStorage::insert(&conn, m).unwrap();
        }

        let users: BTreeSet<&str> = ["u1", "u2"].into_iter().collect();
        let totals = user_totals(&conn, &users).unwrap();
        assert_eq!(totals["u1"], serde_json::json!({"nodes": 2, "edges": 1, "memories": 0}));
        assert_eq!(totals["u2"], serde_json::json!({"nodes": 0, "edges": 0, "memories": 1}));
    }

    fn migrated_db() -> Connection {
        let conn = graph_recall::storage::database::open_in_memory().unwrap();
        graph_recall::storage::migrations::migrate_recall_db(&conn).unwrap();
        conn
    }

    #[test]
    fn test_minimal_snapshot_parses() {
        let raw = r#"{
            "nodes": [{"user_id": "u1", "node_type": "topic", "name": "Rust"}],
            "memories": [{"id": "m1", "user_id": "u1", "memory_type": "project", "content": "borrowck",
                          "metadata": {"categories": ["lang"]}}],
            "associations": [{"memory_id": "m1", "node_id": "n1", "relevance_score": 0.8}]
        }"#;
        let snapshot: Snapshot = serde_json::from_str(raw).unwrap();
        assert_eq!(snapshot.nodes[0].importance_score, 0.5);
        assert_eq!(snapshot.nodes[0].id.len(), 32);
        assert!(snapshot.edges.is_empty());
        assert_eq!(snapshot.memories[0].metadata.categories, vec!["lang"]);
    }
}
