use std::path::Path;

use anyhow::{Context, Result};
use graph_recall::node::NodeType;
use graph_recall::retrieval::{EngineQuery, RecallEngine};

use super::{open_session, print_json};

/// `nodes QUERY --user U`: Node Locator output. `text_only` skips the
/// embedder and matches on node names.
pub fn run(
    query: &str,
    user: &str,
    top_k: Option<usize>,
    node_types: Vec<NodeType>,
    text_only: bool,
    db: Option<&Path>,
) -> Result<()> {
    let mut session = open_session(db, None)?;
    if let Some(k) = top_k {
        session.config.nodes.top_k = k;
    }

    let embedding = if text_only {
        None
    } else {
        Some(
            session
                .embedder
                .embed(query, &session.cancel)
                .context("Failed to embed query")?,
        )
    };

    let engine = RecallEngine::new(session.store.clone(), session.embedder.clone(), session.config.clone());
    let mut q = EngineQuery::new(user, query);
    if !node_types.is_empty() {
        q.node_types = Some(node_types);
    }
    let found = engine
        .locate_nodes(&q, embedding.as_deref(), &session.cancel)
        .context("Node lookup failed")?;

    let rows: Vec<serde_json::Value> = found
        .iter()
        .map(|s| {
            serde_json::json!({
                "id": s.node.id,
                "name": s.node.name,
                "node_type": s.node.node_type,
                "score": s.score,
                "importance_score": s.node.importance_score,
                "access_count": s.node.access_count,
            })
        })
        .collect();
    print_json(&serde_json::json!({
        "query": query,
        "mode": if text_only { "text" } else { "embedding" },
        "nodes": rows,
    }))
}
