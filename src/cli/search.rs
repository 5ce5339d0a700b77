use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use graph_recall::memory::{MemoryType, MetadataFilters};
use graph_recall::retrieval::{to_records, EngineQuery, RecallEngine};

use super::{open_session, print_json};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// Reciprocal-rank fusion of the other two
    Hybrid,
    Hierarchical,
    /// Graph-guided: node expansion plus composite scoring
    Graph,
}

pub struct SearchArgs<'a> {
    pub query: &'a str,
    pub user: &'a str,
    pub mode: SearchMode,
    pub limit: Option<usize>,
    pub memory_type: Option<MemoryType>,
    pub filters: MetadataFilters,
    pub db: Option<&'a Path>,
    pub timeout_secs: Option<u64>,
}

/// `search QUERY --user U`: top-level engine search.
pub fn run(args: SearchArgs<'_>) -> Result<()> {
    let session = open_session(args.db, args.timeout_secs)?;
    let limit = args.limit.unwrap_or(session.config.fusion.default_limit);
    let engine = RecallEngine::new(
        session.store.clone(),
        Arc::clone(&session.embedder),
        session.config.clone(),
    );

    let mut q = EngineQuery::new(args.user, args.query).with_limit(limit);
    q.memory_type = args.memory_type;
    q.filters = args.filters;

    let hits = match args.mode {
        SearchMode::Hybrid => engine.hybrid_search(&q, &session.cancel),
        SearchMode::Hierarchical => engine.hierarchical_search(&q, &session.cancel),
        SearchMode::Graph => engine.graph_guided_search(&q, &session.cancel),
    }
    .with_context(|| format!("{:?} search failed", args.mode))?;

    print_json(&serde_json::json!({
        "query": args.query,
        "mode": args.mode,
        "results": to_records(&hits),
    }))
}
