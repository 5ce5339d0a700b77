use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use graph_recall::memory::MemoryType;
use graph_recall::processing::classifier::{LlmClassifier, QueryClassifier};
use graph_recall::processing::llm_subprocess::is_claude_available;
use graph_recall::retrieval::{to_records, RecallEngine, SearchParams, StrategyKind};

use super::{open_session, print_json};

pub struct RouteArgs<'a> {
    pub query: &'a str,
    pub user: &'a str,
    pub strategy: Option<StrategyKind>,
    pub limit: Option<usize>,
    pub memory_type: Option<MemoryType>,
    pub keywords: Vec<String>,
    pub categories: Vec<String>,
    pub match_all: bool,
    pub since: Option<String>,
    pub root: Option<String>,
    pub weights: Vec<String>,
    pub no_classifier: bool,
    pub db: Option<&'a Path>,
    pub timeout_secs: Option<u64>,
}

/// `route QUERY --user U`: run the query router and print its decision,
/// results, and per-strategy counters.
pub fn run(args: RouteArgs<'_>) -> Result<()> {
    let session = open_session(args.db, args.timeout_secs)?;
    let limit = args.limit.unwrap_or(session.config.fusion.default_limit);

    let classifier: Option<Arc<dyn QueryClassifier>> =
        if args.no_classifier || args.strategy.is_some() {
            None
        } else if is_claude_available() {
            Some(Arc::new(LlmClassifier::new(session.config.classifier.clone())))
        } else {
            tracing::warn!("claude CLI not found, routing without a classifier");
            None
        };

    let engine = RecallEngine::new(session.store.clone(), session.embedder.clone(), session.config.clone());
    let router = engine.router(classifier);

    let mut params = SearchParams::new(args.user, args.query, limit);
    params.memory_type = args.memory_type;
    params.keywords = args.keywords;
    params.categories = args.categories;
    params.match_all = args.match_all;
    params.relative_time = args.since;
    params.root_memory_id = args.root;
    if !args.weights.is_empty() {
        params.weights = Some(parse_weights(&args.weights)?);
    }

    let outcome = router
        .route(&params, args.strategy, &session.cancel)
        .context("Routed search failed")?;

    print_json(&serde_json::json!({
        "query": args.query,
        "decision": outcome.decision,
        "results": to_records(&outcome.hits),
        "invocation_counts": router.invocation_counts(),
    }))
}

/// `strategy=weight` pairs.
fn parse_weights(raw: &[String]) -> Result<HashMap<StrategyKind, f64>> {
    let mut weights = HashMap::new();
    for pair in raw {
        let (name, value) = pair
            .split_once('=')
            .with_context(|| format!("Weight '{}' is not strategy=value", pair))?;
        let kind: StrategyKind = name.parse().map_err(anyhow::Error::msg)?;
        let weight: f64 = value
            .trim()
            .parse()
            .with_context(|| format!("Weight for {} is not a number", name))?;
        weights.insert(kind, weight);
    }
    Ok(weights)
}
