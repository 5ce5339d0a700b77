pub mod config;
pub mod import;
pub mod init;
pub mod nodes;
pub mod route;
pub mod search;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use graph_recall::cancel::CancelToken;
use graph_recall::config::RecallConfig;
use graph_recall::memory::MetadataFilters;
use graph_recall::processing::embeddings::{Embedder, HashEmbedder};
use graph_recall::storage::{path_utils, SqliteGraphStore};

/// Shared per-invocation context: database, config, embedder, deadline.
pub struct Session {
    pub store: Arc<SqliteGraphStore>,
    pub config: RecallConfig,
    pub embedder: Arc<dyn Embedder>,
    pub cancel: CancelToken,
}

pub fn resolve_db_path(db: Option<&Path>) -> PathBuf {
    db.map(Path::to_path_buf).unwrap_or_else(path_utils::default_db_path)
}

pub fn open_session(db: Option<&Path>, timeout_secs: Option<u64>) -> Result<Session> {
    let db_path = resolve_db_path(db);
    let store = SqliteGraphStore::open(&db_path)
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    let config = RecallConfig::load();
    let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new(config.embedding_dim));
    let cancel = match timeout_secs {
        Some(secs) => CancelToken::with_timeout(Duration::from_secs(secs)),
        None => CancelToken::new(),
    };
    Ok(Session {
        store: Arc::new(store),
        config,
        embedder,
        cancel,
    })
}

/// `key=value` pairs; the value is parsed as JSON, falling back to a string.
pub fn parse_filters(raw: &[String]) -> Result<MetadataFilters> {
    let mut filters = MetadataFilters::new();
    for pair in raw {
        let (key, value) = pair
            .split_once('=')
            .with_context(|| format!("Filter '{}' is not key=value", pair))?;
        let parsed = serde_json::from_str(value)
            .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
        filters.insert(key.trim().to_string(), parsed);
    }
    Ok(filters)
}

pub fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
