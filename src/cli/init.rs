use std::path::Path;

use anyhow::{Context, Result};
use graph_recall::config::RecallConfig;
use graph_recall::storage::{database, migrations, path_utils};

use super::{print_json, resolve_db_path};

/// `init`: create (or migrate) the database and write a default config if
/// none exists yet.
pub fn run(db: Option<&Path>) -> Result<()> {
    let db_path = resolve_db_path(db);
    let conn = database::open_connection(&db_path)
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    migrations::migrate_recall_db(&conn).context("Failed to migrate database")?;
    let schema_version = migrations::get_schema_version(&conn)?;

    let config_path = path_utils::config_path();
    let config_written = if config_path.exists() {
        false
    } else {
        RecallConfig::default()
            .save_to(&config_path)
            .map_err(anyhow::Error::msg)
            .context("Failed to write default config")?;
        true
    };

    tracing::info!(db = %db_path.display(), schema_version, "Database initialized");
    print_json(&serde_json::json!({
        "database": db_path,
        "schema_version": schema_version,
        "config": config_path,
        "config_written": config_written,
    }))
}
