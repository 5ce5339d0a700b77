use crate::{RecallError, RecallResult};
use rusqlite::Connection;

/// Current schema version
pub const CURRENT_SCHEMA_VERSION: u32 = crate::constants::SCHEMA_VERSION;

/// Schema version of the database (0 if the table is absent).
pub fn get_schema_version(conn: &Connection) -> RecallResult<u32> {
    let exists: bool = conn
        .query_row(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='schema_version'",
            [],
            |r| r.get(0),
        )
        .map_err(|e| RecallError::Storage(e.to_string()))?;

    if !exists {
        return Ok(0);
    }

    let version: u32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |r| r.get(0),
        )
        .map_err(|e| RecallError::Storage(e.to_string()))?;

    Ok(version)
}

fn set_schema_version(conn: &Connection, version: u32) -> RecallResult<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_version (version, applied_at) VALUES (?1, datetime('now'))",
        rusqlite::params![version],
    )
    .map_err(|e| RecallError::Storage(e.to_string()))?;
    Ok(())
}

const RECALL_DB_V1: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS knowledge_nodes (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    node_type TEXT NOT NULL,
    name TEXT NOT NULL,
    description TEXT,
    embedding BLOB,
    metadata TEXT NOT NULL DEFAULT '{}',
    importance_score REAL NOT NULL DEFAULT 0.5,
    access_count INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_nodes_user ON knowledge_nodes(user_id);
CREATE INDEX IF NOT EXISTS idx_nodes_user_type ON knowledge_nodes(user_id, node_type);

CREATE TABLE IF NOT EXISTS knowledge_edges (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    source_id TEXT NOT NULL REFERENCES knowledge_nodes(id) ON DELETE CASCADE,
    target_id TEXT NOT NULL REFERENCES knowledge_nodes(id) ON DELETE CASCADE,
    edge_type TEXT NOT NULL,
    weight REAL NOT NULL DEFAULT 1.0,
    metadata TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL,
    UNIQUE (source_id, target_id, edge_type)
);
CREATE INDEX IF NOT EXISTS idx_edges_source ON knowledge_edges(source_id);
CREATE INDEX IF NOT EXISTS idx_edges_target ON knowledge_edges(target_id);

CREATE TABLE IF NOT EXISTS memories (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    memory_type TEXT NOT NULL,
    content TEXT NOT NULL,
    embedding BLOB,
    metadata TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL,
    accessed_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_memories_user ON memories(user_id);
CREATE INDEX IF NOT EXISTS idx_memories_user_created ON memories(user_id, created_at);

CREATE TABLE IF NOT EXISTS memory_node_associations (
    memory_id TEXT NOT NULL REFERENCES memories(id) ON DELETE CASCADE,
    node_id TEXT NOT NULL REFERENCES knowledge_nodes(id) ON DELETE CASCADE,
    relevance_score REAL NOT NULL DEFAULT 1.0,
    PRIMARY KEY (memory_id, node_id)
);
CREATE INDEX IF NOT EXISTS idx_assoc_node ON memory_node_associations(node_id);
";

/// V2: full-text index over memory content, kept in sync by triggers.
const RECALL_DB_V2: &str = "
CREATE VIRTUAL TABLE IF NOT EXISTS memories_fts USING fts5(
    content,
    content='memories',
    content_rowid='rowid'
);

CREATE TRIGGER IF NOT EXISTS memories_fts_ai AFTER INSERT ON memories BEGIN
    INSERT INTO memories_fts(rowid, content) VALUES (new.rowid, new.content);
END;

CREATE TRIGGER IF NOT EXISTS memories_fts_ad AFTER DELETE ON memories BEGIN
    INSERT INTO memories_fts(memories_fts, rowid, content) VALUES ('delete', old.rowid, old.content);
END;

CREATE TRIGGER IF NOT EXISTS memories_fts_au AFTER UPDATE ON memories BEGIN
    INSERT INTO memories_fts(memories_fts, rowid, content) VALUES ('delete', old.rowid, old.content);
    INSERT INTO memories_fts(rowid, content) VALUES (new.rowid, new.content);
END;

INSERT INTO memories_fts(memories_fts) VALUES ('rebuild');
";

/// Apply pending migrations to the recall database.
pub fn migrate_recall_db(conn: &Connection) -> RecallResult<()> {
    let version = get_schema_version(conn)?;

    if version < 1 {
        conn.execute_batch(RECALL_DB_V1)
            .map_err(|e| RecallError::Storage(format!("Recall DB V1 migration failed: {}", e)))?;
        set_schema_version(conn, 1)?;
    }

    if version < 2 {
        conn.execute_batch(RECALL_DB_V2)
            .map_err(|e| RecallError::Storage(format!("Recall DB V2 migration failed: {}", e)))?;
        set_schema_version(conn, 2)?;
    }

    tracing::debug!(from = version, to = CURRENT_SCHEMA_VERSION, "Recall DB migrated");
    Ok(())
}
