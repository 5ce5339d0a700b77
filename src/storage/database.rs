use crate::constants::{SQLITE_BUSY_TIMEOUT_MS, WAL_AUTOCHECKPOINT};
use crate::{RecallError, RecallResult};
use rusqlite::Connection;

/// Open a SQLite connection with the standard pragmas.
pub fn open_connection(path: &std::path::Path) -> RecallResult<Connection> {
    // Create parent directories if needed
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let conn = Connection::open(path)
        .map_err(|e| RecallError::Storage(format!("Failed to open {}: {}", path.display(), e)))?;

    tracing::debug!(path = %path.display(), "Database connection opened");

    configure(&conn)?;
    Ok(conn)
}

/// Private in-memory database (tests, dry runs).
pub fn open_in_memory() -> RecallResult<Connection> {
    let conn = Connection::open_in_memory()
        .map_err(|e| RecallError::Storage(format!("Failed to open in-memory db: {}", e)))?;
    conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA temp_store = MEMORY;")
        .map_err(|e| RecallError::Storage(format!("Failed to configure pragmas: {}", e)))?;
    Ok(conn)
}

/// Pragmas:
/// - journal_mode = WAL
/// - busy_timeout = SQLITE_BUSY_TIMEOUT_MS (constants.rs)
/// - synchronous = NORMAL
/// - foreign_keys = ON
/// - temp_store = MEMORY
fn configure(conn: &Connection) -> RecallResult<()> {
    conn.execute_batch(&format!(
        "PRAGMA journal_mode = WAL;
         PRAGMA busy_timeout = {};
         PRAGMA synchronous = NORMAL;
         PRAGMA cache_size = -2000;
         PRAGMA foreign_keys = ON;
         PRAGMA temp_store = MEMORY;
         PRAGMA wal_autocheckpoint = {};",
        SQLITE_BUSY_TIMEOUT_MS, WAL_AUTOCHECKPOINT,
    ))
    .map_err(|e| RecallError::Storage(format!("Failed to configure pragmas: {}", e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_db_path() -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("recall.db");
        (dir, path)
    }

    #[test]
    fn test_open_connection_creates_parent_dirs() {
        let (_dir, path) = tmp_db_path();
        let conn = open_connection(&path);
        assert!(conn.is_ok(), "open_connection should not error");
        assert!(path.exists());
    }

    #[test]
    fn test_busy_timeout_set_correctly() {
        let (_dir, path) = tmp_db_path();
        let conn = open_connection(&path).unwrap();
        let timeout: u32 = conn
            .query_row("PRAGMA busy_timeout", [], |row| row.get(0))
            .unwrap();
        assert_eq!(timeout, SQLITE_BUSY_TIMEOUT_MS);
    }

    #[test]
    fn test_foreign_keys_on_in_memory() {
        let conn = open_in_memory().unwrap();
        let fk: i64 = conn.query_row("PRAGMA foreign_keys", [], |r| r.get(0)).unwrap();
        assert_eq!(fk, 1);
    }
}
