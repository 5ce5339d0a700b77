use std::path::PathBuf;

/// Central data directory.
/// Linux: ~/.local/share/graph-recall/
/// macOS: ~/Library/Application Support/graph-recall/
/// Windows: %APPDATA%/graph-recall/
pub fn data_dir() -> PathBuf {
    let base = dirs::data_dir().unwrap_or_else(|| {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".local")
            .join("share")
    });
    base.join("graph-recall")
}

/// Default database: {data_dir}/recall.db
pub fn default_db_path() -> PathBuf {
    data_dir().join("recall.db")
}

/// Config file: {data_dir}/config.json
pub fn config_path() -> PathBuf {
    data_dir().join("config.json")
}

/// Log file: {data_dir}/recall.log
pub fn log_path() -> PathBuf {
    data_dir().join("recall.log")
}
