//! Tracing initialization for the `graph-recall` binary.
//!
//! Filtering comes from `RUST_LOG`, defaulting to `info`.

use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Append structured logs to `log_path`.
///
/// Falls back to stderr if the file cannot be opened. Calling this after a
/// subscriber is already installed is a no-op.
pub fn init_file_tracing(log_path: &Path) {
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent).ok();
    }

    // Append mode: concurrent CLI invocations share one file.
    let log_file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
    {
        Ok(f) => f,
        Err(e) => {
            init_stderr_tracing();
            tracing::warn!(path = %log_path.display(), error = %e, "Cannot open log file, logging to stderr");
            return;
        }
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(Mutex::new(log_file))
        .with_target(true)
        .with_ansi(false)
        .try_init();
}

/// Interactive logging on stderr, keeping stdout clean for JSON output.
pub fn init_stderr_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
