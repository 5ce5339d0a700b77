use anyhow::{bail, Result};
use graph_recall::config::RecallConfig;

use super::print_json;

/// `config show`: the effective configuration after defaults and clamping.
pub fn run_show() -> Result<()> {
    print_json(&RecallConfig::load())
}

/// `config get <key>`: one value, dot notation (`graph.decay_factor`).
pub fn run_get(key: &str) -> Result<()> {
    let config = serde_json::to_value(RecallConfig::load())?;
    match resolve_path(&config, key) {
        Some(v) => print_json(v),
        None => bail!("Key not found: {}", key),
    }
}

fn resolve_path<'a>(value: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    path.split('.')
        .try_fold(value, |current, segment| current.get(segment))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_path() {
        let config = serde_json::to_value(RecallConfig::default()).unwrap();
        assert_eq!(resolve_path(&config, "graph.decay_factor"), Some(&serde_json::json!(0.7)));
        assert_eq!(resolve_path(&config, "nodes.top_k"), Some(&serde_json::json!(10)));
        assert!(resolve_path(&config, "graph.nope").is_none());
    }
}
