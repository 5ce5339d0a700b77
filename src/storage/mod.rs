pub mod associations;
pub mod database;
pub mod edges;
pub mod graph_store;
pub mod memories;
pub mod migrations;
pub mod nodes;
pub mod path_utils;
pub mod sqlite;

pub use graph_store::{AssociatedMemory, GraphStore};
pub use sqlite::SqliteGraphStore;

use rusqlite::types::Value;

use crate::RecallResult;

/// Upper bound on values bound into one `IN (...)` list. Stays well below
/// SQLite's bound-variable limit with room for the scope parameters.
pub(crate) const MAX_IN_VALUES: usize = 500;

/// Encode an embedding as a little-endian f32 BLOB.
pub fn embedding_to_blob(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Decode a little-endian f32 BLOB. Trailing bytes are ignored.
pub fn embedding_from_blob(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// `?{start}, ?{start+1}, ...` for an IN list of `n` values.
pub(crate) fn placeholders(start: usize, n: usize) -> String {
    (start..start + n)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Runs `f` over `ids` in slices of at most [`MAX_IN_VALUES`] and
/// concatenates the results. Callers that promise an order re-sort after.
pub(crate) fn in_chunks<T, F>(ids: &[String], mut f: F) -> RecallResult<Vec<T>>
where
    F: FnMut(&[String]) -> RecallResult<Vec<T>>,
{
    if ids.len() <= MAX_IN_VALUES {
        return f(ids);
    }
    let mut out = Vec::new();
    for chunk in ids.chunks(MAX_IN_VALUES) {
        out.extend(f(chunk)?);
    }
    Ok(out)
}

/// Owned SQL values for a list of string ids.
pub(crate) fn text_values<S: AsRef<str>>(items: &[S]) -> Vec<Value> {
    items
        .iter()
        .map(|s| Value::Text(s.as_ref().to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_blob_roundtrip() {
        let v = vec![0.25f32, -1.5, 3.0];
        let blob = embedding_to_blob(&v);
        assert_eq!(blob.len(), 12);
        assert_eq!(embedding_from_blob(&blob), v);
    }

    #[test]
    fn test_in_chunks_splits_large_lists() {
        let ids: Vec<String> = (0..1201).map(|i| format!("id{i}")).collect();
        let mut calls = Vec::new();
        let out = in_chunks(&ids, |chunk| {
            calls.push(chunk.len());
            Ok(chunk.to_vec())
        })
        .unwrap();
        assert_eq!(calls, vec![500, 500, 201]);
        assert_eq!(out, ids);
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholders(2, 3), "?2, ?3, ?4");
        assert_eq!(placeholders(1, 0), "");
    }
}
