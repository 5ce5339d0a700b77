use std::collections::HashSet;

use crate::constants::STOP_WORDS;

/// Unicode case fold used for every case-insensitive comparison
/// (categories, node names). SQLite's `lower()` only folds ASCII, so
/// matching happens here rather than in SQL.
pub fn fold_case(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Case-insensitive substring test under [`fold_case`].
pub fn contains_folded(haystack: &str, needle: &str) -> bool {
    fold_case(haystack).contains(&fold_case(needle))
}

/// Lowercased alphanumeric terms, in order.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// Terms of `query` minus stop words; the raw terms when nothing survives.
pub fn keyword_terms(query: &str) -> Vec<String> {
    let terms = tokenize(query);
    let kept: Vec<String> = terms
        .iter()
        .filter(|t| !STOP_WORDS.contains(&t.as_str()))
        .cloned()
        .collect();
    let mut out = if kept.is_empty() { terms } else { kept };
    let mut seen = HashSet::new();
    out.retain(|t| seen.insert(t.clone()));
    out
}

/// FTS5 expression joining terms with OR, each quoted as a phrase.
pub fn fts_or_query(terms: &[String]) -> Option<String> {
    if terms.is_empty() {
        return None;
    }
    Some(
        terms
            .iter()
            .map(|t| format!("\"{}\"", t.replace('"', "\"\"")))
            .collect::<Vec<_>>()
            .join(" OR "),
    )
}

/// Padded character trigrams of each word (pg_trgm style).
fn trigrams(text: &str) -> HashSet<String> {
    let mut set = HashSet::new();
    for word in tokenize(text) {
        let padded: Vec<char> = format!("  {} ", word).chars().collect();
        for w in padded.windows(3) {
            set.insert(w.iter().collect::<String>());
        }
    }
    set
}

/// Trigram similarity in [0,1]: shared / union.
pub fn text_similarity(a: &str, b: &str) -> f64 {
    let ta = trigrams(a);
    let tb = trigrams(b);
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let shared = ta.intersection(&tb).count();
    let union = ta.len() + tb.len() - shared;
    shared as f64 / union as f64
}
