// === Embeddings ===
pub const DEFAULT_EMBEDDING_DIM: usize = 1536;

// === SQLite Tuning ===
pub const SQLITE_BUSY_TIMEOUT_MS: u32 = 5_000;
pub const WAL_AUTOCHECKPOINT: u32 = 1_000;

// === Node Locator ===
pub const NODE_TOP_K_DEFAULT: usize = 10;
pub const NODE_SIMILARITY_THRESHOLD_DEFAULT: f64 = 0.5;
pub const NODE_TEXT_SIMILARITY_WEIGHT: f64 = 0.7;
pub const NODE_IMPORTANCE_WEIGHT: f64 = 0.3;
pub const IMPORTANCE_BASE: f64 = 0.5;
pub const IMPORTANCE_ACCESS_DIVISOR: f64 = 100.0;

// === Graph Expander ===
pub const GRAPH_DEPTH_DEFAULT: usize = 2;
pub const GRAPH_DECAY_DEFAULT: f64 = 0.7;

// === Composite scoring (graph-guided) ===
pub const VECTOR_WEIGHT_DEFAULT: f64 = 0.6;
pub const GRAPH_WEIGHT_DEFAULT: f64 = 0.4;

// === Strategies ===
pub const SEMANTIC_THRESHOLD_DEFAULT: f64 = 0.3;
pub const MEMORY_GRAPH_DEPTH_DEFAULT: usize = 2;
pub const HOURS_PER_DAY: f64 = 24.0;
pub const DAYS_PER_MONTH: i64 = 30;

// === Fusion ===
pub const RRF_K: f64 = 60.0;
pub const WEIGHT_SUM_TOLERANCE: f64 = 0.01;
pub const FUSION_CANDIDATE_FACTOR: usize = 2;
pub const DEFAULT_LIMIT: usize = 10;

// === Router ===
pub const FALLBACK_CONFIDENCE: f64 = 0.5;

// === Classifier ===
pub const CLASSIFIER_TIMEOUT_SECS: u64 = 30;
pub const CLASSIFIER_MAX_RETRIES: u32 = 1;

// === Schema ===
pub const SCHEMA_VERSION: u32 = 2;

/// Stop words removed from keyword queries before full-text matching.
pub const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "all", "am", "an", "and", "any", "are", "as", "at",
    "be", "because", "been", "before", "being", "below", "between", "both", "but", "by", "can",
    "could", "did", "do", "does", "doing", "down", "during", "each", "few", "for", "from",
    "further", "had", "has", "have", "having", "he", "her", "here", "hers", "him", "his", "how",
    "i", "if", "in", "into", "is", "it", "its", "just", "me", "more", "most", "my", "no", "nor",
    "not", "now", "of", "off", "on", "once", "only", "or", "other", "our", "out", "over", "own",
    "same", "she", "should", "so", "some", "such", "than", "that", "the", "their", "them",
    "then", "there", "these", "they", "this", "those", "through", "to", "too", "under", "until",
    "up", "very", "was", "we", "were", "what", "when", "where", "which", "while", "who", "whom",
    "why", "will", "with", "would", "you", "your",
];

/// Truncate a string to at most `max_chars` characters on a char boundary.
pub fn truncate_safe(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
