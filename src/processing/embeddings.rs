//! Embedding provider contract and a deterministic hash-based implementation.
//!
//! `HashEmbedder` maps unigrams and bigrams to vector positions through MD5,
//! so identical text always yields an identical vector without a model. It
//! is good enough for local experiments and tests; production callers plug
//! a real model in behind `Embedder`.

use md5::{Digest, Md5};

use crate::cancel::CancelToken;
use crate::{RecallError, RecallResult};

pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str, cancel: &CancelToken) -> RecallResult<Vec<f32>>;

    fn dimension(&self) -> usize;
}

/// Feature-hashing embedder (MD5 of unigrams + bigrams, L2-normalised).
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    fn embed_hashed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dim];

        let lower = text.to_lowercase();
        let words: Vec<&str> = lower
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
            .filter(|w| !w.is_empty())
            .collect();

        if words.is_empty() {
            return vector;
        }

        // Unigrams
        for w in &words {
            if w.chars().count() < 2 {
                continue;
            }
            hash_term_into(&mut vector, w, 1.0);
        }

        // Bigrams
        for pair in words.windows(2) {
            hash_term_into(&mut vector, &format!("{}_{}", pair[0], pair[1]), 0.7);
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in vector.iter_mut() {
                *v /= norm;
            }
        }

        vector
    }
}

impl Embedder for HashEmbedder {
    fn embed(&self, text: &str, cancel: &CancelToken) -> RecallResult<Vec<f32>> {
        cancel.check()?;
        let v = self.embed_hashed(text);
        if v.iter().all(|x| *x == 0.0) {
            return Err(RecallError::Embedding(format!(
                "No indexable terms in text ({} chars)",
                text.chars().count()
            )));
        }
        tracing::trace!(dim = self.dim, text_len = text.len(), "Hash embedding computed");
        Ok(v)
    }

    fn dimension(&self) -> usize {
        self.dim
    }
}

/// Hash a term into the vector: two signed positions from one MD5 digest.
fn hash_term_into(vector: &mut [f32], term: &str, weight: f32) {
    let mut hasher = Md5::new();
    hasher.update(term.as_bytes());
    let hash = hasher.finalize();

    let idx = u32::from_le_bytes([hash[0], hash[1], hash[2], hash[3]]) as usize % vector.len();
    let sign = if hash[4] & 1 == 0 { 1.0f32 } else { -1.0f32 };
    vector[idx] += sign * weight;

    let idx2 = u32::from_le_bytes([hash[5], hash[6], hash[7], hash[8]]) as usize % vector.len();
    let sign2 = if hash[9] & 1 == 0 { 1.0f32 } else { -1.0f32 };
    vector[idx2] += sign2 * weight * 0.5;
}

/// Cosine similarity in [-1, 1]. Zero for empty, mismatched or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| *x as f64 * *y as f64).sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

/// Cosine distance in [0, 2].
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
    1.0 - cosine_similarity(a, b)
}

/// Map a cosine distance in [0, 2] to a similarity in [0, 1].
pub fn similarity_from_distance(distance: f64) -> f64 {
    (1.0 - distance / 2.0).clamp(0.0, 1.0)
}

/// Checks an embedding against the expected dimension.
pub fn ensure_dimension(v: &[f32], dim: usize) -> RecallResult<()> {
    if v.len() != dim {
        return Err(RecallError::Embedding(format!(
            "Embedding has {} dimensions, expected {}",
            v.len(),
            dim
        )));
    }
    Ok(())
}
