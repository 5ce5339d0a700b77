//! Query-side processing: embeddings, text utilities, and the LLM-backed
//! query classifier.

pub mod classifier;
pub mod embeddings;
pub mod llm_subprocess;
pub mod text;
