//! Graph Recall — hierarchical, graph-guided memory retrieval.
//!
//! Single-crate library: a typed knowledge graph and memory store over
//! SQLite, the retrieval pipeline (node location, graph expansion, memory
//! location, candidate ranking), independent retrieval strategies, a query
//! router, and two fusion algorithms.

// Foundation
pub mod cancel;
pub mod config;
pub mod constants;
pub mod error;
pub mod id_gen;
pub mod time_utils;
pub mod tracing_init;

// Domain types
pub mod edge;
pub mod memory;
pub mod node;

// Sub-systems
pub mod processing;
pub mod retrieval;
pub mod storage;

#[cfg(test)]
pub(crate) mod test_helpers;

// Re-exports for convenience
pub use error::{RecallError, RecallResult};
