//! Memory Locator — memories attached to a set of knowledge nodes.
//!
//! A memory linked to several nodes appears once, at its best-ranked
//! association.

use std::collections::HashSet;
use std::sync::Arc;

use crate::cancel::CancelToken;
use crate::memory::{Memory, MemoryType};
use crate::storage::{AssociatedMemory, GraphStore};
use crate::RecallResult;

pub struct MemoryLocator {
    store: Arc<dyn GraphStore>,
}

impl MemoryLocator {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    /// Raw association rows: one per (memory, node), relevance desc then
    /// memory creation desc.
    pub fn associated(
        &self,
        user_id: &str,
        node_ids: &[String],
        memory_type: Option<MemoryType>,
        cancel: &CancelToken,
    ) -> RecallResult<Vec<AssociatedMemory>> {
        if node_ids.is_empty() {
            return Ok(vec![]);
        }
        self.store
            .memories_for_nodes(user_id, node_ids, memory_type, cancel)
    }

    /// Distinct memories in association order. A memory linked to several
    /// nodes appears once, at its best-ranked row.
    pub fn memories_for_nodes(
        &self,
        user_id: &str,
        node_ids: &[String],
        memory_type: Option<MemoryType>,
        limit: Option<usize>,
        cancel: &CancelToken,
    ) -> RecallResult<Vec<Memory>> {
        let rows = self.associated(user_id, node_ids, memory_type, cancel)?;
        let total = rows.len();
        let mut seen = HashSet::new();
        let mut memories: Vec<Memory> = rows
            .into_iter()
            .filter(|r| seen.insert(r.memory.id.clone()))
            .map(|r| r.memory)
            .collect();
        if let Some(limit) = limit {
            memories.truncate(limit);
        }
        tracing::debug!(
            user = %user_id,
            nodes = node_ids.len(),
            rows = total,
            memories = memories.len(),
            "Memories located for nodes"
        );
        Ok(memories)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memories::MemoryStorage;
    use crate::storage::nodes::NodeStorage;
    use crate::test_helpers::{associate, hours_ago, setup_store, MemoryBuilder, NodeBuilder};

    #[test]
    fn test_dedup_and_limit() {
        let store = setup_store();
        {
            let conn = store.lock().unwrap();
            NodeStorage::insert(&conn, &NodeBuilder::new().id("n1").build()).unwrap();
            NodeStorage::insert(&conn, &NodeBuilder::new().id("n2").build()).unwrap();
            MemoryStorage::insert(&conn, &MemoryBuilder::new().id("shared").created_at(hours_ago(3)).build()).unwrap();
            MemoryStorage::insert(&conn, &MemoryBuilder::new().id("solo").created_at(hours_ago(1)).build()).unwrap();
            associate(&conn, "shared", "n1", 0.9);
            associate(&conn, "shared", "n2", 0.3);
            associate(&conn, "solo", "n2", 0.6);
        }
        let locator = MemoryLocator::new(store.clone());
        let nodes = vec!["n1".to_string(), "n2".to_string()];
        let cancel = CancelToken::new();

        let all = locator.memories_for_nodes("u1", &nodes, None, None, &cancel).unwrap();
        let ids: Vec<&str> = all.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["shared", "solo"]);

        let one = locator.memories_for_nodes("u1", &nodes, None, Some(1), &cancel).unwrap();
        assert_eq!(one.len(), 1);

        assert_eq!(locator.associated("u1", &nodes, None, &cancel).unwrap().len(), 3);
        assert!(locator.memories_for_nodes("u1", &[], None, None, &cancel).unwrap().is_empty());
    }
}
