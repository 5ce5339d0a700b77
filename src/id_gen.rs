use uuid::Uuid;

/// Unique id for a knowledge node (UUID v4 hex, 32 chars).
pub fn node_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Unique id for a knowledge edge (UUID v4 hex, 32 chars).
pub fn edge_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Unique id for a memory (UUID v4 hex, 32 chars).
pub fn memory_id() -> String {
    Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let a = memory_id();
        let b = memory_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
        assert_ne!(node_id(), edge_id());
    }
}
