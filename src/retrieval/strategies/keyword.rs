use std::sync::Arc;

use crate::cancel::CancelToken;
use crate::processing::text::{fts_or_query, keyword_terms};
use crate::retrieval::{HitDetail, SearchHit, SearchParams, Strategy, StrategyKind};
use crate::storage::GraphStore;
use crate::RecallResult;

/// Full-text search: stop words removed, terms OR-ed, ranks normalised by
/// the best rank in the result set.
pub struct KeywordStrategy {
    store: Arc<dyn GraphStore>,
}

impl KeywordStrategy {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }
}

impl Strategy for KeywordStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Keyword
    }

    fn search(&self, params: &SearchParams, cancel: &CancelToken) -> RecallResult<Vec<SearchHit>> {
        let terms = if params.keywords.is_empty() {
            keyword_terms(&params.query)
        } else {
            keyword_terms(&params.keywords.join(" "))
        };
        let Some(fts_query) = fts_or_query(&terms) else {
            tracing::debug!(user = %params.user_id, "Keyword search: no terms");
            return Ok(vec![]);
        };

        let ranked = self.store.memories_full_text(
            &params.user_id,
            &fts_query,
            params.memory_type,
            params.limit,
            cancel,
        )?;

        let max_rank = ranked.iter().map(|(_, r)| *r).fold(0.0f64, f64::max);
        let hits: Vec<SearchHit> = ranked
            .into_iter()
            .map(|(memory, rank)| {
                let score = if max_rank > 0.0 { rank / max_rank } else { 0.0 };
                SearchHit::new(
                    memory,
                    score,
                    HitDetail::Keyword { terms: terms.clone(), rank },
                )
            })
            .collect();

        tracing::debug!(user = %params.user_id, terms = ?terms, hits = hits.len(), "Keyword search done");
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memories::MemoryStorage;
    use crate::test_helpers::{setup_store, MemoryBuilder};

    fn seed() -> Arc<crate::storage::SqliteGraphStore> {
        let store = setup_store();
        {
            let conn = store.lock().unwrap();
            MemoryStorage::insert(&conn, &MemoryBuilder::new().id("both").content("sourdough starter needs feeding").build()).unwrap();
            MemoryStorage::insert(&conn, &MemoryBuilder::new().id("one").content("the starter motor of the car is broken again").build()).unwrap();
            MemoryStorage::insert(&conn, &MemoryBuilder::new().id("none").content("booked flights to Lisbon").build()).unwrap();
        }
        store
    }

    #[test]
    fn test_or_semantics_and_normalisation() {
        let store = seed();
        let strategy = KeywordStrategy::new(store.clone());
        let hits = strategy
            .search(&SearchParams::new("u1", "what about the sourdough starter?", 10), &CancelToken::new())
            .unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.memory.id.as_str()).collect();
        assert_eq!(ids, vec!["both", "one"]);
        assert!((hits[0].score - 1.0).abs() < 1e-9);
        assert!(hits[1].score < 1.0 && hits[1].score >= 0.0);
        match &hits[0].detail {
            HitDetail::Keyword { terms, .. } => assert_eq!(terms, &vec!["sourdough".to_string(), "starter".to_string()]),
            other => panic!("unexpected detail {:?}", other),
        }
    }

    #[test]
    fn test_stop_word_only_query_uses_raw_terms() {
        let store = setup_store();
        {
            let conn = store.lock().unwrap();
            MemoryStorage::insert(&conn, &MemoryBuilder::new().id("m").content("who was there").build()).unwrap();
        }
        let strategy = KeywordStrategy::new(store.clone());
        let hits = strategy
            .search(&SearchParams::new("u1", "who", 10), &CancelToken::new())
            .unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_explicit_keywords_override_query() {
        let store = seed();
        let strategy = KeywordStrategy::new(store.clone());
        let mut params = SearchParams::new("u1", "sourdough", 10);
        params.keywords = vec!["Lisbon".into()];
        let hits = strategy.search(&params, &CancelToken::new()).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].memory.id, "none");
    }

    #[test]
    fn test_empty_query() {
        let store = seed();
        let strategy = KeywordStrategy::new(store.clone());
        let hits = strategy.search(&SearchParams::new("u1", " ?! ", 10), &CancelToken::new()).unwrap();
        assert!(hits.is_empty());
    }
}
