use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Duration, Utc};
use regex::Regex;

use crate::cancel::CancelToken;
use crate::constants::{DAYS_PER_MONTH, HOURS_PER_DAY};
use crate::retrieval::{HitDetail, SearchHit, SearchParams, Strategy, StrategyKind};
use crate::storage::GraphStore;
use crate::time_utils;
use crate::{RecallError, RecallResult};

static RELATIVE_TIME: OnceLock<Regex> = OnceLock::new();

fn relative_time_regex() -> &'static Regex {
    RELATIVE_TIME.get_or_init(|| {
        Regex::new(r"(?i)^\s*(\d+)\s+(hours?|days?|weeks?|months?)\s*$").unwrap()
    })
}

/// Start of the window described by `"<integer> <unit>"` ending at `now`.
/// Units: hour(s), day(s), week(s), month(s) (30 days).
pub fn parse_relative_time(expr: &str, now: DateTime<Utc>) -> RecallResult<DateTime<Utc>> {
    let invalid = || RecallError::InvalidTimeExpression(expr.to_string());
    let caps = relative_time_regex().captures(expr).ok_or_else(invalid)?;
    let amount: i64 = caps[1].parse().map_err(|_| invalid())?;
    let unit = caps[2].to_ascii_lowercase();

    let span = if unit.starts_with("hour") {
        Duration::try_hours(amount)
    } else if unit.starts_with("day") {
        Duration::try_days(amount)
    } else if unit.starts_with("week") {
        Duration::try_weeks(amount)
    } else {
        amount.checked_mul(DAYS_PER_MONTH).and_then(Duration::try_days)
    }
    .ok_or_else(invalid)?;

    now.checked_sub_signed(span).ok_or_else(invalid)
}

/// Recency score: 1 / (1 + ageHours/24).
pub fn recency_score(age_hours: f64) -> f64 {
    1.0 / (1.0 + age_hours / HOURS_PER_DAY)
}

/// Memories inside a time window, newest first, scored by recency.
pub struct TemporalStrategy {
    store: Arc<dyn GraphStore>,
}

impl TemporalStrategy {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    fn window(params: &SearchParams, now: DateTime<Utc>) -> RecallResult<(DateTime<Utc>, DateTime<Utc>)> {
        if let Some((start, end)) = params.time_range {
            if start > end {
                return Err(RecallError::InvalidInput(format!(
                    "Time range start {} is after end {}",
                    time_utils::to_sqlite(&start),
                    time_utils::to_sqlite(&end)
                )));
            }
            return Ok((start, end));
        }
        match params.relative_time.as_deref() {
            Some(expr) => Ok((parse_relative_time(expr, now)?, now)),
            None => Err(RecallError::InvalidInput(
                "Temporal search needs a time range or a relative time expression".into(),
            )),
        }
    }
}

impl Strategy for TemporalStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Temporal
    }

    fn search(&self, params: &SearchParams, cancel: &CancelToken) -> RecallResult<Vec<SearchHit>> {
        let now = time_utils::now();
        let (start, end) = Self::window(params, now)?;

        let memories = self.store.memories_in_window(
            &params.user_id,
            &start,
            &end,
            params.memory_type,
            params.limit,
            cancel,
        )?;

        let hits: Vec<SearchHit> = memories
            .into_iter()
            .map(|memory| {
                let age = time_utils::age_hours(&memory.created_at, &now);
                SearchHit::new(memory, recency_score(age), HitDetail::Temporal { age_hours: age })
            })
            .collect();

        tracing::debug!(
            user = %params.user_id,
            start = %time_utils::to_sqlite(&start),
            end = %time_utils::to_sqlite(&end),
            hits = hits.len(),
            "Temporal search done"
        );
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memories::MemoryStorage;
    use crate::test_helpers::{hours_ago, setup_store, MemoryBuilder};

    fn assert_close(a: DateTime<Utc>, b: DateTime<Utc>) {
        assert!((a - b).num_seconds().abs() <= 2, "{} vs {}", a, b);
    }

    #[test]
    fn test_parse_relative_units() {
        let now = Utc::now();
        assert_close(parse_relative_time("1 week", now).unwrap(), now - Duration::days(7));
        assert_close(parse_relative_time("3 days", now).unwrap(), now - Duration::days(3));
        assert_close(parse_relative_time("2 hours", now).unwrap(), now - Duration::hours(2));
        assert_close(parse_relative_time("1 Month", now).unwrap(), now - Duration::days(30));
        assert_close(parse_relative_time(" 5 day ", now).unwrap(), now - Duration::days(5));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        let now = Utc::now();
        for bad in ["", "yesterday", "3", "days 3", "1.5 days", "-2 days", "3 fortnights", "2 hours ago"] {
            match parse_relative_time(bad, now) {
                Err(RecallError::InvalidTimeExpression(s)) => assert_eq!(s, bad),
                other => panic!("expected error for {:?}, got {:?}", bad, other),
            }
        }
    }

    #[test]
    fn test_recency_score() {
        assert_eq!(recency_score(0.0), 1.0);
        assert!((recency_score(24.0) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_search_window_and_scores() {
        let store = setup_store();
        {
            let conn = store.lock().unwrap();
            MemoryStorage::insert(&conn, &MemoryBuilder::new().id("fresh").created_at(hours_ago(1)).build()).unwrap();
            MemoryStorage::insert(&conn, &MemoryBuilder::new().id("day").created_at(hours_ago(24)).build()).unwrap();
            MemoryStorage::insert(&conn, &MemoryBuilder::new().id("stale").created_at(hours_ago(24 * 10)).build()).unwrap();
        }
        let strategy = TemporalStrategy::new(store.clone());
        let mut params = SearchParams::new("u1", "", 10);
        params.relative_time = Some("3 days".into());
        let hits = strategy.search(&params, &CancelToken::new()).unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.memory.id.as_str()).collect();
        assert_eq!(ids, vec!["fresh", "day"]);
        assert!((hits[1].score - 0.5).abs() < 0.01);
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn test_missing_window_is_an_error() {
        let store = setup_store();
        let strategy = TemporalStrategy::new(store.clone());
        let err = strategy.search(&SearchParams::new("u1", "", 10), &CancelToken::new()).unwrap_err();
        assert!(matches!(err, RecallError::InvalidInput(_)));

        let mut params = SearchParams::new("u1", "", 10);
        params.relative_time = Some("last tuesday".into());
        let err = strategy.search(&params, &CancelToken::new()).unwrap_err();
        assert!(matches!(err, RecallError::InvalidTimeExpression(_)));
    }
}
