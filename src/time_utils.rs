use chrono::{DateTime, SecondsFormat, Utc};

/// Current timestamp in UTC.
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// RFC 3339 timestamp as stored in SQLite.
/// Fixed width (micros, `Z`) so text ordering matches time ordering.
pub fn to_sqlite(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse an RFC 3339 timestamp read back from SQLite.
pub fn from_sqlite(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    s.parse::<DateTime<Utc>>()
}

/// Age of `then` relative to `now`, in fractional hours. Never negative.
pub fn age_hours(then: &DateTime<Utc>, now: &DateTime<Utc>) -> f64 {
    let secs = (*now - *then).num_milliseconds() as f64 / 1000.0;
    (secs / 3600.0).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_roundtrip() {
        let dt = now();
        let s = to_sqlite(&dt);
        let parsed = from_sqlite(&s).unwrap();
        assert_eq!(dt.timestamp(), parsed.timestamp());
    }

    #[test]
    fn test_sqlite_text_sorts_chronologically() {
        let a = now();
        let b = a + Duration::milliseconds(1500);
        assert!(to_sqlite(&a) < to_sqlite(&b));
        assert_eq!(to_sqlite(&a).len(), to_sqlite(&b).len());
    }

    #[test]
    fn test_age_hours() {
        let n = now();
        assert!((age_hours(&(n - Duration::hours(36)), &n) - 36.0).abs() < 1e-6);
        // Future timestamps clamp to zero
        assert_eq!(age_hours(&(n + Duration::hours(1)), &n), 0.0);
    }
}
