use crate::entry::StoredResponse;
use chrono::{DateTime, Utc};

/// Header stamped on every response the gateway writes to a store.
/// Value is an HTTP-date marking the instant the entry goes stale.
pub const EXPIRES_HEADER: &str = "sw-cache-expires";

/// Format a timestamp as an HTTP-date (IMF-fixdate, e.g.
/// `Thu, 01 Jan 1970 00:05:00 GMT`).
pub fn format_http_date(t: DateTime<Utc>) -> String {
    t.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Parse an HTTP-date. A malformed string is `None`, never an error —
/// callers treat unparseable as "cannot prove anything about this entry".
pub fn parse_http_date(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(s)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// Expiration instant of an entry, if it carries a parseable
/// `sw-cache-expires` header.
pub fn expires_at(entry: &StoredResponse) -> Option<DateTime<Utc>> {
    entry.header(EXPIRES_HEADER).and_then(parse_http_date)
}

/// Whether an entry may be served without revalidation.
///
/// Fresh requires a parseable expiration strictly in the future. A missing
/// or malformed header is not fresh (proceed to network).
pub fn is_fresh(entry: &StoredResponse, now: DateTime<Utc>) -> bool {
    match expires_at(entry) {
        Some(expires) => now < expires,
        None => false,
    }
}

/// Whether the purge sweep may delete an entry.
///
/// Deliberately asymmetric with [`is_fresh`]: an entry with no parseable
/// expiration is neither fresh nor expired. The sweep cannot prove a
/// foreign entry is past its lifetime, so it leaves it untouched.
pub fn is_expired(entry: &StoredResponse, now: DateTime<Utc>) -> bool {
    match expires_at(entry) {
        Some(expires) => now >= expires,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use chrono::TimeZone;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    fn entry_expiring_at(ms: i64) -> StoredResponse {
        StoredResponse {
            status: 200,
            status_text: "OK".to_string(),
            headers: vec![(EXPIRES_HEADER.to_string(), format_http_date(at(ms)))],
            body: Bytes::from_static(b"tile"),
        }
    }

    fn entry_with_header(value: &str) -> StoredResponse {
        StoredResponse {
            status: 200,
            status_text: "OK".to_string(),
            headers: vec![(EXPIRES_HEADER.to_string(), value.to_string())],
            body: Bytes::new(),
        }
    }

    #[test]
    fn http_date_round_trips() {
        let t = at(300_000);
        let formatted = format_http_date(t);
        assert_eq!(formatted, "Thu, 01 Jan 1970 00:05:00 GMT");
        assert_eq!(parse_http_date(&formatted), Some(t));
    }

    #[test]
    fn malformed_date_parses_to_none() {
        assert_eq!(parse_http_date("not a date"), None);
        assert_eq!(parse_http_date(""), None);
    }

    #[test]
    fn fresh_strictly_before_expiry() {
        let entry = entry_expiring_at(300_000);
        assert!(is_fresh(&entry, at(150_000)));
        assert!(is_fresh(&entry, at(299_000)));
        // At the exact expiration instant the entry is no longer fresh
        assert!(!is_fresh(&entry, at(300_000)));
        assert!(!is_fresh(&entry, at(300_001)));
    }

    #[test]
    fn expired_at_or_after_expiry() {
        let entry = entry_expiring_at(300_000);
        assert!(!is_expired(&entry, at(299_000)));
        assert!(is_expired(&entry, at(300_000)));
        assert!(is_expired(&entry, at(300_001)));
    }

    #[test]
    fn missing_header_is_neither_fresh_nor_expired() {
        let entry = StoredResponse {
            status: 200,
            status_text: "OK".to_string(),
            headers: vec![("content-type".into(), "image/png".into())],
            body: Bytes::new(),
        };
        assert!(!is_fresh(&entry, at(0)));
        assert!(!is_expired(&entry, at(i64::MAX / 2)));
    }

    #[test]
    fn malformed_header_is_neither_fresh_nor_expired() {
        let entry = entry_with_header("three weeks from tuesday");
        assert!(!is_fresh(&entry, at(0)));
        assert!(!is_expired(&entry, at(0)));
    }

    #[test]
    fn date_parsing_drops_subsecond_precision() {
        // HTTP-dates carry whole seconds; formatting truncates.
        let t = at(1_500);
        let parsed = parse_http_date(&format_http_date(t)).unwrap();
        assert_eq!(parsed, at(1_000));
    }
}
