//! Timestamp normalization and ordering.
//!
//! Record timestamps travel as ISO-8601 strings and are the sole
//! conflict-resolution key, so the ordering they induce must be total
//! even for malformed input. Reconciliation never fails on a bad
//! timestamp; it degrades to a deterministic fallback instead.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use std::cmp::Ordering;

/// Parse an ISO-8601 timestamp into a UTC instant.
///
/// Accepts RFC 3339 (with or without fractional seconds or a numeric
/// offset), a bare datetime without offset (treated as UTC), and the
/// date-only `YYYY-MM-DD` form. Returns `None` for anything else.
pub fn parse(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(instant) = DateTime::parse_from_rfc3339(value) {
        return Some(instant.with_timezone(&Utc));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }

    None
}

/// Format an instant in the canonical wire form: millisecond precision
/// with a `Z` suffix, e.g. `2024-03-01T10:00:00.000Z`.
pub fn format_iso(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Current instant in the canonical wire form.
pub fn now_iso() -> String {
    format_iso(Utc::now())
}

/// Normalize a raw timestamp to the canonical wire form.
///
/// Missing or unparseable input falls back to the current instant, so
/// the result is always a valid timestamp. Never fails.
pub fn normalize(value: Option<&str>) -> String {
    match value.and_then(parse) {
        Some(instant) => format_iso(instant),
        None => now_iso(),
    }
}

/// Total order over raw timestamp strings.
///
/// Parseable instants compare numerically. When exactly one side parses,
/// the parseable side is later. When neither parses, plain string order
/// keeps the result deterministic.
pub fn compare(a: &str, b: &str) -> Ordering {
    match (parse(a), parse(b)) {
        (Some(ta), Some(tb)) => ta.cmp(&tb),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => a.cmp(b),
    }
}

/// Later of two optional timestamps under [`compare`]; ties keep `a`.
/// `None` only when both sides are absent.
pub fn newer(a: Option<&str>, b: Option<&str>) -> Option<String> {
    match (a, b) {
        (None, None) => None,
        (Some(a), None) => Some(a.to_string()),
        (None, Some(b)) => Some(b.to_string()),
        (Some(a), Some(b)) => {
            if compare(a, b) == Ordering::Less {
                Some(b.to_string())
            } else {
                Some(a.to_string())
            }
        }
    }
}

/// Human-readable age of a timestamp relative to now, for status lines:
/// "just now", "5m ago", "3h ago", "2d ago", or a full date once it is
/// a week old. Unparseable input renders as "unknown".
pub fn relative_age(iso: &str) -> String {
    let Some(instant) = parse(iso) else {
        return "unknown".to_string();
    };

    let minutes = (Utc::now() - instant).num_minutes();
    if minutes < 1 {
        return "just now".to_string();
    }
    if minutes < 60 {
        return format!("{minutes}m ago");
    }

    let hours = minutes / 60;
    if hours < 24 {
        return format!("{hours}h ago");
    }

    let days = hours / 24;
    if days < 7 {
        return format!("{days}d ago");
    }

    instant.format("%b %-d, %Y, %-I:%M %p").to_string()
}
