//! Lenient date-time parsing for log timestamps and query parameters.
//!
//! Accepts the shapes proxies and browsers actually produce: RFC 3339 with any
//! offset, RFC 2822, `YYYY-MM-DD HH:MM:SS` with or without an offset, month
//! names (`Jan 1 2024`, `January 1, 2024 10:00`, `1 Jan 2024 10:00:00`),
//! ctime, US `MM/DD/YYYY`, a bare date, and unix epoch seconds or
//! milliseconds. Values without an offset, or with a trailing `UTC`/`GMT`,
//! are read as UTC. Runs of whitespace count as one space.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%:z",
    "%d/%b/%Y:%H:%M:%S %z",
];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M",
    // ctime / asctime
    "%a %b %d %H:%M:%S %Y",
    "%b %d %Y %H:%M:%S%.f",
    "%b %d %Y %H:%M",
    "%b %d, %Y %H:%M:%S%.f",
    "%b %d, %Y %H:%M",
    "%d %b %Y %H:%M:%S%.f",
    "%d %b %Y %H:%M",
    "%m/%d/%Y %H:%M:%S%.f",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%b %d %Y",
    "%b %d, %Y",
    "%d %b %Y",
    "%a, %d %b %Y",
    "%m/%d/%Y",
];

/// Zone names meaning UTC when they trail a naive date-time.
const UTC_NAMES: &[&str] = &["UTC", "GMT", "Z"];

/// Epoch values above this are taken as milliseconds.
const EPOCH_MILLIS_THRESHOLD: f64 = 1e11;

/// Parse `text` into a UTC instant, or `None` if no supported shape matches.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(&text) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(&text, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(&text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Some(local) = strip_utc_name(&text)
        && let Some(dt) = parse_naive(local)
    {
        return Some(dt);
    }
    if let Some(dt) = parse_naive(&text) {
        return Some(dt);
    }
    parse_epoch(&text)
}

/// `text` without a trailing `Z`, ` UTC` or ` GMT` (any case).
fn strip_utc_name(text: &str) -> Option<&str> {
    UTC_NAMES.iter().find_map(|name| {
        let split = text.len().checked_sub(name.len())?;
        let (head, tail) = (text.get(..split)?, text.get(split..)?);
        tail.eq_ignore_ascii_case(name)
            .then(|| head.trim_end())
            .filter(|head| !head.is_empty())
    })
}

/// Naive date-time or bare date (midnight), read as UTC.
fn parse_naive(text: &str) -> Option<DateTime<Utc>> {
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .map(|dt| Utc.from_utc_datetime(&dt))
}

fn parse_epoch(text: &str) -> Option<DateTime<Utc>> {
    // A short digit run is more likely a year than an epoch.
    let integral = text.split('.').next().unwrap_or_default();
    if integral.len() < 9 || !integral.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let value: f64 = text.parse().ok()?;
    let millis = if value > EPOCH_MILLIS_THRESHOLD {
        value
    } else {
        value * 1000.0
    };
    Utc.timestamp_millis_opt(millis as i64).single()
}
