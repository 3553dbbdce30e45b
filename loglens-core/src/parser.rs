//! Access-log line parser.
//!
//! Turns one line of the proxy's JSON access log into a [`NewRecord`]. The
//! parser is tolerant of missing fields (they take documented defaults) but
//! rejects lines that are not JSON objects or whose numeric fields cannot be
//! coerced.

use crate::record::{NewRecord, UNKNOWN};
use crate::timeparse::parse_timestamp;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

const FIELD_START_UTC: &str = "StartUTC";
const FIELD_TIME: &str = "time";
const FIELD_SERVICE: &str = "RouterName";
const FIELD_CLIENT: &str = "ClientHost";
const FIELD_METHOD: &str = "RequestMethod";
const FIELD_PATH: &str = "RequestPath";
const FIELD_STATUS: &str = "DownstreamStatus";
const FIELD_DURATION: &str = "Duration";

const NANOS_PER_MILLI: f64 = 1_000_000.0;

/// Why a line was rejected.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("line is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("line is JSON but not an object")]
    NotAnObject,

    #[error("invalid DownstreamStatus: {0}")]
    InvalidStatus(String),

    #[error("invalid Duration: {0}")]
    InvalidDuration(String),
}

/// Parse one access-log line, defaulting a missing timestamp to now.
pub fn parse_line(line: &str) -> Result<NewRecord, ParseError> {
    parse_line_at(line, Utc::now())
}

/// Parse one access-log line; `now` is used when the line has no usable timestamp.
pub fn parse_line_at(line: &str, now: DateTime<Utc>) -> Result<NewRecord, ParseError> {
    let raw = line.trim_end_matches(['\n', '\r']);

    let value: Value =
        serde_json::from_str(raw).map_err(|e| ParseError::InvalidJson(e.to_string()))?;
    let Value::Object(fields) = value else {
        return Err(ParseError::NotAnObject);
    };

    let (timestamp, timestamp_inferred) = match extract_timestamp(&fields) {
        Some(ts) => (ts, false),
        None => (now, true),
    };

    let status = extract_status(fields.get(FIELD_STATUS))?;
    let duration_ms = extract_duration_nanos(fields.get(FIELD_DURATION))? / NANOS_PER_MILLI;

    Ok(NewRecord {
        timestamp,
        timestamp_inferred,
        service: string_field(&fields, FIELD_SERVICE),
        client_ip: string_field(&fields, FIELD_CLIENT),
        method: string_field(&fields, FIELD_METHOD),
        path: string_field(&fields, FIELD_PATH),
        status,
        duration_ms,
        raw: raw.to_string(),
    })
}

/// First parseable of `StartUTC`, then `time`.
fn extract_timestamp(fields: &Map<String, Value>) -> Option<DateTime<Utc>> {
    [FIELD_START_UTC, FIELD_TIME]
        .iter()
        .filter_map(|key| fields.get(*key).and_then(Value::as_str))
        .find_map(parse_timestamp)
}

fn string_field(fields: &Map<String, Value>, key: &str) -> String {
    match fields.get(key) {
        None | Some(Value::Null) => UNKNOWN.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn extract_status(value: Option<&Value>) -> Result<u16, ParseError> {
    let Some(value) = value else {
        return Ok(0);
    };
    let code = match value {
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => Some(i),
            // fractional codes truncate toward zero
            (None, Some(f)) if f.is_finite() => Some(f.trunc() as i64),
            _ => None,
        },
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    code.and_then(|c| u16::try_from(c).ok())
        .ok_or_else(|| ParseError::InvalidStatus(value.to_string()))
}

fn extract_duration_nanos(value: Option<&Value>) -> Result<f64, ParseError> {
    match value {
        None => Ok(0.0),
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| ParseError::InvalidDuration(n.to_string())),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|d| d.is_finite())
            .ok_or_else(|| ParseError::InvalidDuration(s.clone())),
        Some(other) => Err(ParseError::InvalidDuration(other.to_string())),
    }
}
