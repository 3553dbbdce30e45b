use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel used for string fields missing from a log line.
pub const UNKNOWN: &str = "unknown";

/// Surrogate key assigned by the store on insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl RecordId {
    pub fn next(self) -> Self {
        RecordId(self.0 + 1)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A parsed access-log line that has not been stored yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    pub timestamp: DateTime<Utc>,
    /// `true` when the line carried no usable timestamp and ingestion time was used.
    pub timestamp_inferred: bool,
    pub service: String,
    pub client_ip: String,
    pub method: String,
    pub path: String,
    pub status: u16,
    pub duration_ms: f64,
    pub raw: String,
}

impl NewRecord {
    /// Attach the store-assigned id.
    pub fn into_record(self, id: RecordId) -> RequestRecord {
        RequestRecord {
            id,
            timestamp: self.timestamp,
            timestamp_inferred: self.timestamp_inferred,
            service: self.service,
            client_ip: self.client_ip,
            method: self.method,
            path: self.path,
            status: self.status,
            duration_ms: self.duration_ms,
            raw: self.raw,
        }
    }
}

/// A normalized request record as persisted and returned by `/api/logs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestRecord {
    pub id: RecordId,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub timestamp_inferred: bool,
    pub service: String,
    pub client_ip: String,
    pub method: String,
    pub path: String,
    pub status: u16,
    #[serde(rename = "duration")]
    pub duration_ms: f64,
    pub raw: String,
}

/// Projection used for time-range statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlimRecord {
    pub timestamp: DateTime<Utc>,
    pub status: u16,
    #[serde(rename = "duration")]
    pub duration_ms: f64,
    pub service: String,
}

impl From<&RequestRecord> for SlimRecord {
    fn from(record: &RequestRecord) -> Self {
        Self {
            timestamp: record.timestamp,
            status: record.status,
            duration_ms: record.duration_ms,
            service: record.service.clone(),
        }
    }
}
