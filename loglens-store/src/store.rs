use crate::error::StoreError;
use chrono::{DateTime, Utc};
use loglens_core::record::{NewRecord, RecordId, RequestRecord, SlimRecord};

/// Inclusive time window; an open side is unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl TimeRange {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self { start, end }
    }

    pub fn since(start: DateTime<Utc>) -> Self {
        Self::new(Some(start), None)
    }

    pub fn until(end: DateTime<Utc>) -> Self {
        Self::new(None, Some(end))
    }

    /// A range whose start lies after its end.
    pub fn is_inverted(&self) -> bool {
        matches!((self.start, self.end), (Some(s), Some(e)) if s > e)
    }
}

/// Append-only repository of request records.
///
/// Implementations serialize conflicting writes internally: a reader never
/// observes a half-inserted record, and a record is visible to readers as
/// soon as `append` returns.
pub trait RecordStore: Send + Sync {
    /// Persist one record and return its newly assigned id.
    fn append(&self, record: NewRecord) -> Result<RecordId, StoreError>;

    /// Records inside `range`, ascending by timestamp, at most `limit` of them.
    fn query(&self, range: &TimeRange, limit: Option<usize>)
        -> Result<Vec<SlimRecord>, StoreError>;

    /// The `limit` most recent records, newest first.
    fn list_recent(&self, limit: usize) -> Result<Vec<RequestRecord>, StoreError>;

    fn len(&self) -> Result<usize, StoreError>;
}
