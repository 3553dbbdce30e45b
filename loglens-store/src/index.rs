use crate::store::TimeRange;
use chrono::{DateTime, Utc};
use loglens_core::record::RecordId;
use std::collections::BTreeMap;
use std::ops::Bound;

/// Time-ordered in-memory index keyed by `(timestamp, id)`.
///
/// The id in the key breaks ties between records sharing a timestamp, so
/// ascending scans return same-instant records in insertion order. `V` is
/// the whole record for [`MemoryStore`](crate::MemoryStore) and only a file
/// location for [`FileStore`](crate::FileStore).
#[derive(Debug)]
pub(crate) struct RecordIndex<V> {
    by_time: BTreeMap<(DateTime<Utc>, RecordId), V>,
    next_id: RecordId,
}

impl<V> Default for RecordIndex<V> {
    fn default() -> Self {
        Self {
            by_time: BTreeMap::new(),
            next_id: RecordId(1),
        }
    }
}

impl<V> RecordIndex<V> {
    pub fn next_id(&self) -> RecordId {
        self.next_id
    }

    pub fn insert(&mut self, timestamp: DateTime<Utc>, id: RecordId, value: V) {
        if id >= self.next_id {
            self.next_id = id.next();
        }
        self.by_time.insert((timestamp, id), value);
    }

    pub fn len(&self) -> usize {
        self.by_time.len()
    }

    /// Entries inside `range`, ascending, at most `limit`.
    pub fn range(&self, range: &TimeRange, limit: Option<usize>) -> Vec<&V> {
        // BTreeMap::range panics on start > end
        if range.is_inverted() {
            return Vec::new();
        }
        let lower = match range.start {
            Some(s) => Bound::Included((s, RecordId(0))),
            None => Bound::Unbounded,
        };
        let upper = match range.end {
            Some(e) => Bound::Included((e, RecordId(u64::MAX))),
            None => Bound::Unbounded,
        };
        self.by_time
            .range((lower, upper))
            .take(limit.unwrap_or(usize::MAX))
            .map(|(_, value)| value)
            .collect()
    }

    /// The `limit` newest entries, newest first.
    pub fn recent(&self, limit: usize) -> Vec<&V> {
        self.by_time.values().rev().take(limit).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, m, 0).unwrap()
    }

    #[test]
    fn next_id_resumes_after_highest_inserted() {
        let mut index = RecordIndex::default();
        index.insert(t(1), RecordId(7), ());
        index.insert(t(2), RecordId(3), ());
        assert_eq!(index.next_id(), RecordId(8));
    }

    #[test]
    fn equal_timestamps_order_by_id() {
        let mut index = RecordIndex::default();
        index.insert(t(1), RecordId(2), "second");
        index.insert(t(1), RecordId(1), "first");
        assert_eq!(index.range(&TimeRange::all(), None), vec![&"first", &"second"]);
        assert_eq!(index.recent(1), vec![&"second"]);
    }

    #[test]
    fn inverted_range_is_empty() {
        let mut index = RecordIndex::default();
        index.insert(t(3), RecordId(1), ());
        assert!(index.range(&TimeRange::new(Some(t(5)), Some(t(1))), None).is_empty());
    }
}
