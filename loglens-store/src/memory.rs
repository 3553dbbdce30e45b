use crate::error::StoreError;
use crate::index::RecordIndex;
use crate::store::{RecordStore, TimeRange};
use loglens_core::record::{NewRecord, RecordId, RequestRecord, SlimRecord};
use std::sync::RwLock;

/// Non-durable store; records live only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    index: RwLock<RecordIndex<RequestRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryStore {
    fn append(&self, record: NewRecord) -> Result<RecordId, StoreError> {
        let mut index = self
            .index
            .write()
            .map_err(|_| StoreError::Poisoned("record index"))?;
        let id = index.next_id();
        let record = record.into_record(id);
        index.insert(record.timestamp, id, record);
        Ok(id)
    }

    fn query(
        &self,
        range: &TimeRange,
        limit: Option<usize>,
    ) -> Result<Vec<SlimRecord>, StoreError> {
        let index = self
            .index
            .read()
            .map_err(|_| StoreError::Poisoned("record index"))?;
        Ok(index
            .range(range, limit)
            .into_iter()
            .map(SlimRecord::from)
            .collect())
    }

    fn list_recent(&self, limit: usize) -> Result<Vec<RequestRecord>, StoreError> {
        let index = self
            .index
            .read()
            .map_err(|_| StoreError::Poisoned("record index"))?;
        Ok(index.recent(limit).into_iter().cloned().collect())
    }

    fn len(&self) -> Result<usize, StoreError> {
        let index = self
            .index
            .read()
            .map_err(|_| StoreError::Poisoned("record index"))?;
        Ok(index.len())
    }
}
