//! Request-record persistence.
//!
//! [`RecordStore`] is the seam shared by the tailer (sole writer) and the
//! query service (readers). [`FileStore`] is the durable implementation,
//! [`MemoryStore`] keeps everything in process memory.

pub mod error;
pub mod file;
mod index;
pub mod memory;
pub mod query;
pub mod store;

pub use error::StoreError;
pub use file::{FileStore, FileStoreOptions};
pub use memory::MemoryStore;
pub use query::{LogsParams, QueryError, QueryLimits, QueryService, StatsParams};
pub use store::{RecordStore, TimeRange};
