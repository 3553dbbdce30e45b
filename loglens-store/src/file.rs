//! Durable JSON-lines store.
//!
//! Every record is appended to the data file as one JSON object per line. The
//! file is the only copy of the records: memory holds just a time-ordered
//! index of `(timestamp, id) → byte range`, and queries read the matching
//! lines back from disk. Opening an existing file replays it to rebuild the
//! index; the id sequence resumes after the highest stored id.
//!
//! A crash can leave a torn final line. On open it is cut off so the next
//! append starts on a fresh line; malformed lines elsewhere are skipped with a
//! warning. A failed append truncates the file back to its previous length,
//! so a record reported as failed never resurfaces after a restart.

use crate::error::StoreError;
use crate::index::RecordIndex;
use crate::store::{RecordStore, TimeRange};
use loglens_core::record::{NewRecord, RecordId, RequestRecord, SlimRecord};
use serde::de::DeserializeOwned;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Open-time options for [`FileStore`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FileStoreOptions {
    /// `sync_data` after every append.
    pub fsync: bool,
}

pub struct FileStore {
    path: PathBuf,
    options: FileStoreOptions,
    writer: Mutex<WriterState>,
    index: RwLock<RecordIndex<RecordLocation>>,
}

struct WriterState {
    file: File,
    /// Length of the file up to the last complete line.
    len: u64,
}

impl WriterState {
    /// Cut off whatever a failed write left past the last complete line.
    fn rollback(&mut self, path: &Path) {
        if let Err(e) = self.file.set_len(self.len) {
            warn!(error = %e, path = %path.display(), "store: rollback of failed append failed");
        }
    }
}

/// Byte range of one record line, terminator excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RecordLocation {
    offset: u64,
    len: u64,
}

/// Outcome of replaying an existing data file.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReplayReport {
    pub loaded: usize,
    pub skipped: usize,
    pub truncated_bytes: u64,
}

impl FileStore {
    /// Open (or create) the data file at `path` and rebuild the index from it.
    pub fn open(path: impl AsRef<Path>, options: FileStoreOptions) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let mut index = RecordIndex::default();
        let (report, valid_len) = replay(&path, &mut index)?;

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let on_disk = file.metadata()?.len();
        if on_disk > valid_len {
            warn!(
                path = %path.display(),
                bytes = on_disk - valid_len,
                "store: discarding torn trailing line"
            );
            file.set_len(valid_len)?;
        }

        info!(
            path = %path.display(),
            records = report.loaded,
            skipped = report.skipped,
            next_id = %index.next_id(),
            "store: data file opened"
        );

        Ok(Self {
            path,
            options,
            writer: Mutex::new(WriterState {
                file,
                len: valid_len,
            }),
            index: RwLock::new(index),
        })
    }

    /// Copy the locations out so the index lock is not held during disk reads.
    fn locate(
        &self,
        pick: impl FnOnce(&RecordIndex<RecordLocation>) -> Vec<&RecordLocation>,
    ) -> Result<Vec<RecordLocation>, StoreError> {
        let index = self
            .index
            .read()
            .map_err(|_| StoreError::Poisoned("record index"))?;
        Ok(pick(&*index).into_iter().copied().collect())
    }

    fn read_all<T: DeserializeOwned>(
        &self,
        locations: &[RecordLocation],
    ) -> Result<Vec<T>, StoreError> {
        if locations.is_empty() {
            return Ok(Vec::new());
        }
        let mut reader = LineReader::open(&self.path)?;
        locations.iter().map(|loc| reader.read(*loc)).collect()
    }
}

/// Positioned reads of indexed lines.
struct LineReader {
    file: File,
    buf: Vec<u8>,
}

impl LineReader {
    fn open(path: &Path) -> Result<Self, StoreError> {
        Ok(Self {
            file: File::open(path)?,
            buf: Vec::new(),
        })
    }

    fn read<T: DeserializeOwned>(&mut self, loc: RecordLocation) -> Result<T, StoreError> {
        let len = usize::try_from(loc.len)
            .map_err(|_| std::io::Error::other("record line exceeds address space"))?;
        self.buf.resize(len, 0);
        self.file.seek(SeekFrom::Start(loc.offset))?;
        self.file.read_exact(&mut self.buf)?;
        Ok(serde_json::from_slice(&self.buf)?)
    }
}

/// Index every well-formed line of `path`.
///
/// Returns the report and the byte length covered by complete lines.
fn replay(
    path: &Path,
    index: &mut RecordIndex<RecordLocation>,
) -> Result<(ReplayReport, u64), StoreError> {
    let mut report = ReplayReport::default();
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "store: no data file found, starting fresh");
            return Ok((report, 0));
        }
        Err(e) => return Err(e.into()),
    };

    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();
    let mut valid_len = 0u64;
    let mut line_no = 0usize;

    loop {
        buf.clear();
        let n = reader.read_until(b'\n', &mut buf)?;
        if n == 0 {
            break;
        }
        if buf.last() != Some(&b'\n') {
            report.truncated_bytes = n as u64;
            break;
        }
        line_no += 1;
        let offset = valid_len;
        valid_len += n as u64;

        let line = &buf[..buf.len() - 1];
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        match serde_json::from_slice::<RequestRecord>(line) {
            Ok(record) => {
                let location = RecordLocation {
                    offset,
                    len: line.len() as u64,
                };
                index.insert(record.timestamp, record.id, location);
                report.loaded += 1;
            }
            Err(e) => {
                warn!(error = %e, line = line_no, path = %path.display(), "store: skipping malformed record");
                report.skipped += 1;
            }
        }
    }

    Ok((report, valid_len))
}

impl RecordStore for FileStore {
    fn append(&self, record: NewRecord) -> Result<RecordId, StoreError> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| StoreError::Poisoned("store writer"))?;

        let id = self
            .index
            .read()
            .map_err(|_| StoreError::Poisoned("record index"))?
            .next_id();
        let record = record.into_record(id);

        let mut line = serde_json::to_vec(&record)?;
        let location = RecordLocation {
            offset: writer.len,
            len: line.len() as u64,
        };
        line.push(b'\n');

        let written = writer.file.write_all(&line).and_then(|()| {
            if self.options.fsync {
                writer.file.sync_data()
            } else {
                Ok(())
            }
        });
        if let Err(e) = written {
            writer.rollback(&self.path);
            return Err(e.into());
        }
        writer.len += line.len() as u64;

        self.index
            .write()
            .map_err(|_| StoreError::Poisoned("record index"))?
            .insert(record.timestamp, id, location);

        Ok(id)
    }

    fn query(
        &self,
        range: &TimeRange,
        limit: Option<usize>,
    ) -> Result<Vec<SlimRecord>, StoreError> {
        let locations = self.locate(|index| index.range(range, limit))?;
        self.read_all(&locations)
    }

    fn list_recent(&self, limit: usize) -> Result<Vec<RequestRecord>, StoreError> {
        let locations = self.locate(|index| index.recent(limit))?;
        self.read_all(&locations)
    }

    fn len(&self) -> Result<usize, StoreError> {
        let index = self
            .index
            .read()
            .map_err(|_| StoreError::Poisoned("record index"))?;
        Ok(index.len())
    }
}
