//! Access-log tailer.
//!
//! A single background task that follows the proxy's access log and feeds
//! every complete line through the parser into the record store.
//!
//! ```text
//!   WaitingForFile ──(file appears, seek to EOF)──► Following
//!         ▲                                            │
//!         └──────────────(read error)──────────────────┘
//!   any state ──(shutdown)──► Stopped
//! ```
//!
//! Only lines appended after the tailer reaches `Following` are ingested.
//! A line without its terminating newline stays buffered until the newline
//! arrives, up to `max_line_bytes`; a longer line is discarded as it streams
//! in and counted as a parse failure once its newline shows up. Parse
//! failures and store failures drop the line and never stop the loop.

use loglens_core::config::IngestConfig;
use loglens_core::parser::parse_line;
use loglens_observability::{LineOutcome, MetricsCollector};
use loglens_store::RecordStore;
use serde::Serialize;
use std::io::SeekFrom;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TailerState {
    WaitingForFile,
    Following,
    Stopped,
}

/// Counters since the tailer started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TailerStats {
    pub lines_read: u64,
    pub records_stored: u64,
    pub parse_failures: u64,
    pub store_failures: u64,
}

#[derive(Debug, Default)]
struct SharedStats {
    lines_read: AtomicU64,
    records_stored: AtomicU64,
    parse_failures: AtomicU64,
    store_failures: AtomicU64,
}

impl SharedStats {
    fn snapshot(&self) -> TailerStats {
        TailerStats {
            lines_read: self.lines_read.load(Ordering::Relaxed),
            records_stored: self.records_stored.load(Ordering::Relaxed),
            parse_failures: self.parse_failures.load(Ordering::Relaxed),
            store_failures: self.store_failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TailerSettings {
    pub path: PathBuf,
    /// Existence poll interval while waiting for the file.
    pub wait_interval: Duration,
    /// Idle poll interval at end-of-file.
    pub poll_interval: Duration,
    /// Longest buffered line, terminator included.
    pub max_line_bytes: usize,
}

impl From<&IngestConfig> for TailerSettings {
    fn from(cfg: &IngestConfig) -> Self {
        Self {
            path: cfg.log_file.clone(),
            wait_interval: cfg.wait_interval(),
            poll_interval: cfg.poll_interval(),
            max_line_bytes: cfg.max_line_bytes,
        }
    }
}

pub struct Tailer {
    settings: TailerSettings,
    store: Arc<dyn RecordStore>,
    metrics: Arc<MetricsCollector>,
}

/// Why `follow` returned.
enum FollowEnd {
    Shutdown,
    ReadError(std::io::Error),
}

impl Tailer {
    pub fn new(
        settings: TailerSettings,
        store: Arc<dyn RecordStore>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            settings,
            store,
            metrics,
        }
    }

    /// Start the tailer on the current tokio runtime.
    ///
    /// The task runs until [`TailerHandle::shutdown`] is called or the handle
    /// is dropped.
    pub fn spawn(self) -> TailerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (state_tx, state_rx) = watch::channel(TailerState::WaitingForFile);
        let stats = Arc::new(SharedStats::default());

        let task = tokio::spawn(self.run(shutdown_rx, state_tx, Arc::clone(&stats)));

        TailerHandle {
            shutdown: shutdown_tx,
            monitor: TailerMonitor {
                state: state_rx,
                stats,
            },
            task,
        }
    }

    async fn run(
        self,
        mut shutdown: watch::Receiver<bool>,
        state: watch::Sender<TailerState>,
        stats: Arc<SharedStats>,
    ) {
        info!(path = %self.settings.path.display(), "tailer: watching access log");

        loop {
            state.send_replace(TailerState::WaitingForFile);
            self.metrics.set_following(false);

            let Some(file) = self.wait_for_file(&mut shutdown).await else {
                break;
            };

            state.send_replace(TailerState::Following);
            self.metrics.set_following(true);

            match self.follow(file, &mut shutdown, &stats).await {
                FollowEnd::Shutdown => break,
                FollowEnd::ReadError(e) => {
                    warn!(error = %e, path = %self.settings.path.display(), "tailer: read failed, reopening");
                }
            }
        }

        state.send_replace(TailerState::Stopped);
        self.metrics.set_following(false);
        info!("tailer: stopped");
    }

    /// Poll until the log file exists, then open it positioned at its end.
    ///
    /// Returns `None` on shutdown.
    async fn wait_for_file(&self, shutdown: &mut watch::Receiver<bool>) -> Option<File> {
        let path = &self.settings.path;
        let mut announced = false;

        loop {
            if *shutdown.borrow() {
                return None;
            }

            if tokio::fs::try_exists(path).await.unwrap_or(false) {
                match open_at_end(path).await {
                    Ok((file, offset)) => {
                        info!(path = %path.display(), offset, "tailer: following access log");
                        return Some(file);
                    }
                    Err(e) => {
                        warn!(error = %e, path = %path.display(), "tailer: cannot open access log");
                    }
                }
            } else if !announced {
                info!(path = %path.display(), "tailer: waiting for access log to appear");
                announced = true;
            } else {
                debug!(path = %path.display(), "tailer: access log still missing");
            }

            if !pause(shutdown, self.settings.wait_interval).await {
                return None;
            }
        }
    }

    async fn follow(
        &self,
        file: File,
        shutdown: &mut watch::Receiver<bool>,
        stats: &SharedStats,
    ) -> FollowEnd {
        let mut reader = BufReader::new(file);
        let mut pending: Vec<u8> = Vec::new();
        let mut oversized = false;

        loop {
            if *shutdown.borrow() {
                return FollowEnd::Shutdown;
            }

            let (used, complete) = match reader.fill_buf().await {
                // EOF, possibly holding a partial line
                Ok(buf) if buf.is_empty() => {
                    if !pause(shutdown, self.settings.poll_interval).await {
                        return FollowEnd::Shutdown;
                    }
                    continue;
                }
                Ok(buf) => {
                    let (chunk, complete) = match buf.iter().position(|&b| b == b'\n') {
                        Some(i) => (&buf[..=i], true),
                        None => (buf, false),
                    };
                    if !oversized {
                        pending.extend_from_slice(chunk);
                    }
                    (chunk.len(), complete)
                }
                Err(e) => return FollowEnd::ReadError(e),
            };
            reader.consume(used);

            if !oversized && pending.len() > self.settings.max_line_bytes {
                warn!(
                    limit = self.settings.max_line_bytes,
                    "tailer: line exceeds max_line_bytes, discarding it"
                );
                pending = Vec::new();
                oversized = true;
            }

            if complete {
                if oversized {
                    oversized = false;
                    self.count_parse_failure(stats);
                } else {
                    let line = std::mem::take(&mut pending);
                    self.ingest(&line, stats).await;
                }
            }
        }
    }

    fn count_parse_failure(&self, stats: &SharedStats) {
        stats.lines_read.fetch_add(1, Ordering::Relaxed);
        stats.parse_failures.fetch_add(1, Ordering::Relaxed);
        self.metrics.record_line(LineOutcome::ParseFailed);
    }

    /// Parse one complete line and append it to the store.
    async fn ingest(&self, line: &[u8], stats: &SharedStats) {
        let Ok(text) = std::str::from_utf8(line) else {
            self.count_parse_failure(stats);
            debug!(bytes = line.len(), "tailer: dropping non-UTF-8 line");
            return;
        };
        let text = text.trim_end_matches(['\n', '\r']);
        if text.trim().is_empty() {
            return;
        }
        stats.lines_read.fetch_add(1, Ordering::Relaxed);

        let record = match parse_line(text) {
            Ok(record) => record,
            Err(e) => {
                stats.parse_failures.fetch_add(1, Ordering::Relaxed);
                self.metrics.record_line(LineOutcome::ParseFailed);
                debug!(error = %e, "tailer: dropping unparseable line");
                return;
            }
        };

        let store = Arc::clone(&self.store);
        match tokio::task::spawn_blocking(move || store.append(record)).await {
            Ok(Ok(id)) => {
                stats.records_stored.fetch_add(1, Ordering::Relaxed);
                self.metrics.record_line(LineOutcome::Stored);
                debug!(id = %id, "tailer: record stored");
            }
            Ok(Err(e)) => {
                stats.store_failures.fetch_add(1, Ordering::Relaxed);
                self.metrics.record_line(LineOutcome::StoreFailed);
                warn!(error = %e, "tailer: store append failed, line dropped");
            }
            Err(e) => {
                stats.store_failures.fetch_add(1, Ordering::Relaxed);
                self.metrics.record_line(LineOutcome::StoreFailed);
                warn!(error = %e, "tailer: store task failed, line dropped");
            }
        }
    }
}

async fn open_at_end(path: &std::path::Path) -> std::io::Result<(File, u64)> {
    let mut file = File::open(path).await?;
    let offset = file.seek(SeekFrom::End(0)).await?;
    Ok((file, offset))
}

/// Sleep for `interval` unless shutdown is requested first.
///
/// Returns `false` when the tailer should stop. A dropped handle counts as a
/// shutdown request.
async fn pause(shutdown: &mut watch::Receiver<bool>, interval: Duration) -> bool {
    tokio::select! {
        changed = shutdown.changed() => changed.is_ok() && !*shutdown.borrow(),
        _ = tokio::time::sleep(interval) => true,
    }
}

/// Read-only view of a running tailer, cheap to clone into API state.
#[derive(Debug, Clone)]
pub struct TailerMonitor {
    state: watch::Receiver<TailerState>,
    stats: Arc<SharedStats>,
}

/// Point-in-time tailer status for `/health`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TailerStatus {
    pub state: TailerState,
    #[serde(flatten)]
    pub stats: TailerStats,
}

impl TailerMonitor {
    pub fn state(&self) -> TailerState {
        *self.state.borrow()
    }

    pub fn stats(&self) -> TailerStats {
        self.stats.snapshot()
    }

    pub fn status(&self) -> TailerStatus {
        TailerStatus {
            state: self.state(),
            stats: self.stats(),
        }
    }

    /// Resolve once the tailer reaches `target`.
    ///
    /// Returns `false` if the tailer task ended without reaching it.
    pub async fn wait_for_state(&self, target: TailerState) -> bool {
        let mut rx = self.state.clone();
        rx.wait_for(|s| *s == target).await.is_ok()
    }
}

/// Owner handle of the tailer task.
pub struct TailerHandle {
    shutdown: watch::Sender<bool>,
    monitor: TailerMonitor,
    task: JoinHandle<()>,
}

impl TailerHandle {
    pub fn monitor(&self) -> TailerMonitor {
        self.monitor.clone()
    }

    pub fn state(&self) -> TailerState {
        self.monitor.state()
    }

    pub fn stats(&self) -> TailerStats {
        self.monitor.stats()
    }

    /// Signal the task to stop and wait for it to finish.
    ///
    /// A partially read line is abandoned.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "tailer: task ended abnormally");
        }
    }
}
