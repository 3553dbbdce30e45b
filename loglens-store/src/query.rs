//! Query service: turns raw API parameters into store queries.
//!
//! Time bucketing and status distributions are computed by the dashboard; this
//! layer only guarantees a correctly filtered and ordered sequence.

use crate::error::StoreError;
use crate::store::{RecordStore, TimeRange};
use chrono::{DateTime, Utc};
use loglens_core::LoglensError;
use loglens_core::config::ApiConfig;
use loglens_core::record::{RequestRecord, SlimRecord};
use loglens_core::timeparse::parse_timestamp;
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// `GET /api/stats` query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatsParams {
    pub start: Option<String>,
    pub end: Option<String>,
    pub limit: Option<String>,
}

/// `GET /api/logs` query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogsParams {
    pub limit: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryLimits {
    /// `/api/logs` limit when none is given.
    pub default_limit: usize,
    /// Larger `/api/logs` limits are clamped to this.
    pub max_limit: usize,
    /// Cap on `/api/stats` rows; `None` leaves the range unbounded.
    pub max_stats_rows: Option<usize>,
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            default_limit: 100,
            max_limit: 10_000,
            max_stats_rows: None,
        }
    }
}

impl From<&ApiConfig> for QueryLimits {
    fn from(cfg: &ApiConfig) -> Self {
        Self {
            default_limit: cfg.default_limit,
            max_limit: cfg.max_limit,
            max_stats_rows: cfg.max_stats_rows,
        }
    }
}

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("query task failed: {0}")]
    Task(String),
}

impl QueryError {
    pub fn status_code(&self) -> u16 {
        match self {
            QueryError::InvalidArgument(_) => 400,
            QueryError::Store(_) | QueryError::Task(_) => 500,
        }
    }
}

impl From<QueryError> for LoglensError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::InvalidArgument(msg) => LoglensError::InvalidArgument(msg),
            QueryError::Store(e) => e.into(),
            QueryError::Task(msg) => LoglensError::Internal(msg),
        }
    }
}

/// Read side of the pipeline, shared by all API handlers.
#[derive(Clone)]
pub struct QueryService {
    store: Arc<dyn RecordStore>,
    limits: QueryLimits,
}

impl QueryService {
    pub fn new(store: Arc<dyn RecordStore>, limits: QueryLimits) -> Self {
        Self { store, limits }
    }

    /// Number of stored records, counted on the blocking pool.
    pub async fn record_count(&self) -> Result<usize, QueryError> {
        let store = Arc::clone(&self.store);
        let count = tokio::task::spawn_blocking(move || store.len())
            .await
            .map_err(|e| QueryError::Task(e.to_string()))??;
        Ok(count)
    }

    /// Slim records inside `[start, end]`, ascending by timestamp.
    pub async fn stats(&self, params: &StatsParams) -> Result<Vec<SlimRecord>, QueryError> {
        let range = self.resolve_range(params)?;
        let limit = self.resolve_stats_limit(params.limit.as_deref())?;

        let store = Arc::clone(&self.store);
        let rows = tokio::task::spawn_blocking(move || store.query(&range, limit))
            .await
            .map_err(|e| QueryError::Task(e.to_string()))??;

        debug!(start = ?range.start, end = ?range.end, rows = rows.len(), "stats query");
        Ok(rows)
    }

    /// The most recent records, newest first.
    pub async fn logs(&self, params: &LogsParams) -> Result<Vec<RequestRecord>, QueryError> {
        let limit = self.resolve_logs_limit(params.limit.as_deref())?;

        let store = Arc::clone(&self.store);
        let rows = tokio::task::spawn_blocking(move || store.list_recent(limit))
            .await
            .map_err(|e| QueryError::Task(e.to_string()))??;

        debug!(limit, rows = rows.len(), "logs query");
        Ok(rows)
    }

    pub fn resolve_range(&self, params: &StatsParams) -> Result<TimeRange, QueryError> {
        Ok(TimeRange::new(
            parse_bound("start", params.start.as_deref())?,
            parse_bound("end", params.end.as_deref())?,
        ))
    }

    pub fn resolve_stats_limit(&self, limit: Option<&str>) -> Result<Option<usize>, QueryError> {
        let requested = parse_positive("limit", limit)?;
        Ok(match (requested, self.limits.max_stats_rows) {
            (Some(n), Some(max)) => Some(n.min(max)),
            (Some(n), None) => Some(n),
            (None, max) => max,
        })
    }

    pub fn resolve_logs_limit(&self, limit: Option<&str>) -> Result<usize, QueryError> {
        Ok(parse_positive("limit", limit)?
            .unwrap_or(self.limits.default_limit)
            .min(self.limits.max_limit))
    }
}

fn parse_bound(name: &str, value: Option<&str>) -> Result<Option<DateTime<Utc>>, QueryError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => parse_timestamp(text).map(Some).ok_or_else(|| {
            QueryError::InvalidArgument(format!("{name}: unrecognised date-time {text:?}"))
        }),
    }
}

fn parse_positive(name: &str, value: Option<&str>) -> Result<Option<usize>, QueryError> {
    let text = match value.map(str::trim) {
        None | Some("") => return Ok(None),
        Some(text) => text,
    };
    match text.parse::<i64>() {
        Ok(n) if n > 0 => Ok(Some(usize::try_from(n).unwrap_or(usize::MAX))),
        Ok(_) => Err(QueryError::InvalidArgument(format!(
            "{name}: must be a positive integer, got {text}"
        ))),
        Err(_) => Err(QueryError::InvalidArgument(format!(
            "{name}: not an integer: {text:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use chrono::TimeZone;
    use loglens_core::record::NewRecord;

    fn service(limits: QueryLimits) -> QueryService {
        QueryService::new(Arc::new(MemoryStore::new()), limits)
    }

    #[test]
    fn logs_limit_defaults_and_clamps() {
        let svc = service(QueryLimits {
            default_limit: 100,
            max_limit: 500,
            max_stats_rows: None,
        });
        assert_eq!(svc.resolve_logs_limit(None).unwrap(), 100);
        assert_eq!(svc.resolve_logs_limit(Some("")).unwrap(), 100);
        assert_eq!(svc.resolve_logs_limit(Some(" 25 ")).unwrap(), 25);
        assert_eq!(svc.resolve_logs_limit(Some("100000")).unwrap(), 500);
    }

    #[test]
    fn logs_limit_rejects_garbage() {
        let svc = service(QueryLimits::default());
        for bad in ["abc", "0", "-3", "1.5"] {
            let err = svc.resolve_logs_limit(Some(bad)).unwrap_err();
            assert!(matches!(err, QueryError::InvalidArgument(_)), "{bad}");
            assert_eq!(err.status_code(), 400);
        }
    }

    #[test]
    fn stats_limit_respects_configured_cap() {
        let capped = service(QueryLimits {
            max_stats_rows: Some(1000),
            ..QueryLimits::default()
        });
        assert_eq!(capped.resolve_stats_limit(None).unwrap(), Some(1000));
        assert_eq!(capped.resolve_stats_limit(Some("10")).unwrap(), Some(10));
        assert_eq!(capped.resolve_stats_limit(Some("5000")).unwrap(), Some(1000));

        let open = service(QueryLimits::default());
        assert_eq!(open.resolve_stats_limit(None).unwrap(), None);
    }

    #[test]
    fn range_accepts_flexible_text_and_blank_bounds() {
        let svc = service(QueryLimits::default());
        let range = svc
            .resolve_range(&StatsParams {
                start: Some("2024-01-01 00:00".into()),
                end: Some("   ".into()),
                limit: None,
            })
            .unwrap();
        assert!(range.start.is_some());
        assert!(range.end.is_none());
    }

    #[test]
    fn unparseable_bound_is_invalid_argument() {
        let svc = service(QueryLimits::default());
        let err = svc
            .resolve_range(&StatsParams {
                start: None,
                end: Some("not-a-date".into()),
                limit: None,
            })
            .unwrap_err();
        assert!(err.to_string().contains("end"));
        assert_eq!(LoglensError::from(err).status_code(), 400);
    }

    #[tokio::test]
    async fn record_count_follows_appends() {
        let store = Arc::new(MemoryStore::new());
        let svc = QueryService::new(store.clone(), QueryLimits::default());
        assert_eq!(svc.record_count().await.unwrap(), 0);

        for minute in 0..3 {
            store
                .append(NewRecord {
                    timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, minute, 0).unwrap(),
                    timestamp_inferred: false,
                    service: "svc".into(),
                    client_ip: "192.0.2.1".into(),
                    method: "GET".into(),
                    path: "/".into(),
                    status: 200,
                    duration_ms: 1.0,
                    raw: "{}".into(),
                })
                .unwrap();
        }
        assert_eq!(svc.record_count().await.unwrap(), 3);
    }

    #[test]
    fn store_errors_map_to_500() {
        let err = QueryError::from(StoreError::Poisoned("record index"));
        assert_eq!(err.status_code(), 500);
        assert_eq!(LoglensError::from(err).status_code(), 500);
    }
}
