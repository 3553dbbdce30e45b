use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable that overrides `ingest.log_file`.
pub const LOG_FILE_ENV: &str = "LOG_FILE_PATH";

/// Top-level loglens configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoglensConfig {
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Access-log tailing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
    /// Poll interval while the log file does not exist yet.
    #[serde(default = "default_wait_interval")]
    pub wait_interval_ms: u64,
    /// Poll interval while at end-of-file.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Lines longer than this are dropped as parse failures.
    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,
}

/// Record store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// JSON-lines data file. `None` keeps records in memory only.
    #[serde(default = "default_storage_path")]
    pub path: Option<PathBuf>,
    /// `fsync` after every append.
    #[serde(default)]
    pub fsync: bool,
}

/// Stats API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_addr")]
    pub addr: String,
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,
    /// Upper bound on `/api/stats` rows. `None` = unbounded.
    #[serde(default)]
    pub max_stats_rows: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub prometheus: PrometheusConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrometheusConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

// ── Defaults ──────────────────────────────────────────────────

fn default_log_file() -> PathBuf { PathBuf::from("/var/log/traefik/access.log") }
fn default_wait_interval() -> u64 { 2000 }
fn default_poll_interval() -> u64 { 100 }
fn default_max_line_bytes() -> usize { 1024 * 1024 }
fn default_storage_path() -> Option<PathBuf> { Some(PathBuf::from("data/loglens-requests.jsonl")) }
fn default_api_addr() -> String { "0.0.0.0:5000".into() }
fn default_limit() -> usize { 100 }
fn default_max_limit() -> usize { 10_000 }
fn default_true() -> bool { true }
fn default_metrics_path() -> String { "/metrics".into() }

// ── Impls ─────────────────────────────────────────────────────

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            log_file: default_log_file(),
            wait_interval_ms: default_wait_interval(),
            poll_interval_ms: default_poll_interval(),
            max_line_bytes: default_max_line_bytes(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
            fsync: false,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            addr: default_api_addr(),
            default_limit: default_limit(),
            max_limit: default_max_limit(),
            max_stats_rows: None,
        }
    }
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_metrics_path(),
        }
    }
}

impl IngestConfig {
    pub fn wait_interval(&self) -> Duration {
        Duration::from_millis(self.wait_interval_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl LoglensConfig {
    /// Load configuration from an optional YAML file + env overrides.
    ///
    /// A missing file contributes nothing. `LOGLENS_`-prefixed variables use
    /// `__` for nesting (`LOGLENS_API__ADDR`), and `LOG_FILE_PATH` sets
    /// `ingest.log_file`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let config: LoglensConfig = Figment::new()
            .merge(Yaml::file(path))
            .merge(Env::prefixed("LOGLENS_").split("__"))
            .merge(
                Env::raw()
                    .only(&[LOG_FILE_ENV])
                    .map(|_| "ingest.log_file".into()),
            )
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the tailer or API cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.ingest.wait_interval_ms == 0 || self.ingest.poll_interval_ms == 0 {
            anyhow::bail!("ingest poll intervals must be greater than zero");
        }
        if self.ingest.max_line_bytes == 0 {
            anyhow::bail!("ingest.max_line_bytes must be greater than zero");
        }
        if self.api.default_limit == 0 || self.api.max_limit == 0 {
            anyhow::bail!("api limits must be greater than zero");
        }
        if self.api.default_limit > self.api.max_limit {
            anyhow::bail!(
                "api.default_limit ({}) exceeds api.max_limit ({})",
                self.api.default_limit,
                self.api.max_limit
            );
        }
        let metrics_path = &self.observability.prometheus.path;
        if !metrics_path.starts_with('/') || metrics_path.starts_with("/api/") || metrics_path == "/health" {
            anyhow::bail!("observability.prometheus.path {metrics_path:?} must be an unused absolute path");
        }
        Ok(())
    }
}
