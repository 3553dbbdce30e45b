// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  loglens: reverse-proxy access-log stats
//
//  Ingest:  one tailer task following the JSON access log
//  Store:   append-only JSON-lines file + in-memory time index
//  API:     axum on the same tokio runtime
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use anyhow::Context;
use clap::Parser;
use loglens_admin::{ApiServer, ApiState};
use loglens_core::LoglensConfig;
use loglens_core::config::StorageConfig;
use loglens_ingest::{Tailer, TailerSettings};
use loglens_observability::MetricsCollector;
use loglens_store::{FileStore, FileStoreOptions, MemoryStore, QueryLimits, QueryService, RecordStore};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "loglens", version, about = "Tail a reverse-proxy access log and serve request stats")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "/etc/loglens/loglens.yaml")]
    config: PathBuf,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // ── Tracing ──
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level)),
        )
        .with_target(false)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "loglens starting");

    // ── Config ──
    if cli.config.exists() {
        info!(path = %cli.config.display(), "Loading config file");
    } else {
        info!(path = %cli.config.display(), "No config file found, using defaults and environment");
    }
    let config = LoglensConfig::load(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("loglens")
        .build()
        .context("building tokio runtime")?;

    runtime.block_on(run(config))
}

async fn run(config: LoglensConfig) -> anyhow::Result<()> {
    // ── Store ──
    let store = open_store(&config.storage)?;

    // ── Metrics ──
    let metrics = Arc::new(MetricsCollector::new(config.observability.prometheus.enabled)?);

    // ── Tailer ──
    let tailer = Tailer::new(
        TailerSettings::from(&config.ingest),
        Arc::clone(&store),
        Arc::clone(&metrics),
    )
    .spawn();

    // ── API ──
    let state = Arc::new(ApiState {
        query: QueryService::new(Arc::clone(&store), QueryLimits::from(&config.api)),
        tailer: Some(tailer.monitor()),
        metrics,
        metrics_path: config.observability.prometheus.path.clone(),
    });
    let served = ApiServer::new(config.api.clone(), state)
        .start(shutdown_signal())
        .await;

    // ── Shutdown ──
    tailer.shutdown().await;
    match store.len() {
        Ok(records) => info!(records, "loglens stopped"),
        Err(e) => warn!(error = %e, "loglens stopped, store unreadable"),
    }
    served
}

fn open_store(cfg: &StorageConfig) -> anyhow::Result<Arc<dyn RecordStore>> {
    match &cfg.path {
        Some(path) => {
            let store = FileStore::open(path, FileStoreOptions { fsync: cfg.fsync })
                .with_context(|| format!("opening record store {}", path.display()))?;
            Ok(Arc::new(store))
        }
        None => {
            warn!("storage.path not set, records are kept in memory only");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

/// Resolve on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
