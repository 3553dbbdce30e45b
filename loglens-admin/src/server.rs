use crate::handlers;
use axum::Router;
use axum::routing::get;
use loglens_core::config::ApiConfig;
use loglens_ingest::TailerMonitor;
use loglens_observability::MetricsCollector;
use loglens_store::QueryService;
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared state for the API handlers.
pub struct ApiState {
    pub query: QueryService,
    /// `None` when no tailer runs in this process (tests, read-only mode).
    pub tailer: Option<TailerMonitor>,
    pub metrics: Arc<MetricsCollector>,
    pub metrics_path: String,
}

/// Build the axum router over `state`. Used by [`ApiServer`] and by tests
/// that drive the router with `oneshot`.
pub fn build_api_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/stats", get(handlers::query::stats))
        .route("/api/logs", get(handlers::query::logs))
        .route("/health", get(handlers::health::health_check))
        .route(&state.metrics_path, get(handlers::metrics::metrics))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Stats API server.
pub struct ApiServer {
    config: ApiConfig,
    state: Arc<ApiState>,
}

impl ApiServer {
    pub fn new(config: ApiConfig, state: Arc<ApiState>) -> Self {
        Self { config, state }
    }

    /// Serve until `shutdown` resolves, then drain in-flight requests.
    pub async fn start<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.config.addr;
        let app = build_api_router(self.state);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!(addr = %listener.local_addr()?, "Starting stats API server");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Stats API server stopped");
        Ok(())
    }
}
