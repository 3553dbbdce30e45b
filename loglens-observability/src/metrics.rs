use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use tracing::debug;

/// Outcome of one tailed line, used as a metric label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    Stored,
    ParseFailed,
    StoreFailed,
}

impl LineOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            LineOutcome::Stored => "stored",
            LineOutcome::ParseFailed => "parse_failed",
            LineOutcome::StoreFailed => "store_failed",
        }
    }
}

/// Metrics collector.
///
/// A disabled collector has no prometheus Registry and every recording call
/// is a no-op.
pub struct MetricsCollector {
    registry: Option<Registry>,
    pub ingest_lines_total: Option<IntCounterVec>,
    pub tailer_following: Option<IntGauge>,
    pub api_requests_total: Option<IntCounterVec>,
    pub api_query_duration: Option<HistogramVec>,
}

impl MetricsCollector {
    /// Create a new collector. When `enabled = false`, everything is None.
    pub fn new(enabled: bool) -> anyhow::Result<Self> {
        if !enabled {
            return Ok(Self::disabled());
        }

        let registry = Registry::new();

        let ingest_lines_total = IntCounterVec::new(
            Opts::new("loglens_ingest_lines_total", "Access-log lines read by the tailer"),
            &["outcome"],
        )?;

        let tailer_following = IntGauge::new(
            "loglens_tailer_following",
            "1 while the tailer is following the log file, 0 while waiting for it",
        )?;

        let api_requests_total = IntCounterVec::new(
            Opts::new("loglens_api_requests_total", "Stats API requests"),
            &["endpoint", "status"],
        )?;

        let api_query_duration = HistogramVec::new(
            HistogramOpts::new("loglens_api_query_duration_seconds", "Stats API query latency")
                .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
            &["endpoint"],
        )?;

        registry.register(Box::new(ingest_lines_total.clone()))?;
        registry.register(Box::new(tailer_following.clone()))?;
        registry.register(Box::new(api_requests_total.clone()))?;
        registry.register(Box::new(api_query_duration.clone()))?;

        debug!("prometheus registry initialised");

        Ok(Self {
            registry: Some(registry),
            ingest_lines_total: Some(ingest_lines_total),
            tailer_following: Some(tailer_following),
            api_requests_total: Some(api_requests_total),
            api_query_duration: Some(api_query_duration),
        })
    }

    /// No-op collector.
    pub fn disabled() -> Self {
        Self {
            registry: None,
            ingest_lines_total: None,
            tailer_following: None,
            api_requests_total: None,
            api_query_duration: None,
        }
    }

    #[inline]
    pub fn record_line(&self, outcome: LineOutcome) {
        if let Some(ref counter) = self.ingest_lines_total {
            counter.with_label_values(&[outcome.as_str()]).inc();
        }
    }

    #[inline]
    pub fn set_following(&self, following: bool) {
        if let Some(ref gauge) = self.tailer_following {
            gauge.set(i64::from(following));
        }
    }

    /// Record an API request (no-op when disabled).
    #[inline]
    pub fn record_api_request(&self, endpoint: &str, status: u16, duration_secs: f64) {
        if let Some(ref counter) = self.api_requests_total {
            let status = status.to_string();
            counter
                .with_label_values(&[endpoint, status.as_str()])
                .inc();
        }
        if let Some(ref hist) = self.api_query_duration {
            hist.with_label_values(&[endpoint]).observe(duration_secs);
        }
    }

    /// Render prometheus text exposition format.
    pub fn render(&self) -> String {
        match self.registry {
            Some(ref registry) => render_registry(registry),
            None => String::new(),
        }
    }
}

fn render_registry(registry: &Registry) -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap_or(());
    String::from_utf8(buffer).unwrap_or_default()
}
