pub mod metrics;

pub use metrics::{LineOutcome, MetricsCollector};
