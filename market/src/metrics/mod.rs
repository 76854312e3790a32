//! Metrics for the marketplace core.

mod prometheus;

pub use prometheus::{MarketMetrics, MetricsRegistry, run_prometheus_http_server};
