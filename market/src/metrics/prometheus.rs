//! Prometheus-backed metrics and HTTP exporter.
//!
//! This module defines a [`MetricsRegistry`] that owns a Prometheus
//! registry and a set of strongly-typed marketplace metrics, and an
//! async HTTP exporter that serves `/metrics` using `hyper`.

use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use bytes::Bytes;
use http_body_util::Full;
use hyper::{
    Method, Request, Response, StatusCode, body::Incoming, header, server::conn::http1,
    service::service_fn,
};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use prometheus::{
    self, Counter, Encoder, Histogram, HistogramOpts, IntCounter, Opts, Registry, TextEncoder,
};

/// Marketplace Prometheus metrics.
///
/// These are registered into a [`Registry`] and updated from the payment
/// monitor and settlement code.
#[derive(Clone)]
pub struct MarketMetrics {
    /// Payments detected on watched addresses.
    pub payments_detected_total: IntCounter,
    /// Tasks created locally.
    pub tasks_created_total: IntCounter,
    /// Tasks adopted from the intake bridge.
    pub tasks_adopted_total: IntCounter,
    /// Tasks settled after approved verification.
    pub tasks_completed_total: IntCounter,
    /// Submissions rejected by verification.
    pub verifications_rejected_total: IntCounter,
    /// Latency of a full submission verification, in seconds.
    pub verification_seconds: Histogram,
    /// Cumulative multiplier-adjusted payouts, in KAS.
    pub payout_kas_total: Counter,
}

impl MarketMetrics {
    /// Registers marketplace metrics into the given `Registry`.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let payments_detected_total = IntCounter::with_opts(Opts::new(
            "payments_detected_total",
            "Payments detected on watched task addresses",
        ))?;
        registry.register(Box::new(payments_detected_total.clone()))?;

        let tasks_created_total = IntCounter::with_opts(Opts::new(
            "tasks_created_total",
            "Tasks created locally",
        ))?;
        registry.register(Box::new(tasks_created_total.clone()))?;

        let tasks_adopted_total = IntCounter::with_opts(Opts::new(
            "tasks_adopted_total",
            "Tasks adopted from the intake bridge",
        ))?;
        registry.register(Box::new(tasks_adopted_total.clone()))?;

        let tasks_completed_total = IntCounter::with_opts(Opts::new(
            "tasks_completed_total",
            "Tasks settled after approved verification",
        ))?;
        registry.register(Box::new(tasks_completed_total.clone()))?;

        let verifications_rejected_total = IntCounter::with_opts(Opts::new(
            "verifications_rejected_total",
            "Submissions rejected by verification",
        ))?;
        registry.register(Box::new(verifications_rejected_total.clone()))?;

        // Verification latency is dominated by the evaluator round trip.
        let verification_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "verification_seconds",
                "Time to verify one submission end to end, in seconds",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        )?;
        registry.register(Box::new(verification_seconds.clone()))?;

        let payout_kas_total = Counter::with_opts(Opts::new(
            "payout_kas_total",
            "Cumulative multiplier-adjusted payouts in KAS",
        ))?;
        registry.register(Box::new(payout_kas_total.clone()))?;

        Ok(Self {
            payments_detected_total,
            tasks_created_total,
            tasks_adopted_total,
            tasks_completed_total,
            verifications_rejected_total,
            verification_seconds,
            payout_kas_total,
        })
    }
}

/// Wrapper around a Prometheus registry and the marketplace metrics.
///
/// This is the main handle passed around the core. It can be wrapped in an
/// [`Arc`] and shared across threads/tasks.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Registry,
    pub market: MarketMetrics,
}

impl MetricsRegistry {
    /// Creates a new `MetricsRegistry` with a fresh underlying `Registry`
    /// and registers the marketplace metrics.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("market".to_string()), None)?;
        let market = MarketMetrics::register(&registry)?;
        Ok(Self { registry, market })
    }

    /// Encodes all metrics in this registry into the Prometheus text format.
    pub fn gather_text(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::error!("failed to encode Prometheus metrics: {e}");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

/// Runs an HTTP server that exposes Prometheus metrics.
///
/// The server listens on `addr` and serves `GET /metrics` with the
/// Prometheus text exposition format. All other paths return 404.
///
/// This function is `async` and is intended to be spawned onto a Tokio
/// runtime, e.g.:
///
/// ```ignore
/// let registry = Arc::new(MetricsRegistry::new()?);
/// let addr: SocketAddr = "127.0.0.1:9898".parse()?;
/// tokio::spawn(run_prometheus_http_server(registry.clone(), addr));
/// ```
pub async fn run_prometheus_http_server(
    metrics: Arc<MetricsRegistry>,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let svc = service_fn(move |req| {
                let metrics = metrics.clone();
                handle_request(req, metrics)
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, svc).await {
                tracing::warn!("prometheus HTTP server error: {err}");
            }
        });
    }
}

async fn handle_request(
    req: Request<Incoming>,
    metrics: Arc<MetricsRegistry>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => {
            let body = metrics.gather_text();
            Ok(Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "text/plain; version=0.0.4")
                .body(Full::new(Bytes::from(body)))
                .unwrap())
        }
        _ => Ok(Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::from("not found")))
            .unwrap()),
    }
}
