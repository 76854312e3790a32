// api-gateway/src/main.rs

//! API gateway binary.
//!
//! This binary exposes a small HTTP API on top of the `market` crate:
//!
//! - `GET /health`
//! - `GET /tasks`, `POST /tasks`, `POST /tasks/parse`
//! - `POST /tasks/{id}/submit`
//! - `GET /worker`
//! - `GET /notifications`, `DELETE /notifications`
//! - `POST /dev/blocks`, `POST /dev/fund/{id}`, `POST /dev/reset`
//!
//! It embeds a full marketplace (payment monitor over a channel-backed
//! block feed, evaluator client, intake poller) and a Prometheus metrics
//! exporter on `/metrics`.

mod config;
mod routes;
mod state;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tokio::signal;

use config::ApiConfig;
use market::{
    ChannelNodeRpc, EvaluatorClient, IntakeClient, MarketConfig, Marketplace, MetricsRegistry,
    PaymentMonitor, run_intake_poller, run_prometheus_http_server,
};
use routes::{dev, health, notifications, tasks, worker};
use state::{AppState, SharedState};

#[tokio::main]
async fn main() {
    // Basic tracing setup.
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "api_gateway=info,market=info".to_string()),
        )
        .init();

    if let Err(e) = run().await {
        eprintln!("fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let api_cfg = ApiConfig::from_env();
    let market_cfg = MarketConfig::from_env();

    // ---------------------------
    // Metrics
    // ---------------------------

    let metrics = Arc::new(
        MetricsRegistry::new()
            .map_err(|e| format!("failed to initialise metrics registry: {e}"))?,
    );

    // Metrics exporter.
    if market_cfg.metrics.enabled {
        let metrics_clone = metrics.clone();
        let addr = market_cfg.metrics.listen_addr;
        tokio::spawn(async move {
            if let Err(e) = run_prometheus_http_server(metrics_clone, addr).await {
                eprintln!("metrics HTTP server error: {e}");
            }
        });
        tracing::info!("metrics exporter listening on http://{}/metrics", addr);
    }

    // ---------------------------
    // Block feed + marketplace
    // ---------------------------

    // The channel-backed feed stands in for a live node websocket; blocks
    // arrive via the demo endpoints until one is wired up.
    let rpc = Arc::new(ChannelNodeRpc::new());
    let monitor = PaymentMonitor::new(rpc.clone());

    let evaluator = EvaluatorClient::new(market_cfg.evaluator.clone())
        .map_err(|e| format!("failed to create evaluator client: {e}"))?;

    let intake = if market_cfg.intake.enabled {
        let client = IntakeClient::new(&market_cfg.intake)
            .map_err(|e| format!("failed to create intake client: {e}"))?;
        Some(client)
    } else {
        tracing::info!("intake bridge disabled");
        None
    };

    let market = Arc::new(Marketplace::new(
        market_cfg.notify.clone(),
        monitor,
        evaluator,
        intake,
        metrics.clone(),
    ));

    market
        .start()
        .map_err(|e| format!("failed to start payment monitoring: {e}"))?;

    // ---------------------------
    // Intake poller
    // ---------------------------

    if market_cfg.intake.enabled {
        let poller_market = market.clone();
        let interval = market_cfg.intake.poll_interval;
        tokio::spawn(async move {
            run_intake_poller(poller_market, interval).await;
        });
    }

    // ---------------------------
    // Shared state
    // ---------------------------

    let app_state: SharedState = Arc::new(AppState {
        market: market.clone(),
        rpc,
    });

    // ---------------------------
    // HTTP router
    // ---------------------------

    let app = Router::new()
        .route("/health", get(health::health))
        .route("/tasks", get(tasks::list).post(tasks::create))
        .route("/tasks/parse", post(tasks::parse))
        .route("/tasks/{id}/submit", post(tasks::submit))
        .route("/worker", get(worker::get))
        .route(
            "/notifications",
            get(notifications::get).delete(notifications::dismiss),
        )
        .route("/dev/blocks", post(dev::inject_block))
        .route("/dev/fund/{id}", post(dev::fund))
        .route("/dev/reset", post(dev::reset))
        .with_state(app_state);

    // ---------------------------
    // axum 0.8 server (hyper 1 / tokio 1.48 style)
    // ---------------------------

    tracing::info!("API gateway listening on http://{}", api_cfg.listen_addr);

    let listener = tokio::net::TcpListener::bind(api_cfg.listen_addr)
        .await
        .map_err(|e| format!("failed to bind {}: {e}", api_cfg.listen_addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| format!("API server error: {e}"))?;

    market.shutdown();

    Ok(())
}

/// Waits for Ctrl-C and returns, used for graceful shutdown.
async fn shutdown_signal() {
    // Wait for Ctrl+C
    let _ = signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
