//! Top-level configuration for the marketplace core.
//!
//! This module aggregates configuration for:
//!
//! - the evaluator client (endpoint, credential, model, timeout),
//! - the intake bridge (endpoint, poll interval, enable flag),
//! - notification display windows,
//! - the metrics exporter (enable flag + listen address).
//!
//! The goal is a single `MarketConfig` struct that higher-level binaries
//! can construct from defaults or environment variables as needed.

use std::net::SocketAddr;
use std::time::Duration;

/// Configuration for the evaluator client.
#[derive(Clone, Debug)]
pub struct EvaluatorConfig {
    /// Base URL of the chat completions API, without a trailing slash.
    pub base_url: String,
    /// Credential for the evaluator; `None` selects the mock fallback.
    pub api_key: Option<String>,
    /// Model identifier passed with every request.
    pub model: String,
    /// Request timeout for evaluator calls.
    pub timeout: Duration,
    /// `HTTP-Referer` header required by the endpoint.
    pub referer: String,
    /// `X-Title` header identifying this application.
    pub app_title: String,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            base_url: "https://openrouter.ai/api/v1".to_string(),
            api_key: None,
            model: "google/gemini-2.0-flash-exp:free".to_string(),
            timeout: Duration::from_secs(30),
            referer: "http://localhost:3001".to_string(),
            app_title: "KaspaStream Worker".to_string(),
        }
    }
}

impl EvaluatorConfig {
    /// Builds the config from defaults plus the `OPENROUTER_API_KEY`
    /// environment variable when set.
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var("OPENROUTER_API_KEY").ok().filter(|k| !k.is_empty()),
            ..Self::default()
        }
    }
}

/// Configuration for the external task intake bridge.
#[derive(Clone, Debug)]
pub struct IntakeConfig {
    /// Whether to poll the bridge at all.
    pub enabled: bool,
    /// Base URL of the bridge server.
    pub base_url: String,
    /// Interval between polls. Failures are swallowed per cycle and
    /// retried on the next tick; there is no backoff.
    pub poll_interval: Duration,
    /// Request timeout for bridge calls.
    pub timeout: Duration,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "http://localhost:3001".to_string(),
            poll_interval: Duration::from_secs(3),
            timeout: Duration::from_secs(5),
        }
    }
}

impl IntakeConfig {
    /// Builds the config from defaults plus `INTAKE_BRIDGE_URL` when set.
    /// Setting `INTAKE_BRIDGE_URL` to the empty string disables polling.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(url) = std::env::var("INTAKE_BRIDGE_URL") {
            if url.is_empty() {
                cfg.enabled = false;
            } else {
                cfg.base_url = url;
            }
        }
        cfg
    }
}

/// Display windows for transient notifications.
#[derive(Clone, Debug)]
pub struct NotifyConfig {
    /// Window for funding and payout banners.
    pub payment_ttl: Duration,
    /// Window for "new tasks arrived" banners.
    pub intake_ttl: Duration,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            payment_ttl: Duration::from_secs(5),
            intake_ttl: Duration::from_secs(3),
        }
    }
}

/// Configuration for the Prometheus metrics exporter.
#[derive(Clone, Debug)]
pub struct MetricsConfig {
    /// Whether to run a `/metrics` HTTP exporter.
    pub enabled: bool,
    /// Address to bind the metrics HTTP server to.
    pub listen_addr: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        // Safe to unwrap: this is a fixed, valid address literal.
        let addr: SocketAddr = "127.0.0.1:9898"
            .parse()
            .expect("hard-coded metrics listen address should parse");
        Self {
            enabled: true,
            listen_addr: addr,
        }
    }
}

/// Top-level configuration for the marketplace core.
///
/// This aggregates all the sub-configs needed to wire up the settlement
/// core:
///
/// - evaluator client (`evaluator`),
/// - intake bridge polling (`intake`),
/// - notification display windows (`notify`),
/// - Prometheus metrics exporter (`metrics`).
#[derive(Clone, Debug, Default)]
pub struct MarketConfig {
    pub evaluator: EvaluatorConfig,
    pub intake: IntakeConfig,
    pub notify: NotifyConfig,
    pub metrics: MetricsConfig,
}

impl MarketConfig {
    /// Builds the config from defaults plus environment overrides.
    pub fn from_env() -> Self {
        Self {
            evaluator: EvaluatorConfig::from_env(),
            intake: IntakeConfig::from_env(),
            notify: NotifyConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}
