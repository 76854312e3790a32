//! Market library crate.
//!
//! This crate provides the settlement core of the KaspaStream micro-task
//! marketplace:
//!
//! - strongly-typed domain types (`types`),
//! - chain payment detection (`monitor`),
//! - the task ledger, state machine, and orchestration (`ledger`),
//! - the rank/multiplier reward engine (`reward`),
//! - submission verification clients (`evaluator`),
//! - the external task intake bridge (`intake`),
//! - transient notifications (`notify`),
//! - Prometheus-based metrics (`metrics`),
//! - and a top-level configuration (`config`).
//!
//! Higher-level binaries compose these pieces into a running marketplace
//! node; the `api-gateway` crate in this workspace is one such frontend.

pub mod config;
pub mod evaluator;
pub mod intake;
pub mod ledger;
pub mod metrics;
pub mod monitor;
pub mod notify;
pub mod reward;
pub mod types;

// Re-export top-level configuration types.
pub use config::{EvaluatorConfig, IntakeConfig, MarketConfig, MetricsConfig, NotifyConfig};

// Re-export the orchestration layer and ledger state machine.
pub use ledger::{
    Marketplace, Settlement, SubmissionOutcome, TaskLedger, VerificationOutcome,
};

// Re-export payment monitoring interfaces and the channel-backed node RPC.
pub use monitor::{
    ChannelNodeRpc, MonitorError, NodeRpc, PaymentDetection, PaymentMonitor, WatchRegistry,
};

// Re-export verification interfaces and the HTTP client.
pub use evaluator::{Evaluator, EvaluatorClient, ParsedTask, VerificationResult};

// Re-export the intake bridge client and poller.
pub use intake::{IntakeClient, IntakeError, run_intake_poller};

// Re-export the notification center and metrics registry.
pub use metrics::{MarketMetrics, MetricsRegistry, run_prometheus_http_server};
pub use notify::NotificationCenter;

// Re-export domain types at the crate root for convenience.
pub use types::*;

/// Type alias for the marketplace as wired by a "typical" node: a
/// channel-backed node RPC feed and the HTTP evaluator client.
pub type DefaultMarketplace = Marketplace<ChannelNodeRpc, EvaluatorClient>;
