//! External task intake bridge.
//!
//! The bridge is an external producer of tasks (for example a chat-bot
//! channel) exposed over a small HTTP contract:
//!
//! - `GET /tasks` returns the currently open external tasks in the Task
//!   JSON shape,
//! - `POST /complete/{id}` marks one unit of completion against a task.
//!
//! The poller pulls on a fixed interval with no backoff: a failed cycle is
//! swallowed at debug level and retried on the next tick. The channel is
//! best-effort by design, so losing a cycle only delays adoption.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;

use crate::config::IntakeConfig;
use crate::evaluator::Evaluator;
use crate::ledger::Marketplace;
use crate::monitor::NodeRpc;
use crate::types::{Task, TaskId};

/// Errors from the intake bridge.
#[derive(Debug)]
pub enum IntakeError {
    /// Transport-level error (e.g. bridge unreachable, timeout).
    Transport(String),
    /// The bridge returned a non-success status.
    Service(String),
    /// The bridge response did not decode as the Task shape.
    Protocol(String),
}

impl fmt::Display for IntakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntakeError::Transport(msg) => write!(f, "intake transport error: {msg}"),
            IntakeError::Service(msg) => write!(f, "intake service error: {msg}"),
            IntakeError::Protocol(msg) => write!(f, "intake protocol error: {msg}"),
        }
    }
}

impl std::error::Error for IntakeError {}

/// HTTP client for the intake bridge.
pub struct IntakeClient {
    base_url: String,
    client: Client,
}

impl IntakeClient {
    /// Constructs a client from the intake configuration.
    pub fn new(cfg: &IntakeConfig) -> Result<Self, IntakeError> {
        let client = Client::builder()
            .timeout(cfg.timeout)
            .build()
            .map_err(|e| IntakeError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Fetches the currently open external tasks.
    pub async fn fetch_open_tasks(&self) -> Result<Vec<Task>, IntakeError> {
        let url = format!("{}/tasks", self.base_url);

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| IntakeError::Transport(format!("GET {url} failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(IntakeError::Service(format!(
                "bridge returned HTTP status {status}"
            )));
        }

        resp.json::<Vec<Task>>()
            .await
            .map_err(|e| IntakeError::Protocol(format!("failed to decode task list: {e}")))
    }

    /// Reports one unit of completion for an external task.
    ///
    /// Best-effort: callers log a failure and move on; local settlement is
    /// never rolled back over an undeliverable report.
    pub async fn report_completion(&self, id: &TaskId) -> Result<(), IntakeError> {
        let url = format!("{}/complete/{}", self.base_url, id);

        let resp = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| IntakeError::Transport(format!("POST {url} failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(IntakeError::Service(format!(
                "bridge returned HTTP status {status}"
            )));
        }

        Ok(())
    }
}

/// Periodic intake pull loop.
///
/// Intended to be spawned onto the runtime. Each cycle pulls the open
/// external tasks and merges them into the ledger by identity; failures
/// are swallowed per cycle and retried on the next tick.
pub async fn run_intake_poller<R, E>(market: Arc<Marketplace<R, E>>, interval: Duration)
where
    R: NodeRpc,
    E: Evaluator + 'static,
{
    tracing::info!(
        "intake poller running with interval {}s",
        interval.as_secs()
    );

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        match market.poll_intake_once().await {
            Ok(0) => {}
            Ok(adopted) => tracing::info!(adopted, "adopted external tasks"),
            Err(e) => tracing::debug!("intake poll failed, retrying next tick: {e}"),
        }
    }
}
