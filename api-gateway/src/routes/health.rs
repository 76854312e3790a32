use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

use crate::state::SharedState;

/// Health-check response with settlement-core liveness.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    /// Whether the payment monitor's dispatch loop is running.
    pub monitoring: bool,
    /// Number of payment addresses currently under watch.
    pub watched_addresses: usize,
}

/// `GET /health`
///
/// Liveness plus a glance at the settlement core: whether block dispatch
/// is running and how many payment addresses are being watched. A gateway
/// whose monitor loop has died still answers, with `monitoring: false`.
pub async fn health(State(state): State<SharedState>) -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok",
            monitoring: state.market.is_monitoring(),
            watched_addresses: state.market.watched_addresses(),
        }),
    )
}
