use axum::{Json, extract::State};
use serde::Serialize;

use market::Worker;

use crate::state::SharedState;

/// Response body for `GET /worker`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerResponse {
    pub worker: Worker,
    /// Settled-but-unwithdrawn balance, in KAS.
    pub live_balance: f64,
}

/// `GET /worker`
///
/// Returns the worker aggregate (rank, multiplier, totals) and the live
/// balance accumulated from settled tasks.
pub async fn get(State(state): State<SharedState>) -> Json<WorkerResponse> {
    Json(WorkerResponse {
        worker: state.market.worker(),
        live_balance: state.market.live_balance(),
    })
}
