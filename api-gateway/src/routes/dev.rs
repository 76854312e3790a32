//! Demo tooling endpoints.
//!
//! These exist so the full settlement path can be exercised without a
//! chain node or real payments. They are wired unconditionally for this
//! prototype; a production deployment would gate them.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Serialize;

use market::{Block, TaskId};

use crate::state::SharedState;

/// Response body for `POST /dev/blocks`.
#[derive(Debug, Serialize)]
pub struct InjectBlockResponse {
    /// Number of subscribers the block was delivered to.
    pub delivered: usize,
}

/// `POST /dev/blocks`
///
/// Injects a synthetic block into the feed the payment monitor consumes,
/// as if the node had announced it.
pub async fn inject_block(
    State(state): State<SharedState>,
    Json(block): Json<Block>,
) -> Json<InjectBlockResponse> {
    let delivered = state.rpc.publish_block(block);
    Json(InjectBlockResponse { delivered })
}

/// `POST /dev/fund/{id}`
///
/// Synthesizes a funding detection for a pending task, skipping the
/// chain entirely. 409 when the task is unknown or already funded.
pub async fn fund(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    if state.market.simulate_funding(&TaskId(id)) {
        Ok(StatusCode::OK)
    } else {
        Err((
            StatusCode::CONFLICT,
            "task is unknown or not pending".to_string(),
        ))
    }
}

/// `POST /dev/reset`
///
/// Resets the worker aggregate and live balance to a fresh state.
pub async fn reset(State(state): State<SharedState>) -> StatusCode {
    state.market.reset_worker();
    StatusCode::NO_CONTENT
}
