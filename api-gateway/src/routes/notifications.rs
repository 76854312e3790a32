use axum::{Json, extract::State, http::StatusCode};

use market::PaymentNotification;

use crate::state::SharedState;

/// `GET /notifications`
///
/// Returns the outstanding transient notification, or `null` when the
/// slot is empty (expired, dismissed, or never filled).
pub async fn get(State(state): State<SharedState>) -> Json<Option<PaymentNotification>> {
    Json(state.market.notification())
}

/// `DELETE /notifications`
///
/// Dismisses the outstanding notification before its window elapses.
pub async fn dismiss(State(state): State<SharedState>) -> StatusCode {
    state.market.clear_notification();
    StatusCode::NO_CONTENT
}
