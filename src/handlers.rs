//! HTTP request handlers
//!
//! Thin ingress layer over the services: decode the request, call the
//! matching service, map the outcome to a status code. No business logic
//! lives here.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tracing::debug;

use crate::models::{PaymentRequest, PaymentSummary};
use crate::services::{payment_service, summary_service};
use crate::state::AppState;

/// Time window accepted on summary reads. Totals are global; the window is
/// kept for wire compatibility with callers that always pass one.
#[derive(Debug, Deserialize)]
pub struct SummaryWindow {
    pub from: Option<String>,
    pub to: Option<String>,
}

/// Dispatch a payment. 200 when an upstream accepted it, 500 when the retry
/// budget ran out, 400 on an invalid amount.
pub async fn create_payment(
    State(state): State<AppState>,
    Json(payload): Json<PaymentRequest>,
) -> StatusCode {
    if !payload.is_valid() {
        return StatusCode::BAD_REQUEST;
    }

    match payment_service::process_payment(&state, payload).await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Aggregate totals per processor.
pub async fn payments_summary(
    State(state): State<AppState>,
    Query(window): Query<SummaryWindow>,
) -> Json<PaymentSummary> {
    debug!(from = ?window.from, to = ?window.to, "summary requested");
    Json(summary_service::summary(&state).await)
}

/// Reset all counters; exposed for test environments.
pub async fn purge_payments(State(state): State<AppState>) -> StatusCode {
    summary_service::reset(&state).await;
    StatusCode::OK
}
