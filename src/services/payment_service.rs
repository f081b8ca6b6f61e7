//! Payment dispatch
//!
//! The hot path. Each request is enriched once, then runs a bounded retry
//! loop: routing picks the preferred processor, the dispatcher tries it,
//! falls back to the other on failure, and sleeps a short backoff between
//! rounds. Breaker and summary state are updated as outcomes are observed;
//! the summary is only ever touched after upstream confirms a payment.

use chrono::Utc;
use thiserror::Error;
use tracing::warn;

use crate::models::{PaymentRequest, Processor, ProcessorPayment};
use crate::services::{circuit_breaker, routing, summary_service};
use crate::state::AppState;

/// Both processors rejected every attempt within the retry budget.
#[derive(Debug, Error)]
#[error("payment dispatch exhausted all attempts")]
pub struct DispatchExhausted;

/// Dispatch one payment, returning the processor that accepted it.
pub async fn process_payment(
    state: &AppState,
    request: PaymentRequest,
) -> Result<Processor, DispatchExhausted> {
    // requested_at is pinned here; retries reuse the same payload.
    let payment = ProcessorPayment::new(request, Utc::now());
    let attempts = state.config.retry.attempts;

    for attempt in 0..attempts {
        let preferred = routing::pick_processor(state).await;
        for processor in [preferred, preferred.other()] {
            if attempt_post(state, processor, &payment).await {
                return Ok(processor);
            }
        }
        if attempt + 1 < attempts {
            tokio::time::sleep(state.config.retry.backoff_for(attempt as usize)).await;
        }
    }

    Err(DispatchExhausted)
}

/// One upstream POST plus its bookkeeping. Returns whether it succeeded.
async fn attempt_post(
    state: &AppState,
    processor: Processor,
    payment: &ProcessorPayment,
) -> bool {
    match state.processors.post_payment(processor, payment).await {
        Ok(()) => {
            // Breaker first, then the counters the summary endpoint serves.
            circuit_breaker::record_success(state, processor).await;
            summary_service::record_payment(state, processor, payment.amount).await;
            true
        }
        Err(err) => {
            warn!(
                %processor,
                correlation_id = %payment.correlation_id,
                %err,
                "upstream payment attempt failed"
            );
            circuit_breaker::record_failure(state, processor).await;
            false
        }
    }
}
