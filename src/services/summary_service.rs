//! Aggregate payment counters
//!
//! Two atomic counters per processor in the coordination store: a request
//! count and a running amount. Increments happen only after upstream has
//! confirmed a payment, so the totals never include speculative traffic.
//! Reads return the global totals; amounts are reported with two fractional
//! digits.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::warn;

use crate::infrastructure::redis_client::keys;
use crate::models::{PaymentSummary, Processor, ProcessorStats};
use crate::state::AppState;

/// Record one confirmed payment against `processor`.
pub async fn record_payment(state: &AppState, processor: Processor, amount: Decimal) {
    let amount = amount.to_f64().unwrap_or(0.0);

    if let Err(err) = state
        .store
        .incr_by(&keys::summary_requests(processor), 1)
        .await
    {
        warn!(%processor, %err, "failed to bump request counter");
    }
    if let Err(err) = state
        .store
        .incr_by_float(&keys::summary_amount(processor), amount)
        .await
    {
        warn!(%processor, %err, "failed to bump amount counter");
    }
}

/// Global totals for both processors.
pub async fn summary(state: &AppState) -> PaymentSummary {
    PaymentSummary {
        default: stats(state, Processor::Primary).await,
        fallback: stats(state, Processor::Fallback).await,
    }
}

/// Delete all counters; test environments only.
pub async fn reset(state: &AppState) {
    let all = vec![
        keys::summary_requests(Processor::Primary),
        keys::summary_amount(Processor::Primary),
        keys::summary_requests(Processor::Fallback),
        keys::summary_amount(Processor::Fallback),
    ];
    if let Err(err) = state.store.delete(&all).await {
        warn!(%err, "failed to reset summary counters");
    }
}

async fn stats(state: &AppState, processor: Processor) -> ProcessorStats {
    let total_requests = read_counter(state, &keys::summary_requests(processor))
        .await
        .and_then(|raw| raw.parse::<i64>().ok())
        .unwrap_or(0);
    let total_amount = read_counter(state, &keys::summary_amount(processor))
        .await
        .and_then(|raw| raw.parse::<f64>().ok())
        .unwrap_or(0.0);

    ProcessorStats {
        total_requests,
        total_amount: (total_amount * 100.0).round() / 100.0,
    }
}

/// Counter reads share the degrade-to-zero policy of every other store read.
async fn read_counter(state: &AppState, key: &str) -> Option<String> {
    match state.store.get(key).await {
        Ok(value) => value,
        Err(err) => {
            warn!(key, %err, "store read failed, reporting zero");
            None
        }
    }
}
