//! Processor selection
//!
//! Routing prefers the cheaper primary processor and only pays the fallback
//! fee when the shared circuit and health view says the primary is a bad
//! bet. An absent health snapshot counts as "unknown, not confidently
//! healthy" and never wins against a side that reads clean.

use crate::models::Processor;
use crate::services::circuit_breaker::{self, CircuitState};
use crate::services::health_service;
use crate::state::AppState;

/// Pick the processor to attempt first for the next dispatch.
pub async fn pick_processor(state: &AppState) -> Processor {
    let (primary, fallback) = tokio::join!(
        circuit_breaker::get_state(state, Processor::Primary),
        circuit_breaker::get_state(state, Processor::Fallback),
    );

    match (primary.state, fallback.state) {
        // Both believed dead: fail fast against the cheaper fee.
        (CircuitState::Open, CircuitState::Open) => Processor::Primary,
        (CircuitState::Open, _) => Processor::Fallback,
        // A recovering primary gets probed with live traffic once its
        // health reads clean.
        (CircuitState::HalfOpen, _) => {
            match health_service::get_health(state, Processor::Primary).await {
                Some(health) if !health.failing => Processor::Primary,
                _ => Processor::Fallback,
            }
        }
        (_, CircuitState::Open) => Processor::Primary,
        (_, CircuitState::HalfOpen) => {
            match health_service::get_health(state, Processor::Fallback).await {
                Some(health) if !health.failing => Processor::Fallback,
                _ => Processor::Primary,
            }
        }
        (CircuitState::Closed, CircuitState::Closed) => both_closed(state).await,
    }
}

async fn both_closed(state: &AppState) -> Processor {
    let (primary, fallback) = tokio::join!(
        health_service::get_health(state, Processor::Primary),
        health_service::get_health(state, Processor::Fallback),
    );

    let threshold = state.config.health.latency_threshold.as_millis() as i64;
    if let Some(health) = primary {
        if !health.failing && health.min_response_time < threshold {
            return Processor::Primary;
        }
    }
    if let Some(health) = fallback {
        if !health.failing {
            return Processor::Fallback;
        }
    }
    Processor::Primary
}
