//! Distributed processor health view
//!
//! Health snapshots live in the coordination store under a short TTL so all
//! replicas share one observation instead of stampeding the upstream health
//! endpoint. Within a replica, concurrent misses for the same processor are
//! coalesced through a single-slot gate: one caller probes, the rest wait
//! and pick the result up from the cache.

use tracing::warn;

use crate::infrastructure::redis_client::keys;
use crate::models::{HealthSnapshot, Processor};
use crate::state::AppState;

/// Cached health for one processor, probing upstream on a miss.
///
/// `None` means the processor's health is unknown: the probe failed and no
/// snapshot is cached. Callers must not treat unknown as healthy.
pub async fn get_health(state: &AppState, processor: Processor) -> Option<HealthSnapshot> {
    let key = keys::health(processor);
    if let Some(snapshot) = cached(state, &key).await {
        return Some(snapshot);
    }

    let _probe = state.probe_gates.gate(processor).lock().await;
    // Another caller may have populated the cache while we waited.
    if let Some(snapshot) = cached(state, &key).await {
        return Some(snapshot);
    }

    let snapshot = state.processors.fetch_health(processor).await?;
    publish(state, &key, &snapshot).await;
    Some(snapshot)
}

async fn cached(state: &AppState, key: &str) -> Option<HealthSnapshot> {
    match state.store.get(key).await {
        Ok(Some(raw)) => match serde_json::from_str(&raw) {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                warn!(key, %err, "discarding unreadable health snapshot");
                None
            }
        },
        Ok(None) => None,
        Err(err) => {
            warn!(key, %err, "store read failed, treating health cache as empty");
            None
        }
    }
}

/// Cache population failure must not fail the read.
async fn publish(state: &AppState, key: &str, snapshot: &HealthSnapshot) {
    let json = match serde_json::to_string(snapshot) {
        Ok(json) => json,
        Err(err) => {
            warn!(key, %err, "health snapshot failed to serialize");
            return;
        }
    };
    if let Err(err) = state
        .store
        .set_with_ttl(key, &json, state.config.health.cache_ttl)
        .await
    {
        warn!(key, %err, "failed to publish health snapshot");
    }
}
