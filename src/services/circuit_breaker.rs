//! Distributed circuit breaker
//!
//! One record per processor lives in the coordination store. Replicas apply
//! plain read-modify-write: transitions are monotone within an epoch, so a
//! stale write from a slow replica is corrected by the next observation
//! instead of being guarded against with a distributed lock. The breaker is
//! advisory; a single payment never depends on it being right.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::infrastructure::redis_client::keys;
use crate::models::Processor;
use crate::state::AppState;

/// Records persist for ten minutes past the last touch.
const RECORD_TTL: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Persisted breaker record for one processor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitRecord {
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub last_failure_at: DateTime<Utc>,
    pub last_state_change_at: DateTime<Utc>,
}

impl CircuitRecord {
    /// Default record for a processor nothing has observed yet.
    pub fn closed(now: DateTime<Utc>) -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            last_failure_at: DateTime::<Utc>::UNIX_EPOCH,
            last_state_change_at: now,
        }
    }

    /// Lazy Open -> HalfOpen promotion, applied on every access.
    fn promote_if_cooled(&mut self, cooldown: Duration, now: DateTime<Utc>) -> bool {
        if self.state != CircuitState::Open {
            return false;
        }
        let cooled = now.signed_duration_since(self.last_state_change_at)
            > ChronoDuration::from_std(cooldown).unwrap_or(ChronoDuration::MAX);
        if cooled {
            self.state = CircuitState::HalfOpen;
            self.success_count = 0;
            self.last_state_change_at = now;
        }
        cooled
    }

    /// Returns whether the record changed and needs a write-back.
    fn on_success(&mut self, close_threshold: u32, now: DateTime<Utc>) -> bool {
        match self.state {
            // Successes carry no information in Closed and are dropped in Open.
            CircuitState::Closed | CircuitState::Open => false,
            CircuitState::HalfOpen => {
                self.success_count += 1;
                if self.success_count >= close_threshold {
                    self.state = CircuitState::Closed;
                    self.failure_count = 0;
                    self.success_count = 0;
                    self.last_state_change_at = now;
                }
                true
            }
        }
    }

    /// Returns whether the record changed and needs a write-back.
    fn on_failure(&mut self, open_threshold: u32, now: DateTime<Utc>) -> bool {
        match self.state {
            // Failures while Open are dropped until cooldown.
            CircuitState::Open => false,
            CircuitState::Closed => {
                self.failure_count += 1;
                self.last_failure_at = now;
                if self.failure_count >= open_threshold {
                    self.state = CircuitState::Open;
                    self.failure_count = 0;
                    self.success_count = 0;
                    self.last_state_change_at = now;
                }
                true
            }
            CircuitState::HalfOpen => {
                self.state = CircuitState::Open;
                self.failure_count = 0;
                self.success_count = 0;
                self.last_failure_at = now;
                self.last_state_change_at = now;
                true
            }
        }
    }
}

/// Current record with lazy promotion applied. Store failures degrade to the
/// default closed record.
pub async fn get_state(state: &AppState, processor: Processor) -> CircuitRecord {
    let key = keys::circuit(processor);
    let now = Utc::now();
    let mut record = load(state, &key, now).await;

    if record.promote_if_cooled(state.config.breaker.cooldown, now) {
        persist(state, &key, &record).await;
    } else {
        touch(state, key);
    }
    record
}

pub async fn record_success(state: &AppState, processor: Processor) {
    let key = keys::circuit(processor);
    let now = Utc::now();
    let mut record = load(state, &key, now).await;

    let promoted = record.promote_if_cooled(state.config.breaker.cooldown, now);
    let changed = record.on_success(state.config.breaker.success_threshold, now);
    if promoted || changed {
        persist(state, &key, &record).await;
    } else {
        touch(state, key);
    }
}

pub async fn record_failure(state: &AppState, processor: Processor) {
    let key = keys::circuit(processor);
    let now = Utc::now();
    let mut record = load(state, &key, now).await;

    let promoted = record.promote_if_cooled(state.config.breaker.cooldown, now);
    let changed = record.on_failure(state.config.breaker.failure_threshold, now);
    if promoted || changed {
        persist(state, &key, &record).await;
    } else {
        touch(state, key);
    }
}

async fn load(state: &AppState, key: &str, now: DateTime<Utc>) -> CircuitRecord {
    match state.store.get(key).await {
        Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|err| {
            warn!(key, %err, "discarding unreadable circuit record");
            CircuitRecord::closed(now)
        }),
        Ok(None) => CircuitRecord::closed(now),
        Err(err) => {
            warn!(key, %err, "store read failed, assuming closed circuit");
            CircuitRecord::closed(now)
        }
    }
}

async fn persist(state: &AppState, key: &str, record: &CircuitRecord) {
    let json = match serde_json::to_string(record) {
        Ok(json) => json,
        Err(err) => {
            warn!(key, %err, "circuit record failed to serialize");
            return;
        }
    };
    if let Err(err) = state.store.set_with_ttl(key, &json, RECORD_TTL).await {
        warn!(key, %err, "failed to persist circuit record");
    }
}

/// Sliding-TTL refresh on accesses that wrote nothing; not worth waiting for.
fn touch(state: &AppState, key: String) {
    let store = state.store.clone();
    tokio::spawn(async move {
        if let Err(err) = store.refresh_ttl(&key, RECORD_TTL).await {
            debug!(key, %err, "circuit ttl refresh failed");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::infrastructure::http_client::stubs::ScriptedProcessors;
    use crate::infrastructure::redis_client::memory::MemoryStore;
    use std::sync::Arc;

    fn test_state(store: Arc<MemoryStore>) -> AppState {
        AppState::for_tests(
            AppConfig::for_tests(),
            store,
            Arc::new(ScriptedProcessors::new()),
        )
    }

    fn stored_record(store: &MemoryStore, processor: Processor) -> CircuitRecord {
        let raw = store
            .read(&keys::circuit(processor))
            .expect("record persisted");
        serde_json::from_str(&raw).expect("record decodes")
    }

    fn open_record(opened_ago: Duration) -> CircuitRecord {
        let mut record = CircuitRecord::closed(Utc::now());
        record.state = CircuitState::Open;
        record.last_state_change_at =
            Utc::now() - ChronoDuration::from_std(opened_ago).expect("in range");
        record
    }

    fn put_record(store: &MemoryStore, processor: Processor, record: &CircuitRecord) {
        store.put(
            &keys::circuit(processor),
            serde_json::to_string(record).expect("record encodes"),
        );
    }

    #[tokio::test]
    async fn failures_accumulate_then_open_the_circuit() {
        let store = Arc::new(MemoryStore::default());
        let state = test_state(store.clone());

        for _ in 0..3 {
            record_failure(&state, Processor::Primary).await;
        }
        let partial = stored_record(&store, Processor::Primary);
        assert_eq!(partial.state, CircuitState::Closed);
        assert_eq!(partial.failure_count, 3);

        for _ in 0..2 {
            record_failure(&state, Processor::Primary).await;
        }
        let tripped = stored_record(&store, Processor::Primary);
        assert_eq!(tripped.state, CircuitState::Open);
        assert_eq!(tripped.failure_count, 0);
        assert_eq!(tripped.success_count, 0);
    }

    #[tokio::test]
    async fn open_circuit_drops_observations_until_cooldown() {
        let store = Arc::new(MemoryStore::default());
        let state = test_state(store.clone());
        put_record(&store, Processor::Primary, &open_record(Duration::from_secs(1)));

        record_failure(&state, Processor::Primary).await;
        record_success(&state, Processor::Primary).await;

        let record = stored_record(&store, Processor::Primary);
        assert_eq!(record.state, CircuitState::Open);
        assert_eq!(record.failure_count, 0);
        assert_eq!(record.success_count, 0);
    }

    #[tokio::test]
    async fn cooldown_promotes_open_to_half_open_on_read() {
        let store = Arc::new(MemoryStore::default());
        let state = test_state(store.clone());
        put_record(&store, Processor::Primary, &open_record(Duration::from_secs(6)));

        let record = get_state(&state, Processor::Primary).await;
        assert_eq!(record.state, CircuitState::HalfOpen);
        assert_eq!(record.success_count, 0);

        // The promotion is persisted for the other replicas.
        assert_eq!(
            stored_record(&store, Processor::Primary).state,
            CircuitState::HalfOpen
        );
    }

    #[tokio::test]
    async fn fresh_open_circuit_stays_open_on_read() {
        let store = Arc::new(MemoryStore::default());
        let state = test_state(store.clone());
        put_record(&store, Processor::Primary, &open_record(Duration::from_secs(1)));

        let record = get_state(&state, Processor::Primary).await;
        assert_eq!(record.state, CircuitState::Open);
    }

    #[tokio::test]
    async fn successes_close_a_half_open_circuit() {
        let store = Arc::new(MemoryStore::default());
        let state = test_state(store.clone());
        let mut record = CircuitRecord::closed(Utc::now());
        record.state = CircuitState::HalfOpen;
        put_record(&store, Processor::Primary, &record);

        record_success(&state, Processor::Primary).await;
        record_success(&state, Processor::Primary).await;
        assert_eq!(
            stored_record(&store, Processor::Primary).state,
            CircuitState::HalfOpen
        );

        record_success(&state, Processor::Primary).await;
        let closed = stored_record(&store, Processor::Primary);
        assert_eq!(closed.state, CircuitState::Closed);
        assert_eq!(closed.failure_count, 0);
        assert_eq!(closed.success_count, 0);
    }

    #[tokio::test]
    async fn failure_in_half_open_reopens_immediately() {
        let store = Arc::new(MemoryStore::default());
        let state = test_state(store.clone());
        let mut record = CircuitRecord::closed(Utc::now());
        record.state = CircuitState::HalfOpen;
        record.success_count = 2;
        put_record(&store, Processor::Primary, &record);

        record_failure(&state, Processor::Primary).await;

        let reopened = stored_record(&store, Processor::Primary);
        assert_eq!(reopened.state, CircuitState::Open);
        assert_eq!(reopened.success_count, 0);
    }

    #[tokio::test]
    async fn offline_store_degrades_to_closed() {
        let store = Arc::new(MemoryStore::default());
        store.set_offline(true);
        let state = test_state(store.clone());

        let record = get_state(&state, Processor::Primary).await;
        assert_eq!(record.state, CircuitState::Closed);

        // Writes are swallowed, not propagated.
        record_failure(&state, Processor::Primary).await;
        record_success(&state, Processor::Primary).await;
    }

    #[test]
    fn success_is_a_no_op_while_closed() {
        let now = Utc::now();
        let mut record = CircuitRecord::closed(now);
        assert!(!record.on_success(3, now));
        assert_eq!(record.state, CircuitState::Closed);
        assert_eq!(record.success_count, 0);
    }

    #[test]
    fn promotion_requires_strictly_elapsed_cooldown() {
        let now = Utc::now();
        let cooldown = Duration::from_secs(5);

        let mut at_boundary = CircuitRecord::closed(now);
        at_boundary.state = CircuitState::Open;
        at_boundary.last_state_change_at = now - ChronoDuration::seconds(5);
        assert!(!at_boundary.promote_if_cooled(cooldown, now));

        let mut past_boundary = CircuitRecord::closed(now);
        past_boundary.state = CircuitState::Open;
        past_boundary.last_state_change_at = now - ChronoDuration::milliseconds(5001);
        assert!(past_boundary.promote_if_cooled(cooldown, now));
        assert_eq!(past_boundary.state, CircuitState::HalfOpen);
    }
}
