//! Coordination-store access
//!
//! All cross-replica state lives in a shared Redis instance: cached health
//! snapshots, circuit breaker records and the summary counters. Access goes
//! through the `CoordinationStore` trait; callers treat every error as
//! "record absent" so the payment path keeps working with the store gone.

use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::AsyncCommands;
use std::time::Duration;

use crate::config::StoreConfig;

/// Store key layout, kept in one place so readers and writers never drift.
pub mod keys {
    use crate::models::Processor;

    pub fn health(processor: Processor) -> String {
        format!("health_check:{}", processor.as_str())
    }

    pub fn circuit(processor: Processor) -> String {
        format!("circuit_breaker:{}", processor.as_str())
    }

    pub fn summary_requests(processor: Processor) -> String {
        format!("payment_summary:{}:requests", processor.as_str())
    }

    pub fn summary_amount(processor: Processor) -> String {
        format!("payment_summary:{}:amount", processor.as_str())
    }
}

/// The handful of primitives the engine needs from the shared store.
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, redis::RedisError>;

    async fn set_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), redis::RedisError>;

    /// Slide an existing key's TTL without rewriting the value.
    async fn refresh_ttl(&self, key: &str, ttl: Duration) -> Result<(), redis::RedisError>;

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, redis::RedisError>;

    async fn incr_by_float(&self, key: &str, delta: f64) -> Result<f64, redis::RedisError>;

    async fn delete(&self, keys: &[String]) -> Result<(), redis::RedisError>;
}

/// Redis-backed store shared by every replica.
///
/// `ConnectionManager` multiplexes one connection and reconnects on its own;
/// clones are cheap handles onto the same pipe.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(config: &StoreConfig) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(config.url.as_str())?;
        let manager_config = ConnectionManagerConfig::new()
            .set_connection_timeout(config.connect_timeout)
            .set_response_timeout(config.command_timeout);
        let conn = ConnectionManager::new_with_config(client, manager_config).await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl CoordinationStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, redis::RedisError> {
        let mut con = self.conn.clone();
        con.get(key).await
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), redis::RedisError> {
        let mut con = self.conn.clone();
        con.set_ex(key, value, ttl.as_secs().max(1)).await
    }

    async fn refresh_ttl(&self, key: &str, ttl: Duration) -> Result<(), redis::RedisError> {
        let mut con = self.conn.clone();
        con.expire(key, ttl.as_secs().max(1) as i64).await
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, redis::RedisError> {
        let mut con = self.conn.clone();
        con.incr(key, delta).await
    }

    async fn incr_by_float(&self, key: &str, delta: f64) -> Result<f64, redis::RedisError> {
        let mut con = self.conn.clone();
        con.incr(key, delta).await
    }

    async fn delete(&self, keys: &[String]) -> Result<(), redis::RedisError> {
        let mut con = self.conn.clone();
        con.del(keys.to_vec()).await
    }
}

#[cfg(test)]
pub(crate) mod memory {
    use super::CoordinationStore;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Mutex, MutexGuard};
    use std::time::Duration;

    fn offline_error() -> redis::RedisError {
        redis::RedisError::from((redis::ErrorKind::IoError, "store offline"))
    }

    /// In-memory stand-in for the shared store. TTLs are accepted and
    /// ignored; tests that need expiry write synthetic records instead.
    /// Flipping `set_offline(true)` makes every operation fail, which is how
    /// degraded-store behaviour is exercised.
    #[derive(Default)]
    pub struct MemoryStore {
        data: Mutex<HashMap<String, String>>,
        offline: AtomicBool,
    }

    impl MemoryStore {
        pub fn put(&self, key: &str, value: impl Into<String>) {
            self.data
                .lock()
                .expect("memory store lock")
                .insert(key.to_string(), value.into());
        }

        pub fn read(&self, key: &str) -> Option<String> {
            self.data.lock().expect("memory store lock").get(key).cloned()
        }

        pub fn set_offline(&self, offline: bool) {
            self.offline.store(offline, Ordering::SeqCst);
        }

        fn guarded(&self) -> Result<MutexGuard<'_, HashMap<String, String>>, redis::RedisError> {
            if self.offline.load(Ordering::SeqCst) {
                return Err(offline_error());
            }
            Ok(self.data.lock().expect("memory store lock"))
        }
    }

    #[async_trait]
    impl CoordinationStore for MemoryStore {
        async fn get(&self, key: &str) -> Result<Option<String>, redis::RedisError> {
            Ok(self.guarded()?.get(key).cloned())
        }

        async fn set_with_ttl(
            &self,
            key: &str,
            value: &str,
            _ttl: Duration,
        ) -> Result<(), redis::RedisError> {
            self.guarded()?.insert(key.to_string(), value.to_string());
            Ok(())
        }

        async fn refresh_ttl(&self, _key: &str, _ttl: Duration) -> Result<(), redis::RedisError> {
            self.guarded()?;
            Ok(())
        }

        async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, redis::RedisError> {
            let mut data = self.guarded()?;
            let current = data
                .get(key)
                .and_then(|raw| raw.parse::<i64>().ok())
                .unwrap_or(0);
            let next = current + delta;
            data.insert(key.to_string(), next.to_string());
            Ok(next)
        }

        async fn incr_by_float(&self, key: &str, delta: f64) -> Result<f64, redis::RedisError> {
            let mut data = self.guarded()?;
            let current = data
                .get(key)
                .and_then(|raw| raw.parse::<f64>().ok())
                .unwrap_or(0.0);
            let next = current + delta;
            data.insert(key.to_string(), next.to_string());
            Ok(next)
        }

        async fn delete(&self, keys: &[String]) -> Result<(), redis::RedisError> {
            let mut data = self.guarded()?;
            for key in keys {
                data.remove(key);
            }
            Ok(())
        }
    }
}
