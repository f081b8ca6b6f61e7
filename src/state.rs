//! Shared application state
//!
//! One `AppState` is built at process start and cloned into every request
//! handler. All long-lived collaborators hang off it behind `Arc`s; cloning
//! is cheap and handlers never construct infrastructure themselves.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::config::AppConfig;
use crate::infrastructure::http_client::{HttpProcessorClient, ProcessorClient};
use crate::infrastructure::redis_client::{CoordinationStore, RedisStore};
use crate::models::Processor;

/// Per-processor single-slot gates that coalesce health probes.
///
/// At most one upstream health probe per processor is in flight on this
/// replica; concurrent callers wait on the gate and re-read the shared
/// cache once it opens.
#[derive(Default)]
pub struct ProbeGates {
    primary: Mutex<()>,
    fallback: Mutex<()>,
}

impl ProbeGates {
    pub fn gate(&self, processor: Processor) -> &Mutex<()> {
        match processor {
            Processor::Primary => &self.primary,
            Processor::Fallback => &self.fallback,
        }
    }
}

/// Failure to assemble the long-lived collaborators at startup.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("coordination store connection failed: {0}")]
    Store(#[from] redis::RedisError),
    #[error("upstream client construction failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Global application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn CoordinationStore>,
    pub processors: Arc<dyn ProcessorClient>,
    pub probe_gates: Arc<ProbeGates>,
}

impl AppState {
    /// Connect the coordination store and build the upstream clients.
    pub async fn new(config: AppConfig) -> Result<Self, StateError> {
        let store = RedisStore::connect(&config.store).await?;
        let processors = HttpProcessorClient::new(config.processors.clone())?;

        Ok(Self {
            config: Arc::new(config),
            store: Arc::new(store),
            processors: Arc::new(processors),
            probe_gates: Arc::new(ProbeGates::default()),
        })
    }
}

#[cfg(test)]
impl AppState {
    pub(crate) fn for_tests(
        config: AppConfig,
        store: Arc<dyn CoordinationStore>,
        processors: Arc<dyn ProcessorClient>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            store,
            processors,
            probe_gates: Arc::new(ProbeGates::default()),
        }
    }
}
