//! Upstream processor HTTP clients
//!
//! Two pooled reqwest clients built once at startup: a large keep-alive pool
//! for payment POSTs and a smaller, shorter-deadline pool for health probes.
//! Services depend on the `ProcessorClient` trait so dispatch logic can be
//! exercised against scripted upstreams in tests.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONNECTION};
use std::time::Duration;
use thiserror::Error;

use crate::config::ProcessorConfig;
use crate::models::{HealthSnapshot, Processor, ProcessorPayment};

/// Idle connections kept per upstream for payment traffic.
const PAYMENT_POOL_SIZE: usize = 200;
/// Idle connections kept per upstream for health probes.
const PROBE_POOL_SIZE: usize = 50;

/// A failed payment attempt against one upstream.
#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("upstream returned status {0}")]
    Status(u16),
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

/// Upstream operations the dispatch engine needs.
#[async_trait]
pub trait ProcessorClient: Send + Sync {
    /// POST one payment. Success iff the upstream answers 2xx.
    async fn post_payment(
        &self,
        processor: Processor,
        payment: &ProcessorPayment,
    ) -> Result<(), ProcessorError>;

    /// GET the processor health endpoint. `None` covers every failure mode:
    /// non-2xx, timeout, transport error, undecodable body.
    async fn fetch_health(&self, processor: Processor) -> Option<HealthSnapshot>;
}

/// reqwest-backed client pair for both upstream processors.
pub struct HttpProcessorClient {
    payments: reqwest::Client,
    probes: reqwest::Client,
    config: ProcessorConfig,
}

impl HttpProcessorClient {
    pub fn new(config: ProcessorConfig) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));

        let payments = reqwest::Client::builder()
            .pool_max_idle_per_host(PAYMENT_POOL_SIZE)
            .tcp_keepalive(Duration::from_secs(60))
            .default_headers(headers)
            .timeout(config.payment_timeout)
            .build()?;

        let probes = reqwest::Client::builder()
            .pool_max_idle_per_host(PROBE_POOL_SIZE)
            .timeout(config.probe_timeout)
            .build()?;

        Ok(Self {
            payments,
            probes,
            config,
        })
    }
}

#[async_trait]
impl ProcessorClient for HttpProcessorClient {
    async fn post_payment(
        &self,
        processor: Processor,
        payment: &ProcessorPayment,
    ) -> Result<(), ProcessorError> {
        let url = format!("{}/payments", self.config.base_url(processor));
        let response = self.payments.post(&url).json(payment).send().await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ProcessorError::Status(response.status().as_u16()))
        }
    }

    async fn fetch_health(&self, processor: Processor) -> Option<HealthSnapshot> {
        let url = format!(
            "{}/payments/service-health",
            self.config.base_url(processor)
        );
        let response = self.probes.get(&url).send().await.ok()?;
        if !response.status().is_success() {
            return None;
        }
        response.json::<HealthSnapshot>().await.ok()
    }
}
