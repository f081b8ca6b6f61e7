//! Application configuration
//!
//! Environment variable loading with per-field defaults and validation.
//! Every routing and resilience tunable lives here so deployments can adjust
//! thresholds without a rebuild.

use std::env;
use std::time::Duration;

use crate::models::Processor;

/// Main application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub processors: ProcessorConfig,
    pub store: StoreConfig,
    pub retry: RetryConfig,
    pub breaker: BreakerConfig,
    pub health: HealthConfig,
}

/// Listener settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Upstream processor endpoints and call deadlines.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    pub default_url: String,
    pub fallback_url: String,
    /// Hard deadline for one payment POST, connection included.
    pub payment_timeout: Duration,
    /// Hard deadline for one health GET.
    pub probe_timeout: Duration,
}

impl ProcessorConfig {
    pub fn base_url(&self, processor: Processor) -> &str {
        match processor {
            Processor::Primary => &self.default_url,
            Processor::Fallback => &self.fallback_url,
        }
    }
}

/// Coordination store connection settings.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub url: String,
    pub connect_timeout: Duration,
    pub command_timeout: Duration,
}

/// Dispatch retry policy.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub attempts: u32,
    pub backoff: Vec<Duration>,
}

impl RetryConfig {
    /// Backoff step before the next round; the last step repeats when the
    /// schedule is shorter than the attempt count.
    pub fn backoff_for(&self, attempt: usize) -> Duration {
        self.backoff
            .get(attempt)
            .or_else(|| self.backoff.last())
            .copied()
            .unwrap_or(Duration::from_millis(100))
    }
}

/// Circuit breaker thresholds.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub cooldown: Duration,
}

/// Shared health view tunables.
#[derive(Debug, Clone)]
pub struct HealthConfig {
    pub cache_ttl: Duration,
    /// A primary slower than this is not worth the cheaper fee.
    pub latency_threshold: Duration,
}

impl AppConfig {
    /// Load and validate the configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = AppConfig {
            server: ServerConfig::from_env()?,
            processors: ProcessorConfig::from_env()?,
            store: StoreConfig::from_env()?,
            retry: RetryConfig::from_env()?,
            breaker: BreakerConfig::from_env()?,
            health: HealthConfig::from_env()?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_base_url("PROCESSOR_DEFAULT_URL", &self.processors.default_url)?;
        validate_base_url("PROCESSOR_FALLBACK_URL", &self.processors.fallback_url)?;

        if self.store.url.is_empty() {
            return Err(ConfigError::InvalidValue(
                "STORE_CONNECTION_STRING cannot be empty".to_string(),
            ));
        }
        if self.retry.attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "RETRY_ATTEMPTS must be at least 1".to_string(),
            ));
        }
        if self.breaker.failure_threshold == 0 || self.breaker.success_threshold == 0 {
            return Err(ConfigError::InvalidValue(
                "breaker thresholds must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(ServerConfig {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".to_string()))?,
        })
    }
}

impl ProcessorConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(ProcessorConfig {
            default_url: required_url("PROCESSOR_DEFAULT_URL")?,
            fallback_url: required_url("PROCESSOR_FALLBACK_URL")?,
            payment_timeout: duration_ms("PAYMENT_TIMEOUT_MS", 1000)?,
            probe_timeout: duration_ms("HEALTH_PROBE_TIMEOUT_MS", 500)?,
        })
    }
}

impl StoreConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(StoreConfig {
            url: env::var("STORE_CONNECTION_STRING")
                .map_err(|_| ConfigError::MissingVariable("STORE_CONNECTION_STRING".to_string()))?,
            connect_timeout: duration_ms("STORE_CONNECT_TIMEOUT_MS", 2000)?,
            command_timeout: duration_ms("STORE_COMMAND_TIMEOUT_MS", 1000)?,
        })
    }
}

impl RetryConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(RetryConfig {
            attempts: parse_u32("RETRY_ATTEMPTS", 2)?,
            backoff: parse_backoff(
                &env::var("RETRY_BACKOFF_MS").unwrap_or_else(|_| "25,100".to_string()),
            )?,
        })
    }
}

impl BreakerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(BreakerConfig {
            failure_threshold: parse_u32("BREAKER_FAILURE_THRESHOLD", 5)?,
            success_threshold: parse_u32("BREAKER_SUCCESS_THRESHOLD", 3)?,
            cooldown: duration_ms("BREAKER_COOLDOWN_MS", 5000)?,
        })
    }
}

impl HealthConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(HealthConfig {
            cache_ttl: duration_ms("HEALTH_CACHE_TTL_MS", 5000)?,
            latency_threshold: duration_ms("HEALTH_LATENCY_THRESHOLD_MS", 500)?,
        })
    }
}

fn required_url(name: &str) -> Result<String, ConfigError> {
    let raw = env::var(name).map_err(|_| ConfigError::MissingVariable(name.to_string()))?;
    Ok(raw.trim_end_matches('/').to_string())
}

fn validate_base_url(name: &str, url: &str) -> Result<(), ConfigError> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::InvalidValue(format!(
            "{name} must be an http(s) URL"
        )));
    }
    Ok(())
}

fn duration_ms(name: &str, default: u64) -> Result<Duration, ConfigError> {
    let millis = env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidValue(name.to_string()))?;
    Ok(Duration::from_millis(millis))
}

fn parse_u32(name: &str, default: u32) -> Result<u32, ConfigError> {
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .map_err(|_| ConfigError::InvalidValue(name.to_string()))
}

/// Comma-separated millisecond steps, e.g. `25,100`.
fn parse_backoff(raw: &str) -> Result<Vec<Duration>, ConfigError> {
    raw.split(',')
        .map(|step| {
            step.trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| ConfigError::InvalidValue("RETRY_BACKOFF_MS".to_string()))
        })
        .collect()
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing environment variable: {0}")]
    MissingVariable(String),

    #[error("invalid value for configuration: {0}")]
    InvalidValue(String),
}

#[cfg(test)]
impl AppConfig {
    /// Fixed configuration for unit tests; short backoffs keep them fast.
    pub(crate) fn for_tests() -> Self {
        AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            processors: ProcessorConfig {
                default_url: "http://primary.test".to_string(),
                fallback_url: "http://fallback.test".to_string(),
                payment_timeout: Duration::from_millis(1000),
                probe_timeout: Duration::from_millis(500),
            },
            store: StoreConfig {
                url: "redis://127.0.0.1:6379".to_string(),
                connect_timeout: Duration::from_millis(2000),
                command_timeout: Duration::from_millis(1000),
            },
            retry: RetryConfig {
                attempts: 2,
                backoff: vec![Duration::from_millis(1), Duration::from_millis(2)],
            },
            breaker: BreakerConfig {
                failure_threshold: 5,
                success_threshold: 3,
                cooldown: Duration::from_secs(5),
            },
            health: HealthConfig {
                cache_ttl: Duration::from_secs(5),
                latency_threshold: Duration::from_millis(500),
            },
        }
    }
}
