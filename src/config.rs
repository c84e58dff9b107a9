use std::collections::HashMap;
use std::time::Duration;

use crate::constants;
use crate::dispatch::{RetryConfig, WorkManagerConfig};
use crate::error::{GatewayError, Result};

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub actor_service_uri: String,
    pub queue_capacity: usize,
    pub worker_count: usize,
    pub remote_call_timeout_ms: u64,
    pub retry_limit: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    pub backoff_multiplier: f64,
    pub backoff_jitter: bool,
    pub custom_settings: HashMap<String, String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            actor_service_uri: constants::system::DEFAULT_ACTOR_SERVICE_URI.to_string(),
            queue_capacity: constants::DEFAULT_QUEUE_CAPACITY,
            worker_count: constants::DEFAULT_WORKER_COUNT,
            remote_call_timeout_ms: constants::DEFAULT_REMOTE_CALL_TIMEOUT_MS,
            retry_limit: constants::DEFAULT_RETRY_LIMIT,
            backoff_base_ms: constants::DEFAULT_BACKOFF_BASE_MS,
            backoff_max_ms: constants::DEFAULT_BACKOFF_MAX_MS,
            backoff_multiplier: constants::DEFAULT_BACKOFF_MULTIPLIER,
            backoff_jitter: true,
            custom_settings: HashMap::new(),
        }
    }
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(uri) = std::env::var("GATEWAY_ACTOR_SERVICE_URI") {
            config.actor_service_uri = uri;
        }

        if let Ok(capacity) = std::env::var("GATEWAY_QUEUE_CAPACITY") {
            config.queue_capacity = capacity.parse().map_err(|e| {
                GatewayError::ConfigurationError(format!("Invalid queue_capacity: {e}"))
            })?;
        }

        if let Ok(workers) = std::env::var("GATEWAY_WORKER_COUNT") {
            config.worker_count = workers.parse().map_err(|e| {
                GatewayError::ConfigurationError(format!("Invalid worker_count: {e}"))
            })?;
        }

        if let Ok(timeout) = std::env::var("GATEWAY_REMOTE_CALL_TIMEOUT_MS") {
            config.remote_call_timeout_ms = timeout.parse().map_err(|e| {
                GatewayError::ConfigurationError(format!("Invalid remote_call_timeout_ms: {e}"))
            })?;
        }

        if let Ok(retry_limit) = std::env::var("GATEWAY_RETRY_LIMIT") {
            config.retry_limit = retry_limit.parse().map_err(|e| {
                GatewayError::ConfigurationError(format!("Invalid retry_limit: {e}"))
            })?;
        }

        Ok(config)
    }

    /// Dispatcher configuration derived from the flat gateway settings
    pub fn work_manager_config(&self) -> WorkManagerConfig {
        WorkManagerConfig {
            queue_capacity: self.queue_capacity,
            worker_count: self.worker_count,
            retry: self.retry_config(),
        }
    }

    /// Retry configuration derived from the flat gateway settings
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.retry_limit,
            base_delay: Duration::from_millis(self.backoff_base_ms),
            max_delay: Duration::from_millis(self.backoff_max_ms),
            backoff_multiplier: self.backoff_multiplier,
            jitter: self.backoff_jitter,
        }
    }

    /// Per-remote-call timeout budget
    pub fn remote_call_timeout(&self) -> Duration {
        Duration::from_millis(self.remote_call_timeout_ms)
    }
}
