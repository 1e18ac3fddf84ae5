//! HTTP client configuration for product providers

use crate::error::{LookupError, LookupResult};
use pantry_core::config::LookupConfig;
use pantry_core::retry::{CircuitBreakerConfig, RetryConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default user agent; Open Food Facts asks clients to identify themselves
const DEFAULT_USER_AGENT: &str = concat!("pantry-scan/", env!("CARGO_PKG_VERSION"));

/// Client configuration shared by all providers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// User agent sent with every request
    pub user_agent: String,
    /// Request timeout
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
    /// Retry configuration
    pub retry: RetryConfig,
    /// Circuit breaker configuration
    pub circuit_breaker: CircuitBreakerConfig,
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(10),
            retry: RetryConfig::quick(),
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

impl From<&LookupConfig> for ClientConfig {
    fn from(config: &LookupConfig) -> Self {
        Self {
            timeout: config.timeout(),
            retry: RetryConfig::quick().with_max_attempts(config.max_attempts),
            ..Self::default()
        }
    }
}

impl ClientConfig {
    /// Builder-style method to set timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builder-style method to set retry config
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Builder-style method to set the user agent
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> LookupResult<()> {
        if self.timeout.is_zero() {
            return Err(LookupError::config("timeout cannot be zero"));
        }
        if self.retry.max_attempts == 0 {
            return Err(LookupError::config("retry.max_attempts must be at least 1"));
        }
        if self.user_agent.trim().is_empty() {
            return Err(LookupError::config("user_agent cannot be empty"));
        }
        Ok(())
    }
}
