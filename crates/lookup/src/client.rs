//! Resilient HTTP client used by the product providers

use crate::config::ClientConfig;
use crate::error::{LookupError, LookupResult};
use pantry_core::retry::{CircuitBreaker, CircuitState};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Request correlation ID header
const X_REQUEST_ID: &str = "X-Request-ID";

/// HTTP client with built-in resilience patterns
///
/// Wraps `reqwest` and adds:
/// - Automatic retry with exponential backoff for transient failures
/// - A circuit breaker so a provider that keeps failing is skipped quickly
/// - Request correlation IDs for tracing
#[derive(Clone)]
pub struct HttpClient {
    inner: Client,
    config: Arc<ClientConfig>,
    circuit_breaker: Arc<CircuitBreaker>,
}

impl HttpClient {
    /// Create a new client with default configuration
    pub fn new() -> LookupResult<Self> {
        Self::with_config(ClientConfig::default())
    }

    /// Create a new client with specific configuration
    pub fn with_config(config: ClientConfig) -> LookupResult<Self> {
        config.validate()?;

        let mut default_headers = HeaderMap::new();
        default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let agent = HeaderValue::from_str(&config.user_agent)
            .map_err(|e| LookupError::config(format!("invalid user agent: {e}")))?;
        default_headers.insert(USER_AGENT, agent);

        let inner = Client::builder()
            .timeout(config.timeout)
            .default_headers(default_headers)
            .build()
            .map_err(LookupError::Request)?;

        let circuit_breaker = Arc::new(CircuitBreaker::new(config.circuit_breaker.clone()));

        Ok(Self {
            inner,
            config: Arc::new(config),
            circuit_breaker,
        })
    }

    /// Get the current configuration
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Get circuit breaker state
    #[must_use]
    pub fn circuit_state(&self) -> CircuitState {
        self.circuit_breaker.state()
    }

    /// Reset the circuit breaker
    pub fn reset_circuit(&self) {
        self.circuit_breaker.reset();
    }

    /// Perform a GET request with resilience patterns
    #[instrument(skip(self, query), fields(request_id))]
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> LookupResult<T> {
        let request_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("request_id", request_id.as_str());

        if !self.circuit_breaker.can_execute() {
            warn!(
                request_id = %request_id,
                url = %url,
                "Circuit breaker is open, rejecting request"
            );
            return Err(LookupError::CircuitOpen);
        }

        self.execute_with_retry(&request_id, url, query).await
    }

    /// Execute request with retry logic
    async fn execute_with_retry<T: DeserializeOwned>(
        &self,
        request_id: &str,
        url: &str,
        query: &[(&str, &str)],
    ) -> LookupResult<T> {
        let retry_config = &self.config.retry;
        let mut last_error: Option<LookupError> = None;

        for attempt in 0..retry_config.max_attempts {
            if attempt > 0 {
                let delay = retry_config.delay_for_attempt(attempt);
                debug!(
                    request_id = %request_id,
                    attempt = attempt,
                    delay_ms = delay.as_millis(),
                    "Retrying after delay"
                );
                tokio::time::sleep(delay).await;
            }

            let start = Instant::now();
            let result = self.execute_single_request(request_id, url, query).await;
            let elapsed = start.elapsed();

            match result {
                Ok(value) => {
                    self.circuit_breaker.record_success();
                    debug!(
                        request_id = %request_id,
                        attempt = attempt + 1,
                        elapsed_ms = elapsed.as_millis(),
                        "Request succeeded"
                    );
                    return Ok(value);
                }
                Err(e) => {
                    // A 404 means "no such product", not an unhealthy provider
                    if !e.is_not_found() {
                        self.circuit_breaker.record_failure();
                    }

                    if e.is_retryable() && attempt + 1 < retry_config.max_attempts {
                        debug!(
                            request_id = %request_id,
                            attempt = attempt + 1,
                            error = %e,
                            "Request failed, will retry"
                        );
                        last_error = Some(e);
                    } else {
                        debug!(
                            request_id = %request_id,
                            attempt = attempt + 1,
                            error = %e,
                            "Request failed, not retrying"
                        );
                        return Err(e);
                    }
                }
            }
        }

        Err(LookupError::RetriesExhausted {
            attempts: retry_config.max_attempts,
            last_error: last_error.map_or_else(|| "Unknown error".to_string(), |e| e.to_string()),
        })
    }

    /// Execute a single request without retry
    async fn execute_single_request<T: DeserializeOwned>(
        &self,
        request_id: &str,
        url: &str,
        query: &[(&str, &str)],
    ) -> LookupResult<T> {
        let response = self
            .inner
            .get(url)
            .query(query)
            .header(X_REQUEST_ID, request_id)
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// Handle HTTP response and deserialize
    async fn handle_response<T: DeserializeOwned>(response: Response) -> LookupResult<T> {
        let status = response.status();

        if status.is_success() {
            let body = response.bytes().await?;
            Ok(serde_json::from_slice(&body)?)
        } else {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            Err(LookupError::api_response(status.as_u16(), message))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_client_creation() {
        let client = HttpClient::new();
        assert!(client.is_ok());
        assert_eq!(client.unwrap().circuit_state(), CircuitState::Closed);
    }

    #[test]
    fn test_client_rejects_invalid_config() {
        let config = ClientConfig::default().with_timeout(Duration::ZERO);
        assert!(HttpClient::with_config(config).is_err());
    }

    #[tokio::test]
    async fn test_open_circuit_short_circuits() {
        let client = HttpClient::new().unwrap();
        for _ in 0..client.config().circuit_breaker.failure_threshold {
            client.circuit_breaker.record_failure();
        }

        let result: LookupResult<serde_json::Value> =
            client.get_json("http://127.0.0.1:9/never-called", &[]).await;
        assert!(matches!(result, Err(LookupError::CircuitOpen)));

        client.reset_circuit();
        assert_eq!(client.circuit_state(), CircuitState::Closed);
    }
}
