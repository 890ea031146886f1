//! Exponential backoff for provider requests.
//!
//! Retries timeouts, connection failures, 5xx, 408 and 429. Other 4xx responses
//! (bad id, bad API key) are returned as-is on the first attempt.

use std::future::Future;
use std::time::Duration;

use reqwest::{Response, StatusCode};

use crate::error::UpstreamError;

pub const DEFAULT_INITIAL_DELAY_MS: u64 = 100;
pub const DEFAULT_MAX_DELAY_MS: u64 = 2000;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Doubles each retry
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl RetryConfig {
    pub fn new(max_retries: u32, initial_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_retries,
            initial_delay: Duration::from_millis(initial_delay_ms),
            max_delay: Duration::from_millis(max_delay_ms),
        }
    }

    /// First attempt plus retries.
    pub fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before retry number `attempt` (0-based): `initial * 2^attempt`, capped.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry,
    NoRetry,
}

pub fn is_retryable_error(error: &reqwest::Error) -> RetryDecision {
    if error.is_timeout() || error.is_connect() {
        return RetryDecision::Retry;
    }
    match error.status() {
        Some(status) => is_retryable_status(status),
        None => RetryDecision::NoRetry,
    }
}

pub fn is_retryable_status(status: StatusCode) -> RetryDecision {
    if status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
    {
        RetryDecision::Retry
    } else {
        RetryDecision::NoRetry
    }
}

/// Run `operation` until it yields a non-retryable outcome or retries run out.
///
/// A retryable status on the last attempt is returned as the response so the
/// caller can report it; a retryable transport error becomes `RetriesExhausted`.
pub async fn with_retry<F, Fut>(config: &RetryConfig, operation: F) -> Result<Response, UpstreamError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<Response, reqwest::Error>>,
{
    let attempts = config.total_attempts();
    let mut last_error = String::new();

    for attempt in 0..attempts {
        if attempt > 0 {
            let delay = config.delay_for_attempt(attempt - 1);
            tracing::info!("Retry {} of {}, waiting {:?}", attempt, config.max_retries, delay);
            tokio::time::sleep(delay).await;
        }

        match operation().await {
            Ok(response) => {
                let status = response.status();
                if is_retryable_status(status) == RetryDecision::Retry && attempt + 1 < attempts {
                    tracing::warn!(
                        "Provider returned {}, attempt {} of {}",
                        status,
                        attempt + 1,
                        attempts
                    );
                    last_error = format!("status {}", status);
                    continue;
                }
                if attempt > 0 {
                    tracing::info!("Request completed after {} retries", attempt);
                }
                return Ok(response);
            }
            Err(e) => {
                if is_retryable_error(&e) == RetryDecision::NoRetry {
                    tracing::debug!("Non-retryable error: {}", e);
                    return Err(UpstreamError::from(e));
                }
                tracing::warn!("Retryable error on attempt {} of {}: {}", attempt + 1, attempts, e);
                if attempts == 1 {
                    return Err(UpstreamError::from(e));
                }
                last_error = e.to_string();
            }
        }
    }

    tracing::error!("All {} attempts failed", attempts);
    Err(UpstreamError::RetriesExhausted {
        attempts,
        last: last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_doubles_and_caps() {
        let config = RetryConfig::new(5, 100, 1000);
        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(400));
        assert_eq!(config.delay_for_attempt(4), Duration::from_millis(1000));
        assert_eq!(config.delay_for_attempt(40), Duration::from_millis(1000));
    }

    #[test]
    fn test_total_attempts_saturates() {
        assert_eq!(RetryConfig::new(0, 0, 0).total_attempts(), 1);
        assert_eq!(RetryConfig::new(3, 0, 0).total_attempts(), 4);
        assert_eq!(RetryConfig::new(u32::MAX, 0, 0).total_attempts(), u32::MAX);
    }

    #[test]
    fn test_retryable_statuses() {
        assert_eq!(is_retryable_status(StatusCode::INTERNAL_SERVER_ERROR), RetryDecision::Retry);
        assert_eq!(is_retryable_status(StatusCode::BAD_GATEWAY), RetryDecision::Retry);
        assert_eq!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS), RetryDecision::Retry);
        assert_eq!(is_retryable_status(StatusCode::REQUEST_TIMEOUT), RetryDecision::Retry);

        assert_eq!(is_retryable_status(StatusCode::UNAUTHORIZED), RetryDecision::NoRetry);
        assert_eq!(is_retryable_status(StatusCode::NOT_FOUND), RetryDecision::NoRetry);
        assert_eq!(is_retryable_status(StatusCode::OK), RetryDecision::NoRetry);
    }
}
