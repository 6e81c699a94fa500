//! Retry utilities with exponential backoff for resilient API calls.

use std::time::Duration;
use tokio::time::{sleep, timeout};

use crate::lookup::LookupError;

/// Configuration for retry behavior
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of calls, including the first one
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Time limit for a single call
    pub attempt_timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            attempt_timeout: Duration::from_secs(60),
        }
    }
}

impl RetryConfig {
    /// Backoff before retry number `retry` (1 for the first retry)
    ///
    /// Multipliers below 1 or not finite fall back to a constant delay.
    pub fn backoff(&self, retry: u32) -> Duration {
        let multiplier = if self.backoff_multiplier.is_finite() && self.backoff_multiplier >= 1.0 {
            self.backoff_multiplier
        } else {
            1.0
        };
        let max = self.max_delay.as_secs_f64();
        let exp_delay =
            self.initial_delay.as_secs_f64() * multiplier.powf(retry.saturating_sub(1) as f64);
        Duration::from_secs_f64(exp_delay.min(max).max(0.0))
    }

    /// Delay before retrying after `transient` on attempt number `attempt`
    ///
    /// A server-requested delay raises the backoff, capped at `max_delay`.
    pub fn delay_after(&self, attempt: u32, transient: &TransientError) -> Duration {
        let delay = self.backoff(attempt);
        match transient.requested_delay() {
            Some(requested) => delay.max(requested.min(self.max_delay)),
            None => delay,
        }
    }
}

/// Transient errors that should trigger a retry
#[derive(Debug, Clone, PartialEq)]
pub enum TransientError {
    /// Network connectivity issues
    Network,
    /// Rate limit exceeded (with optional retry-after seconds)
    RateLimit(Option<u64>),
    /// Server error (5xx)
    ServerError,
    /// Request timeout
    Timeout,
}

impl TransientError {
    /// Check if a LookupError represents a transient error
    pub fn from_lookup_error(err: &LookupError) -> Option<Self> {
        match err {
            LookupError::Network(_) => Some(TransientError::Network),
            LookupError::Timeout => Some(TransientError::Timeout),
            LookupError::RateLimit(after) => Some(TransientError::RateLimit(*after)),
            LookupError::Api { status, .. } if *status >= 500 => Some(TransientError::ServerError),
            _ => None,
        }
    }

    /// Delay the server asked for, if any
    pub fn requested_delay(&self) -> Option<Duration> {
        match self {
            TransientError::RateLimit(Some(seconds)) => Some(Duration::from_secs(*seconds)),
            _ => None,
        }
    }
}

/// Execute an async operation with retry logic
///
/// Transient errors are retried with exponential backoff until
/// `config.max_attempts` calls have been made, after which the last error is
/// wrapped in [`LookupError::Unavailable`]. Any other error is returned
/// immediately.
pub async fn with_retry<T, F, Fut>(config: RetryConfig, operation: F) -> Result<T, LookupError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, LookupError>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempts = 0;
    let mut operation = operation;

    loop {
        attempts += 1;

        let error = match timeout(config.attempt_timeout, operation()).await {
            Ok(Ok(result)) => {
                if attempts > 1 {
                    tracing::info!(
                        "Lookup succeeded on attempt {} after {} transient failures",
                        attempts,
                        attempts - 1
                    );
                }
                return Ok(result);
            }
            Ok(Err(error)) => error,
            Err(_) => LookupError::Timeout,
        };

        let Some(transient) = TransientError::from_lookup_error(&error) else {
            // Permanent error - return immediately
            return Err(error);
        };

        if attempts >= max_attempts {
            tracing::warn!("Lookup failed after {} attempts: {}", attempts, error);
            return Err(LookupError::Unavailable {
                attempts,
                last_error: error.to_string(),
            });
        }

        let delay = config.delay_after(attempts, &transient);

        tracing::debug!(
            "Transient error on attempt {}: {:?}, retrying in {:?}",
            attempts,
            transient,
            delay
        );

        sleep(delay).await;
    }
}
