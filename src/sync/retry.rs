//! Bounded retries with exponential backoff around a single outbound call.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Config;
use crate::constants::retry::MAX_DELAY_MS;
use crate::error::AppError;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, the first call included.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, multiplier: f64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            multiplier: if multiplier.is_finite() && multiplier >= 1.0 {
                multiplier
            } else {
                1.0
            },
            max_delay: Duration::from_millis(MAX_DELAY_MS),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.max_retries,
            Duration::from_millis(config.base_retry_delay_ms),
            config.backoff_multiplier,
        )
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Delay after the failed attempt `attempt` (0-indexed):
    /// `min(base * multiplier^attempt, max_delay)`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(secs)
        }
    }

    /// Runs `operation` until it succeeds, fails with a non-retryable error, or
    /// the attempts run out. The last error is returned unchanged.
    ///
    /// "No data" and other business outcomes are never retried; see
    /// [`AppError::is_retryable`].
    pub async fn execute<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, AppError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let mut attempt = 0;
        loop {
            debug!("{label}: attempt {}/{}", attempt + 1, self.max_attempts);
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_retryable() => {
                    debug!("{label}: not retrying: {e}");
                    return Err(e);
                }
                Err(e) => {
                    attempt += 1;
                    if attempt >= self.max_attempts {
                        warn!("{label}: giving up after {attempt} attempts: {e}");
                        return Err(e);
                    }
                    let delay = self.delay_for_attempt(attempt - 1);
                    warn!(
                        "{label}: attempt {attempt}/{} failed, retrying in {:.1}s: {e}",
                        self.max_attempts,
                        delay.as_secs_f64()
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_secs(2), 2.0)
    }

    #[test]
    fn test_delay_grows_exponentially() {
        let p = policy();
        assert_eq!(p.delay_for_attempt(0), Duration::from_secs(2));
        assert_eq!(p.delay_for_attempt(1), Duration::from_secs(4));
        assert_eq!(p.delay_for_attempt(2), Duration::from_secs(8));
    }

    #[test]
    fn test_delay_is_capped() {
        let p = policy();
        assert_eq!(p.delay_for_attempt(40), p.max_delay);
        assert_eq!(p.delay_for_attempt(u32::MAX), p.max_delay);
    }

    #[test]
    fn test_invalid_parameters_are_clamped() {
        let p = RetryPolicy::new(0, Duration::from_secs(1), f64::NAN);
        assert_eq!(p.max_attempts, 1);
        assert_eq!(p.multiplier, 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_operation_runs_exactly_max_attempts() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let result: Result<(), AppError> = policy()
            .execute("status", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(AppError::network_timeout("http://test/status"))
            })
            .await;

        assert!(matches!(result, Err(AppError::NetworkTimeout { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 2s + 4s of backoff, no sleep after the final attempt.
        assert_eq!(start.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_data_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), AppError> = policy()
            .execute("scored", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(AppError::api_no_data("empty", "http://test/scored/3"))
            })
            .await;

        assert!(result.unwrap_err().is_no_data());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auth_expired_is_returned_to_caller() {
        let calls = AtomicU32::new(0);
        let result: Result<(), AppError> = policy()
            .execute("highlights", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(AppError::auth_expired("http://test/auth"))
            })
            .await;

        assert!(result.unwrap_err().is_auth_expired());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = policy()
            .execute("market", || async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(AppError::api_server_error(500, "boom", "http://test/market"))
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
