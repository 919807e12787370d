//! Sliding-window limiter shared by every outbound call of a cycle.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::trace;

use crate::config::Config;

/// Admits at most `max_calls` acquisitions in any window of length `period`.
///
/// The mutex is held across the wait, so callers are admitted in arrival order
/// and never sleep concurrently against the same stale window.
#[derive(Debug)]
pub struct RateLimiter {
    max_calls: usize,
    period: Duration,
    calls: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(max_calls: usize, period: Duration) -> Self {
        let max_calls = max_calls.max(1);
        Self {
            max_calls,
            period,
            calls: Mutex::new(VecDeque::with_capacity(max_calls)),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.rate_limit_max_calls,
            Duration::from_millis(config.rate_limit_period_ms),
        )
    }

    pub fn max_calls(&self) -> usize {
        self.max_calls
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Waits until a slot is free, then records the call.
    pub async fn acquire(&self) {
        let mut calls = self.calls.lock().await;
        self.evict(&mut calls, Instant::now());

        while calls.len() >= self.max_calls {
            let Some(&oldest) = calls.front() else { break };
            let ready_at = oldest + self.period;
            trace!(
                "Rate limit reached ({} calls), waiting {:?}",
                calls.len(),
                ready_at.saturating_duration_since(Instant::now())
            );
            tokio::time::sleep_until(ready_at).await;
            self.evict(&mut calls, Instant::now());
        }

        calls.push_back(Instant::now());
    }

    fn evict(&self, calls: &mut VecDeque<Instant>, now: Instant) {
        while let Some(&front) = calls.front() {
            if now.duration_since(front) >= self.period {
                calls.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_burst_within_ceiling_does_not_wait() {
        let limiter = RateLimiter::new(10, Duration::from_secs(1));
        let start = Instant::now();
        for _ in 0..10 {
            limiter.acquire().await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_twenty_five_calls_take_two_periods() {
        let limiter = RateLimiter::new(10, Duration::from_secs(1));
        let start = Instant::now();
        let mut starts = Vec::new();
        for _ in 0..25 {
            limiter.acquire().await;
            starts.push(start.elapsed());
        }

        assert_eq!(start.elapsed(), Duration::from_secs(2));
        for (i, at) in starts.iter().enumerate() {
            let in_window = starts
                .iter()
                .skip(i)
                .take_while(|other| **other < *at + Duration::from_secs(1))
                .count();
            assert!(in_window <= 10, "{in_window} calls within one second of {at:?}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_the_window() {
        let limiter = Arc::new(RateLimiter::new(3, Duration::from_millis(500)));
        let start = Instant::now();

        let handles: Vec<_> = (0..9)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                tokio::spawn(async move {
                    limiter.acquire().await;
                    start.elapsed()
                })
            })
            .collect();

        let mut starts = Vec::new();
        for handle in handles {
            starts.push(handle.await.unwrap());
        }
        starts.sort();

        assert_eq!(starts.last().copied(), Some(Duration::from_millis(1000)));
        assert_eq!(
            starts.iter().filter(|s| **s < Duration::from_millis(500)).count(),
            3
        );
    }

    #[test]
    fn test_zero_ceiling_is_clamped() {
        let limiter = RateLimiter::new(0, Duration::from_secs(1));
        assert_eq!(limiter.max_calls(), 1);
    }
}
