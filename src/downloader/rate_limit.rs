//! Token-interval rate limiting
//!
//! Enforces a minimum delay between requests to be polite to the server.
//! A single limiter instance is shared across all workers so the effective
//! request rate is bounded globally, not per worker.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

/// Shared rate limiter enforcing a minimum inter-request interval.
///
/// The last-request instant lives behind a mutex and the guard is held
/// across the sleep, so concurrent callers serialize and each departs at
/// least `1/rate` after the previous one.
pub struct RateLimiter {
    min_interval: Option<Duration>,
    last_request: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Create a limiter for the given maximum requests per second.
    ///
    /// A rate of zero or less disables limiting entirely.
    pub fn new(requests_per_second: f64) -> Self {
        let min_interval = (requests_per_second > 0.0)
            .then(|| Duration::from_secs_f64(1.0 / requests_per_second));
        Self {
            min_interval,
            last_request: Mutex::new(None),
        }
    }

    /// Create a shared limiter wrapped in [`Arc`].
    pub fn shared(requests_per_second: f64) -> Arc<Self> {
        Arc::new(Self::new(requests_per_second))
    }

    /// Whether rate limiting is active.
    pub fn is_enabled(&self) -> bool {
        self.min_interval.is_some()
    }

    /// Block until it is safe to make another request, then record now as
    /// the new last-request time. Never fails; a no-op when disabled.
    pub async fn wait(&self) {
        let Some(min_interval) = self.min_interval else {
            return;
        };

        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < min_interval {
                let sleep_for = min_interval - elapsed;
                debug!(sleep_ms = sleep_for.as_millis() as u64, "Rate limiting");
                tokio::time::sleep(sleep_for).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_rate_disables_limiting() {
        assert!(!RateLimiter::new(0.0).is_enabled());
        assert!(!RateLimiter::new(-1.0).is_enabled());
        assert!(RateLimiter::new(1.0).is_enabled());
    }

    #[tokio::test]
    async fn disabled_limiter_never_sleeps() {
        let limiter = RateLimiter::new(0.0);
        let start = Instant::now();
        for _ in 0..100 {
            limiter.wait().await;
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn enforces_minimum_interval() {
        // 20 req/s -> 50ms between requests
        let limiter = RateLimiter::new(20.0);
        let start = Instant::now();
        limiter.wait().await;
        limiter.wait().await;
        limiter.wait().await;
        assert!(
            start.elapsed() >= Duration::from_millis(100),
            "three requests at 20 req/s should span at least 100ms"
        );
    }

    #[tokio::test]
    async fn interval_is_global_across_tasks() {
        let limiter = RateLimiter::shared(20.0);
        let start = Instant::now();

        let mut handles = Vec::new();
        for _ in 0..4 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move {
                limiter.wait().await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        // Four requests through one limiter take at least 3 intervals.
        assert!(
            start.elapsed() >= Duration::from_millis(150),
            "shared limiter must bound the rate globally, not per worker"
        );
    }
}
