//! Download configuration and backoff calculation

use std::time::Duration;

/// Default request rate in requests per second.
/// One request per second is polite to the portal while still finishing a
/// typical dataset in minutes.
pub const DEFAULT_RATE_LIMIT: f64 = 1.0;

/// Default worker count. Two workers is a conservative default; higher
/// values risk triggering server-side throttling.
pub const DEFAULT_MAX_WORKERS: usize = 2;

/// Maximum allowed worker count to prevent self-inflicted rate limiting.
pub const MAX_WORKERS: usize = 32;

/// Default number of retries for transient failures.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default base delay for exponential backoff in seconds.
pub const DEFAULT_BASE_BACKOFF_SECS: f64 = 2.0;

/// Default per-request timeout in seconds. Some SEAO resources are large
/// monthly archives, so this is generous.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Values consumed by the download core. Parsed and validated by the CLI.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Maximum requests per second across all workers; `<= 0` disables
    /// rate limiting
    pub rate_limit: f64,
    /// Number of retries for transient failures (total attempts is
    /// `max_retries + 1`)
    pub max_retries: u32,
    /// Base delay for exponential backoff, in seconds
    pub base_backoff_secs: f64,
    /// Per-request timeout, in seconds
    pub timeout_secs: u64,
    /// Whether to verify TLS certificates
    pub verify_tls: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            rate_limit: DEFAULT_RATE_LIMIT,
            max_retries: DEFAULT_MAX_RETRIES,
            base_backoff_secs: DEFAULT_BASE_BACKOFF_SECS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            verify_tls: true,
        }
    }
}

/// Calculate the exponential backoff delay for a retry attempt.
///
/// Delay grows as `base * 2^attempt`: attempt 0 sleeps `base`, attempt 1
/// sleeps `2 * base`, and so on. Attempts are bounded by `max_retries`, so
/// the delay stays well within `Duration` range.
pub fn calculate_backoff(base_secs: f64, attempt: u32) -> Duration {
    let secs = base_secs.max(0.0) * 2f64.powi(attempt.min(32) as i32);
    Duration::from_secs_f64(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt() {
        assert_eq!(calculate_backoff(2.0, 0), Duration::from_secs(2));
        assert_eq!(calculate_backoff(2.0, 1), Duration::from_secs(4));
        assert_eq!(calculate_backoff(2.0, 2), Duration::from_secs(8));
        assert_eq!(calculate_backoff(2.0, 3), Duration::from_secs(16));
    }

    #[test]
    fn backoff_is_strictly_increasing() {
        let mut last = Duration::ZERO;
        for attempt in 0..6 {
            let delay = calculate_backoff(0.5, attempt);
            assert!(delay > last, "attempt {attempt} should sleep longer");
            last = delay;
        }
    }

    #[test]
    fn zero_base_disables_backoff_delay() {
        assert_eq!(calculate_backoff(0.0, 4), Duration::ZERO);
    }

    #[test]
    fn negative_base_is_clamped() {
        assert_eq!(calculate_backoff(-1.0, 2), Duration::ZERO);
    }
}
