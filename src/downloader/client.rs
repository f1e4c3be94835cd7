//! Retrying HTTP transfer client
//!
//! Performs a single resource transfer with bounded retries and exponential
//! backoff. Transient failures (5xx, network errors, timeouts) are retried;
//! other 4xx responses fail the resource without retrying; 403 and 429 are
//! fatal for the whole run and propagate immediately so the orchestrator
//! can stop dispatching work.

use crate::downloader::config::{calculate_backoff, DownloadConfig};
use crate::downloader::rate_limit::RateLimiter;
use crate::shutdown::SharedShutdown;
use async_trait::async_trait;
use futures_util::StreamExt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// User agent sent on every download request.
pub const USER_AGENT: &str = "SEAO-Downloader/1.0 (Quebec-OpenData-Client; Production)";

/// Terminal result of one transfer attempt sequence. Never mutated after
/// return.
#[derive(Debug, Clone)]
pub struct TransferOutcome {
    /// Whether the transfer completed and the file was written
    pub success: bool,
    /// Source URL
    pub url: String,
    /// Destination path the file was (or would have been) written to
    pub local_path: Option<PathBuf>,
    /// HTTP status of the final attempt; 0 when no response was received
    pub http_status: u16,
    /// Bytes written to the destination on success
    pub bytes_written: u64,
    /// Last observed error when the transfer failed
    pub error_message: Option<String>,
    /// Attempt index on success; attempts made on failure
    pub retry_count: u32,
}

/// Server-imposed restriction that must halt the entire batch, not just the
/// current resource. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FatalSignal {
    /// HTTP 403: the server is blocking requests
    #[error("access denied (HTTP 403) for {url}")]
    AccessDenied {
        /// URL that was denied
        url: String,
    },

    /// HTTP 429: the server is throttling requests
    #[error("rate limited (HTTP 429) for {url}")]
    RateLimited {
        /// URL that was throttled
        url: String,
    },
}

impl FatalSignal {
    /// Operator-facing remediation hint, logged instead of a stack trace.
    pub fn remediation(&self) -> &'static str {
        match self {
            FatalSignal::AccessDenied { .. } => {
                "the server is blocking requests (IP rate limiting, required \
                 authentication, or geographic restrictions); wait and retry \
                 later, or check whether auth is needed"
            }
            FatalSignal::RateLimited { .. } => {
                "too many requests; reduce --rate-limit and wait before retrying"
            }
        }
    }
}

/// Errors constructing the transfer client.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// The underlying HTTP client could not be built
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(String),
}

/// One resource transfer. Seam for the executor so tests can script
/// transfer behavior without a network.
#[async_trait]
pub trait Transfer: Send + Sync {
    /// Transfer `url` to `dest`, retrying transient failures.
    ///
    /// Returns `Err` only for fatal-for-run signals (403/429); every other
    /// failure mode is folded into the returned [`TransferOutcome`].
    async fn transfer(&self, url: &str, dest: &Path) -> Result<TransferOutcome, FatalSignal>;
}

/// Per-attempt failure classification, internal to the retry loop.
enum AttemptError {
    /// 403/429, bubbles up immediately
    Fatal(FatalSignal),
    /// 5xx, network error, or timeout; retried with backoff
    Retryable(String),
    /// Other 4xx; fails the resource without retrying
    ClientError(u16, String),
}

/// HTTP downloader with exponential backoff and rate limiting.
///
/// Stops immediately on 403/429 to avoid IP banning.
pub struct ResourceDownloader {
    client: reqwest::Client,
    rate_limiter: Arc<RateLimiter>,
    max_retries: u32,
    base_backoff_secs: f64,
    shutdown: Option<SharedShutdown>,
}

impl ResourceDownloader {
    /// Create a downloader from config, sharing the given rate limiter.
    pub fn new(
        config: &DownloadConfig,
        rate_limiter: Arc<RateLimiter>,
    ) -> Result<Self, TransferError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()
            .map_err(|e| TransferError::ClientBuild(e.to_string()))?;

        Ok(Self {
            client,
            rate_limiter,
            max_retries: config.max_retries,
            base_backoff_secs: config.base_backoff_secs,
            shutdown: crate::shutdown::get_global_shutdown(),
        })
    }

    /// Attach a shared shutdown handle so backoff sleeps can be interrupted.
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown
            .as_ref()
            .map(|s| s.is_shutdown_requested())
            .unwrap_or(false)
    }

    /// Sleep the backoff delay, waking early on shutdown. Returns false when
    /// shutdown was requested and retrying should stop.
    async fn backoff_or_shutdown(&self, attempt: u32) -> bool {
        let backoff = calculate_backoff(self.base_backoff_secs, attempt);
        warn!(
            attempt = attempt + 1,
            max_retries = self.max_retries,
            backoff_ms = backoff.as_millis() as u64,
            "Retrying after backoff delay"
        );
        if let Some(shutdown) = &self.shutdown {
            tokio::select! {
                _ = tokio::time::sleep(backoff) => true,
                _ = shutdown.wait_for_shutdown() => false,
            }
        } else {
            tokio::time::sleep(backoff).await;
            true
        }
    }

    /// Single download attempt: request, classify the status, stream the
    /// body to a temp file, and atomically persist it to `dest`.
    ///
    /// Writing through a temp file means a failed attempt never leaves a
    /// partial file at the destination.
    async fn attempt_transfer(
        &self,
        url: &str,
        dest: &Path,
        attempt: u32,
    ) -> Result<TransferOutcome, AttemptError> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json, */*")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AttemptError::Retryable("request timed out".to_string())
                } else {
                    AttemptError::Retryable(format!("network error: {e}"))
                }
            })?;

        let status = response.status();
        match status.as_u16() {
            403 => {
                return Err(AttemptError::Fatal(FatalSignal::AccessDenied {
                    url: url.to_string(),
                }))
            }
            429 => {
                return Err(AttemptError::Fatal(FatalSignal::RateLimited {
                    url: url.to_string(),
                }))
            }
            _ if status.is_server_error() => {
                return Err(AttemptError::Retryable(format!("HTTP {status}")))
            }
            _ if status.is_client_error() => {
                return Err(AttemptError::ClientError(
                    status.as_u16(),
                    format!("HTTP {status}"),
                ))
            }
            _ => {}
        }

        let parent = dest.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent)
            .map_err(|e| AttemptError::Retryable(format!("IO error: {e}")))?;
        let mut temp_file = tempfile::NamedTempFile::new_in(parent)
            .map_err(|e| AttemptError::Retryable(format!("IO error: {e}")))?;

        let mut bytes_written: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk =
                chunk.map_err(|e| AttemptError::Retryable(format!("network error: {e}")))?;
            temp_file
                .write_all(&chunk)
                .map_err(|e| AttemptError::Retryable(format!("IO error: {e}")))?;
            bytes_written += chunk.len() as u64;
        }

        temp_file
            .flush()
            .map_err(|e| AttemptError::Retryable(format!("IO error: {e}")))?;
        temp_file
            .persist(dest)
            .map_err(|e| AttemptError::Retryable(format!("IO error: {e}")))?;

        debug!(bytes = bytes_written, dest = %dest.display(), "Downloaded resource");

        Ok(TransferOutcome {
            success: true,
            url: url.to_string(),
            local_path: Some(dest.to_path_buf()),
            http_status: status.as_u16(),
            bytes_written,
            error_message: None,
            retry_count: attempt,
        })
    }
}

#[async_trait]
impl Transfer for ResourceDownloader {
    async fn transfer(&self, url: &str, dest: &Path) -> Result<TransferOutcome, FatalSignal> {
        let mut last_error: Option<String> = None;
        let mut last_status = 0u16;
        let mut retry_count = 0u32;

        for attempt in 0..=self.max_retries {
            self.rate_limiter.wait().await;

            match self.attempt_transfer(url, dest, attempt).await {
                Ok(outcome) => return Ok(outcome),
                Err(AttemptError::Fatal(signal)) => {
                    error!(
                        url = %url,
                        error = %signal,
                        "Stopping: {}",
                        signal.remediation()
                    );
                    return Err(signal);
                }
                Err(AttemptError::Retryable(message)) => {
                    warn!(
                        url = %url,
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        error = %message,
                        "Transient download failure"
                    );
                    last_error = Some(message);
                    retry_count = attempt + 1;
                    if attempt < self.max_retries && !self.backoff_or_shutdown(attempt).await {
                        break;
                    }
                }
                Err(AttemptError::ClientError(status, message)) => {
                    warn!(url = %url, error = %message, "Client error, not retrying");
                    last_error = Some(message);
                    last_status = status;
                    retry_count = attempt + 1;
                    break;
                }
            }

            if self.shutdown_requested() {
                break;
            }
        }

        error!(url = %url, attempts = retry_count, "Download failed after all attempts");
        Ok(TransferOutcome {
            success: false,
            url: url.to_string(),
            local_path: Some(dest.to_path_buf()),
            http_status: last_status,
            bytes_written: 0,
            error_message: last_error,
            retry_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downloader_creation() {
        let config = DownloadConfig::default();
        let downloader = ResourceDownloader::new(&config, RateLimiter::shared(0.0)).unwrap();
        assert_eq!(downloader.max_retries, config.max_retries);
    }

    #[test]
    fn fatal_signal_remediation_hints() {
        let denied = FatalSignal::AccessDenied {
            url: "https://example.org/a.json".to_string(),
        };
        assert!(denied.remediation().contains("blocking"));

        let limited = FatalSignal::RateLimited {
            url: "https://example.org/a.json".to_string(),
        };
        assert!(limited.remediation().contains("--rate-limit"));
    }
}
