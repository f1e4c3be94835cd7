//! Download orchestration, retries, and rate limiting
//!
//! This module provides the core download engine:
//!
//! 1. **Rate Limiting**: a single shared [`rate_limit::RateLimiter`] bounds
//!    the global request rate across all workers
//! 2. **Transfers**: [`client::ResourceDownloader`] performs one resource
//!    transfer with bounded retries and exponential backoff
//! 3. **Orchestration**: [`executor::DownloadExecutor`] fans resources out
//!    across a bounded worker pool, records every outcome in the manifest,
//!    and enforces the fail-fast policy on 403/429
//!
//! # Error Handling
//!
//! Failures fall into three classes:
//! - Transient (5xx, network errors, timeouts) - retried with exponential
//!   backoff; exhausted retries become a recorded per-resource failure
//! - Fatal for the run (403, 429) - never retried; halts all dispatch
//! - Other client errors (4xx) - recorded per-resource failure, run continues

pub mod client;
pub mod config;
pub mod executor;
pub mod rate_limit;

pub use client::{FatalSignal, ResourceDownloader, Transfer, TransferError, TransferOutcome};
pub use config::DownloadConfig;
pub use executor::{DownloadExecutor, RunOutcome, RunReport};
pub use rate_limit::RateLimiter;

use crate::manifest::ManifestError;

/// Run-level download errors.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// Manifest persistence failed
    #[error("manifest error: {0}")]
    ManifestError(#[from] ManifestError),

    /// Filesystem error preparing the output directory
    #[error("IO error: {0}")]
    IoError(String),

    /// Transfer client could not be constructed
    #[error("transfer error: {0}")]
    TransferError(#[from] TransferError),
}
