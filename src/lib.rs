//! # SEAO Downloader Library
//!
//! A resilient bulk downloader for JSON resources published on the Québec
//! SEAO open-data portal. Resources are discovered through the CKAN Action
//! API, downloaded with retries and rate limiting, and every outcome is
//! recorded in a durable manifest so interrupted runs can resume without
//! re-downloading files that already succeeded.
//!
//! ## Features
//!
//! - **CKAN Discovery**: Resource metadata fetched from the CKAN API rather
//!   than scraped from HTML
//! - **Resume Capability**: Append-only manifest tracks every attempt; a
//!   resumed run skips resources with a prior valid download
//! - **Rate Limiting**: A single shared limiter bounds the global request
//!   rate across all workers
//! - **Fail-Fast**: HTTP 403/429 halt the entire batch immediately to
//!   protect the caller's standing with the server
//! - **Graceful Shutdown**: Ctrl+C flushes the manifest before exiting
//!
//! ## Quick Start
//!
//! ```no_run
//! use seao_downloader::discovery::CkanClient;
//! use seao_downloader::downloader::{
//!     DownloadConfig, DownloadExecutor, RateLimiter, ResourceDownloader,
//! };
//! use seao_downloader::manifest::ManifestStore;
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let out_dir = PathBuf::from("./seao_data");
//! let config = DownloadConfig::default();
//!
//! let discovery = CkanClient::new("systeme-electronique-dappel-doffres-seao", true)?;
//! let resources = discovery.discover_json_resources().await?;
//!
//! let limiter = RateLimiter::shared(config.rate_limit);
//! let downloader = ResourceDownloader::new(&config, limiter)?;
//! let store = ManifestStore::open(&out_dir, "systeme-electronique-dappel-doffres-seao");
//!
//! let executor = DownloadExecutor::new(Arc::new(downloader), store, out_dir)
//!     .with_workers(2)
//!     .with_resume(true);
//! let report = executor.run(resources).await?;
//! println!("succeeded: {}", report.succeeded);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`discovery`] - CKAN Action API client and the [`Resource`] type
//! - [`downloader`] - Rate limiter, retrying transfer client, and the
//!   download executor
//! - [`manifest`] - Durable manifest store, filename derivation, and JSON
//!   validation
//! - [`cli`] - Command-line surface
//! - [`shutdown`] - Graceful shutdown coordination shared across modules

#![warn(missing_docs)]
#![warn(clippy::all)]

/// CLI command implementation
pub mod cli;

/// CKAN resource discovery
pub mod discovery;

/// Download orchestration
pub mod downloader;

/// Manifest persistence and file naming
pub mod manifest;

/// Graceful shutdown coordination shared across modules
pub mod shutdown;

pub use discovery::Resource;
pub use downloader::{RunOutcome, RunReport, TransferOutcome};
