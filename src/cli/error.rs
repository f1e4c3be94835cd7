//! CLI error type

use crate::discovery::DiscoveryError;
use crate::downloader::client::TransferError;
use crate::downloader::DownloadError;
use crate::manifest::ManifestError;

/// Errors surfaced to the operator by the CLI.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Discovery against the CKAN API failed
    #[error("discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),

    /// The download run itself failed
    #[error("download failed: {0}")]
    Download(#[from] DownloadError),

    /// The transfer client could not be constructed
    #[error("transfer client error: {0}")]
    Transfer(#[from] TransferError),

    /// Manifest persistence failed
    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),
}
