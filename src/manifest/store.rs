//! Durable manifest store
//!
//! Implements atomic file writes through a temp file in the target
//! directory: serialize, write to a `NamedTempFile`, fsync, rename over the
//! target, then fsync the parent directory so the rename is durable.

use crate::discovery::Resource;
use crate::downloader::client::TransferOutcome;
use crate::manifest::ManifestError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Fixed manifest filename inside the output directory.
pub const MANIFEST_FILENAME: &str = "manifest.json";

/// Current manifest schema version.
const SCHEMA_VERSION: &str = "1.0";

/// Single entry in the download manifest.
///
/// Entries are append-only: one is written per completed transfer attempt
/// sequence (success or exhausted failure) and never updated or removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// CKAN resource identifier
    pub resource_id: String,
    /// Resource display name
    pub resource_name: String,
    /// Source URL
    pub source_url: String,
    /// Local destination path, empty when nothing was written
    pub local_path: String,
    /// RFC3339 timestamp of when the entry was recorded
    pub downloaded_at: String,
    /// HTTP status of the final attempt; 0 when no response was received
    pub http_status: u16,
    /// Size of the downloaded file in bytes
    pub file_size_bytes: u64,
    /// Whether the downloaded content passed JSON validation
    pub is_valid: bool,
    /// Last observed error for failed transfers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Retries consumed by the transfer
    #[serde(default)]
    pub retry_count: u32,
}

/// Download manifest: schema header plus the ordered entry log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    /// Schema version of the persisted document
    pub version: String,
    /// CKAN dataset the manifest belongs to
    pub dataset_id: String,
    /// RFC3339 creation timestamp
    pub created_at: String,
    /// RFC3339 timestamp of the most recent append
    pub last_updated: String,
    /// Append-only sequence of outcomes
    pub entries: Vec<ManifestEntry>,
}

impl Manifest {
    fn new(dataset_id: &str) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            version: SCHEMA_VERSION.to_string(),
            dataset_id: dataset_id.to_string(),
            created_at: now.clone(),
            last_updated: now,
            entries: Vec::new(),
        }
    }
}

/// Owns the manifest for one output directory.
///
/// Loaded or created at startup, mutated in memory through [`record`], and
/// persisted with [`flush`]. A corrupt or legacy manifest on disk is
/// discarded with a warning rather than blocking new downloads.
///
/// [`record`]: ManifestStore::record
/// [`flush`]: ManifestStore::flush
pub struct ManifestStore {
    out_dir: PathBuf,
    manifest_path: PathBuf,
    manifest: Manifest,
}

impl ManifestStore {
    /// Load the manifest from `out_dir`, or start a fresh one.
    pub fn open(out_dir: &Path, dataset_id: &str) -> Self {
        let manifest_path = out_dir.join(MANIFEST_FILENAME);
        let manifest = Self::load_or_create(&manifest_path, dataset_id);
        Self {
            out_dir: out_dir.to_path_buf(),
            manifest_path,
            manifest,
        }
    }

    fn load_or_create(path: &Path, dataset_id: &str) -> Manifest {
        if path.exists() {
            match std::fs::read_to_string(path)
                .map_err(|e| e.to_string())
                .and_then(|contents| {
                    serde_json::from_str::<Manifest>(&contents).map_err(|e| e.to_string())
                }) {
                Ok(manifest) => {
                    info!(
                        path = %path.display(),
                        entries = manifest.entries.len(),
                        "Loaded existing manifest"
                    );
                    return manifest;
                }
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "Could not parse existing manifest, starting fresh"
                    );
                }
            }
        }
        Manifest::new(dataset_id)
    }

    /// Path of the persisted manifest file.
    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    /// All recorded entries, in append order.
    pub fn entries(&self) -> &[ManifestEntry] {
        &self.manifest.entries
    }

    /// Whether some entry for this resource id is marked valid.
    pub fn is_complete(&self, resource_id: &str) -> bool {
        self.manifest
            .entries
            .iter()
            .any(|e| e.resource_id == resource_id && e.is_valid)
    }

    /// Ids of all resources with at least one valid entry. Used by resume
    /// filtering.
    pub fn completed_ids(&self) -> HashSet<String> {
        self.manifest
            .entries
            .iter()
            .filter(|e| e.is_valid)
            .map(|e| e.resource_id.clone())
            .collect()
    }

    /// Append an entry for a completed transfer attempt sequence and bump
    /// the manifest timestamp. Entries are never edited afterwards.
    pub fn record(
        &mut self,
        resource: &Resource,
        outcome: &TransferOutcome,
        is_valid: bool,
    ) -> ManifestEntry {
        let entry = ManifestEntry {
            resource_id: resource.id.clone(),
            resource_name: resource.name.clone(),
            source_url: resource.url.clone(),
            local_path: outcome
                .local_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            downloaded_at: chrono::Utc::now().to_rfc3339(),
            http_status: outcome.http_status,
            file_size_bytes: outcome.bytes_written,
            is_valid,
            error_message: outcome.error_message.clone(),
            retry_count: outcome.retry_count,
        };

        self.manifest.entries.push(entry.clone());
        self.manifest.last_updated = chrono::Utc::now().to_rfc3339();
        entry
    }

    /// Atomically persist the manifest.
    ///
    /// Safe to call repeatedly and after a cancellation signal: the file on
    /// disk is replaced via rename, so it is always a complete, valid JSON
    /// document.
    pub fn flush(&self) -> Result<(), ManifestError> {
        std::fs::create_dir_all(&self.out_dir)
            .map_err(|e| ManifestError::IoError(e.to_string()))?;

        let json = serde_json::to_string_pretty(&self.manifest)
            .map_err(|e| ManifestError::SerializationError(e.to_string()))?;

        let mut temp_file = tempfile::NamedTempFile::new_in(&self.out_dir)
            .map_err(|e| ManifestError::IoError(format!("failed to create temp file: {e}")))?;
        temp_file
            .write_all(json.as_bytes())
            .map_err(|e| ManifestError::IoError(format!("failed to write temp file: {e}")))?;
        temp_file
            .flush()
            .map_err(|e| ManifestError::IoError(format!("failed to flush temp file: {e}")))?;
        temp_file
            .as_file()
            .sync_all()
            .map_err(|e| ManifestError::IoError(format!("failed to sync temp file: {e}")))?;
        temp_file
            .persist(&self.manifest_path)
            .map_err(|e| ManifestError::IoError(format!("failed to persist manifest: {e}")))?;

        // Fsync the directory so the rename itself is durable
        if let Ok(dir) = std::fs::File::open(&self.out_dir) {
            let _ = dir.sync_all();
        }

        debug!(
            path = %self.manifest_path.display(),
            entries = self.manifest.entries.len(),
            "Manifest flushed"
        );
        Ok(())
    }
}
