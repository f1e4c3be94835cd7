//! Manifest persistence, file naming, and content validation
//!
//! The manifest is an append-only JSON log of every transfer outcome. It is
//! the durable contract behind resume: a resource is considered done when
//! any of its entries is marked valid, so a resumed run can skip it without
//! re-downloading or re-validating.

pub mod naming;
pub mod store;

pub use naming::file_name;
pub use store::{Manifest, ManifestEntry, ManifestStore, MANIFEST_FILENAME};

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::warn;

/// Errors related to manifest persistence.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    /// Filesystem failure while persisting
    #[error("IO error: {0}")]
    IoError(String),

    /// Manifest could not be serialized
    #[error("serialization error: {0}")]
    SerializationError(String),
}

/// Validate that a file contains well-formed JSON.
///
/// Uses a buffered reader so large resource files are not loaded into
/// memory as a single string.
pub fn validate_json_file(path: &Path) -> bool {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "JSON validation failed");
            return false;
        }
    };
    match serde_json::from_reader::<_, serde_json::Value>(BufReader::new(file)) {
        Ok(_) => true,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "JSON validation failed");
            false
        }
    }
}
