//! CKAN Action API client for resource discovery.
//!
//! The CKAN API provides structured metadata about datasets and their
//! resources, which is more reliable than HTML scraping.
//!
//! API Reference: <https://docs.ckan.org/en/latest/api/index.html>

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Base URL of the donneesquebec.ca CKAN Action API.
pub const CKAN_API_BASE: &str = "https://www.donneesquebec.ca/recherche/api/3/action";

/// CKAN identifier of the SEAO dataset.
pub const DEFAULT_DATASET_ID: &str = "systeme-electronique-dappel-doffres-seao";

/// User agent sent on every request.
pub const USER_AGENT: &str = "SEAO-Downloader/1.0 (Quebec-OpenData-Client; Production)";

/// Timeout for metadata requests.
const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Immutable representation of a dataset resource.
///
/// Produced once by discovery and consumed read-only downstream.
/// Identity is the `id` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Stable CKAN resource identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Source URL
    pub url: String,
    /// Declared format (e.g., "JSON")
    pub format: String,
    /// Optional free-text description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Declared size in bytes, when the portal reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Last-modified timestamp as reported by the portal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
}

/// Errors raised during resource discovery.
///
/// Discovery failures are fatal to the run: without a resource list there
/// is nothing to download.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    /// Server rejected the request with 403
    #[error(
        "access denied (403): the dataset may require authentication \
         or your IP may be rate-limited"
    )]
    AccessDenied,

    /// Dataset does not exist
    #[error("dataset not found (404): verify the dataset id `{0}`")]
    DatasetNotFound(String),

    /// Server is throttling metadata requests
    #[error("rate limited (429): wait before retrying, or reduce --rate-limit")]
    RateLimited,

    /// Any other HTTP failure status
    #[error("HTTP error {0}")]
    HttpError(u16),

    /// Connection-level failure
    #[error("network error: {0}")]
    NetworkError(String),

    /// CKAN envelope reported `success = false`
    #[error("CKAN API error: {0}")]
    ApiError(String),

    /// Response body was not the expected JSON shape
    #[error("invalid JSON response: {0}")]
    InvalidResponse(String),
}

/// CKAN response envelope: `{"success": bool, "result": ..., "error": ...}`.
#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    success: bool,
    #[serde(default)]
    result: Option<DatasetMetadata>,
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DatasetMetadata {
    #[serde(default)]
    resources: Vec<RawResource>,
}

/// Raw resource record as CKAN returns it. Fields are frequently absent or
/// loosely typed (size may be a number or a string), so everything is
/// optional here and normalized into [`Resource`].
#[derive(Debug, Deserialize)]
struct RawResource {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    format: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    size: Option<serde_json::Value>,
    #[serde(default)]
    last_modified: Option<String>,
}

impl RawResource {
    fn into_resource(self) -> Resource {
        let id = self.id.unwrap_or_default();
        let name = self.name.unwrap_or_else(|| {
            if id.is_empty() {
                "unknown".to_string()
            } else {
                id.clone()
            }
        });
        Resource {
            name,
            url: self.url.unwrap_or_default(),
            format: self.format.unwrap_or_default(),
            description: self.description,
            size: self.size.and_then(|v| match v {
                serde_json::Value::Number(n) => n.as_u64(),
                serde_json::Value::String(s) => s.parse().ok(),
                _ => None,
            }),
            last_modified: self.last_modified,
            id,
        }
    }
}

/// Client for discovering resources via the CKAN Action API.
pub struct CkanClient {
    client: reqwest::Client,
    base_url: String,
    dataset_id: String,
}

impl CkanClient {
    /// Create a discovery client for the given dataset.
    ///
    /// `verify_tls = false` disables certificate verification; this is not
    /// recommended outside of testing.
    pub fn new(dataset_id: impl Into<String>, verify_tls: bool) -> Result<Self, DiscoveryError> {
        if !verify_tls {
            warn!("TLS verification disabled - not recommended for production");
        }
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(DISCOVERY_TIMEOUT)
            .danger_accept_invalid_certs(!verify_tls)
            .build()
            .map_err(|e| DiscoveryError::NetworkError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: CKAN_API_BASE.to_string(),
            dataset_id: dataset_id.into(),
        })
    }

    /// Override the API base URL (used by tests against a local server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// The dataset this client discovers resources for.
    pub fn dataset_id(&self) -> &str {
        &self.dataset_id
    }

    /// Fetch full dataset metadata from CKAN (`package_show`).
    async fn package_show(&self) -> Result<DatasetMetadata, DiscoveryError> {
        let url = format!("{}/package_show", self.base_url);
        debug!(url = %url, dataset_id = %self.dataset_id, "Requesting dataset metadata");

        let response = self
            .client
            .get(&url)
            .query(&[("id", self.dataset_id.as_str())])
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| DiscoveryError::NetworkError(e.to_string()))?;

        let status = response.status();
        match status.as_u16() {
            403 => return Err(DiscoveryError::AccessDenied),
            404 => return Err(DiscoveryError::DatasetNotFound(self.dataset_id.clone())),
            429 => return Err(DiscoveryError::RateLimited),
            _ if !status.is_success() => return Err(DiscoveryError::HttpError(status.as_u16())),
            _ => {}
        }

        let envelope: ApiEnvelope = response
            .json()
            .await
            .map_err(|e| DiscoveryError::InvalidResponse(e.to_string()))?;

        if !envelope.success {
            let message = envelope
                .error
                .and_then(|e| e.message)
                .unwrap_or_else(|| "Unknown API error".to_string());
            return Err(DiscoveryError::ApiError(message));
        }

        envelope
            .result
            .ok_or_else(|| DiscoveryError::InvalidResponse("missing result field".to_string()))
    }

    /// Discover all JSON resources in the dataset.
    ///
    /// A resource qualifies when its format field equals "JSON"
    /// (case-insensitive) or its URL ends with ".json".
    pub async fn discover_json_resources(&self) -> Result<Vec<Resource>, DiscoveryError> {
        info!(dataset_id = %self.dataset_id, "Fetching dataset metadata");
        let metadata = self.package_show().await?;

        info!(
            total = metadata.resources.len(),
            "Found resources in dataset"
        );

        let json_resources: Vec<Resource> = metadata
            .resources
            .into_iter()
            .map(RawResource::into_resource)
            .filter(|r| r.format.eq_ignore_ascii_case("JSON") || r.url.to_lowercase().ends_with(".json"))
            .inspect(|r| debug!(resource = %r.name, "Discovered JSON resource"))
            .collect();

        info!(count = json_resources.len(), "Filtered to JSON resources");
        Ok(json_resources)
    }

    /// Discover all resources regardless of format (for `--list-all`).
    pub async fn discover_all_resources(&self) -> Result<Vec<Resource>, DiscoveryError> {
        let metadata = self.package_show().await?;
        Ok(metadata
            .resources
            .into_iter()
            .map(RawResource::into_resource)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(id: &str, name: Option<&str>, url: &str, format: &str) -> RawResource {
        RawResource {
            id: Some(id.to_string()),
            name: name.map(str::to_string),
            url: Some(url.to_string()),
            format: Some(format.to_string()),
            description: None,
            size: None,
            last_modified: None,
        }
    }

    #[test]
    fn raw_resource_falls_back_to_id_for_name() {
        let resource = raw("abc123", None, "https://example.org/a.json", "JSON").into_resource();
        assert_eq!(resource.name, "abc123");
    }

    #[test]
    fn raw_resource_parses_string_size() {
        let mut r = raw("abc", Some("A"), "https://example.org/a.json", "JSON");
        r.size = Some(serde_json::Value::String("12345".to_string()));
        assert_eq!(r.into_resource().size, Some(12345));
    }

    #[test]
    fn raw_resource_ignores_unparseable_size() {
        let mut r = raw("abc", Some("A"), "https://example.org/a.json", "JSON");
        r.size = Some(serde_json::Value::String("n/a".to_string()));
        assert_eq!(r.into_resource().size, None);
    }
}
