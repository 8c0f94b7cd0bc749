//! Data sources backing the resolver
//!
//! A [`DataSource`] fetches one resource by reference. Two sources ship here:
//! [`LocalCacheSource`] reads an on-disk cache, [`HttpDataSource`] queries a
//! data server. Both report "not found" as `Ok(None)` and reserve `Err` for
//! transport or decoding failures.

use crate::dataset::{DataError, Dataset};
use crate::visasset::VisAsset;
use serde_json::Value;
use std::fmt::{self, Display, Formatter};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// What a reference names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    /// Dataset path, e.g. `Org/Ocean`
    Dataset,
    /// Vis asset uuid
    VisAsset,
}

impl Display for ResourceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dataset => f.write_str("dataset"),
            Self::VisAsset => f.write_str("visasset"),
        }
    }
}

/// Cache key: reference string plus kind
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey {
    pub kind: ResourceKind,
    pub reference: String,
}

impl ResourceKey {
    #[must_use]
    pub fn new(kind: ResourceKind, reference: impl Into<String>) -> Self {
        Self {
            kind,
            reference: reference.into(),
        }
    }

    #[must_use]
    pub fn dataset(reference: impl Into<String>) -> Self {
        Self::new(ResourceKind::Dataset, reference)
    }

    #[must_use]
    pub fn vis_asset(reference: impl Into<String>) -> Self {
        Self::new(ResourceKind::VisAsset, reference)
    }
}

impl Display for ResourceKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.reference)
    }
}

/// Loaded resource
#[derive(Debug, Clone)]
pub enum Resource {
    Dataset(Arc<Dataset>),
    VisAsset(Arc<VisAsset>),
}

impl Resource {
    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Dataset(_) => ResourceKind::Dataset,
            Self::VisAsset(_) => ResourceKind::VisAsset,
        }
    }

    #[must_use]
    pub fn as_dataset(&self) -> Option<&Arc<Dataset>> {
        match self {
            Self::Dataset(dataset) => Some(dataset),
            Self::VisAsset(_) => None,
        }
    }

    #[must_use]
    pub fn as_vis_asset(&self) -> Option<&Arc<VisAsset>> {
        match self {
            Self::VisAsset(asset) => Some(asset),
            Self::Dataset(_) => None,
        }
    }

    /// Build a resource from a manifest of the given kind
    ///
    /// # Errors
    /// Returns error if the manifest does not describe a resource of that kind
    pub fn from_manifest(key: &ResourceKey, manifest: &Value) -> Result<Self, DataError> {
        match key.kind {
            ResourceKind::Dataset => {
                Dataset::from_manifest(&key.reference, manifest).map(|d| Self::Dataset(Arc::new(d)))
            }
            ResourceKind::VisAsset => {
                VisAsset::from_manifest(&key.reference, manifest).map(|a| Self::VisAsset(Arc::new(a)))
            }
        }
    }
}

/// Where a resolved resource came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provenance {
    /// Shipped inside the state document
    Embedded,
    /// Local/offline cache
    Cached,
    /// Remote data server
    Remote,
}

/// Fetches resources by reference
#[async_trait::async_trait]
pub trait DataSource: Send + Sync {
    /// Fetch a resource
    ///
    /// # Errors
    /// Returns error on transport or decoding failure; absence is `Ok(None)`
    async fn fetch(&self, key: &ResourceKey) -> Result<Option<Resource>, FetchError>;

    /// Provenance recorded for resources from this source
    fn provenance(&self) -> Provenance;
}

/// On-disk cache laid out as `datasets/<path>.json` and
/// `visassets/<uuid>/artifact.json`
#[derive(Debug, Clone)]
pub struct LocalCacheSource {
    root: PathBuf,
}

impl LocalCacheSource {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File holding the manifest for a key
    #[must_use]
    pub fn manifest_path(&self, key: &ResourceKey) -> PathBuf {
        match key.kind {
            ResourceKind::Dataset => {
                let mut path = self.root.join("datasets");
                for segment in key.reference.split('/') {
                    path.push(segment);
                }
                path.set_extension("json");
                path
            }
            ResourceKind::VisAsset => self
                .root
                .join("visassets")
                .join(&key.reference)
                .join("artifact.json"),
        }
    }
}

#[async_trait::async_trait]
impl DataSource for LocalCacheSource {
    async fn fetch(&self, key: &ResourceKey) -> Result<Option<Resource>, FetchError> {
        if key.reference.split('/').any(|seg| seg == ".." || seg.is_empty()) {
            return Ok(None);
        }

        let path = self.manifest_path(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(FetchError::io(key, e)),
        };

        let manifest: Value =
            serde_json::from_slice(&bytes).map_err(|e| FetchError::decode(key, e.to_string()))?;
        let resource =
            Resource::from_manifest(key, &manifest).map_err(|e| FetchError::decode(key, e.to_string()))?;

        tracing::debug!("Loaded {} from local cache {}", key, path.display());
        Ok(Some(resource))
    }

    fn provenance(&self) -> Provenance {
        Provenance::Cached
    }
}

/// Data server client
///
/// Datasets are served at `<base>/datasets/<path>` and vis assets at
/// `<base>/visassets/<uuid>`, each returning the manifest JSON.
#[derive(Debug, Clone)]
pub struct HttpDataSource {
    base_url: String,
    client: reqwest::Client,
}

impl HttpDataSource {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, reqwest::Client::new())
    }

    #[must_use]
    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    #[must_use]
    pub fn url_for(&self, key: &ResourceKey) -> String {
        match key.kind {
            ResourceKind::Dataset => format!("{}/datasets/{}", self.base_url, key.reference),
            ResourceKind::VisAsset => format!("{}/visassets/{}", self.base_url, key.reference),
        }
    }
}

#[async_trait::async_trait]
impl DataSource for HttpDataSource {
    async fn fetch(&self, key: &ResourceKey) -> Result<Option<Resource>, FetchError> {
        let url = self.url_for(key);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::transport(key, e))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response
            .error_for_status()
            .map_err(|e| FetchError::transport(key, e))?;
        let manifest: Value = response
            .json()
            .await
            .map_err(|e| FetchError::decode(key, e.to_string()))?;
        let resource =
            Resource::from_manifest(key, &manifest).map_err(|e| FetchError::decode(key, e.to_string()))?;

        tracing::debug!("Fetched {} from {}", key, url);
        Ok(Some(resource))
    }

    fn provenance(&self) -> Provenance {
        Provenance::Remote
    }
}

/// Errors fetching a resource
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Network or HTTP status failure
    #[error("transport error fetching {key}: {source}")]
    Transport {
        key: String,
        #[source]
        source: reqwest::Error,
    },

    /// Filesystem failure other than not-found
    #[error("io error reading {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// Payload is not a valid manifest
    #[error("could not decode {key}: {message}")]
    Decode { key: String, message: String },
}

impl FetchError {
    pub fn transport(key: &ResourceKey, source: reqwest::Error) -> Self {
        Self::Transport {
            key: key.to_string(),
            source,
        }
    }

    pub fn io(key: &ResourceKey, source: std::io::Error) -> Self {
        Self::Io {
            key: key.to_string(),
            source,
        }
    }

    pub fn decode(key: &ResourceKey, message: impl Into<String>) -> Self {
        Self::Decode {
            key: key.to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn local_cache_reads_manifests() {
        let dir = tempfile::tempdir().unwrap();
        let source = LocalCacheSource::new(dir.path());

        let key = ResourceKey::dataset("Org/Ocean");
        let path = source.manifest_path(&key);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            json!({ "keyData": { "mesh1": { "topology": "Quads" } } }).to_string(),
        )
        .unwrap();

        let resource = source.fetch(&key).await.unwrap().unwrap();
        let dataset = resource.as_dataset().unwrap();
        assert_eq!(dataset.path(), "Org/Ocean");
        assert!(dataset.key_data("mesh1").is_some());
        assert_eq!(source.provenance(), Provenance::Cached);
    }

    #[tokio::test]
    async fn local_cache_miss_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let source = LocalCacheSource::new(dir.path());
        assert!(source
            .fetch(&ResourceKey::vis_asset("missing"))
            .await
            .unwrap()
            .is_none());
        assert!(source
            .fetch(&ResourceKey::dataset("../escape"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn corrupt_manifest_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = LocalCacheSource::new(dir.path());
        let key = ResourceKey::vis_asset("abc");
        let path = source.manifest_path(&key);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            source.fetch(&key).await,
            Err(FetchError::Decode { .. })
        ));
    }

    #[test]
    fn http_urls() {
        let source = HttpDataSource::new("http://localhost:8000/");
        assert_eq!(
            source.url_for(&ResourceKey::dataset("Org/Ocean")),
            "http://localhost:8000/datasets/Org/Ocean"
        );
        assert_eq!(
            source.url_for(&ResourceKey::vis_asset("abc")),
            "http://localhost:8000/visassets/abc"
        );
    }
}
