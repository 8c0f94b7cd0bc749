//! State loaders
//!
//! A [`StateLoader`] fetches named state documents and stores serialized ones.
//! Transport failures are returned to the caller as fatal; nothing retries.

use crate::error::LoaderError;
use serde_json::Value;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Source and sink of state documents
#[async_trait::async_trait]
pub trait StateLoader: Send + Sync {
    /// Fetch a document by name
    ///
    /// # Errors
    /// Returns error on transport failure, unknown name or invalid payload
    async fn get_state(&self, name: &str) -> Result<Value, LoaderError>;

    /// Store a serialized document
    ///
    /// # Errors
    /// Returns error on transport failure or if saving is unsupported
    async fn save_state(&self, document: &Value) -> Result<(), LoaderError>;
}

/// Read-only documents bundled with the application
///
/// Names match either the full key or its file stem, so `"Basic"` finds a
/// document registered as `"states/Basic.json"`.
#[derive(Debug, Clone, Default)]
pub struct BundledStateLoader {
    documents: HashMap<String, Value>,
}

impl BundledStateLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document
    #[must_use]
    pub fn with_document(mut self, name: impl Into<String>, document: Value) -> Self {
        self.documents.insert(name.into(), document);
        self
    }

    /// Bundle every `*.json` file in a directory
    ///
    /// # Errors
    /// Returns error if the directory or a file cannot be read or parsed
    pub fn from_dir(dir: &Path) -> Result<Self, LoaderError> {
        let target = dir.display().to_string();
        let entries = std::fs::read_dir(dir).map_err(|e| LoaderError::transport(&target, e))?;

        let mut loader = Self::new();
        for entry in entries {
            let path = entry.map_err(|e| LoaderError::transport(&target, e))?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let text = std::fs::read_to_string(&path)
                .map_err(|e| LoaderError::transport(path.display().to_string(), e))?;
            let document: Value = serde_json::from_str(&text)
                .map_err(|e| LoaderError::payload(path.display().to_string(), e))?;
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string();
            loader.documents.insert(name, document);
        }
        Ok(loader)
    }

    fn find(&self, name: &str) -> Option<&Value> {
        self.documents.get(name).or_else(|| {
            self.documents
                .iter()
                .find(|(key, _)| Path::new(key).file_stem().and_then(|s| s.to_str()) == Some(name))
                .map(|(_, doc)| doc)
        })
    }
}

#[async_trait::async_trait]
impl StateLoader for BundledStateLoader {
    async fn get_state(&self, name: &str) -> Result<Value, LoaderError> {
        self.find(name)
            .cloned()
            .ok_or_else(|| LoaderError::NotFound(name.to_string()))
    }

    async fn save_state(&self, _document: &Value) -> Result<(), LoaderError> {
        Err(LoaderError::Unsupported("saving state"))
    }
}

/// State server client
///
/// `GET <state_url>/<name>` returns `{ "state": <document> }`;
/// `PUT <state_url>` stores a document.
#[derive(Debug, Clone)]
pub struct HttpStateLoader {
    state_url: String,
    client: reqwest::Client,
}

impl HttpStateLoader {
    #[must_use]
    pub fn new(state_url: impl Into<String>) -> Self {
        Self {
            state_url: state_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn state_url(&self) -> &str {
        &self.state_url
    }
}

#[async_trait::async_trait]
impl StateLoader for HttpStateLoader {
    async fn get_state(&self, name: &str) -> Result<Value, LoaderError> {
        let url = format!("{}/{}", self.state_url, name);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| LoaderError::transport(&url, e))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(LoaderError::NotFound(name.to_string()));
        }
        let mut body: Value = response
            .error_for_status()
            .map_err(|e| LoaderError::transport(&url, e))?
            .json()
            .await
            .map_err(|e| LoaderError::payload(&url, e))?;

        match body.get_mut("state").map(Value::take) {
            Some(state) if !state.is_null() => Ok(state),
            _ => Err(LoaderError::payload(&url, "response has no 'state' field")),
        }
    }

    async fn save_state(&self, document: &Value) -> Result<(), LoaderError> {
        self.client
            .put(&self.state_url)
            .json(document)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| LoaderError::transport(&self.state_url, e))?;
        tracing::info!("Saved state to {}", self.state_url);
        Ok(())
    }
}

/// Documents stored as `<dir>/<name>.json`
///
/// Saving writes to the file named at construction.
#[derive(Debug, Clone)]
pub struct FileStateLoader {
    dir: PathBuf,
    save_name: String,
}

impl FileStateLoader {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, save_name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            save_name: save_name.into(),
        }
    }

    fn path_for(&self, name: &str) -> PathBuf {
        let file = if name.ends_with(".json") {
            name.to_string()
        } else {
            format!("{name}.json")
        };
        self.dir.join(file)
    }
}

#[async_trait::async_trait]
impl StateLoader for FileStateLoader {
    async fn get_state(&self, name: &str) -> Result<Value, LoaderError> {
        let path = self.path_for(name);
        let target = path.display().to_string();
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(LoaderError::NotFound(name.to_string()))
            }
            Err(e) => return Err(LoaderError::transport(target, e)),
        };
        serde_json::from_str(&text).map_err(|e| LoaderError::payload(target, e))
    }

    async fn save_state(&self, document: &Value) -> Result<(), LoaderError> {
        let path = self.path_for(&self.save_name);
        let target = path.display().to_string();
        let text = serde_json::to_string_pretty(document).map_err(|e| LoaderError::payload(&target, e))?;
        tokio::fs::write(&path, text)
            .await
            .map_err(|e| LoaderError::transport(&target, e))?;
        tracing::info!("Saved state to {}", target);
        Ok(())
    }
}
