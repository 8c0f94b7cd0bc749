//! Engine configuration
//!
//! Loaded from TOML; every field has a default so an empty file is valid.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Engine session configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// JSON schema for state documents; absent accepts everything
    pub schema_path: Option<PathBuf>,
    /// Data server base URL; absent disables the remote layer
    pub data_server: Option<String>,
    /// Local/offline cache root; absent disables the local layer
    pub cache_dir: Option<PathBuf>,
    /// State server base URL for the HTTP loader
    pub server_address: Option<String>,
    /// Path of the state endpoint on the state server
    pub state_path_on_server: String,
    /// Bound for the resource cache; absent means unbounded
    pub cache_capacity: Option<u64>,
    /// Mailbox size of the scene owner task
    pub scene_channel_capacity: usize,
}

impl EngineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from TOML text
    ///
    /// # Errors
    /// Returns `ConfigError::Parse` on invalid TOML or mistyped keys
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Read from a TOML file
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// With schema file
    #[inline]
    #[must_use]
    pub fn with_schema_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.schema_path = Some(path.into());
        self
    }

    /// With data server
    #[inline]
    #[must_use]
    pub fn with_data_server(mut self, url: impl Into<String>) -> Self {
        self.data_server = Some(url.into());
        self
    }

    /// With local cache directory
    #[inline]
    #[must_use]
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    /// With state server
    #[inline]
    #[must_use]
    pub fn with_server_address(mut self, url: impl Into<String>) -> Self {
        self.server_address = Some(url.into());
        self
    }

    /// With bounded resource cache
    #[inline]
    #[must_use]
    pub fn with_cache_capacity(mut self, capacity: u64) -> Self {
        self.cache_capacity = Some(capacity);
        self
    }

    /// URL the HTTP loader saves to, when a state server is configured
    #[must_use]
    pub fn state_url(&self) -> Option<String> {
        self.server_address.as_ref().map(|base| {
            format!(
                "{}/{}",
                base.trim_end_matches('/'),
                self.state_path_on_server.trim_start_matches('/')
            )
        })
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            schema_path: None,
            data_server: None,
            cache_dir: None,
            server_address: None,
            state_path_on_server: "api/state".to_string(),
            cache_capacity: None,
            scene_channel_capacity: 64,
        }
    }
}
