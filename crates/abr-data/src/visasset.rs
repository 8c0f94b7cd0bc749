//! Visual-encoding assets
//!
//! A vis asset is an externally authored colormap, glyph set or texture,
//! identified by uuid. Only its kind matters for slot assignment; the
//! artifact body is kept opaque.

use crate::dataset::DataError;
use serde_json::Value;
use std::fmt::{self, Display, Formatter};

/// Kind of vis asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VisAssetKind {
    Colormap,
    Glyph,
    LineTexture,
    SurfaceTexture,
}

impl VisAssetKind {
    /// Parse the `artifactType` field of an artifact manifest
    #[must_use]
    pub fn from_artifact_type(name: &str) -> Option<Self> {
        match name {
            "colormap" | "Colormap" | "ColormapVisAsset" => Some(Self::Colormap),
            "glyph" | "Glyph" | "GlyphVisAsset" => Some(Self::Glyph),
            "line" | "LineTexture" | "LineTextureVisAsset" => Some(Self::LineTexture),
            "texture" | "SurfaceTexture" | "SurfaceTextureVisAsset" => Some(Self::SurfaceTexture),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Colormap => "Colormap",
            Self::Glyph => "Glyph",
            Self::LineTexture => "LineTexture",
            Self::SurfaceTexture => "SurfaceTexture",
        }
    }
}

impl Display for VisAssetKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Loaded vis asset
#[derive(Debug, Clone)]
pub struct VisAsset {
    uuid: String,
    kind: VisAssetKind,
    artifact: Value,
}

impl VisAsset {
    /// Build from an artifact manifest
    ///
    /// # Errors
    /// Returns `DataError::Manifest` if `artifactType` is missing or unknown
    pub fn from_manifest(uuid: &str, artifact: &Value) -> Result<Self, DataError> {
        let kind = artifact
            .get("artifactType")
            .and_then(Value::as_str)
            .and_then(VisAssetKind::from_artifact_type)
            .ok_or_else(|| DataError::Manifest {
                reference: uuid.to_string(),
                message: "missing or unknown artifactType".to_string(),
            })?;

        Ok(Self {
            uuid: uuid.to_string(),
            kind,
            artifact: artifact.clone(),
        })
    }

    #[inline]
    #[must_use]
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> VisAssetKind {
        self.kind
    }

    /// Raw artifact manifest
    #[inline]
    #[must_use]
    pub fn artifact(&self) -> &Value {
        &self.artifact
    }
}
