//! Testing utilities for the ABR workspace
//!
//! Counting in-memory data source, fixture manifests and state documents.

#![allow(missing_docs)]

use abr_data::{DataSource, FetchError, Provenance, Resource, ResourceKey};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Dataset path used by the fixtures
pub const DATASET: &str = "ds1";

/// Colormap uuid used by the fixtures
pub const COLORMAP: &str = "66b3cde4-034d-11eb-a7e6-005056bae6d8";

/// In-memory data source that counts fetches per key
#[derive(Debug, Default)]
pub struct MemorySource {
    manifests: HashMap<ResourceKey, Value>,
    calls: Mutex<HashMap<ResourceKey, usize>>,
    total: AtomicUsize,
    delay: Option<Duration>,
    provenance: Option<Provenance>,
}

impl MemorySource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Source preloaded with [`sample_dataset`] and [`sample_colormap`]
    #[must_use]
    pub fn with_samples() -> Self {
        Self::new()
            .with_manifest(ResourceKey::dataset(DATASET), sample_dataset())
            .with_manifest(ResourceKey::vis_asset(COLORMAP), sample_colormap())
    }

    #[must_use]
    pub fn with_manifest(mut self, key: ResourceKey, manifest: Value) -> Self {
        self.manifests.insert(key, manifest);
        self
    }

    /// Sleep before answering, so concurrent lookups overlap
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    #[must_use]
    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = Some(provenance);
        self
    }

    /// Fetches made for one key
    #[must_use]
    pub fn calls_for(&self, key: &ResourceKey) -> usize {
        self.calls.lock().get(key).copied().unwrap_or(0)
    }

    /// Fetches made for any key
    #[must_use]
    pub fn total_calls(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl DataSource for MemorySource {
    async fn fetch(&self, key: &ResourceKey) -> Result<Option<Resource>, FetchError> {
        self.total.fetch_add(1, Ordering::SeqCst);
        *self.calls.lock().entry(key.clone()).or_insert(0) += 1;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match self.manifests.get(key) {
            Some(manifest) => Resource::from_manifest(key, manifest)
                .map(Some)
                .map_err(|e| FetchError::decode(key, e.to_string())),
            None => Ok(None),
        }
    }

    fn provenance(&self) -> Provenance {
        self.provenance.unwrap_or(Provenance::Remote)
    }
}

/// Manifest for dataset [`DATASET`]
///
/// Key data of every topology category plus two scalars and one vector.
#[must_use]
pub fn sample_dataset() -> Value {
    json!({
        "keyData": {
            "mesh1": { "topology": "Triangles", "pointCount": 120 },
            "lines": { "topology": "LineStrip", "pointCount": 64 },
            "points": { "topology": "Points", "pointCount": 200 }
        },
        "scalarVars": {
            "temp": { "min": -2.0, "max": 30.0 },
            "salt": { "min": 30.0, "max": 40.0 }
        },
        "vectorVars": {
            "wind": { "min": { "x": -1.0, "y": -1.0, "z": 0.0 }, "max": { "x": 1.0, "y": 1.0, "z": 0.0 } }
        }
    })
}

/// Artifact manifest for colormap [`COLORMAP`]
#[must_use]
pub fn sample_colormap() -> Value {
    json!({ "artifactType": "colormap", "name": "Cool to Warm" })
}

/// One `Surfaces` impression `id1` on `ds1/KeyData/mesh1`
#[must_use]
pub fn surface_document() -> Value {
    json!({
        "version": "0.2.0",
        "impressions": {
            "id1": {
                "plateType": "Surfaces",
                "inputValues": {
                    "Key Data": {
                        "inputGenre": "KeyData",
                        "inputValue": "ds1/KeyData/mesh1",
                        "parameterName": "Key Data"
                    }
                }
            }
        }
    })
}

/// Surfaces, Ribbons and Glyphs sharing [`DATASET`], grouped and lit
#[must_use]
pub fn full_document() -> Value {
    json!({
        "version": "0.2.0",
        "impressions": {
            "surf": {
                "plateType": "Surfaces",
                "name": "Seafloor",
                "inputValues": {
                    "Key Data": { "inputGenre": "KeyData", "inputValue": "ds1/KeyData/mesh1", "parameterName": "Key Data" },
                    "Color Variable": { "inputGenre": "Variable", "inputValue": "ds1/ScalarVar/temp", "parameterName": "Color" },
                    "Colormap": { "inputGenre": "VisAsset", "inputValue": COLORMAP, "parameterName": "Color" },
                    "Pattern Size": { "inputGenre": "Primitive", "inputValue": "0.1m", "inputType": "IMLD.LengthPrimitive", "parameterName": "Pattern" }
                },
                "renderHints": { "visible": true },
                "tags": ["terrain"]
            },
            "rib": {
                "plateType": "Ribbons",
                "inputValues": {
                    "Key Data": { "inputGenre": "KeyData", "inputValue": "ds1/KeyData/lines" },
                    "Ribbon Width": { "inputGenre": "Primitive", "inputValue": "0.05m" },
                    "Ribbon Rotation": { "inputGenre": "Primitive", "inputValue": "45deg" }
                }
            },
            "gly": {
                "plateType": "Glyphs",
                "inputValues": {
                    "Key Data": { "inputGenre": "KeyData", "inputValue": "ds1/KeyData/points" },
                    "Glyph Density": { "inputGenre": "Primitive", "inputValue": "50%" },
                    "Forward Variable": { "inputGenre": "Variable", "inputValue": "ds1/VectorVar/wind" }
                },
                "renderHints": { "visible": false }
            }
        },
        "scene": {
            "groups": {
                "grp-ocean": {
                    "name": "Ocean",
                    "impressions": ["surf", "rib"],
                    "rootPosition": { "x": 0.0, "y": 1.0, "z": 0.0 }
                }
            },
            "lighting": [
                { "name": "Sun", "type": "Directional", "intensity": 1.5 }
            ]
        },
        "dataRanges": {
            "scalarRanges": {
                "ds1/ScalarVar/salt": { "min": 33.0, "max": 36.0 }
            }
        },
        "uiData": { "selectedTab": "impressions" }
    })
}
