//! Datasets and the entries they contain
//!
//! A [`Dataset`] is built from a JSON manifest listing its key data and
//! variables. Entries are shared behind `Arc` so every impression that
//! references the same path sees the same object, including range overrides.

use abr_document::{DataPath, DataPathKind, PathError, Range, Vec3};
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

/// Cell layout of a key data object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum Topology {
    Points,
    Lines,
    LineStrip,
    Triangles,
    Quads,
    Voxels,
}

/// Broad category of key data, matched against slot value types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyDataKind {
    Point,
    Line,
    Surface,
    Volume,
}

impl Topology {
    /// Category the topology belongs to
    #[must_use]
    pub fn kind(self) -> KeyDataKind {
        match self {
            Self::Points => KeyDataKind::Point,
            Self::Lines | Self::LineStrip => KeyDataKind::Line,
            Self::Triangles | Self::Quads => KeyDataKind::Surface,
            Self::Voxels => KeyDataKind::Volume,
        }
    }
}

/// Geometry payload addressed by `dataset/KeyData/name`
#[derive(Debug)]
pub struct KeyData {
    path: DataPath,
    topology: Topology,
    point_count: usize,
}

impl KeyData {
    #[inline]
    #[must_use]
    pub fn path(&self) -> &DataPath {
        &self.path
    }

    #[inline]
    #[must_use]
    pub fn topology(&self) -> Topology {
        self.topology
    }

    #[inline]
    #[must_use]
    pub fn point_count(&self) -> usize {
        self.point_count
    }
}

/// Current range of a scalar variable
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VariableRange {
    pub min: f64,
    pub max: f64,
    /// Set once a document overrides the range
    pub customized: bool,
}

/// Scalar field addressed by `dataset/ScalarVar/name`
///
/// The range is interior-mutable: overrides are applied to the shared entry
/// and survive later loads and serializations.
#[derive(Debug)]
pub struct ScalarVariable {
    path: DataPath,
    range: RwLock<VariableRange>,
}

impl ScalarVariable {
    /// Create variable with a computed range
    #[must_use]
    pub fn new(path: DataPath, min: f64, max: f64) -> Self {
        Self {
            path,
            range: RwLock::new(VariableRange {
                min,
                max,
                customized: false,
            }),
        }
    }

    #[inline]
    #[must_use]
    pub fn path(&self) -> &DataPath {
        &self.path
    }

    /// Snapshot of the current range
    #[must_use]
    pub fn range(&self) -> VariableRange {
        *self.range.read()
    }

    /// Whether a document has overridden the range
    #[must_use]
    pub fn is_customized(&self) -> bool {
        self.range.read().customized
    }

    /// Override the range and mark it customized
    pub fn set_custom_range(&self, range: Range) {
        let mut current = self.range.write();
        current.min = range.min;
        current.max = range.max;
        current.customized = true;
    }

    /// Customized range as a document value
    #[must_use]
    pub fn custom_range(&self) -> Option<Range> {
        let current = self.range.read();
        current
            .customized
            .then(|| Range::new(current.min, current.max))
    }
}

/// Vector field addressed by `dataset/VectorVar/name`
#[derive(Debug)]
pub struct VectorVariable {
    path: DataPath,
    min: Vec3,
    max: Vec3,
}

impl VectorVariable {
    #[inline]
    #[must_use]
    pub fn path(&self) -> &DataPath {
        &self.path
    }

    /// Component-wise minimum and maximum
    #[inline]
    #[must_use]
    pub fn bounds(&self) -> (Vec3, Vec3) {
        (self.min, self.max)
    }
}

/// Entry found by looking up a data path in a dataset
#[derive(Debug, Clone)]
pub enum DataEntry {
    KeyData(Arc<KeyData>),
    Scalar(Arc<ScalarVariable>),
    Vector(Arc<VectorVariable>),
}

/// Collection of key data and variables under one dataset path
#[derive(Debug)]
pub struct Dataset {
    path: String,
    key_data: IndexMap<String, Arc<KeyData>>,
    scalars: IndexMap<String, Arc<ScalarVariable>>,
    vectors: IndexMap<String, Arc<VectorVariable>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Manifest {
    #[serde(default)]
    key_data: IndexMap<String, KeyDataManifest>,
    #[serde(default)]
    scalar_vars: IndexMap<String, ScalarManifest>,
    #[serde(default)]
    vector_vars: IndexMap<String, VectorManifest>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyDataManifest {
    topology: Topology,
    #[serde(default)]
    point_count: usize,
}

#[derive(Deserialize)]
struct ScalarManifest {
    #[serde(default)]
    min: f64,
    #[serde(default)]
    max: f64,
}

#[derive(Deserialize)]
struct VectorManifest {
    #[serde(default)]
    min: Vec3,
    #[serde(default)]
    max: Vec3,
}

impl Dataset {
    /// Build dataset from its manifest
    ///
    /// # Errors
    /// - `DataError::Manifest` if the manifest does not describe a dataset
    /// - `DataError::Path` if an entry name yields an invalid data path
    pub fn from_manifest(path: &str, manifest: &Value) -> Result<Self, DataError> {
        let parsed = Manifest::deserialize(manifest).map_err(|e| DataError::Manifest {
            reference: path.to_string(),
            message: e.to_string(),
        })?;

        let entry_path = |kind: DataPathKind, name: &str| -> Result<DataPath, DataError> {
            let raw = format!("{path}/{kind}/{name}");
            raw.parse::<DataPath>().map_err(DataError::Path)
        };

        let mut key_data = IndexMap::new();
        for (name, entry) in parsed.key_data {
            let key = KeyData {
                path: entry_path(DataPathKind::KeyData, &name)?,
                topology: entry.topology,
                point_count: entry.point_count,
            };
            key_data.insert(name, Arc::new(key));
        }

        let mut scalars = IndexMap::new();
        for (name, entry) in parsed.scalar_vars {
            let var = ScalarVariable::new(
                entry_path(DataPathKind::ScalarVar, &name)?,
                entry.min,
                entry.max,
            );
            scalars.insert(name, Arc::new(var));
        }

        let mut vectors = IndexMap::new();
        for (name, entry) in parsed.vector_vars {
            let var = VectorVariable {
                path: entry_path(DataPathKind::VectorVar, &name)?,
                min: entry.min,
                max: entry.max,
            };
            vectors.insert(name, Arc::new(var));
        }

        Ok(Self {
            path: path.to_string(),
            key_data,
            scalars,
            vectors,
        })
    }

    /// Dataset path, e.g. `Org/Ocean`
    #[inline]
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn key_data(&self, name: &str) -> Option<Arc<KeyData>> {
        self.key_data.get(name).cloned()
    }

    #[must_use]
    pub fn scalar_var(&self, name: &str) -> Option<Arc<ScalarVariable>> {
        self.scalars.get(name).cloned()
    }

    #[must_use]
    pub fn vector_var(&self, name: &str) -> Option<Arc<VectorVariable>> {
        self.vectors.get(name).cloned()
    }

    /// All scalar variables in manifest order
    pub fn scalar_vars(&self) -> impl Iterator<Item = &Arc<ScalarVariable>> + '_ {
        self.scalars.values()
    }

    /// Look up the entry a path points at
    ///
    /// Returns `None` if the path belongs to another dataset or names no entry.
    #[must_use]
    pub fn lookup(&self, path: &DataPath) -> Option<DataEntry> {
        if path.dataset() != self.path {
            return None;
        }
        match path.kind() {
            DataPathKind::KeyData => self.key_data(path.name()).map(DataEntry::KeyData),
            DataPathKind::ScalarVar => self.scalar_var(path.name()).map(DataEntry::Scalar),
            DataPathKind::VectorVar => self.vector_var(path.name()).map(DataEntry::Vector),
        }
    }
}

/// Errors building data objects
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    /// Manifest JSON has the wrong shape
    #[error("invalid manifest for '{reference}': {message}")]
    Manifest { reference: String, message: String },

    /// Entry name produced an unusable data path
    #[error(transparent)]
    Path(#[from] PathError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn ocean() -> Dataset {
        Dataset::from_manifest(
            "Org/Ocean",
            &json!({
                "keyData": {
                    "mesh1": { "topology": "Triangles", "pointCount": 12 },
                    "currents": { "topology": "LineStrip" }
                },
                "scalarVars": { "temp": { "min": -2.0, "max": 30.0 } },
                "vectorVars": { "wind": { "max": { "x": 1.0, "y": 1.0, "z": 0.0 } } }
            }),
        )
        .unwrap()
    }

    #[test]
    fn lookup_by_path() {
        let dataset = ocean();
        let path: DataPath = "Org/Ocean/KeyData/mesh1".parse().unwrap();
        match dataset.lookup(&path) {
            Some(DataEntry::KeyData(key)) => {
                assert_eq!(key.topology().kind(), KeyDataKind::Surface);
                assert_eq!(key.point_count(), 12);
                assert_eq!(key.path(), &path);
            }
            other => panic!("expected key data, got {other:?}"),
        }

        let vector: DataPath = "Org/Ocean/VectorVar/wind".parse().unwrap();
        assert!(matches!(dataset.lookup(&vector), Some(DataEntry::Vector(_))));

        let elsewhere: DataPath = "Other/KeyData/mesh1".parse().unwrap();
        assert!(dataset.lookup(&elsewhere).is_none());
    }

    #[test]
    fn wrong_kind_finds_nothing() {
        let dataset = ocean();
        let path: DataPath = "Org/Ocean/ScalarVar/mesh1".parse().unwrap();
        assert!(dataset.lookup(&path).is_none());
    }

    #[test]
    fn custom_range_marks_variable() {
        let dataset = ocean();
        let temp = dataset.scalar_var("temp").unwrap();
        assert!(!temp.is_customized());
        assert_eq!(temp.custom_range(), None);

        temp.set_custom_range(Range::new(0.0, 1.0));

        let again = dataset.scalar_var("temp").unwrap();
        assert!(again.is_customized());
        assert_eq!(again.custom_range(), Some(Range::new(0.0, 1.0)));
    }

    #[test]
    fn bad_manifest_is_rejected() {
        let err = Dataset::from_manifest("ds1", &json!({ "keyData": { "m": { "topology": "Blob" } } }))
            .unwrap_err();
        assert!(matches!(err, DataError::Manifest { .. }));
    }
}
