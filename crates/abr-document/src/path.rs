//! Data paths for addressing dataset contents
//!
//! Provides [`DataPath`] for references of the form `dataset/Type/name`, where
//! `Type` is one of `KeyData`, `ScalarVar` or `VectorVar`. The dataset part may
//! itself span several segments (e.g. `Organization/Dataset`).

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Kind of entry a data path points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DataPathKind {
    /// Geometry/topology payload
    KeyData,
    /// Scalar field over key data
    ScalarVar,
    /// Vector field over key data
    VectorVar,
}

impl DataPathKind {
    /// Segment used for this kind inside a path
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::KeyData => "KeyData",
            Self::ScalarVar => "ScalarVar",
            Self::VectorVar => "VectorVar",
        }
    }

    fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "KeyData" => Some(Self::KeyData),
            "ScalarVar" => Some(Self::ScalarVar),
            "VectorVar" => Some(Self::VectorVar),
            _ => None,
        }
    }
}

impl Display for DataPathKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to a key data object or variable inside a dataset
///
/// # Examples
/// - `ds1/KeyData/mesh1` → dataset `ds1`, key data `mesh1`
/// - `Org/Ocean/ScalarVar/temp` → dataset `Org/Ocean`, scalar `temp`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DataPath {
    dataset: String,
    kind: DataPathKind,
    name: String,
}

impl DataPath {
    /// Create path from its parts
    #[inline]
    #[must_use]
    pub fn new(dataset: impl Into<String>, kind: DataPathKind, name: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
            kind,
            name: name.into(),
        }
    }

    /// Dataset portion of the path
    #[inline]
    #[must_use]
    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    /// Kind segment
    #[inline]
    #[must_use]
    pub fn kind(&self) -> DataPathKind {
        self.kind
    }

    /// Entry name inside the dataset
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Display for DataPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.dataset, self.kind, self.name)
    }
}

impl FromStr for DataPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(PathError::Empty);
        }

        let segments: Vec<&str> = s.split('/').collect();
        if segments.iter().any(|seg| seg.is_empty()) {
            return Err(PathError::EmptySegment(s.to_string()));
        }

        // The dataset needs at least one segment before the kind marker
        let (index, kind) = segments
            .iter()
            .enumerate()
            .skip(1)
            .find_map(|(i, seg)| DataPathKind::from_segment(seg).map(|k| (i, k)))
            .ok_or_else(|| PathError::MissingKind(s.to_string()))?;

        if index + 1 >= segments.len() {
            return Err(PathError::MissingName(s.to_string()));
        }

        Ok(Self::new(
            segments[..index].join("/"),
            kind,
            segments[index + 1..].join("/"),
        ))
    }
}

/// Errors related to data paths
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// Empty reference string
    #[error("data path is empty")]
    Empty,

    /// Empty segment in path
    #[error("data path '{0}' contains an empty segment")]
    EmptySegment(String),

    /// No KeyData/ScalarVar/VectorVar segment after the dataset
    #[error("data path '{0}' has no KeyData, ScalarVar or VectorVar segment")]
    MissingKind(String),

    /// Nothing after the kind segment
    #[error("data path '{0}' has no entry name")]
    MissingName(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_short_path() {
        let path: DataPath = "ds1/KeyData/mesh1".parse().unwrap();
        assert_eq!(path.dataset(), "ds1");
        assert_eq!(path.kind(), DataPathKind::KeyData);
        assert_eq!(path.name(), "mesh1");
    }

    #[test]
    fn parse_multi_segment_dataset() {
        let path: DataPath = "Org/Ocean/ScalarVar/temp".parse().unwrap();
        assert_eq!(path.dataset(), "Org/Ocean");
        assert_eq!(path.kind(), DataPathKind::ScalarVar);
        assert_eq!(path.name(), "temp");
    }

    #[test]
    fn display_matches_input() {
        let raw = "Org/Ocean/VectorVar/wind";
        let path: DataPath = raw.parse().unwrap();
        assert_eq!(path.to_string(), raw);
    }

    #[test]
    fn kind_must_follow_dataset() {
        assert_eq!(
            "KeyData/mesh1".parse::<DataPath>(),
            Err(PathError::MissingKind("KeyData/mesh1".to_string()))
        );
    }

    #[test]
    fn rejects_missing_name_and_empty_segments() {
        assert!(matches!(
            "ds1/KeyData".parse::<DataPath>(),
            Err(PathError::MissingName(_))
        ));
        assert!(matches!(
            "ds1//KeyData/x".parse::<DataPath>(),
            Err(PathError::EmptySegment(_))
        ));
        assert_eq!("".parse::<DataPath>(), Err(PathError::Empty));
    }
}
