//! Structural deltas between JSON documents
//!
//! Provides [`Delta`], the array-encoded difference format shared with external
//! delta producers, and [`ImpressionChanges`], the per-impression view the
//! reconciler consumes.
//!
//! # Encoding
//! - `[v]`: added with value `v`
//! - `[old, new]`: modified
//! - `[old, 0, 0]`: deleted (the trailing zeros are a marker, not data)
//! - `[text, 0, 2]`: text diff (decoded, never produced here)
//! - `["", index, 3]`: array move (decoded, never produced here)
//! - object: nested field deltas; a `_t` key is array bookkeeping and is ignored

use crate::document::ImpressionId;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet};

const IMPRESSIONS: &str = "impressions";

/// Difference between two JSON values
#[derive(Debug, Clone, PartialEq)]
pub enum Delta {
    /// Field appeared
    Added(Value),
    /// Field changed from `old` to `new`
    Modified { old: Value, new: Value },
    /// Field removed; carries the old value
    Deleted(Value),
    /// Text-level patch of a long string
    TextDiff(String),
    /// Array item moved to a new index
    Moved { to: u64 },
    /// Per-field deltas of an object
    Object(BTreeMap<String, Delta>),
}

impl Delta {
    /// Whether this delta is the deletion marker
    #[inline]
    #[must_use]
    pub fn is_deletion(&self) -> bool {
        matches!(self, Self::Deleted(_))
    }

    /// Nested delta for a field of an object delta
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&Delta> {
        match self {
            Self::Object(fields) => fields.get(key),
            _ => None,
        }
    }

    /// Encode into the array convention
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Added(value) => json!([value]),
            Self::Modified { old, new } => json!([old, new]),
            Self::Deleted(old) => json!([old, 0, 0]),
            Self::TextDiff(patch) => json!([patch, 0, 2]),
            Self::Moved { to } => json!(["", to, 3]),
            Self::Object(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(key, delta)| (key.clone(), delta.to_value()))
                    .collect::<Map<_, _>>(),
            ),
        }
    }

    /// Decode from the array convention
    ///
    /// # Errors
    /// - `DeltaError::NotADelta` for scalars and `null`
    /// - `DeltaError::UnknownArrayDelta` for arrays matching no known shape
    pub fn from_value(value: &Value) -> Result<Self, DeltaError> {
        match value {
            Value::Object(map) => {
                let mut fields = BTreeMap::new();
                for (key, nested) in map {
                    if key == "_t" {
                        continue;
                    }
                    let decoded = Self::from_value(nested).map_err(|e| e.at(key))?;
                    fields.insert(key.clone(), decoded);
                }
                Ok(Self::Object(fields))
            }
            Value::Array(items) => match items.as_slice() {
                [value] => Ok(Self::Added(value.clone())),
                [old, new] => Ok(Self::Modified {
                    old: old.clone(),
                    new: new.clone(),
                }),
                [old, a, b] if is_number(a, 0) && is_number(b, 0) => Ok(Self::Deleted(old.clone())),
                [Value::String(patch), a, b] if is_number(a, 0) && is_number(b, 2) => {
                    Ok(Self::TextDiff(patch.clone()))
                }
                [_, Value::Number(to), b] if is_number(b, 3) => to
                    .as_u64()
                    .map(|to| Self::Moved { to })
                    .ok_or_else(|| DeltaError::unknown_array("$", value)),
                _ => Err(DeltaError::unknown_array("$", value)),
            },
            other => Err(DeltaError::NotADelta {
                location: "$".to_string(),
                found: other.to_string(),
            }),
        }
    }
}

fn is_number(value: &Value, expected: u64) -> bool {
    value.as_u64() == Some(expected)
        || value
            .as_f64()
            .is_some_and(|n| (n - expected as f64).abs() < f64::EPSILON)
}

/// Compute the structural delta from `old` to `new`
///
/// Objects recurse per field. Arrays and scalars are compared whole and
/// reported as [`Delta::Modified`]. Returns `None` when the values are equal.
#[must_use]
pub fn diff(old: &Value, new: &Value) -> Option<Delta> {
    if old == new {
        return None;
    }

    match (old, new) {
        (Value::Object(before), Value::Object(after)) => {
            let mut fields = BTreeMap::new();
            for (key, prev) in before {
                match after.get(key) {
                    Some(next) => {
                        if let Some(delta) = diff(prev, next) {
                            fields.insert(key.clone(), delta);
                        }
                    }
                    None => {
                        fields.insert(key.clone(), Delta::Deleted(prev.clone()));
                    }
                }
            }
            for (key, next) in after {
                if !before.contains_key(key) {
                    fields.insert(key.clone(), Delta::Added(next.clone()));
                }
            }
            (!fields.is_empty()).then_some(Delta::Object(fields))
        }
        _ => Some(Delta::Modified {
            old: old.clone(),
            new: new.clone(),
        }),
    }
}

/// Delta of a whole document against the previously applied one
///
/// With no previous document the whole new document is reported as added.
#[must_use]
pub fn diff_documents(previous: Option<&Value>, next: &Value) -> Option<Delta> {
    match previous {
        Some(previous) => diff(previous, next),
        None => Some(Delta::Added(next.clone())),
    }
}

/// Which impressions a new document rebuilds or removes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImpressionChanges {
    /// No previous document; every impression is new
    Initial,
    /// The impressions container was replaced wholesale; clear and rebuild everything
    Replace,
    /// Per-id changes against the previous document
    Patch {
        changed: BTreeSet<ImpressionId>,
        deleted: BTreeSet<ImpressionId>,
    },
}

impl ImpressionChanges {
    /// Interpret a document-level delta
    ///
    /// `None` means the documents were identical.
    #[must_use]
    pub fn from_document_delta(delta: Option<&Delta>) -> Self {
        let Some(delta) = delta else {
            return Self::empty();
        };

        match delta {
            Delta::Added(_) => Self::Initial,
            Delta::Object(_) => match delta.field(IMPRESSIONS) {
                None => Self::empty(),
                Some(Delta::Object(per_id)) => {
                    let mut changed = BTreeSet::new();
                    let mut deleted = BTreeSet::new();
                    for (id, entry) in per_id {
                        if entry.is_deletion() {
                            deleted.insert(ImpressionId::from(id.as_str()));
                        } else {
                            changed.insert(ImpressionId::from(id.as_str()));
                        }
                    }
                    Self::Patch { changed, deleted }
                }
                Some(_) => Self::Replace,
            },
            _ => Self::Replace,
        }
    }

    /// Changes needed to go from `previous` to `next`
    #[must_use]
    pub fn between(previous: Option<&Value>, next: &Value) -> Self {
        Self::from_document_delta(diff_documents(previous, next).as_ref())
    }

    /// Interpret a raw delta produced elsewhere
    ///
    /// # Errors
    /// Returns error if the value does not follow the delta encoding
    pub fn from_delta_value(value: &Value) -> Result<Self, DeltaError> {
        let delta = Delta::from_value(value)?;
        Ok(Self::from_document_delta(Some(&delta)))
    }

    fn empty() -> Self {
        Self::Patch {
            changed: BTreeSet::new(),
            deleted: BTreeSet::new(),
        }
    }

    /// Whether the impression must be rebuilt
    #[must_use]
    pub fn is_changed(&self, id: &ImpressionId) -> bool {
        match self {
            Self::Initial | Self::Replace => true,
            Self::Patch { changed, .. } => changed.contains(id),
        }
    }

    /// Ids to remove from the live scene
    pub fn deleted(&self) -> impl Iterator<Item = &ImpressionId> + '_ {
        match self {
            Self::Patch { deleted, .. } => Some(deleted.iter()),
            _ => None,
        }
        .into_iter()
        .flatten()
    }

    /// Whether every impression in the new document is rebuilt
    #[inline]
    #[must_use]
    pub fn rebuilds_all(&self) -> bool {
        matches!(self, Self::Initial | Self::Replace)
    }

    /// Whether the live scene must be cleared first
    #[inline]
    #[must_use]
    pub fn clears_scene(&self) -> bool {
        matches!(self, Self::Replace)
    }

    /// No rebuilds and no removals
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Patch { changed, deleted } => changed.is_empty() && deleted.is_empty(),
            _ => false,
        }
    }
}

/// Errors decoding deltas
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeltaError {
    /// Value is neither object nor array
    #[error("value at '{location}' is not a delta: {found}")]
    NotADelta { location: String, found: String },

    /// Array of unrecognized shape
    #[error("unrecognized array delta at '{location}': {found}")]
    UnknownArrayDelta { location: String, found: String },
}

impl DeltaError {
    fn unknown_array(location: &str, value: &Value) -> Self {
        Self::UnknownArrayDelta {
            location: location.to_string(),
            found: value.to_string(),
        }
    }

    /// Prefix the location with a parent key
    fn at(self, key: &str) -> Self {
        let nest = |location: String| {
            if location == "$" {
                format!("$.{key}")
            } else {
                format!("$.{key}{}", &location[1..])
            }
        };
        match self {
            Self::NotADelta { location, found } => Self::NotADelta {
                location: nest(location),
                found,
            },
            Self::UnknownArrayDelta { location, found } => Self::UnknownArrayDelta {
                location: nest(location),
                found,
            },
        }
    }
}
