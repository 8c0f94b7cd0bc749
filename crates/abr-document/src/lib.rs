//! ABR State Documents
//!
//! Typed scene documents, data paths, and the structural delta format used to
//! compare successive documents.
//!
//! # Core Concepts
//!
//! - [`StateDocument`]: Typed view of a raw JSON scene state
//! - [`DataPath`]: `dataset/Type/name` references into datasets
//! - [`Delta`]: Array-encoded structural difference between two JSON values
//! - [`ImpressionChanges`]: Which impressions a new document creates, changes or deletes
//!
//! # Example
//!
//! ```rust,ignore
//! use abr_document::{ImpressionChanges, StateDocument};
//!
//! let document = StateDocument::from_value(&raw)?;
//! let changes = ImpressionChanges::between(previous.as_ref(), &raw);
//! for id in changes.deleted() {
//!     println!("remove {id}");
//! }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod delta;
mod document;
mod geometry;
mod path;

pub use delta::{diff, diff_documents, Delta, DeltaError, ImpressionChanges};
pub use document::{
    DataRanges, DocumentError, GroupId, GroupSpec, ImpressionId, ImpressionSpec, InputGenre,
    InputRef, LightSpec, LightType, Range, RenderHints, SceneSpec, StateDocument, STATE_VERSION,
};
pub use geometry::{Bounds, Quat, Vec3};
pub use path::{DataPath, DataPathKind, PathError};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod integration_tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn document_and_delta_agree_on_impression_keys() {
        let previous = json!({
            "impressions": {
                "a": { "plateType": "Surfaces" },
                "b": { "plateType": "Glyphs" }
            }
        });
        let next = json!({
            "impressions": {
                "b": { "plateType": "Glyphs", "tags": ["hero"] },
                "c": { "plateType": "Ribbons" }
            }
        });

        let document = StateDocument::from_value(&next).unwrap();
        let changes = ImpressionChanges::between(Some(&previous), &next);

        for id in document.impressions.keys() {
            assert!(changes.is_changed(id), "{id} should be rebuilt");
        }
        let deleted: Vec<_> = changes.deleted().map(ImpressionId::as_str).collect();
        assert_eq!(deleted, vec!["a"]);
    }

    #[test]
    fn key_data_reference_names_its_dataset() {
        let raw = json!({
            "impressions": {
                "id1": {
                    "plateType": "Surfaces",
                    "inputValues": {
                        "Key Data": { "inputGenre": "KeyData", "inputValue": "ds1/KeyData/mesh1" }
                    }
                }
            }
        });
        let document = StateDocument::from_value(&raw).unwrap();
        let input = &document.impressions[&ImpressionId::from("id1")].input_values["Key Data"];
        let path: DataPath = input.input_value.parse().unwrap();
        assert_eq!(path.dataset(), "ds1");
        assert_eq!(path.kind(), DataPathKind::KeyData);
        assert_eq!(path.name(), "mesh1");
    }
}
