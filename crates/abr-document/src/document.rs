//! Typed scene state documents
//!
//! Parses raw JSON into [`StateDocument`]. Only structural typing is checked
//! here; schema validation happens elsewhere.

use crate::geometry::{Bounds, Quat, Vec3};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

/// Version written into serialized documents
pub const STATE_VERSION: &str = "0.2.0";

/// Stable identifier of a data impression
///
/// Same id across reloads means the same logical object.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImpressionId(String);

impl ImpressionId {
    /// Create id from string
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get id as str
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ImpressionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ImpressionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ImpressionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Borrow<str> for ImpressionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Identifier of an impression group
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(String);

impl GroupId {
    /// Create id from string
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random id
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Get id as str
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for GroupId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GroupId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl Borrow<str> for GroupId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Full scene state document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateDocument {
    /// Document format version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Impressions keyed by id
    pub impressions: BTreeMap<ImpressionId, ImpressionSpec>,

    /// Groups and lighting
    #[serde(default, deserialize_with = "nullable")]
    pub scene: SceneSpec,

    /// Range overrides for variables
    #[serde(default, deserialize_with = "nullable")]
    pub data_ranges: DataRanges,

    /// Vis assets shipped inside the document, keyed by uuid
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub local_vis_assets: BTreeMap<String, Value>,

    /// Opaque data owned by authoring UIs; never interpreted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui_data: Option<Value>,
}

impl StateDocument {
    /// Empty document at the current version
    #[must_use]
    pub fn empty() -> Self {
        Self {
            version: Some(STATE_VERSION.to_string()),
            impressions: BTreeMap::new(),
            scene: SceneSpec::default(),
            data_ranges: DataRanges::default(),
            local_vis_assets: BTreeMap::new(),
            ui_data: None,
        }
    }

    /// Parse document from a raw JSON value
    ///
    /// # Errors
    /// - `DocumentError::Malformed` if the root is not an object, `impressions`
    ///   is absent, or any known key has the wrong shape
    pub fn from_value(raw: &Value) -> Result<Self, DocumentError> {
        let root = raw
            .as_object()
            .ok_or_else(|| DocumentError::malformed("$", "document root must be an object"))?;

        match root.get("impressions") {
            Some(Value::Object(_)) => {}
            Some(_) => {
                return Err(DocumentError::malformed(
                    "impressions",
                    "must be an object keyed by impression id",
                ))
            }
            None => return Err(DocumentError::malformed("impressions", "missing required key")),
        }

        Self::deserialize(raw).map_err(|e| DocumentError::malformed("$", e.to_string()))
    }

    /// Parse document from JSON text
    ///
    /// # Errors
    /// - `DocumentError::Syntax` if the text is not JSON
    /// - `DocumentError::Malformed` as for [`StateDocument::from_value`]
    pub fn from_json_str(text: &str) -> Result<Self, DocumentError> {
        let raw: Value = serde_json::from_str(text).map_err(DocumentError::Syntax)?;
        Self::from_value(&raw)
    }

    /// Convert to a raw JSON value
    ///
    /// # Errors
    /// Returns error if a value cannot be represented as JSON (e.g. NaN ranges)
    pub fn to_value(&self) -> Result<Value, DocumentError> {
        serde_json::to_value(self).map_err(DocumentError::Encode)
    }

    /// Pretty-printed JSON text
    ///
    /// # Errors
    /// Returns error if a value cannot be represented as JSON
    pub fn to_json_pretty(&self) -> Result<String, DocumentError> {
        serde_json::to_string_pretty(self).map_err(DocumentError::Encode)
    }
}

/// One data impression entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpressionSpec {
    /// Id repeated inside the entry; the map key is authoritative
    #[serde(default, alias = "id", skip_serializing_if = "Option::is_none")]
    pub uuid: Option<ImpressionId>,

    /// Plate type tag selecting the impression variant
    #[serde(default, deserialize_with = "nullable")]
    pub plate_type: String,

    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Inputs keyed by slot name
    #[serde(default, deserialize_with = "nullable")]
    pub input_values: BTreeMap<String, InputRef>,

    /// Rendering flags
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub render_hints: Option<RenderHints>,

    /// Free-form tags
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl ImpressionSpec {
    /// Create entry with a plate type and no inputs
    #[must_use]
    pub fn new(plate_type: impl Into<String>) -> Self {
        Self {
            uuid: None,
            plate_type: plate_type.into(),
            name: None,
            input_values: BTreeMap::new(),
            render_hints: None,
            tags: Vec::new(),
        }
    }

    /// Add an input
    #[must_use]
    pub fn with_input(mut self, slot: impl Into<String>, input: InputRef) -> Self {
        self.input_values.insert(slot.into(), input);
        self
    }
}

/// Category of an input reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum InputGenre {
    /// Dataset geometry referenced by data path
    KeyData,
    /// Scalar or vector variable referenced by data path
    Variable,
    /// Visual-encoding asset referenced by uuid
    VisAsset,
    /// Literal value built from a string
    Primitive,
    /// Any genre this engine does not know; never assignable
    #[serde(other)]
    Unknown,
}

impl InputGenre {
    /// Name used in documents
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::KeyData => "KeyData",
            Self::Variable => "Variable",
            Self::VisAsset => "VisAsset",
            Self::Primitive => "Primitive",
            Self::Unknown => "Unknown",
        }
    }

    /// Genres backed by a resolved external resource
    #[inline]
    #[must_use]
    pub fn is_resource(self) -> bool {
        matches!(self, Self::KeyData | Self::Variable | Self::VisAsset)
    }
}

impl Display for InputGenre {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference from an impression slot to its value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputRef {
    /// Category of the value
    pub input_genre: InputGenre,
    /// Data path, vis asset uuid, or primitive literal
    pub input_value: String,
    /// Declared value type; selects the primitive constructor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_type: Option<String>,
    /// Parameter group of the slot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter_name: Option<String>,
}

impl InputRef {
    /// Create reference without type or parameter name
    #[must_use]
    pub fn new(genre: InputGenre, value: impl Into<String>) -> Self {
        Self {
            input_genre: genre,
            input_value: value.into(),
            input_type: None,
            parameter_name: None,
        }
    }

    /// With declared type
    #[must_use]
    pub fn with_type(mut self, input_type: impl Into<String>) -> Self {
        self.input_type = Some(input_type.into());
        self
    }

    /// With parameter name
    #[must_use]
    pub fn with_parameter(mut self, parameter: impl Into<String>) -> Self {
        self.parameter_name = Some(parameter.into());
        self
    }
}

/// Visibility/change flags for downstream rendering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderHints {
    #[serde(default = "visible_by_default")]
    pub visible: bool,
    #[serde(default)]
    pub changed: bool,
}

fn visible_by_default() -> bool {
    true
}

impl Default for RenderHints {
    fn default() -> Self {
        Self {
            visible: true,
            changed: false,
        }
    }
}

/// Scene section: groups and lights
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneSpec {
    #[serde(default, alias = "impressionGroups", deserialize_with = "nullable")]
    pub groups: BTreeMap<GroupId, GroupSpec>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub lighting: Vec<LightSpec>,
}

/// Impression group entry
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSpec {
    #[serde(default, alias = "id", skip_serializing_if = "Option::is_none")]
    pub uuid: Option<GroupId>,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub impressions: Vec<ImpressionId>,
    #[serde(default)]
    pub container_bounds: Bounds,
    #[serde(default)]
    pub root_position: Vec3,
    #[serde(default)]
    pub root_rotation: Quat,
}

/// Kind of light source
///
/// Accepts either the name or the host engine's integer code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LightType {
    Spot,
    #[default]
    Directional,
    Point,
    Area,
}

impl LightType {
    /// Name used in documents
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Spot => "Spot",
            Self::Directional => "Directional",
            Self::Point => "Point",
            Self::Area => "Area",
        }
    }

    fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(Self::Spot),
            1 => Some(Self::Directional),
            2 => Some(Self::Point),
            3 => Some(Self::Area),
            _ => None,
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "Spot" => Some(Self::Spot),
            "Directional" => Some(Self::Directional),
            "Point" => Some(Self::Point),
            "Area" | "Rectangle" => Some(Self::Area),
            _ => None,
        }
    }
}

impl Serialize for LightType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for LightType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(name) => Self::from_name(&name)
                .ok_or_else(|| de::Error::custom(format!("unknown light type '{name}'"))),
            Value::Number(n) => n
                .as_u64()
                .and_then(Self::from_code)
                .ok_or_else(|| de::Error::custom(format!("unknown light type code {n}"))),
            other => Err(de::Error::custom(format!(
                "light type must be a name or code, got {other}"
            ))),
        }
    }
}

/// Light entry; lights are identified by name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LightSpec {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: LightType,
    #[serde(default = "default_intensity")]
    pub intensity: f64,
    #[serde(default)]
    pub position: Vec3,
    #[serde(default)]
    pub rotation: Quat,
}

fn default_intensity() -> f64 {
    1.0
}

/// Range overrides section
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataRanges {
    #[serde(default, deserialize_with = "nullable")]
    pub scalar_ranges: BTreeMap<String, Range>,
}

/// Inclusive min/max range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    /// Create range
    #[inline]
    #[must_use]
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }
}

/// Treat an explicit `null` like an absent key
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Errors while reading or writing documents
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// Text is not JSON
    #[error("document is not valid JSON: {0}")]
    Syntax(#[source] serde_json::Error),

    /// Required key absent or mistyped
    #[error("malformed document at '{location}': {message}")]
    Malformed { location: String, message: String },

    /// Typed document could not be encoded
    #[error("document could not be encoded: {0}")]
    Encode(#[source] serde_json::Error),
}

impl DocumentError {
    /// Create malformed-document error
    pub fn malformed(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Malformed {
            location: location.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn minimal_document_parses() {
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

        let doc = StateDocument::from_value(&raw).unwrap();
        assert_eq!(doc.impressions.len(), 1);
        let spec = &doc.impressions["id1"];
        assert_eq!(spec.plate_type, "Surfaces");
        assert_eq!(spec.input_values["Key Data"].input_genre, InputGenre::KeyData);
        assert!(doc.scene.groups.is_empty());
        assert!(doc.ui_data.is_none());
    }

    #[test]
    fn missing_impressions_is_malformed() {
        let err = StateDocument::from_value(&json!({ "version": "0.2.0" })).unwrap_err();
        match err {
            DocumentError::Malformed { location, .. } => assert_eq!(location, "impressions"),
            other => panic!("expected Malformed, got {other:?}"),
        }
    }

    #[test]
    fn mistyped_impressions_is_malformed() {
        let err = StateDocument::from_value(&json!({ "impressions": [] })).unwrap_err();
        assert!(matches!(err, DocumentError::Malformed { .. }));

        let err = StateDocument::from_value(&json!("nope")).unwrap_err();
        assert!(matches!(err, DocumentError::Malformed { .. }));
    }

    #[test]
    fn mistyped_nested_key_is_malformed() {
        let raw = json!({
            "impressions": { "a": { "plateType": "Surfaces", "tags": "not-a-list" } }
        });
        assert!(matches!(
            StateDocument::from_value(&raw),
            Err(DocumentError::Malformed { .. })
        ));
    }

    #[test]
    fn invalid_json_text_is_syntax_error() {
        assert!(matches!(
            StateDocument::from_json_str("{\"impressions\":"),
            Err(DocumentError::Syntax(_))
        ));
    }

    #[test]
    fn nulls_read_as_empty() {
        let raw = json!({
            "impressions": { "a": { "plateType": "Glyphs", "inputValues": null, "tags": null } },
            "scene": null,
            "dataRanges": { "scalarRanges": null }
        });
        let doc = StateDocument::from_value(&raw).unwrap();
        assert!(doc.impressions["a"].input_values.is_empty());
        assert!(doc.data_ranges.scalar_ranges.is_empty());
    }

    #[test]
    fn unknown_genre_is_tolerated() {
        let raw = json!({
            "impressions": {
                "a": {
                    "plateType": "Glyphs",
                    "inputValues": { "Glyph": { "inputGenre": "Sound", "inputValue": "x" } }
                }
            }
        });
        let doc = StateDocument::from_value(&raw).unwrap();
        assert_eq!(
            doc.impressions["a"].input_values["Glyph"].input_genre,
            InputGenre::Unknown
        );
    }

    #[test]
    fn groups_accept_legacy_key() {
        let raw = json!({
            "impressions": {},
            "scene": {
                "impressionGroups": {
                    "g1": { "uuid": "g1", "name": "Main", "impressions": ["a"] }
                }
            }
        });
        let doc = StateDocument::from_value(&raw).unwrap();
        assert_eq!(doc.scene.groups["g1"].name, "Main");
        assert_eq!(doc.scene.groups["g1"].impressions, vec![ImpressionId::from("a")]);
    }

    #[test]
    fn light_type_accepts_names_and_codes() {
        let raw = json!({
            "impressions": {},
            "scene": {
                "lighting": [
                    { "name": "Key", "type": "Point", "intensity": 0.5 },
                    { "name": "Fill", "type": 0 }
                ]
            }
        });
        let doc = StateDocument::from_value(&raw).unwrap();
        assert_eq!(doc.scene.lighting[0].kind, LightType::Point);
        assert_eq!(doc.scene.lighting[1].kind, LightType::Spot);
        assert_eq!(doc.scene.lighting[1].intensity, 1.0);
        assert_eq!(doc.scene.lighting[1].rotation, Quat::IDENTITY);
    }

    #[test]
    fn serialization_is_stable() {
        let raw = json!({
            "version": "0.2.0",
            "impressions": {
                "b": { "plateType": "Ribbons", "tags": ["t"] },
                "a": {
                    "plateType": "Surfaces",
                    "renderHints": { "visible": false, "changed": true }
                }
            },
            "dataRanges": { "scalarRanges": { "ds1/ScalarVar/temp": { "min": 0.0, "max": 1.0 } } },
            "uiData": { "panels": [1, 2, 3] }
        });
        let doc = StateDocument::from_value(&raw).unwrap();
        let again = StateDocument::from_value(&doc.to_value().unwrap()).unwrap();
        assert_eq!(doc, again);
        assert_eq!(again.ui_data, Some(json!({ "panels": [1, 2, 3] })));
    }
}
