//! Input slots and the value types they accept

use crate::value::InputValue;
use abr_data::{KeyDataKind, VisAssetKind};
use abr_document::InputGenre;
use std::fmt::{self, Display, Formatter};

/// Declared type of an input slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    AnyKeyData,
    SurfaceKeyData,
    LineKeyData,
    PointKeyData,
    ScalarVariable,
    VectorVariable,
    Colormap,
    Glyph,
    LineTexture,
    SurfaceTexture,
    Length,
    Percent,
    Angle,
    Integer,
}

const ALL_VALUE_TYPES: [ValueType; 14] = [
    ValueType::AnyKeyData,
    ValueType::SurfaceKeyData,
    ValueType::LineKeyData,
    ValueType::PointKeyData,
    ValueType::ScalarVariable,
    ValueType::VectorVariable,
    ValueType::Colormap,
    ValueType::Glyph,
    ValueType::LineTexture,
    ValueType::SurfaceTexture,
    ValueType::Length,
    ValueType::Percent,
    ValueType::Angle,
    ValueType::Integer,
];

impl ValueType {
    /// Genre an input must declare to fill a slot of this type
    #[must_use]
    pub fn genre(self) -> InputGenre {
        match self {
            Self::AnyKeyData | Self::SurfaceKeyData | Self::LineKeyData | Self::PointKeyData => {
                InputGenre::KeyData
            }
            Self::ScalarVariable | Self::VectorVariable => InputGenre::Variable,
            Self::Colormap | Self::Glyph | Self::LineTexture | Self::SurfaceTexture => {
                InputGenre::VisAsset
            }
            Self::Length | Self::Percent | Self::Angle | Self::Integer => InputGenre::Primitive,
        }
    }

    /// Type name written to `inputType`
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::AnyKeyData => "KeyData",
            Self::SurfaceKeyData => "SurfaceKeyData",
            Self::LineKeyData => "LineKeyData",
            Self::PointKeyData => "PointKeyData",
            Self::ScalarVariable => "ScalarDataVariable",
            Self::VectorVariable => "VectorDataVariable",
            Self::Colormap => "ColormapVisAsset",
            Self::Glyph => "GlyphVisAsset",
            Self::LineTexture => "LineTextureVisAsset",
            Self::SurfaceTexture => "SurfaceTextureVisAsset",
            Self::Length => "LengthPrimitive",
            Self::Percent => "PercentPrimitive",
            Self::Angle => "AnglePrimitive",
            Self::Integer => "IntegerPrimitive",
        }
    }

    /// Parse a type name, ignoring any dotted namespace prefix
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let bare = name.rsplit('.').next().unwrap_or(name);
        ALL_VALUE_TYPES.into_iter().find(|ty| ty.name() == bare)
    }

    /// Key data type matching a topology category
    #[must_use]
    pub fn of_key_data(kind: KeyDataKind) -> Self {
        match kind {
            KeyDataKind::Surface | KeyDataKind::Volume => Self::SurfaceKeyData,
            KeyDataKind::Line => Self::LineKeyData,
            KeyDataKind::Point => Self::PointKeyData,
        }
    }

    /// Vis asset type matching an asset kind
    #[must_use]
    pub fn of_vis_asset(kind: VisAssetKind) -> Self {
        match kind {
            VisAssetKind::Colormap => Self::Colormap,
            VisAssetKind::Glyph => Self::Glyph,
            VisAssetKind::LineTexture => Self::LineTexture,
            VisAssetKind::SurfaceTexture => Self::SurfaceTexture,
        }
    }

    /// Whether a resolved value may be assigned to a slot of this type
    #[must_use]
    pub fn accepts(self, value: &InputValue) -> bool {
        match (self, value) {
            (Self::AnyKeyData, InputValue::KeyData(_)) => true,
            (Self::SurfaceKeyData | Self::LineKeyData | Self::PointKeyData, InputValue::KeyData(key)) => {
                Self::of_key_data(key.topology().kind()) == self
            }
            (Self::ScalarVariable, InputValue::Scalar(_))
            | (Self::VectorVariable, InputValue::Vector(_)) => true,
            (_, InputValue::VisAsset(asset)) => Self::of_vis_asset(asset.kind()) == self,
            (_, InputValue::Primitive(primitive)) => primitive.value_type() == self,
            _ => false,
        }
    }
}

impl Display for ValueType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One declared input of a plate type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputSlot {
    pub name: &'static str,
    pub parameter_name: &'static str,
    pub value_type: ValueType,
}

impl InputSlot {
    #[must_use]
    pub const fn new(name: &'static str, parameter_name: &'static str, value_type: ValueType) -> Self {
        Self {
            name,
            parameter_name,
            value_type,
        }
    }

    #[inline]
    #[must_use]
    pub fn genre(&self) -> InputGenre {
        self.value_type.genre()
    }

    /// Whether a document may name this slot's parameter group
    ///
    /// An absent parameter name matches any slot.
    #[must_use]
    pub fn matches_parameter(&self, parameter_name: Option<&str>) -> bool {
        parameter_name.map_or(true, |name| name == self.parameter_name)
    }
}

pub(crate) const SURFACE_SLOTS: &[InputSlot] = &[
    InputSlot::new("Key Data", "Key Data", ValueType::SurfaceKeyData),
    InputSlot::new("Color Variable", "Color", ValueType::ScalarVariable),
    InputSlot::new("Colormap", "Color", ValueType::Colormap),
    InputSlot::new("Pattern Variable", "Pattern", ValueType::ScalarVariable),
    InputSlot::new("Pattern", "Pattern", ValueType::SurfaceTexture),
    InputSlot::new("Pattern Size", "Pattern", ValueType::Length),
    InputSlot::new("Pattern Seam Blend", "Pattern", ValueType::Percent),
    InputSlot::new("Pattern Saturation", "Pattern", ValueType::Percent),
    InputSlot::new("Pattern Intensity", "Pattern", ValueType::Percent),
];

pub(crate) const RIBBON_SLOTS: &[InputSlot] = &[
    InputSlot::new("Key Data", "Key Data", ValueType::LineKeyData),
    InputSlot::new("Color Variable", "Color", ValueType::ScalarVariable),
    InputSlot::new("Colormap", "Color", ValueType::Colormap),
    InputSlot::new("Texture Variable", "Texture", ValueType::ScalarVariable),
    InputSlot::new("Texture", "Texture", ValueType::LineTexture),
    InputSlot::new("Texture Cutoff", "Texture", ValueType::Percent),
    InputSlot::new("Ribbon Smooth", "Ribbon", ValueType::Integer),
    InputSlot::new("Ribbon Width", "Ribbon", ValueType::Length),
    InputSlot::new("Ribbon Rotation", "Ribbon", ValueType::Angle),
    InputSlot::new("Ribbon Brightness", "Ribbon", ValueType::Percent),
    InputSlot::new("Ribbon Curve", "Ribbon", ValueType::Angle),
];

pub(crate) const GLYPH_SLOTS: &[InputSlot] = &[
    InputSlot::new("Key Data", "Key Data", ValueType::AnyKeyData),
    InputSlot::new("Color Variable", "Color", ValueType::ScalarVariable),
    InputSlot::new("Colormap", "Color", ValueType::Colormap),
    InputSlot::new("Glyph Variable", "Glyph", ValueType::ScalarVariable),
    InputSlot::new("Glyph", "Glyph", ValueType::Glyph),
    InputSlot::new("Glyph Size", "Glyph", ValueType::Length),
    InputSlot::new("Glyph Density", "Glyph", ValueType::Percent),
    InputSlot::new("Forward Variable", "Direction", ValueType::VectorVariable),
    InputSlot::new("Up Variable", "Direction", ValueType::VectorVariable),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive::Primitive;

    #[test]
    fn names_round_trip_with_namespace() {
        for ty in ALL_VALUE_TYPES {
            assert_eq!(ValueType::from_name(ty.name()), Some(ty));
        }
        assert_eq!(
            ValueType::from_name("IVLab.ABREngine.PercentPrimitive"),
            Some(ValueType::Percent)
        );
        assert_eq!(ValueType::from_name("BooleanPrimitive"), None);
    }

    #[test]
    fn primitives_must_match_exactly() {
        let length = InputValue::Primitive(Primitive::Length(0.1));
        assert!(ValueType::Length.accepts(&length));
        assert!(!ValueType::Percent.accepts(&length));
        assert!(!ValueType::ScalarVariable.accepts(&length));
    }

    #[test]
    fn slot_names_are_unique_per_plate() {
        for slots in [SURFACE_SLOTS, RIBBON_SLOTS, GLYPH_SLOTS] {
            let mut names: Vec<_> = slots.iter().map(|s| s.name).collect();
            names.sort_unstable();
            names.dedup();
            assert_eq!(names.len(), slots.len());
        }
    }

    #[test]
    fn parameter_check() {
        let slot = SURFACE_SLOTS[2];
        assert!(slot.matches_parameter(Some("Color")));
        assert!(slot.matches_parameter(None));
        assert!(!slot.matches_parameter(Some("Pattern")));
    }
}
