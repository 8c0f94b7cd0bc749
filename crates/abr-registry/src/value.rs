//! Resolved values held by impression slots

use crate::primitive::Primitive;
use crate::slot::ValueType;
use abr_data::{KeyData, ScalarVariable, VectorVariable, VisAsset};
use abr_document::InputGenre;
use std::sync::Arc;

/// Value assigned to an input slot
///
/// Resource-backed values are shared with the resolver cache; the impression
/// references them but does not own them.
#[derive(Debug, Clone)]
pub enum InputValue {
    KeyData(Arc<KeyData>),
    Scalar(Arc<ScalarVariable>),
    Vector(Arc<VectorVariable>),
    VisAsset(Arc<VisAsset>),
    Primitive(Primitive),
}

impl InputValue {
    #[must_use]
    pub fn genre(&self) -> InputGenre {
        match self {
            Self::KeyData(_) => InputGenre::KeyData,
            Self::Scalar(_) | Self::Vector(_) => InputGenre::Variable,
            Self::VisAsset(_) => InputGenre::VisAsset,
            Self::Primitive(_) => InputGenre::Primitive,
        }
    }

    /// Identity string written back to `inputValue`
    ///
    /// Data path for key data and variables, uuid for vis assets, literal for
    /// primitives.
    #[must_use]
    pub fn reference(&self) -> String {
        match self {
            Self::KeyData(key) => key.path().to_string(),
            Self::Scalar(var) => var.path().to_string(),
            Self::Vector(var) => var.path().to_string(),
            Self::VisAsset(asset) => asset.uuid().to_string(),
            Self::Primitive(primitive) => primitive.to_string(),
        }
    }

    /// Concrete type of the value
    #[must_use]
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::KeyData(key) => ValueType::of_key_data(key.topology().kind()),
            Self::Scalar(_) => ValueType::ScalarVariable,
            Self::Vector(_) => ValueType::VectorVariable,
            Self::VisAsset(asset) => ValueType::of_vis_asset(asset.kind()),
            Self::Primitive(primitive) => primitive.value_type(),
        }
    }

    #[must_use]
    pub fn as_key_data(&self) -> Option<&Arc<KeyData>> {
        match self {
            Self::KeyData(key) => Some(key),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_primitive(&self) -> Option<Primitive> {
        match self {
            Self::Primitive(primitive) => Some(*primitive),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_scalar(&self) -> Option<&Arc<ScalarVariable>> {
        match self {
            Self::Scalar(var) => Some(var),
            _ => None,
        }
    }
}
