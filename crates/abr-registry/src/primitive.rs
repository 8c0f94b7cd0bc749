//! Primitive input values built from literal strings
//!
//! Construction goes through a type-keyed table: the declared `inputType`
//! picks the constructor, the literal is parsed by it. Display output parses
//! back to the same value.

use crate::slot::ValueType;
use std::fmt::{self, Display, Formatter};

/// Literal-valued input
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Primitive {
    /// Meters, written `0.1m`
    Length(f64),
    /// Percentage points, written `50%`
    Percent(f64),
    /// Degrees, written `45deg`
    Angle(f64),
    /// Whole number, written `3`
    Integer(i64),
}

type Constructor = fn(&str) -> Option<Primitive>;

const CONSTRUCTORS: &[(ValueType, Constructor)] = &[
    (ValueType::Length, length),
    (ValueType::Percent, percent),
    (ValueType::Angle, angle),
    (ValueType::Integer, integer),
];

fn length(literal: &str) -> Option<Primitive> {
    parse_unit(literal, "m").map(Primitive::Length)
}

fn percent(literal: &str) -> Option<Primitive> {
    parse_unit(literal, "%").map(Primitive::Percent)
}

fn angle(literal: &str) -> Option<Primitive> {
    parse_unit(literal, "deg").map(Primitive::Angle)
}

fn integer(literal: &str) -> Option<Primitive> {
    literal.trim().parse().ok().map(Primitive::Integer)
}

/// Number with an optional unit suffix
fn parse_unit(literal: &str, unit: &str) -> Option<f64> {
    let trimmed = literal.trim();
    let number = trimmed.strip_suffix(unit).unwrap_or(trimmed).trim_end();
    number.parse::<f64>().ok().filter(|n| n.is_finite())
}

impl Primitive {
    /// Build a primitive of the named type from its literal
    ///
    /// # Errors
    /// - `PrimitiveError::UnknownType` if no constructor is registered for the type
    /// - `PrimitiveError::InvalidLiteral` if the literal does not parse
    pub fn construct(type_name: &str, literal: &str) -> Result<Self, PrimitiveError> {
        let value_type = ValueType::from_name(type_name)
            .ok_or_else(|| PrimitiveError::UnknownType(type_name.to_string()))?;
        Self::construct_as(value_type, literal)
    }

    /// Build a primitive of a known value type
    ///
    /// # Errors
    /// As for [`Primitive::construct`]
    pub fn construct_as(value_type: ValueType, literal: &str) -> Result<Self, PrimitiveError> {
        let (_, build) = CONSTRUCTORS
            .iter()
            .find(|(ty, _)| *ty == value_type)
            .ok_or_else(|| PrimitiveError::UnknownType(value_type.name().to_string()))?;

        build(literal).ok_or_else(|| PrimitiveError::InvalidLiteral {
            type_name: value_type.name().to_string(),
            literal: literal.to_string(),
        })
    }

    #[must_use]
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Length(_) => ValueType::Length,
            Self::Percent(_) => ValueType::Percent,
            Self::Angle(_) => ValueType::Angle,
            Self::Integer(_) => ValueType::Integer,
        }
    }

    /// Numeric value in the primitive's unit
    #[must_use]
    pub fn as_f64(&self) -> f64 {
        match *self {
            Self::Length(v) | Self::Percent(v) | Self::Angle(v) => v,
            #[allow(clippy::cast_precision_loss)]
            Self::Integer(v) => v as f64,
        }
    }
}

impl Display for Primitive {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Length(v) => write!(f, "{v}m"),
            Self::Percent(v) => write!(f, "{v}%"),
            Self::Angle(v) => write!(f, "{v}deg"),
            Self::Integer(v) => write!(f, "{v}"),
        }
    }
}

/// Errors constructing primitives
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PrimitiveError {
    #[error("no primitive constructor for type '{0}'")]
    UnknownType(String),

    #[error("'{literal}' is not a valid {type_name}")]
    InvalidLiteral { type_name: String, literal: String },
}
