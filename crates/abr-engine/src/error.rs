//! Error types for the reconciliation engine
//!
//! Fatal errors abort the current call and leave the live scene untouched:
//! - Malformed or schema-invalid documents
//! - Loader transport failures
//! - Serialization failures
//!
//! Per-entity problems are [`SoftFailure`]s: logged, recorded in the load
//! report, and skipped.

use crate::phase::ReconcilePhase;
use abr_document::{DeltaError, DocumentError, ImpressionId};
use abr_registry::{PrimitiveError, ValueType};
use std::path::PathBuf;

/// Main engine error type
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Document is not structurally a state document
    #[error("malformed document: {0}")]
    Malformed(#[from] DocumentError),

    /// Externally supplied delta does not follow the delta encoding
    #[error("malformed delta: {0}")]
    Delta(#[from] DeltaError),

    /// Schema validation failed
    #[error("document failed validation with {} issue(s)", issues.len())]
    Validation { issues: Vec<ValidationIssue> },

    /// Loader could not fetch or store a document
    #[error("loader error: {0}")]
    Loader(#[from] LoaderError),

    /// Live scene could not be serialized
    #[error("serialization failed: {0}")]
    Serialize(#[from] SerializeError),

    /// Configuration could not be read
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Scene owner task is gone
    #[error("live scene is no longer running")]
    SceneClosed,

    /// Reconciler attempted an illegal phase change
    #[error("illegal phase transition {from:?} -> {to:?}")]
    IllegalTransition {
        from: ReconcilePhase,
        to: ReconcilePhase,
    },
}

impl EngineError {
    /// Whether a caller may retry the same call
    ///
    /// No retry happens inside the engine.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.is_transport()
    }

    /// Whether the error came from the transport layer
    #[inline]
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Loader(LoaderError::Transport { .. }))
    }

    /// Validation issues, if this is a validation failure
    #[must_use]
    pub fn validation_issues(&self) -> Option<&[ValidationIssue]> {
        match self {
            Self::Validation { issues } => Some(issues),
            _ => None,
        }
    }
}

/// One schema violation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// JSON pointer to the offending value
    pub path: String,
    /// Source line, when the validator knows it
    pub line: Option<usize>,
    pub message: String,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.line {
            Some(line) => write!(f, "{} (line {}): {}", self.path, line, self.message),
            None => write!(f, "{}: {}", self.path, self.message),
        }
    }
}

/// Per-entity problem recovered during a load
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SoftFailure {
    /// Impression skipped: no registered plate type
    #[error("impression {impression}: unknown plate type '{plate_type}'")]
    UnknownPlateType {
        impression: ImpressionId,
        plate_type: String,
    },

    /// Slot left empty: reference did not resolve
    #[error("{owner}: unresolved reference '{reference}' ({reason})")]
    UnresolvedReference {
        owner: String,
        reference: String,
        reason: String,
    },

    /// Slot left empty: primitive literal rejected
    #[error("impression {impression} slot '{slot}': {error}")]
    PrimitiveConstruction {
        impression: ImpressionId,
        slot: String,
        error: PrimitiveError,
    },

    /// Slot left empty: value not assignable to the slot
    #[error("impression {impression} slot '{slot}': expected {expected}, found {found}")]
    TypeMismatch {
        impression: ImpressionId,
        slot: String,
        expected: ValueType,
        found: String,
    },
}

impl SoftFailure {
    /// Impression the failure belongs to, if any
    #[must_use]
    pub fn impression(&self) -> Option<&ImpressionId> {
        match self {
            Self::UnknownPlateType { impression, .. }
            | Self::PrimitiveConstruction { impression, .. }
            | Self::TypeMismatch { impression, .. } => Some(impression),
            Self::UnresolvedReference { .. } => None,
        }
    }
}

/// State loader errors
#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    /// Network, HTTP status or filesystem failure
    #[error("transport failure for '{target}': {message}")]
    Transport { target: String, message: String },

    /// No document under that name
    #[error("no state named '{0}'")]
    NotFound(String),

    /// Payload is not the expected JSON
    #[error("invalid payload from '{target}': {message}")]
    Payload { target: String, message: String },

    /// Backend cannot perform the operation
    #[error("{0} is not supported by this loader")]
    Unsupported(&'static str),
}

impl LoaderError {
    pub fn transport(target: impl Into<String>, message: impl ToString) -> Self {
        Self::Transport {
            target: target.into(),
            message: message.to_string(),
        }
    }

    pub fn payload(target: impl Into<String>, message: impl ToString) -> Self {
        Self::Payload {
            target: target.into(),
            message: message.to_string(),
        }
    }
}

/// Serializer errors
#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    /// Live impression's plate type has no registered tag
    #[error("impression {impression} has plate type {plate} with no registered tag")]
    UnregisteredPlate {
        impression: ImpressionId,
        plate: String,
    },

    /// Document could not be encoded
    #[error("could not encode document: {0}")]
    Encode(#[from] DocumentError),
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid schema: {0}")]
    Schema(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_classification() {
        let err = EngineError::from(LoaderError::transport("http://x", "refused"));
        assert!(err.is_retryable());
        assert!(err.is_transport());

        let err = EngineError::from(LoaderError::Unsupported("saving"));
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "loader error: saving is not supported by this loader");
    }

    #[test]
    fn validation_issues_are_exposed() {
        let err = EngineError::Validation {
            issues: vec![ValidationIssue {
                path: "/impressions/a".to_string(),
                line: None,
                message: "bad".to_string(),
            }],
        };
        assert_eq!(err.validation_issues().map(<[_]>::len), Some(1));
        assert_eq!(err.to_string(), "document failed validation with 1 issue(s)");
    }

    #[test]
    fn soft_failure_owner() {
        let failure = SoftFailure::UnknownPlateType {
            impression: ImpressionId::from("a"),
            plate_type: "Volumes".to_string(),
        };
        assert_eq!(failure.impression().map(ImpressionId::as_str), Some("a"));
        assert_eq!(failure.to_string(), "impression a: unknown plate type 'Volumes'");
    }
}
