//! Schema validation collaborator
//!
//! The engine only consumes pass/fail plus located issues.

use crate::error::{ConfigError, ValidationIssue};
use jsonschema::JSONSchema;
use serde_json::Value;
use std::path::Path;

/// Validates raw state documents
pub trait SchemaValidator: Send + Sync {
    /// Check a document
    ///
    /// # Errors
    /// Returns every issue found when the document is invalid
    fn validate(&self, document: &Value) -> Result<(), Vec<ValidationIssue>>;
}

/// Validator that accepts every document
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl SchemaValidator for AcceptAll {
    fn validate(&self, _document: &Value) -> Result<(), Vec<ValidationIssue>> {
        Ok(())
    }
}

/// JSON Schema backed validator
pub struct JsonSchemaValidator {
    schema: JSONSchema,
}

impl std::fmt::Debug for JsonSchemaValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonSchemaValidator").finish_non_exhaustive()
    }
}

impl JsonSchemaValidator {
    /// Compile a schema value
    ///
    /// # Errors
    /// Returns `ConfigError::Schema` if the schema itself is invalid
    pub fn new(schema: &Value) -> Result<Self, ConfigError> {
        let compiled = JSONSchema::compile(schema).map_err(|e| ConfigError::Schema(e.to_string()))?;
        Ok(Self { schema: compiled })
    }

    /// Read and compile a schema file
    ///
    /// # Errors
    /// Returns error if the file cannot be read, is not JSON, or is not a schema
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let schema: Value =
            serde_json::from_str(&text).map_err(|e| ConfigError::Schema(e.to_string()))?;
        Self::new(&schema)
    }
}

impl SchemaValidator for JsonSchemaValidator {
    fn validate(&self, document: &Value) -> Result<(), Vec<ValidationIssue>> {
        self.schema.validate(document).map_err(|errors| {
            errors
                .map(|error| ValidationIssue {
                    path: error.instance_path.to_string(),
                    line: None,
                    message: error.to_string(),
                })
                .collect()
        })
    }
}
