//! Unified error types for the domain layer
//!
//! Provides a common error type that can be used across all domain operations,
//! enabling consistent error handling without forcing callers to use String or anyhow.

use thiserror::Error;

/// Unified error type for domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Validation failed (e.g., invalid field values)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Invalid key format for a catalog option, tree, or skill
    #[error("Invalid key format: {0}")]
    InvalidKey(String),

    /// Entity not found
    #[error("Entity not found: {entity_type} with key {key}")]
    NotFound {
        entity_type: &'static str,
        key: String,
    },

    /// Business rule violation
    #[error("Constraint violation: {0}")]
    Constraint(String),

    /// Parse error (for value objects)
    #[error("Parse error: {0}")]
    Parse(String),
}

impl DomainError {
    /// Creates a validation error for business rule violations.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a not found error
    pub fn not_found(entity_type: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            key: key.into(),
        }
    }

    /// Create a constraint violation error
    pub fn constraint(msg: impl Into<String>) -> Self {
        Self::Constraint(msg.into())
    }

    /// Create an invalid key error
    pub fn invalid_key(msg: impl Into<String>) -> Self {
        Self::InvalidKey(msg.into())
    }

    /// Creates a parse error for string-to-type conversion failures.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }
}

/// Errors detected while validating a catalog at load time.
///
/// These are authoring errors in the catalog content itself. A catalog that
/// fails validation must be rejected wholesale; the runtime evaluator assumes
/// it only ever sees a validated catalog.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// A prerequisite references a key that does not exist in the catalog
    #[error("Unknown key referenced by {referrer}: {referenced}")]
    UnknownReference { referrer: String, referenced: String },

    /// The feat/talent prerequisite graph contains a cycle
    #[error("Prerequisite cycle detected involving: {0}")]
    PrerequisiteCycle(String),

    /// Two options share the same key
    #[error("Duplicate catalog key: {0}")]
    DuplicateKey(String),

    /// The catalog contains no options of a kind the engine requires
    #[error("Catalog is empty: no {0} defined")]
    Empty(&'static str),
}
