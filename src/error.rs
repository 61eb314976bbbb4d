//! Unified error type for drift-audit.

use thiserror::Error;

/// Unified error type for all drift-audit operations.
#[derive(Error, Debug)]
pub enum DriftError {
    /// Malformed input (missing identifiers, invalid field values).
    #[error("Validation failed for {entity}: {message}")]
    Validation {
        entity: &'static str,
        message: String,
    },

    /// A row looked up explicitly does not exist.
    ///
    /// A missing baseline during detection is not reported through this
    /// variant; it triggers automatic-baseline creation instead.
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// Persistence layer failure.
    #[error("Store operation '{operation}' failed: {message}")]
    Store {
        operation: &'static str,
        message: String,
    },

    /// A single rule definition could not be evaluated. Fatal only to that
    /// rule; evaluation of the remaining rules continues.
    #[error("Rule {rule_id} failed to evaluate: {message}")]
    RuleEvaluation { rule_id: String, message: String },

    /// Resource provider failure for a single resource.
    #[error("Provider error for resource {resource_id}: {message}")]
    Provider {
        resource_id: String,
        message: String,
    },

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parse error in a rule definition file.
    #[error("Rule definition parse error: {0}")]
    RuleParse(#[from] serde_yaml::Error),
}

impl DriftError {
    /// Create a validation error.
    pub fn validation(entity: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            entity,
            message: message.into(),
        }
    }

    /// Create a not-found error.
    pub fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            key: key.into(),
        }
    }

    /// Create a store error.
    pub fn store(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Store {
            operation,
            message: message.into(),
        }
    }

    /// Create a rule evaluation error.
    pub fn rule(rule_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RuleEvaluation {
            rule_id: rule_id.into(),
            message: message.into(),
        }
    }

    /// Create a provider error.
    pub fn provider(resource_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            resource_id: resource_id.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for drift-audit operations.
pub type Result<T> = std::result::Result<T, DriftError>;
