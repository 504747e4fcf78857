//! Load-time error types.
//!
//! Denials are not errors: they are returned as [`Decision::Deny`] values.
//! Only problems with the policy definition itself surface as [`ConfigError`].
//!
//! [`Decision::Deny`]: crate::engine::Decision::Deny

use std::path::PathBuf;

use crate::definition::ValidationError;

/// Errors that reject a policy definition at load time.
///
/// A load that fails with any of these leaves the previously active rule set
/// in place.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The definition file could not be read.
    #[error("Failed to read policy definition {path}: {source}")]
    Io {
        /// Path of the definition file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The definition is not valid JSON/TOML or does not fit the schema.
    #[error("Failed to parse policy definition: {message}")]
    Parse {
        /// Parser diagnostic.
        message: String,
    },

    /// The definition file extension is not `.json` or `.toml`.
    #[error("Unsupported policy definition format: {path}")]
    UnsupportedFormat {
        /// Path of the definition file.
        path: PathBuf,
    },

    /// The definition declares a schema version this engine does not know.
    #[error("Unsupported policy definition version {0} (expected 1)")]
    UnsupportedVersion(u32),

    /// A `match` pattern is malformed.
    #[error("Invalid path pattern '{pattern}': {message}")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// Why it was rejected.
        message: String,
    },

    /// Two rules could match the same concrete path with equal specificity.
    #[error("Ambiguous path patterns: '{pattern}' matches the same paths as '{existing}'")]
    AmbiguousPattern {
        /// Pattern being added.
        pattern: String,
        /// Previously declared pattern with the same shape.
        existing: String,
    },

    /// Two rules share an id.
    #[error("Duplicate rule id '{0}'")]
    DuplicateRuleId(String),

    /// A rule failed validation.
    #[error("Invalid rule '{rule_id}': {source}")]
    InvalidRule {
        /// Id of the rule.
        rule_id: String,
        /// What is wrong with it.
        #[source]
        source: ValidationError,
    },
}

impl ConfigError {
    /// Creates a new `Parse` error.
    #[must_use]
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidPattern` error.
    #[must_use]
    pub fn invalid_pattern(pattern: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            message: message.into(),
        }
    }

    /// Creates a new `InvalidRule` error.
    #[must_use]
    pub fn invalid_rule(rule_id: impl Into<String>, source: ValidationError) -> Self {
        Self::InvalidRule {
            rule_id: rule_id.into(),
            source,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::parse(err.to_string())
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        Self::parse(err.to_string())
    }
}
