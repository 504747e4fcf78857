//! Policy definition format.
//!
//! A definition is the serialized form of a rule set, written by hand as JSON
//! or TOML:
//!
//! ```json
//! {
//!   "version": 1,
//!   "rules": [
//!     {
//!       "id": "user-profile",
//!       "match": "users/{userId}",
//!       "allow": {
//!         "create": { "type": "owner", "binding": "userId" },
//!         "delete": { "type": "owner", "binding": "userId" }
//!       }
//!     }
//!   ]
//! }
//! ```
//!
//! `allow.write` grants all three operations. When it is combined with an
//! operation-specific statement the two are OR-ed, since each allow statement
//! grants access on its own.

use serde::{Deserialize, Serialize};

use docrules_core::Operation;

use crate::error::ConfigError;
use crate::matcher::PathPattern;
use crate::predicate::Predicate;
use crate::rule_set::PolicyRule;

/// The only definition schema version this crate understands.
pub const SUPPORTED_VERSION: u32 = 1;

// =============================================================================
// Definition Types
// =============================================================================

/// A complete policy definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyDefinition {
    pub version: u32,

    #[serde(default)]
    pub rules: Vec<RuleDefinition>,
}

/// One rule: a path pattern and the allow statements that apply under it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleDefinition {
    /// Unique identifier, reported in decisions.
    pub id: String,

    /// Path pattern, e.g. `users/{userId}/todos/{todoId}`.
    #[serde(rename = "match")]
    pub pattern: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub allow: AllowStatements,
}

/// Allow statements of a rule, one optional predicate per operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AllowStatements {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create: Option<Predicate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update: Option<Predicate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete: Option<Predicate>,

    /// Applies to create, update and delete.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write: Option<Predicate>,
}

impl AllowStatements {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.create.is_none() && self.update.is_none() && self.delete.is_none() && self.write.is_none()
    }

    /// The effective predicate for one operation.
    #[must_use]
    pub fn effective(&self, operation: Operation) -> Option<Predicate> {
        let specific = match operation {
            Operation::Create => self.create.as_ref(),
            Operation::Update => self.update.as_ref(),
            Operation::Delete => self.delete.as_ref(),
        };
        match (specific, self.write.as_ref()) {
            (Some(specific), Some(write)) => Some(specific.clone().or(write.clone())),
            (Some(only), None) | (None, Some(only)) => Some(only.clone()),
            (None, None) => None,
        }
    }

    fn iter(&self) -> impl Iterator<Item = &Predicate> {
        [&self.create, &self.update, &self.delete, &self.write]
            .into_iter()
            .flatten()
    }
}

// =============================================================================
// Parsing
// =============================================================================

impl PolicyDefinition {
    /// Parse a JSON definition.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON or schema mismatches.
    pub fn from_json_str(input: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(input)?)
    }

    /// Parse a TOML definition.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or schema mismatches.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(input)?)
    }

    /// Check the schema version.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnsupportedVersion`] for any version other than
    /// [`SUPPORTED_VERSION`].
    pub fn check_version(&self) -> Result<(), ConfigError> {
        if self.version == SUPPORTED_VERSION {
            Ok(())
        } else {
            Err(ConfigError::UnsupportedVersion(self.version))
        }
    }
}

// =============================================================================
// Validation
// =============================================================================

impl RuleDefinition {
    /// Validate the rule and turn it into its compiled form.
    ///
    /// `index` is the rule's position in the definition; it names rules whose
    /// id is empty.
    ///
    /// # Errors
    ///
    /// Returns the first problem found with the rule.
    pub fn to_policy_rule(&self, index: usize) -> Result<PolicyRule, ConfigError> {
        if self.id.trim().is_empty() {
            return Err(ConfigError::invalid_rule(
                format!("rules[{index}]"),
                ValidationError::EmptyRuleId,
            ));
        }

        let pattern = PathPattern::parse(&self.pattern)?;

        if self.allow.is_empty() {
            return Err(ConfigError::invalid_rule(&self.id, ValidationError::EmptyAllow));
        }

        for predicate in self.allow.iter() {
            predicate
                .validate(&pattern)
                .map_err(|e| ConfigError::invalid_rule(&self.id, e))?;
        }

        Ok(PolicyRule {
            id: self.id.clone(),
            description: self.description.clone(),
            create: self.allow.effective(Operation::Create),
            update: self.allow.effective(Operation::Update),
            delete: self.allow.effective(Operation::Delete),
            pattern,
        })
    }
}

/// Problems with an individual rule.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Rule id must not be empty")]
    EmptyRuleId,

    #[error("Rule has no allow statement")]
    EmptyAllow,

    #[error("Path variable '{name}' is not bound by pattern '{pattern}'")]
    UnknownBinding { name: String, pattern: String },

    #[error("Invalid length bounds for '{field}': {message}")]
    InvalidLengthBounds { field: String, message: String },

    #[error("Field name must not be empty")]
    EmptyFieldName,

    #[error("'{predicate}' needs at least one field")]
    EmptyFieldList { predicate: &'static str },

    #[error("'{combinator}' needs at least one operand")]
    EmptyCombinator { combinator: &'static str },
}

// =============================================================================
// Tests
// =============================================================================
