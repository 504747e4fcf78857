//! Compiled, immutable rule sets.

use std::collections::HashSet;

use docrules_core::{DocumentPath, Operation, Timestamp, now_utc};

use crate::definition::PolicyDefinition;
use crate::error::ConfigError;
use crate::matcher::{Bindings, PathMatcher, PathPattern};
use crate::predicate::Predicate;

// =============================================================================
// Policy Rule
// =============================================================================

/// A validated rule, ready for evaluation.
///
/// `write` statements have already been folded into the per-operation
/// predicates.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyRule {
    pub id: String,
    pub description: Option<String>,
    pub pattern: PathPattern,
    pub create: Option<Predicate>,
    pub update: Option<Predicate>,
    pub delete: Option<Predicate>,
}

impl PolicyRule {
    /// The predicate governing `operation`, if the rule grants it at all.
    #[must_use]
    pub fn predicate_for(&self, operation: Operation) -> Option<&Predicate> {
        match operation {
            Operation::Create => self.create.as_ref(),
            Operation::Update => self.update.as_ref(),
            Operation::Delete => self.delete.as_ref(),
        }
    }

    /// Operations this rule can allow.
    #[must_use]
    pub fn operations(&self) -> Vec<Operation> {
        Operation::ALL
            .into_iter()
            .filter(|op| self.predicate_for(*op).is_some())
            .collect()
    }
}

// =============================================================================
// Rule Set
// =============================================================================

/// All rules of one loaded definition plus the path matcher built over them.
#[derive(Debug)]
pub struct RuleSet {
    rules: Vec<PolicyRule>,
    matcher: PathMatcher,
    version: u64,
    loaded_at: Timestamp,
}

impl RuleSet {
    /// A rule set with no rules; denies every request.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            rules: Vec::new(),
            matcher: PathMatcher::new(),
            version: 0,
            loaded_at: now_utc(),
        }
    }

    /// Validate and compile a definition.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found; nothing is partially built.
    pub fn compile(definition: &PolicyDefinition, version: u64) -> Result<Self, ConfigError> {
        definition.check_version()?;

        let mut rules = Vec::with_capacity(definition.rules.len());
        let mut matcher = PathMatcher::new();
        let mut ids = HashSet::new();

        for (index, rule_def) in definition.rules.iter().enumerate() {
            let rule = rule_def.to_policy_rule(index)?;

            if !ids.insert(rule.id.clone()) {
                return Err(ConfigError::DuplicateRuleId(rule.id));
            }

            matcher.insert(&rule.pattern, rules.len())?;
            rules.push(rule);
        }

        Ok(Self {
            rules,
            matcher,
            version,
            loaded_at: now_utc(),
        })
    }

    /// Find the rule governing `path` and bind its variables.
    #[must_use]
    pub fn resolve(&self, path: &DocumentPath) -> Option<(&PolicyRule, Bindings)> {
        let rule = self.rules.get(self.matcher.resolve(path)?)?;
        let bindings = rule.pattern.match_path(path)?;
        Some((rule, bindings))
    }

    #[must_use]
    pub fn rules(&self) -> &[PolicyRule] {
        &self.rules
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&PolicyRule> {
        self.rules.iter().find(|r| r.id == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Store version at which this set was loaded.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    #[must_use]
    pub fn loaded_at(&self) -> Timestamp {
        self.loaded_at
    }
}
