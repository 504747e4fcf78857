//! Path pattern matching for policy lookup.
//!
//! A rule is bound to a pattern such as `users/{userId}/todos/{todoId}`: a
//! sequence of literal segments and `{name}` variables. Resolving a concrete
//! [`DocumentPath`] walks a segment trie built from every loaded pattern.
//!
//! # Resolution
//!
//! - Segment counts must match exactly; there is no wildcard suffix.
//! - At each position a literal child is tried before the variable child, so
//!   the most specific pattern wins at the first position where two
//!   candidates differ.
//! - Two patterns with the same shape (same length, same literals, variables
//!   in the same positions) are rejected when the trie is built.
//!
//! # Usage
//!
//! ```ignore
//! use docrules_policy::matcher::{PathMatcher, PathPattern};
//!
//! let users = PathPattern::parse("users/{userId}")?;
//! let mut matcher = PathMatcher::new();
//! matcher.insert(&users, 0)?;
//!
//! let path = DocumentPath::parse("users/alice")?;
//! assert_eq!(matcher.resolve(&path), Some(0));
//! assert_eq!(users.match_path(&path).unwrap().get("userId"), Some("alice"));
//! ```

use std::collections::HashMap;
use std::fmt;

use docrules_core::DocumentPath;
use indexmap::IndexMap;
use serde::Serialize;

use crate::error::ConfigError;

// =============================================================================
// Path Pattern
// =============================================================================

/// One segment of a path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternSegment {
    /// Matches exactly this segment.
    Literal(String),
    /// Matches any one segment and binds it to this name.
    Variable(String),
}

/// A parsed path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<PatternSegment>,
}

impl PathPattern {
    /// Parse a pattern like `users/{userId}/todos/{todoId}`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPattern`] if the pattern is empty, has an
    /// empty segment, an odd number of segments, unbalanced braces, an
    /// invalid or repeated variable name.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let trimmed = raw.trim_matches('/');
        if trimmed.is_empty() {
            return Err(ConfigError::invalid_pattern(raw, "pattern is empty"));
        }

        let mut segments = Vec::new();
        let mut seen: Vec<&str> = Vec::new();

        for part in trimmed.split('/') {
            if part.is_empty() {
                return Err(ConfigError::invalid_pattern(raw, "empty segment"));
            }

            if let Some(inner) = part.strip_prefix('{') {
                let name = inner
                    .strip_suffix('}')
                    .ok_or_else(|| ConfigError::invalid_pattern(raw, "unbalanced braces"))?;
                if !is_variable_name(name) {
                    return Err(ConfigError::invalid_pattern(
                        raw,
                        format!("invalid variable name '{name}'"),
                    ));
                }
                if seen.contains(&name) {
                    return Err(ConfigError::invalid_pattern(
                        raw,
                        format!("variable '{name}' is bound twice"),
                    ));
                }
                seen.push(name);
                segments.push(PatternSegment::Variable(name.to_string()));
            } else if part.contains(['{', '}']) {
                return Err(ConfigError::invalid_pattern(raw, "unbalanced braces"));
            } else {
                segments.push(PatternSegment::Literal(part.to_string()));
            }
        }

        if segments.len() % 2 != 0 {
            return Err(ConfigError::invalid_pattern(
                raw,
                "pattern names a collection, not a document",
            ));
        }

        Ok(Self {
            raw: trimmed.to_string(),
            segments,
        })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub fn segments(&self) -> &[PatternSegment] {
        &self.segments
    }

    /// Names of the variables this pattern binds, in path order.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            PatternSegment::Variable(name) => Some(name.as_str()),
            PatternSegment::Literal(_) => None,
        })
    }

    #[must_use]
    pub fn binds(&self, name: &str) -> bool {
        self.variables().any(|v| v == name)
    }

    /// Match a concrete path against this pattern alone.
    #[must_use]
    pub fn match_path(&self, path: &DocumentPath) -> Option<Bindings> {
        if path.len() != self.segments.len() {
            return None;
        }

        let mut bindings = Bindings::default();
        for (segment, value) in self.segments.iter().zip(path.segments()) {
            match segment {
                PatternSegment::Literal(literal) if literal == value => {}
                PatternSegment::Literal(_) => return None,
                PatternSegment::Variable(name) => {
                    bindings.0.insert(name.clone(), value.clone());
                }
            }
        }
        Some(bindings)
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn is_variable_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// =============================================================================
// Bindings
// =============================================================================

/// Values bound to pattern variables for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Bindings(IndexMap<String, String>);

impl Bindings {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, String)> for Bindings {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

// =============================================================================
// Path Matcher
// =============================================================================

#[derive(Debug, Default)]
struct Node {
    literals: HashMap<String, Node>,
    variable: Option<Box<Node>>,
    terminal: Option<Terminal>,
}

#[derive(Debug)]
struct Terminal {
    rule_index: usize,
    pattern: String,
}

/// Segment trie over all loaded patterns.
///
/// Built once per rule set and read-only afterwards; resolution never
/// allocates and always terminates after at most one literal and one variable
/// branch per segment.
#[derive(Debug, Default)]
pub struct PathMatcher {
    root: Node,
    len: usize,
}

impl PathMatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pattern for the rule at `rule_index`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::AmbiguousPattern`] if a pattern with the same
    /// shape is already registered.
    pub fn insert(&mut self, pattern: &PathPattern, rule_index: usize) -> Result<(), ConfigError> {
        let mut node = &mut self.root;
        for segment in pattern.segments() {
            node = match segment {
                PatternSegment::Literal(literal) => {
                    node.literals.entry(literal.clone()).or_default()
                }
                PatternSegment::Variable(_) => node.variable.get_or_insert_with(Box::default),
            };
        }

        if let Some(existing) = &node.terminal {
            return Err(ConfigError::AmbiguousPattern {
                pattern: pattern.as_str().to_string(),
                existing: existing.pattern.clone(),
            });
        }

        node.terminal = Some(Terminal {
            rule_index,
            pattern: pattern.as_str().to_string(),
        });
        self.len += 1;
        Ok(())
    }

    /// Find the rule index governing `path`, if any.
    #[must_use]
    pub fn resolve(&self, path: &DocumentPath) -> Option<usize> {
        Self::walk(&self.root, path.segments())
    }

    fn walk(node: &Node, segments: &[String]) -> Option<usize> {
        let Some((head, rest)) = segments.split_first() else {
            return node.terminal.as_ref().map(|t| t.rule_index);
        };

        if let Some(child) = node.literals.get(head)
            && let Some(found) = Self::walk(child, rest)
        {
            return Some(found);
        }

        node.variable
            .as_deref()
            .and_then(|child| Self::walk(child, rest))
    }

    /// Number of registered patterns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

// =============================================================================
// Tests
// =============================================================================
