//! # docrules-policy
//!
//! Write-authorization policy engine for hierarchical document stores.
//!
//! Given a proposed write and the identity behind it, the engine decides
//! whether the write may be committed. Decisions are deny-by-default.
//!
//! ## Modules
//!
//! - [`matcher`] - path patterns and the segment trie that resolves them
//! - [`diff`] - per-field diff between the stored and proposed document
//! - [`predicate`] - the predicate expression tree and its evaluation
//! - [`definition`] - the serialized policy format and rule validation
//! - [`rule_set`] - compiled, immutable rule sets
//! - [`store`] - the atomically swappable active rule set
//! - [`engine`] - the evaluator and its decisions
//! - [`loader`] - reading definitions from JSON or TOML files
//! - [`watch`] - hot reload of a definition file

pub mod context;
pub mod definition;
pub mod diff;
pub mod engine;
pub mod error;
pub mod loader;
pub mod matcher;
pub mod predicate;
pub mod rule_set;
pub mod store;
pub mod watch;

pub use context::EvaluationContext;
pub use definition::{AllowStatements, PolicyDefinition, RuleDefinition, ValidationError};
pub use diff::{FieldChange, FieldDiff};
pub use engine::{Decision, DenyKind, DenyReason, EvaluationResult, PolicyEvaluator};
pub use error::ConfigError;
pub use loader::{DefinitionFormat, load_definition_file, reload_from_file};
pub use matcher::{Bindings, PathMatcher, PathPattern, PatternSegment};
pub use predicate::{
    CompareOp, DocumentState, Operand, Predicate, TypeCheck, Violation, ViolationKind,
};
pub use rule_set::{PolicyRule, RuleSet};
pub use store::PolicyStore;
pub use watch::{PolicyFileWatcher, ReloadOutcome, ReloadStats, WatchError, WatchHandle};
