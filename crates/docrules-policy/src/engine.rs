//! Write authorization.
//!
//! The [`PolicyEvaluator`] turns a write request and an auth context into a
//! [`Decision`]. It is deny-by-default: a request is allowed only when a rule
//! matches its path, that rule grants the requested operation, and the
//! operation's predicate holds.
//!
//! # Evaluation order
//!
//! 1. Request shape (`malformed-request`)
//! 2. Path lookup (`no-matching-policy`)
//! 3. Operation lookup on the matched rule (`operation-not-permitted`)
//! 4. Field diff
//! 5. Predicate (`policy-predicate-failed`)
//!
//! Evaluation is synchronous and reads only the request, the auth context and
//! one rule set snapshot, so any number of requests can be evaluated in
//! parallel.
//!
//! # Example
//!
//! ```ignore
//! use docrules_policy::{PolicyEvaluator, PolicyStore};
//!
//! let evaluator = PolicyEvaluator::new(Arc::new(store));
//! match evaluator.evaluate(&request, &auth) {
//!     Decision::Allow => commit(request),
//!     Decision::Deny(reason) => reject(reason.code()),
//! }
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use docrules_core::{AuthContext, WriteRequest};
use serde::Serialize;

use crate::context::EvaluationContext;
use crate::diff::FieldDiff;
use crate::matcher::Bindings;
use crate::predicate::Violation;
use crate::rule_set::RuleSet;
use crate::store::PolicyStore;

// =============================================================================
// Decision
// =============================================================================

/// Outcome of one evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", content = "reason", rename_all = "camelCase")]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    /// Returns `true` if the write is allowed.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Returns `true` if the write is denied.
    #[must_use]
    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Deny(_))
    }

    /// Get the deny reason if the write was denied.
    #[must_use]
    pub fn deny_reason(&self) -> Option<&DenyReason> {
        match self {
            Self::Deny(reason) => Some(reason),
            Self::Allow => None,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allow => f.write_str("allow"),
            Self::Deny(reason) => write!(f, "deny ({}): {}", reason.code(), reason.message),
        }
    }
}

// =============================================================================
// Deny Reason
// =============================================================================

/// Why a write was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DenyKind {
    NoMatchingPolicy,
    OperationNotPermitted,
    PolicyPredicateFailed,
    MalformedRequest,
}

impl DenyKind {
    /// Stable error code for programmatic handling.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoMatchingPolicy => "no-matching-policy",
            Self::OperationNotPermitted => "operation-not-permitted",
            Self::PolicyPredicateFailed => "policy-predicate-failed",
            Self::MalformedRequest => "malformed-request",
        }
    }
}

/// Reason for a denial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DenyReason {
    /// Error code for programmatic handling.
    #[serde(rename = "code")]
    pub kind: DenyKind,

    /// Human-readable error message.
    pub message: String,

    /// ID of the rule that matched the path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,

    /// The sub-predicate that did not hold.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub violation: Option<Violation>,
}

impl DenyReason {
    /// Create a denial reason for a path no rule matches.
    #[must_use]
    pub fn no_matching_policy(path: impl fmt::Display) -> Self {
        Self {
            kind: DenyKind::NoMatchingPolicy,
            message: format!("No rule matches '{path}'"),
            rule_id: None,
            violation: None,
        }
    }

    /// Create a denial reason for an operation the matched rule does not grant.
    #[must_use]
    pub fn operation_not_permitted(rule_id: &str, operation: impl fmt::Display) -> Self {
        Self {
            kind: DenyKind::OperationNotPermitted,
            message: format!("Rule '{rule_id}' does not allow {operation}"),
            rule_id: Some(rule_id.to_string()),
            violation: None,
        }
    }

    /// Create a denial reason from a failed predicate.
    #[must_use]
    pub fn predicate_failed(rule_id: &str, violation: Violation) -> Self {
        Self {
            kind: DenyKind::PolicyPredicateFailed,
            message: format!("Rule '{rule_id}' denied the write: {}", violation.message),
            rule_id: Some(rule_id.to_string()),
            violation: Some(violation),
        }
    }

    /// Create a denial reason for a request with an invalid shape.
    #[must_use]
    pub fn malformed_request(message: impl Into<String>) -> Self {
        Self {
            kind: DenyKind::MalformedRequest,
            message: message.into(),
            rule_id: None,
            violation: None,
        }
    }

    #[must_use]
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }
}

// =============================================================================
// Evaluation Result
// =============================================================================

/// A decision plus what led to it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    /// The final decision.
    pub decision: Decision,

    /// Rule that matched the path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,

    /// Path variables bound by the matched rule.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bindings: Option<Bindings>,

    /// Fields added, removed or changed by the write.
    pub affected_keys: Vec<String>,

    /// Version of the rule set the request was evaluated against.
    pub policy_version: u64,

    /// Time taken to evaluate (milliseconds).
    pub evaluation_time_ms: f64,
}

// =============================================================================
// Policy Evaluator
// =============================================================================

/// Evaluates write requests against the rules in a [`PolicyStore`].
#[derive(Debug, Clone)]
pub struct PolicyEvaluator {
    store: Arc<PolicyStore>,
}

impl PolicyEvaluator {
    #[must_use]
    pub fn new(store: Arc<PolicyStore>) -> Self {
        Self { store }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<PolicyStore> {
        &self.store
    }

    /// Decide whether `request` may be committed.
    #[must_use]
    pub fn evaluate(&self, request: &WriteRequest, auth: &AuthContext) -> Decision {
        self.evaluate_with_audit(request, auth).decision
    }

    /// Like [`evaluate`](Self::evaluate), with details for logging and tooling.
    #[must_use]
    pub fn evaluate_with_audit(&self, request: &WriteRequest, auth: &AuthContext) -> EvaluationResult {
        let start = Instant::now();
        let rules = self.store.snapshot();

        let mut result = evaluate_against(&rules, request, auth);
        result.evaluation_time_ms = start.elapsed().as_secs_f64() * 1000.0;

        match &result.decision {
            Decision::Allow => tracing::debug!(
                path = %request.path,
                operation = %request.operation,
                uid = auth.uid().unwrap_or("-"),
                rule_id = result.rule_id.as_deref().unwrap_or("-"),
                policy_version = result.policy_version,
                "Write allowed"
            ),
            Decision::Deny(reason) => tracing::debug!(
                path = %request.path,
                operation = %request.operation,
                uid = auth.uid().unwrap_or("-"),
                rule_id = result.rule_id.as_deref().unwrap_or("-"),
                code = reason.code(),
                reason = %reason.message,
                policy_version = result.policy_version,
                "Write denied"
            ),
        }

        result
    }
}

fn evaluate_against(rules: &RuleSet, request: &WriteRequest, auth: &AuthContext) -> EvaluationResult {
    let mut result = EvaluationResult {
        decision: Decision::Allow,
        rule_id: None,
        bindings: None,
        affected_keys: Vec::new(),
        policy_version: rules.version(),
        evaluation_time_ms: 0.0,
    };

    if let Err(e) = request.validate() {
        result.decision = Decision::Deny(DenyReason::malformed_request(e.to_string()));
        return result;
    }

    let Some((rule, bindings)) = rules.resolve(&request.path) else {
        result.decision = Decision::Deny(DenyReason::no_matching_policy(&request.path));
        return result;
    };
    result.rule_id = Some(rule.id.clone());

    let Some(predicate) = rule.predicate_for(request.operation) else {
        result.decision = Decision::Deny(DenyReason::operation_not_permitted(
            &rule.id,
            request.operation,
        ));
        result.bindings = Some(bindings);
        return result;
    };

    let diff = FieldDiff::compute(request.old_document.as_ref(), request.new_document.as_ref());
    result.affected_keys = diff
        .affected_keys()
        .into_iter()
        .map(str::to_string)
        .collect();

    let ctx = EvaluationContext {
        operation: request.operation,
        auth,
        bindings: &bindings,
        old_document: request.old_document.as_ref(),
        new_document: request.new_document.as_ref(),
        diff: &diff,
    };

    if let Err(violation) = predicate.check(&ctx) {
        result.decision = Decision::Deny(DenyReason::predicate_failed(&rule.id, violation));
    }
    result.bindings = Some(bindings);
    result
}

// =============================================================================
// Tests
// =============================================================================
