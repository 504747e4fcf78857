//! The predicate expression tree.
//!
//! A rule's `allow` statements are trees of [`Predicate`] nodes. The set of
//! node types is closed: every check a policy can express is one of the
//! variants below, and evaluation is a plain recursive walk with no string
//! interpretation at request time.
//!
//! # Wire format
//!
//! Predicates are internally tagged by `type`; operands by `source`:
//!
//! ```json
//! {
//!   "type": "and",
//!   "all": [
//!     { "type": "owner", "binding": "userId" },
//!     { "type": "stringLength", "field": "name", "max": 20, "optional": true },
//!     {
//!       "type": "compare",
//!       "left": { "source": "newField", "field": "isCompleted" },
//!       "op": "==",
//!       "right": { "source": "literal", "value": false }
//!     }
//!   ]
//! }
//! ```
//!
//! # Outcomes
//!
//! [`Predicate::check`] returns `Ok(())` or a [`Violation`]. A violation is
//! either `Failed` (the condition is false) or `Undefined` (it could not be
//! evaluated, e.g. it compares a field that does not exist). `not` turns a
//! failure into a pass but propagates an undefined result unchanged, so a
//! negated check on missing data still denies.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;

use docrules_core::{FieldPath, FieldValue, ValueKind};
use serde::{Deserialize, Serialize};

use crate::context::EvaluationContext;
use crate::definition::ValidationError;
use crate::matcher::PathPattern;

// =============================================================================
// Predicate
// =============================================================================

/// One node of a rule's boolean expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Predicate {
    /// Always true or always false.
    Const { value: bool },

    /// The request carries an identity.
    Authenticated,

    /// The authenticated uid equals the value bound to a path variable.
    Owner { binding: String },

    /// Compare two operands.
    Compare {
        left: Operand,
        op: CompareOp,
        right: Operand,
    },

    /// Every listed field exists in the chosen document.
    HasAll {
        fields: Vec<FieldPath>,
        #[serde(default)]
        document: DocumentState,
    },

    /// The proposed document has no top-level keys outside this list.
    HasOnly { fields: Vec<String> },

    /// The field is not present in the proposed document. An explicit `null`
    /// counts as present.
    Absent { field: FieldPath },

    /// The field in the proposed document has the given type.
    FieldType {
        field: FieldPath,
        kind: TypeCheck,
        #[serde(default)]
        optional: bool,
    },

    /// The field in the proposed document is a string whose length, counted
    /// in characters, lies within the inclusive bounds.
    StringLength {
        field: FieldPath,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<usize>,
        #[serde(default)]
        optional: bool,
    },

    /// The field in the proposed document is the server-timestamp sentinel.
    ServerTimestamp { field: FieldPath },

    /// The field has the same value (or the same absence) before and after.
    Unchanged { field: FieldPath },

    /// If `field` is affected by the write, every field in `requires` must be
    /// affected too and hold a non-null value afterwards.
    CoUpdate {
        field: String,
        requires: Vec<String>,
    },

    /// The write affects no top-level keys outside this list.
    OnlyAffects { fields: Vec<String> },

    And { all: Vec<Predicate> },

    Or { any: Vec<Predicate> },

    Not { predicate: Box<Predicate> },
}

impl Predicate {
    /// Logical OR of two predicates, flattening nested `or` nodes.
    #[must_use]
    pub fn or(self, other: Predicate) -> Predicate {
        let mut any = match self {
            Predicate::Or { any } => any,
            single => vec![single],
        };
        match other {
            Predicate::Or { any: more } => any.extend(more),
            single => any.push(single),
        }
        Predicate::Or { any }
    }

    /// Evaluate against one request.
    ///
    /// # Errors
    ///
    /// Returns the [`Violation`] of the first sub-predicate that did not hold.
    pub fn check(&self, ctx: &EvaluationContext<'_>) -> Result<(), Violation> {
        match self {
            Self::Const { value } => {
                if *value {
                    Ok(())
                } else {
                    Err(self.failed("constant false"))
                }
            }

            Self::Authenticated => {
                if ctx.auth.is_authenticated() {
                    Ok(())
                } else {
                    Err(self.failed("request is not authenticated"))
                }
            }

            Self::Owner { binding } => {
                let Some(bound) = ctx.bindings.get(binding) else {
                    return Err(self.undefined(format!("path variable '{binding}' is not bound")));
                };
                match ctx.auth.uid() {
                    None if ctx.auth.is_authenticated() => {
                        Err(self.failed("authenticated request carries no uid"))
                    }
                    None => Err(self.failed("request is not authenticated")),
                    Some(uid) if uid == bound => Ok(()),
                    Some(uid) => Err(self.failed(format!(
                        "uid '{uid}' does not own '{binding}' = '{bound}'"
                    ))),
                }
            }

            Self::Compare { left, op, right } => {
                let lhs = left
                    .resolve(ctx)
                    .ok_or_else(|| self.undefined(format!("{left} is undefined")))?;
                let rhs = right
                    .resolve(ctx)
                    .ok_or_else(|| self.undefined(format!("{right} is undefined")))?;
                match op.apply(&lhs, &rhs) {
                    Some(true) => Ok(()),
                    Some(false) => Err(self.failed(format!("{lhs} {op} {rhs} is false"))),
                    None => Err(self.undefined(format!("cannot order {lhs} and {rhs}"))),
                }
            }

            Self::HasAll { fields, document } => {
                let Some(doc) = ctx.document(*document) else {
                    return Err(self.failed(format!("{document} document does not exist")));
                };
                match fields.iter().find(|f| !doc.contains_path(f)) {
                    Some(missing) => Err(self.failed(format!("missing required field '{missing}'"))),
                    None => Ok(()),
                }
            }

            Self::HasOnly { fields } => {
                let Some(doc) = ctx.new_document else {
                    return Err(self.undefined("request has no new document"));
                };
                match doc.keys().find(|key| !fields.iter().any(|f| f.as_str() == *key)) {
                    Some(extra) => Err(self.failed(format!("field '{extra}' is not allowed"))),
                    None => Ok(()),
                }
            }

            Self::Absent { field } => {
                if ctx.new_value(field).is_some() {
                    Err(self.failed(format!("field '{field}' is present")))
                } else {
                    Ok(())
                }
            }

            Self::FieldType {
                field,
                kind,
                optional,
            } => match ctx.new_value(field) {
                None if *optional => Ok(()),
                None => Err(self.failed(format!("missing required field '{field}'"))),
                Some(value) if kind.accepts(value) => Ok(()),
                Some(value) => Err(self.failed(format!(
                    "field '{field}' is {}, expected {kind}",
                    value.kind()
                ))),
            },

            Self::StringLength {
                field,
                min,
                max,
                optional,
            } => match ctx.new_value(field) {
                None if *optional => Ok(()),
                None => Err(self.failed(format!("missing required field '{field}'"))),
                Some(value) => {
                    let Some(text) = value.as_str() else {
                        return Err(self.failed(format!(
                            "field '{field}' is {}, expected string",
                            value.kind()
                        )));
                    };
                    let len = text.chars().count();
                    if min.is_some_and(|min| len < min) || max.is_some_and(|max| len > max) {
                        Err(self.failed(format!(
                            "field '{field}' has length {len}, outside {}",
                            LengthBounds(*min, *max)
                        )))
                    } else {
                        Ok(())
                    }
                }
            },

            Self::ServerTimestamp { field } => match ctx.new_value(field) {
                Some(value) if value.is_server_timestamp() => Ok(()),
                Some(value) => Err(self.failed(format!(
                    "field '{field}' is {value}, not the server timestamp"
                ))),
                None => Err(self.failed(format!("missing required field '{field}'"))),
            },

            Self::Unchanged { field } => {
                let unchanged = if field.is_top_level() {
                    !ctx.diff.affects(field.root())
                } else {
                    ctx.old_value(field) == ctx.new_value(field)
                };
                if unchanged {
                    Ok(())
                } else {
                    Err(self.failed(format!("field '{field}' was modified")))
                }
            }

            Self::CoUpdate { field, requires } => {
                if !ctx.diff.affects(field) {
                    return Ok(());
                }
                for required in requires {
                    if !ctx.diff.affects(required) {
                        return Err(self.failed(format!(
                            "'{field}' changed without '{required}'"
                        )));
                    }
                    let is_set = ctx
                        .new_document
                        .and_then(|doc| doc.get(required))
                        .is_some_and(|value| !value.is_null());
                    if !is_set {
                        return Err(self.failed(format!(
                            "'{field}' changed but '{required}' was cleared"
                        )));
                    }
                }
                Ok(())
            }

            Self::OnlyAffects { fields } => {
                match ctx
                    .diff
                    .affected_keys()
                    .into_iter()
                    .find(|key| !fields.iter().any(|f| f.as_str() == *key))
                {
                    Some(extra) => Err(self.failed(format!("field '{extra}' may not be modified"))),
                    None => Ok(()),
                }
            }

            Self::And { all } => all.iter().try_for_each(|p| p.check(ctx)),

            Self::Or { any } => {
                let mut last = None;
                for p in any {
                    match p.check(ctx) {
                        Ok(()) => return Ok(()),
                        Err(violation) => last = Some(violation),
                    }
                }
                Err(last.unwrap_or_else(|| self.failed("no alternative holds")))
            }

            Self::Not { predicate } => match predicate.check(ctx) {
                Ok(()) => Err(self.failed(format!("{predicate} holds"))),
                Err(v) if v.kind == ViolationKind::Undefined => Err(v),
                Err(_) => Ok(()),
            },
        }
    }

    /// Static checks against the pattern the predicate is attached to.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found in the tree.
    pub fn validate(&self, pattern: &PathPattern) -> Result<(), ValidationError> {
        match self {
            Self::Const { .. }
            | Self::Authenticated
            | Self::Absent { .. }
            | Self::FieldType { .. }
            | Self::HasAll { .. }
            | Self::ServerTimestamp { .. }
            | Self::Unchanged { .. } => Ok(()),

            Self::Owner { binding } => check_binding(binding, pattern),

            Self::Compare { left, right, .. } => {
                left.validate(pattern)?;
                right.validate(pattern)
            }

            Self::HasOnly { fields } | Self::OnlyAffects { fields } => {
                fields.iter().try_for_each(|f| check_field_name(f))
            }

            Self::StringLength {
                field, min, max, ..
            } => match (min, max) {
                (None, None) => Err(ValidationError::InvalidLengthBounds {
                    field: field.to_string(),
                    message: "at least one of min or max is required".to_string(),
                }),
                (_, Some(0)) => Err(ValidationError::InvalidLengthBounds {
                    field: field.to_string(),
                    message: "max must be greater than zero".to_string(),
                }),
                (Some(lo), Some(hi)) if lo > hi => Err(ValidationError::InvalidLengthBounds {
                    field: field.to_string(),
                    message: format!("min {lo} is greater than max {hi}"),
                }),
                _ => Ok(()),
            },

            Self::CoUpdate { field, requires } => {
                check_field_name(field)?;
                if requires.is_empty() {
                    return Err(ValidationError::EmptyFieldList {
                        predicate: "coUpdate",
                    });
                }
                requires.iter().try_for_each(|f| check_field_name(f))
            }

            Self::And { all } => {
                if all.is_empty() {
                    return Err(ValidationError::EmptyCombinator { combinator: "and" });
                }
                all.iter().try_for_each(|p| p.validate(pattern))
            }

            Self::Or { any } => {
                if any.is_empty() {
                    return Err(ValidationError::EmptyCombinator { combinator: "or" });
                }
                any.iter().try_for_each(|p| p.validate(pattern))
            }

            Self::Not { predicate } => predicate.validate(pattern),
        }
    }

    fn failed(&self, message: impl Into<String>) -> Violation {
        Violation::new(ViolationKind::Failed, self, message)
    }

    fn undefined(&self, message: impl Into<String>) -> Violation {
        Violation::new(ViolationKind::Undefined, self, message)
    }
}

fn check_binding(name: &str, pattern: &PathPattern) -> Result<(), ValidationError> {
    if pattern.binds(name) {
        Ok(())
    } else {
        Err(ValidationError::UnknownBinding {
            name: name.to_string(),
            pattern: pattern.to_string(),
        })
    }
}

fn check_field_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        Err(ValidationError::EmptyFieldName)
    } else {
        Ok(())
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Const { value } => write!(f, "{value}"),
            Self::Authenticated => f.write_str("request.auth != null"),
            Self::Owner { binding } => write!(f, "request.auth.uid == {binding}"),
            Self::Compare { left, op, right } => write!(f, "{left} {op} {right}"),
            Self::HasAll { fields, document } => {
                write!(f, "{}.keys().hasAll({})", document.data(), FieldList(fields))
            }
            Self::HasOnly { fields } => {
                write!(f, "request.resource.data.keys().hasOnly({})", FieldList(fields))
            }
            Self::Absent { field } => write!(f, "!('{field}' in request.resource.data)"),
            Self::FieldType {
                field,
                kind,
                optional,
            } => {
                write!(f, "request.resource.data.{field} is {kind}")?;
                if *optional {
                    f.write_str(" (optional)")?;
                }
                Ok(())
            }
            Self::StringLength {
                field,
                min,
                max,
                optional,
            } => {
                write!(
                    f,
                    "request.resource.data.{field}.size() in {}",
                    LengthBounds(*min, *max)
                )?;
                if *optional {
                    f.write_str(" (optional)")?;
                }
                Ok(())
            }
            Self::ServerTimestamp { field } => {
                write!(f, "request.resource.data.{field} == request.time")
            }
            Self::Unchanged { field } => {
                write!(f, "request.resource.data.{field} == resource.data.{field}")
            }
            Self::CoUpdate { field, requires } => write!(
                f,
                "affectedKeys().hasAny(['{field}']) implies affectedKeys().hasAll({})",
                FieldList(requires)
            ),
            Self::OnlyAffects { fields } => {
                write!(f, "affectedKeys().hasOnly({})", FieldList(fields))
            }
            Self::And { all } => write_joined(f, all, " && "),
            Self::Or { any } => write_joined(f, any, " || "),
            Self::Not { predicate } => write!(f, "!({predicate})"),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, items: &[Predicate], sep: &str) -> fmt::Result {
    f.write_str("(")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{item}")?;
    }
    f.write_str(")")
}

struct FieldList<'a, T>(&'a [T]);

impl<T: fmt::Display> fmt::Display for FieldList<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, item) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "'{item}'")?;
        }
        f.write_str("]")
    }
}

struct LengthBounds(Option<usize>, Option<usize>);

impl fmt::Display for LengthBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.0, self.1) {
            (Some(lo), Some(hi)) => write!(f, "[{lo}, {hi}]"),
            (Some(lo), None) => write!(f, "[{lo}, ..)"),
            (None, Some(hi)) => write!(f, "[0, {hi}]"),
            (None, None) => f.write_str("[0, ..)"),
        }
    }
}

// =============================================================================
// Operands
// =============================================================================

/// A value a comparison reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "camelCase")]
pub enum Operand {
    /// `request.auth.uid`
    AuthUid,
    /// A token claim of the authenticated identity.
    AuthClaim { claim: String },
    /// A path variable.
    Binding { name: String },
    /// A field of the proposed document.
    NewField { field: FieldPath },
    /// A field of the stored document.
    OldField { field: FieldPath },
    Literal { value: FieldValue },
    /// The commit time of the write; resolves to the server-timestamp sentinel.
    RequestTime,
}

impl Operand {
    /// Resolve to a value, or `None` if the referenced data does not exist.
    #[must_use]
    pub fn resolve<'r>(&'r self, ctx: &EvaluationContext<'r>) -> Option<Cow<'r, FieldValue>> {
        match self {
            Self::AuthUid => ctx
                .auth
                .uid()
                .map(|uid| Cow::Owned(FieldValue::from(uid))),
            Self::AuthClaim { claim } => ctx.auth.claim(claim).map(Cow::Borrowed),
            Self::Binding { name } => ctx
                .bindings
                .get(name)
                .map(|value| Cow::Owned(FieldValue::from(value))),
            Self::NewField { field } => ctx.new_value(field).map(Cow::Borrowed),
            Self::OldField { field } => ctx.old_value(field).map(Cow::Borrowed),
            Self::Literal { value } => Some(Cow::Borrowed(value)),
            Self::RequestTime => Some(Cow::Owned(FieldValue::server_timestamp())),
        }
    }

    fn validate(&self, pattern: &PathPattern) -> Result<(), ValidationError> {
        match self {
            Self::Binding { name } => check_binding(name, pattern),
            Self::AuthClaim { claim } => check_field_name(claim),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AuthUid => f.write_str("request.auth.uid"),
            Self::AuthClaim { claim } => write!(f, "request.auth.token.{claim}"),
            Self::Binding { name } => f.write_str(name),
            Self::NewField { field } => write!(f, "request.resource.data.{field}"),
            Self::OldField { field } => write!(f, "resource.data.{field}"),
            Self::Literal { value } => write!(f, "{value}"),
            Self::RequestTime => f.write_str("request.time"),
        }
    }
}

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
}

impl CompareOp {
    /// `None` when an ordering operator is applied to incomparable values.
    #[must_use]
    pub fn apply(self, left: &FieldValue, right: &FieldValue) -> Option<bool> {
        match self {
            Self::Eq => Some(left == right),
            Self::Ne => Some(left != right),
            Self::Lt => Some(left.compare(right)? == Ordering::Less),
            Self::Le => Some(left.compare(right)? != Ordering::Greater),
            Self::Gt => Some(left.compare(right)? == Ordering::Greater),
            Self::Ge => Some(left.compare(right)? != Ordering::Less),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type accepted by a `fieldType` check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeCheck {
    String,
    Bool,
    Int,
    Float,
    /// Int or float.
    Number,
    /// A literal timestamp or the server-timestamp sentinel.
    Timestamp,
    Map,
    List,
    Null,
}

impl TypeCheck {
    #[must_use]
    pub fn accepts(self, value: &FieldValue) -> bool {
        let kind = value.kind();
        match self {
            Self::String => kind == ValueKind::String,
            Self::Bool => kind == ValueKind::Boolean,
            Self::Int => kind == ValueKind::Integer,
            Self::Float => kind == ValueKind::Double,
            Self::Number => matches!(kind, ValueKind::Integer | ValueKind::Double),
            Self::Timestamp => matches!(kind, ValueKind::Timestamp | ValueKind::ServerTimestamp),
            Self::Map => kind == ValueKind::Map,
            Self::List => kind == ValueKind::Array,
            Self::Null => kind == ValueKind::Null,
        }
    }
}

impl fmt::Display for TypeCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Number => "number",
            Self::Timestamp => "timestamp",
            Self::Map => "map",
            Self::List => "list",
            Self::Null => "null",
        };
        f.write_str(name)
    }
}

/// Which side of the write a check reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentState {
    /// The proposed document (`request.resource`).
    #[default]
    New,
    /// The stored document (`resource`).
    Old,
}

impl DocumentState {
    fn data(self) -> &'static str {
        match self {
            Self::New => "request.resource.data",
            Self::Old => "resource.data",
        }
    }
}

impl fmt::Display for DocumentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::New => f.write_str("new"),
            Self::Old => f.write_str("old"),
        }
    }
}

// =============================================================================
// Violation
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ViolationKind {
    /// The condition evaluated to false.
    Failed,
    /// The condition could not be evaluated.
    Undefined,
}

/// The sub-predicate that caused a denial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub kind: ViolationKind,
    /// Rendered form of the failing node.
    pub predicate: String,
    pub message: String,
}

impl Violation {
    fn new(kind: ViolationKind, predicate: &Predicate, message: impl Into<String>) -> Self {
        Self {
            kind,
            predicate: predicate.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.predicate, self.message)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::FieldDiff;
    use crate::matcher::Bindings;
    use docrules_core::{AuthContext, Document, Operation};
    use serde_json::json;

    fn field(raw: &str) -> FieldPath {
        FieldPath::parse(raw).unwrap()
    }

    fn bindings(user: &str) -> Bindings {
        [("userId".to_string(), user.to_string())].into_iter().collect()
    }

    fn parse(value: serde_json::Value) -> Predicate {
        serde_json::from_value(value).unwrap()
    }

    /// Run `predicate` against an update from `old` to `new`.
    fn check_update(
        predicate: &Predicate,
        auth: &AuthContext,
        old: Option<&Document>,
        new: Option<&Document>,
    ) -> Result<(), Violation> {
        let bindings = bindings("alice");
        let diff = FieldDiff::compute(old, new);
        let operation = match (old, new) {
            (None, _) => Operation::Create,
            (_, None) => Operation::Delete,
            _ => Operation::Update,
        };
        let ctx = EvaluationContext {
            operation,
            auth,
            bindings: &bindings,
            old_document: old,
            new_document: new,
            diff: &diff,
        };
        predicate.check(&ctx)
    }

    fn check_create(predicate: &Predicate, new: &Document) -> Result<(), Violation> {
        check_update(predicate, &AuthContext::authenticated("alice"), None, Some(new))
    }

    // -------------------------------------------------------------------------
    // Parsing and display
    // -------------------------------------------------------------------------

    #[test]
    fn test_parse_nested_tree() {
        let predicate = parse(json!({
            "type": "and",
            "all": [
                { "type": "owner", "binding": "userId" },
                { "type": "not", "predicate": { "type": "absent", "field": "title" } },
                {
                    "type": "compare",
                    "left": { "source": "newField", "field": "isCompleted" },
                    "op": "==",
                    "right": { "source": "literal", "value": false }
                }
            ]
        }));
        assert_eq!(
            predicate.to_string(),
            "(request.auth.uid == userId && !(!('title' in request.resource.data)) \
             && request.resource.data.isCompleted == false)"
        );
    }

    #[test]
    fn test_parse_rejects_unknown_type() {
        let result = serde_json::from_value::<Predicate>(json!({ "type": "regex" }));
        assert!(result.is_err());
    }

    #[test]
    fn test_or_flattens() {
        let combined = Predicate::Authenticated
            .or(Predicate::Const { value: false })
            .or(Predicate::Const { value: true });
        match combined {
            Predicate::Or { any } => assert_eq!(any.len(), 3),
            other => panic!("Expected Or, got {other:?}"),
        }
    }

    // -------------------------------------------------------------------------
    // Leaf predicates
    // -------------------------------------------------------------------------

    #[test]
    fn test_owner() {
        let owner = Predicate::Owner {
            binding: "userId".to_string(),
        };
        let doc = Document::new();
        assert!(check_update(&owner, &AuthContext::authenticated("alice"), None, Some(&doc)).is_ok());

        let err = check_update(&owner, &AuthContext::authenticated("bob"), None, Some(&doc))
            .unwrap_err();
        assert_eq!(err.kind, ViolationKind::Failed);
        assert_eq!(err.predicate, "request.auth.uid == userId");

        let err = check_update(&owner, &AuthContext::unauthenticated(), None, Some(&doc))
            .unwrap_err();
        assert!(err.message.contains("not authenticated"));

        let claims_only: AuthContext = serde_json::from_value(json!({"admin": true})).unwrap();
        let err = check_update(&owner, &claims_only, None, Some(&doc)).unwrap_err();
        assert_eq!(err.kind, ViolationKind::Failed);
        assert_eq!(err.message, "authenticated request carries no uid");
    }

    #[test]
    fn test_compare_with_missing_field_is_undefined() {
        let predicate = parse(json!({
            "type": "compare",
            "left": { "source": "newField", "field": "completedAt" },
            "op": "==",
            "right": { "source": "literal", "value": null }
        }));
        let err = check_create(&predicate, &Document::new()).unwrap_err();
        assert_eq!(err.kind, ViolationKind::Undefined);

        let doc = Document::new().with("completedAt", FieldValue::Null);
        assert!(check_create(&predicate, &doc).is_ok());
    }

    #[test]
    fn test_compare_auth_uid_and_claims() {
        let predicate = parse(json!({
            "type": "compare",
            "left": { "source": "newField", "field": "uid" },
            "op": "==",
            "right": { "source": "authUid" }
        }));
        assert!(check_create(&predicate, &Document::new().with("uid", "alice")).is_ok());
        assert!(check_create(&predicate, &Document::new().with("uid", "bob")).is_err());

        let admin = parse(json!({
            "type": "compare",
            "left": { "source": "authClaim", "claim": "admin" },
            "op": "==",
            "right": { "source": "literal", "value": true }
        }));
        let auth = AuthContext::authenticated("alice").with_claim("admin", true);
        let doc = Document::new();
        assert!(check_update(&admin, &auth, None, Some(&doc)).is_ok());
        let err = check_update(&admin, &AuthContext::authenticated("alice"), None, Some(&doc))
            .unwrap_err();
        assert_eq!(err.kind, ViolationKind::Undefined);
    }

    #[test]
    fn test_ordering_operators() {
        let predicate = parse(json!({
            "type": "compare",
            "left": { "source": "newField", "field": "count" },
            "op": "<=",
            "right": { "source": "literal", "value": 10 }
        }));
        assert!(check_create(&predicate, &Document::new().with("count", 10)).is_ok());
        assert!(check_create(&predicate, &Document::new().with("count", 9.5)).is_ok());
        assert!(check_create(&predicate, &Document::new().with("count", 11)).is_err());

        let err = check_create(&predicate, &Document::new().with("count", "ten")).unwrap_err();
        assert_eq!(err.kind, ViolationKind::Undefined);
    }

    #[test]
    fn test_request_time_equals_only_sentinel() {
        let predicate = parse(json!({
            "type": "compare",
            "left": { "source": "newField", "field": "updatedAt" },
            "op": "==",
            "right": { "source": "requestTime" }
        }));
        let sentinel = Document::new().with("updatedAt", FieldValue::server_timestamp());
        assert!(check_create(&predicate, &sentinel).is_ok());

        let literal = Document::new().with(
            "updatedAt",
            "2020-01-30T09:15:00Z".parse::<docrules_core::Timestamp>().unwrap(),
        );
        assert!(check_create(&predicate, &literal).is_err());
    }

    #[test]
    fn test_has_all_and_has_only() {
        let has_all = Predicate::HasAll {
            fields: vec![field("title"), field("isCompleted")],
            document: DocumentState::New,
        };
        let doc = Document::new().with("title", "x").with("isCompleted", false);
        assert!(check_create(&has_all, &doc).is_ok());
        let err = check_create(&has_all, &Document::new().with("isCompleted", false)).unwrap_err();
        assert!(err.message.contains("'title'"));

        let has_only = Predicate::HasOnly {
            fields: vec!["title".to_string()],
        };
        assert!(check_create(&has_only, &Document::new().with("title", "x")).is_ok());
        assert!(check_create(&has_only, &doc).is_err());
    }

    #[test]
    fn test_has_all_on_old_document() {
        let predicate = Predicate::HasAll {
            fields: vec![field("createdAt")],
            document: DocumentState::Old,
        };
        let new = Document::new();
        let err = check_create(&predicate, &new).unwrap_err();
        assert!(err.message.contains("old document does not exist"));
    }

    #[test]
    fn test_absent_treats_null_as_present() {
        let absent = Predicate::Absent {
            field: field("completedAt"),
        };
        assert!(check_create(&absent, &Document::new()).is_ok());
        assert!(
            check_create(&absent, &Document::new().with("completedAt", FieldValue::Null)).is_err()
        );
    }

    #[test]
    fn test_field_type() {
        let predicate = Predicate::FieldType {
            field: field("isCompleted"),
            kind: TypeCheck::Bool,
            optional: false,
        };
        assert!(check_create(&predicate, &Document::new().with("isCompleted", true)).is_ok());
        let err = check_create(&predicate, &Document::new().with("isCompleted", "yes")).unwrap_err();
        assert_eq!(err.message, "field 'isCompleted' is string, expected bool");
        assert!(check_create(&predicate, &Document::new()).is_err());

        let optional = Predicate::FieldType {
            field: field("isCompleted"),
            kind: TypeCheck::Bool,
            optional: true,
        };
        assert!(check_create(&optional, &Document::new()).is_ok());
        assert!(TypeCheck::Timestamp.accepts(&FieldValue::server_timestamp()));
        assert!(TypeCheck::Number.accepts(&FieldValue::Double(1.5)));
    }

    #[test]
    fn test_string_length_is_inclusive() {
        let predicate = Predicate::StringLength {
            field: field("name"),
            min: None,
            max: Some(20),
            optional: true,
        };
        let ok = Document::new().with("name", "1".repeat(20));
        let too_long = Document::new().with("name", "1".repeat(21));
        assert!(check_create(&predicate, &ok).is_ok());
        let err = check_create(&predicate, &too_long).unwrap_err();
        assert_eq!(err.message, "field 'name' has length 21, outside [0, 20]");
        assert!(check_create(&predicate, &Document::new()).is_ok());

        // Counted in characters, not bytes.
        let wide = Document::new().with("name", "é".repeat(20));
        assert!(check_create(&predicate, &wide).is_ok());
    }

    #[test]
    fn test_string_length_min() {
        let predicate = Predicate::StringLength {
            field: field("title"),
            min: Some(1),
            max: None,
            optional: false,
        };
        assert!(check_create(&predicate, &Document::new().with("title", "")).is_err());
        assert!(check_create(&predicate, &Document::new().with("title", 5)).is_err());
        assert!(check_create(&predicate, &Document::new().with("title", "a")).is_ok());
    }

    #[test]
    fn test_server_timestamp() {
        let predicate = Predicate::ServerTimestamp {
            field: field("updatedAt"),
        };
        let sentinel = Document::new().with("updatedAt", FieldValue::server_timestamp());
        assert!(check_create(&predicate, &sentinel).is_ok());

        let string = Document::new().with("updatedAt", "2020-01-30T09:15:00Z");
        let err = check_create(&predicate, &string).unwrap_err();
        assert!(err.message.contains("not the server timestamp"));
        assert!(check_create(&predicate, &Document::new()).is_err());
    }

    #[test]
    fn test_unchanged() {
        let predicate = Predicate::Unchanged {
            field: field("groupCount"),
        };
        let auth = AuthContext::authenticated("alice");
        let old = Document::new().with("groupCount", 1);

        let same = Document::new().with("groupCount", 1);
        assert!(check_update(&predicate, &auth, Some(&old), Some(&same)).is_ok());

        let changed = Document::new().with("groupCount", 2);
        assert!(check_update(&predicate, &auth, Some(&old), Some(&changed)).is_err());

        let removed = Document::new();
        assert!(check_update(&predicate, &auth, Some(&old), Some(&removed)).is_err());
    }

    #[test]
    fn test_unchanged_nested_field() {
        let predicate = Predicate::Unchanged {
            field: field("profile.name"),
        };
        let auth = AuthContext::authenticated("alice");
        let old = Document::from_json(json!({"profile": {"name": "a", "age": 1}})).unwrap();
        let new = Document::from_json(json!({"profile": {"name": "a", "age": 2}})).unwrap();
        assert!(check_update(&predicate, &auth, Some(&old), Some(&new)).is_ok());

        let renamed = Document::from_json(json!({"profile": {"name": "b"}})).unwrap();
        assert!(check_update(&predicate, &auth, Some(&old), Some(&renamed)).is_err());
    }

    #[test]
    fn test_co_update() {
        let predicate = Predicate::CoUpdate {
            field: "isCompleted".to_string(),
            requires: vec!["completedAt".to_string()],
        };
        let auth = AuthContext::authenticated("alice");
        let old = Document::new()
            .with("title", "x")
            .with("isCompleted", false)
            .with("completedAt", FieldValue::Null);

        let with_time = old
            .clone()
            .with("isCompleted", true)
            .with("completedAt", FieldValue::server_timestamp());
        assert!(check_update(&predicate, &auth, Some(&old), Some(&with_time)).is_ok());

        let alone = old.clone().with("isCompleted", true);
        let err = check_update(&predicate, &auth, Some(&old), Some(&alone)).unwrap_err();
        assert_eq!(err.message, "'isCompleted' changed without 'completedAt'");

        let title_only = old.clone().with("title", "y");
        assert!(check_update(&predicate, &auth, Some(&old), Some(&title_only)).is_ok());
    }

    #[test]
    fn test_co_update_requires_non_null() {
        let predicate = Predicate::CoUpdate {
            field: "isCompleted".to_string(),
            requires: vec!["completedAt".to_string()],
        };
        let auth = AuthContext::authenticated("alice");
        let old = Document::new()
            .with("isCompleted", true)
            .with("completedAt", FieldValue::server_timestamp());
        let new = Document::new()
            .with("isCompleted", false)
            .with("completedAt", FieldValue::Null);
        let err = check_update(&predicate, &auth, Some(&old), Some(&new)).unwrap_err();
        assert!(err.message.contains("cleared"));
    }

    #[test]
    fn test_only_affects() {
        let predicate = Predicate::OnlyAffects {
            fields: vec!["title".to_string(), "updatedAt".to_string()],
        };
        let auth = AuthContext::authenticated("alice");
        let old = Document::new().with("title", "a").with("owner", "alice");
        let ok = old.clone().with("title", "b");
        assert!(check_update(&predicate, &auth, Some(&old), Some(&ok)).is_ok());
        let bad = old.clone().with("owner", "bob");
        let err = check_update(&predicate, &auth, Some(&old), Some(&bad)).unwrap_err();
        assert_eq!(err.message, "field 'owner' may not be modified");
    }

    // -------------------------------------------------------------------------
    // Combinators
    // -------------------------------------------------------------------------

    #[test]
    fn test_and_reports_first_failure() {
        let predicate = Predicate::And {
            all: vec![
                Predicate::Authenticated,
                Predicate::Const { value: false },
                Predicate::Absent {
                    field: field("x"),
                },
            ],
        };
        let err = check_create(&predicate, &Document::new().with("x", 1)).unwrap_err();
        assert_eq!(err.predicate, "false");
    }

    #[test]
    fn test_or_reports_last_failure() {
        let predicate = Predicate::Or {
            any: vec![
                Predicate::Const { value: false },
                Predicate::Absent {
                    field: field("x"),
                },
            ],
        };
        let err = check_create(&predicate, &Document::new().with("x", 1)).unwrap_err();
        assert_eq!(err.message, "field 'x' is present");
        assert!(check_create(&predicate, &Document::new()).is_ok());
    }

    #[test]
    fn test_not_propagates_undefined() {
        let predicate = Predicate::Not {
            predicate: Box::new(parse(json!({
                "type": "compare",
                "left": { "source": "newField", "field": "missing" },
                "op": "==",
                "right": { "source": "literal", "value": 1 }
            }))),
        };
        let err = check_create(&predicate, &Document::new()).unwrap_err();
        assert_eq!(err.kind, ViolationKind::Undefined);

        let flipped = Predicate::Not {
            predicate: Box::new(Predicate::Const { value: false }),
        };
        assert!(check_create(&flipped, &Document::new()).is_ok());
    }

    // -------------------------------------------------------------------------
    // Validation
    // -------------------------------------------------------------------------

    #[test]
    fn test_validate_rejects_unknown_binding() {
        let pattern = PathPattern::parse("users/{userId}").unwrap();
        let predicate = Predicate::Owner {
            binding: "uid".to_string(),
        };
        assert!(matches!(
            predicate.validate(&pattern),
            Err(ValidationError::UnknownBinding { .. })
        ));

        let compare = parse(json!({
            "type": "compare",
            "left": { "source": "binding", "name": "todoId" },
            "op": "==",
            "right": { "source": "authUid" }
        }));
        assert!(compare.validate(&pattern).is_err());
    }

    #[test]
    fn test_validate_length_bounds() {
        let pattern = PathPattern::parse("users/{userId}").unwrap();
        for (min, max) in [(None, None), (Some(5), Some(2)), (None, Some(0))] {
            let predicate = Predicate::StringLength {
                field: field("name"),
                min,
                max,
                optional: false,
            };
            assert!(
                matches!(
                    predicate.validate(&pattern),
                    Err(ValidationError::InvalidLengthBounds { .. })
                ),
                "expected {min:?}..{max:?} to be rejected"
            );
        }
    }

    #[test]
    fn test_validate_empty_combinators_and_fields() {
        let pattern = PathPattern::parse("users/{userId}").unwrap();
        let predicate = Predicate::Not {
            predicate: Box::new(Predicate::Or { any: vec![] }),
        };
        assert!(matches!(
            predicate.validate(&pattern),
            Err(ValidationError::EmptyCombinator { combinator: "or" })
        ));

        let predicate = Predicate::OnlyAffects {
            fields: vec![String::new()],
        };
        assert!(matches!(
            predicate.validate(&pattern),
            Err(ValidationError::EmptyFieldName)
        ));
    }
}
