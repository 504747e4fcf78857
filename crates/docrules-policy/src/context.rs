//! Inputs visible to a predicate during one evaluation.

use docrules_core::{AuthContext, Document, FieldPath, FieldValue, Operation};

use crate::diff::FieldDiff;
use crate::matcher::Bindings;
use crate::predicate::DocumentState;

/// Everything a predicate may read. Built by the evaluator per request and
/// dropped with the decision.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationContext<'a> {
    pub operation: Operation,
    pub auth: &'a AuthContext,
    pub bindings: &'a Bindings,
    pub old_document: Option<&'a Document>,
    pub new_document: Option<&'a Document>,
    pub diff: &'a FieldDiff<'a>,
}

impl<'a> EvaluationContext<'a> {
    #[must_use]
    pub fn document(&self, state: DocumentState) -> Option<&'a Document> {
        match state {
            DocumentState::New => self.new_document,
            DocumentState::Old => self.old_document,
        }
    }

    /// Value of a field in the proposed document.
    #[must_use]
    pub fn new_value(&self, field: &FieldPath) -> Option<&'a FieldValue> {
        self.new_document.and_then(|doc| doc.get_path(field))
    }

    /// Value of a field in the stored document.
    #[must_use]
    pub fn old_value(&self, field: &FieldPath) -> Option<&'a FieldValue> {
        self.old_document.and_then(|doc| doc.get_path(field))
    }
}
