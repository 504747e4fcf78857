//! Write requests submitted for authorization.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::error::{CoreError, Result};
use crate::path::DocumentPath;

/// Kind of write being attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl Operation {
    pub const ALL: [Operation; 3] = [Operation::Create, Operation::Update, Operation::Delete];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A proposed write: the operation, target path, and the document before and after.
///
/// Shape invariants (checked by [`WriteRequest::validate`]):
///
/// | operation | old document | new document |
/// |-----------|--------------|--------------|
/// | create    | absent       | present      |
/// | update    | present      | present      |
/// | delete    | present      | absent       |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteRequest {
    pub operation: Operation,

    pub path: DocumentPath,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_document: Option<Document>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_document: Option<Document>,
}

impl WriteRequest {
    #[must_use]
    pub fn create(path: DocumentPath, document: Document) -> Self {
        Self {
            operation: Operation::Create,
            path,
            old_document: None,
            new_document: Some(document),
        }
    }

    /// Full replacement of an existing document.
    #[must_use]
    pub fn update(path: DocumentPath, old: Document, new: Document) -> Self {
        Self {
            operation: Operation::Update,
            path,
            old_document: Some(old),
            new_document: Some(new),
        }
    }

    /// Partial update: the new state is `old` with the fields of `patch` applied.
    #[must_use]
    pub fn patch(path: DocumentPath, old: Document, patch: &Document) -> Self {
        let new = old.merged(patch);
        Self::update(path, old, new)
    }

    #[must_use]
    pub fn delete(path: DocumentPath, old: Document) -> Self {
        Self {
            operation: Operation::Delete,
            path,
            old_document: Some(old),
            new_document: None,
        }
    }

    /// Overwrite semantics: a create when nothing exists at `path`, an update otherwise.
    #[must_use]
    pub fn set(path: DocumentPath, existing: Option<Document>, document: Document) -> Self {
        match existing {
            Some(old) => Self::update(path, old, document),
            None => Self::create(path, document),
        }
    }

    /// Check the operation/old/new shape invariants.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MalformedRequest`] if a document that the operation
    /// requires is missing, or one that it forbids is present.
    pub fn validate(&self) -> Result<()> {
        let (needs_old, needs_new) = match self.operation {
            Operation::Create => (false, true),
            Operation::Update => (true, true),
            Operation::Delete => (true, false),
        };

        match (needs_old, self.old_document.is_some()) {
            (true, false) => {
                return Err(CoreError::malformed_request(format!(
                    "{} requires the existing document",
                    self.operation
                )));
            }
            (false, true) => {
                return Err(CoreError::malformed_request(format!(
                    "{} must not carry an existing document",
                    self.operation
                )));
            }
            _ => {}
        }

        match (needs_new, self.new_document.is_some()) {
            (true, false) => Err(CoreError::malformed_request(format!(
                "{} requires the proposed document",
                self.operation
            ))),
            (false, true) => Err(CoreError::malformed_request(format!(
                "{} must not carry a proposed document",
                self.operation
            ))),
            _ => Ok(()),
        }
    }
}
