use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// A concrete document path such as `users/abc/todos/xyz`.
///
/// Paths alternate collection and document ids, so a valid path always has an
/// even, non-zero number of non-empty segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentPath {
    segments: Vec<String>,
}

impl DocumentPath {
    /// Parse a slash-separated document path. Leading and trailing slashes are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is empty, has an empty segment, or has an
    /// odd number of segments (i.e. names a collection rather than a document).
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim_matches('/');
        if trimmed.is_empty() {
            return Err(CoreError::invalid_path("document path is empty"));
        }

        let segments: Vec<String> = trimmed.split('/').map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return Err(CoreError::invalid_path(format!(
                "'{raw}' contains an empty segment"
            )));
        }
        if segments.len() % 2 != 0 {
            return Err(CoreError::invalid_path(format!(
                "'{raw}' names a collection, not a document"
            )));
        }

        Ok(Self { segments })
    }

    /// Path of a document inside a collection, e.g. `DocumentPath::doc("users", "abc")`.
    ///
    /// # Errors
    ///
    /// Returns an error if either part is empty or contains a slash.
    pub fn doc(collection: &str, id: &str) -> Result<Self> {
        Self::parse(&format!("{collection}/{id}"))
    }

    /// Path of a document in a sub-collection of this document.
    ///
    /// # Errors
    ///
    /// Returns an error if either part is empty or contains a slash.
    pub fn child(&self, collection: &str, id: &str) -> Result<Self> {
        Self::parse(&format!("{self}/{collection}/{id}"))
    }

    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    #[must_use]
    pub fn collection_id(&self) -> &str {
        &self.segments[self.segments.len() - 2]
    }

    #[must_use]
    pub fn document_id(&self) -> &str {
        &self.segments[self.segments.len() - 1]
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

impl FromStr for DocumentPath {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DocumentPath {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<DocumentPath> for String {
    fn from(value: DocumentPath) -> Self {
        value.to_string()
    }
}
