//! Documents: ordered maps from field name to [`FieldValue`].
//!
//! A missing document is modelled as `Option<Document>::None` by callers; an
//! empty document is a document that exists with no fields.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::field_path::FieldPath;
use crate::value::FieldValue;

/// A document's top-level fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document {
    fields: IndexMap<String, FieldValue>,
}

impl Document {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_fields(fields: IndexMap<String, FieldValue>) -> Self {
        Self { fields }
    }

    /// Build a document from a JSON object.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not an object or contains a malformed
    /// value marker.
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        match FieldValue::from_json(value)? {
            FieldValue::Map(fields) => Ok(Self { fields }),
            other => Err(CoreError::invalid_value(format!(
                "document must be an object, got {}",
                other.kind()
            ))),
        }
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(field.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    /// Look up a possibly nested field. Intermediate non-map values resolve to `None`.
    #[must_use]
    pub fn get_path(&self, path: &FieldPath) -> Option<&FieldValue> {
        let (first, rest) = path.segments().split_first()?;
        let mut current = self.fields.get(first)?;
        for segment in rest {
            current = current.as_map()?.get(segment)?;
        }
        Some(current)
    }

    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    #[must_use]
    pub fn contains_path(&self, path: &FieldPath) -> bool {
        self.get_path(path).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The state after applying a partial update: top-level keys of `patch`
    /// replace those of `self`, all other fields are kept.
    #[must_use]
    pub fn merged(&self, patch: &Document) -> Document {
        let mut fields = self.fields.clone();
        for (key, value) in &patch.fields {
            fields.insert(key.clone(), value.clone());
        }
        Document { fields }
    }
}

impl FromIterator<(String, FieldValue)> for Document {
    fn from_iter<T: IntoIterator<Item = (String, FieldValue)>>(iter: T) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}
