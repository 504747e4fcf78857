//! Field-level diff between the stored and the proposed document.

use docrules_core::{Document, FieldValue};
use indexmap::IndexMap;
use serde::Serialize;

/// Status of one top-level field across a write.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum FieldChange<'a> {
    Added { new: &'a FieldValue },
    Removed { old: &'a FieldValue },
    Unchanged { value: &'a FieldValue },
    Changed { old: &'a FieldValue, new: &'a FieldValue },
}

impl FieldChange<'_> {
    /// Whether the write touches this field at all.
    #[must_use]
    pub fn is_affected(&self) -> bool {
        !matches!(self, Self::Unchanged { .. })
    }
}

/// Per-field classification of a write. Borrowed from the request; rebuilt for
/// every evaluation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FieldDiff<'a> {
    fields: IndexMap<&'a str, FieldChange<'a>>,
}

impl<'a> FieldDiff<'a> {
    /// Diff two optional documents.
    ///
    /// A missing `old` makes every new field `Added`; a missing `new` makes
    /// every old field `Removed`. Otherwise the union of keys is walked, old
    /// keys first, comparing values structurally.
    #[must_use]
    pub fn compute(old: Option<&'a Document>, new: Option<&'a Document>) -> Self {
        let mut fields = IndexMap::new();

        if let Some(old) = old {
            for (key, old_value) in old.iter() {
                let change = match new.and_then(|n| n.get(key)) {
                    None => FieldChange::Removed { old: old_value },
                    Some(new_value) if new_value == old_value => {
                        FieldChange::Unchanged { value: new_value }
                    }
                    Some(new_value) => FieldChange::Changed {
                        old: old_value,
                        new: new_value,
                    },
                };
                fields.insert(key, change);
            }
        }

        if let Some(new) = new {
            for (key, new_value) in new.iter() {
                fields
                    .entry(key)
                    .or_insert(FieldChange::Added { new: new_value });
            }
        }

        Self { fields }
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&FieldChange<'a>> {
        self.fields.get(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &FieldChange<'a>)> {
        self.fields.iter().map(|(k, v)| (*k, v))
    }

    /// True if the field was added, removed or changed.
    #[must_use]
    pub fn affects(&self, field: &str) -> bool {
        self.get(field).is_some_and(FieldChange::is_affected)
    }

    /// Added, removed and changed keys.
    #[must_use]
    pub fn affected_keys(&self) -> Vec<&'a str> {
        self.keys_where(FieldChange::is_affected)
    }

    #[must_use]
    pub fn changed_keys(&self) -> Vec<&'a str> {
        self.keys_where(|c| matches!(c, FieldChange::Changed { .. }))
    }

    #[must_use]
    pub fn added_keys(&self) -> Vec<&'a str> {
        self.keys_where(|c| matches!(c, FieldChange::Added { .. }))
    }

    #[must_use]
    pub fn removed_keys(&self) -> Vec<&'a str> {
        self.keys_where(|c| matches!(c, FieldChange::Removed { .. }))
    }

    #[must_use]
    pub fn unchanged_keys(&self) -> Vec<&'a str> {
        self.keys_where(|c| matches!(c, FieldChange::Unchanged { .. }))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn keys_where(&self, keep: impl Fn(&FieldChange<'a>) -> bool) -> Vec<&'a str> {
        self.fields
            .iter()
            .filter(|(_, change)| keep(change))
            .map(|(key, _)| *key)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn todo() -> Document {
        Document::new()
            .with("title", "write tests")
            .with("isCompleted", false)
            .with("completedAt", FieldValue::Null)
    }

    #[test]
    fn test_create_marks_everything_added() {
        let new = todo();
        let diff = FieldDiff::compute(None, Some(&new));
        assert_eq!(diff.added_keys(), vec!["title", "isCompleted", "completedAt"]);
        assert_eq!(diff.affected_keys().len(), 3);
        assert!(diff.unchanged_keys().is_empty());
    }

    #[test]
    fn test_delete_marks_everything_removed() {
        let old = todo();
        let diff = FieldDiff::compute(Some(&old), None);
        assert_eq!(diff.removed_keys(), vec!["title", "isCompleted", "completedAt"]);
        assert!(diff.affects("title"));
    }

    #[test]
    fn test_update_classifies_each_field() {
        let old = todo().with("tag", "home");
        let new = todo()
            .with("isCompleted", true)
            .with("completedAt", FieldValue::server_timestamp())
            .with("priority", 1);

        let diff = FieldDiff::compute(Some(&old), Some(&new));
        assert_eq!(diff.unchanged_keys(), vec!["title"]);
        assert_eq!(diff.changed_keys(), vec!["isCompleted", "completedAt"]);
        assert_eq!(diff.removed_keys(), vec!["tag"]);
        assert_eq!(diff.added_keys(), vec!["priority"]);
        assert_eq!(
            diff.affected_keys(),
            vec!["isCompleted", "completedAt", "tag", "priority"]
        );
        assert!(!diff.affects("title"));
        assert!(!diff.affects("missing"));
    }

    #[test]
    fn test_numeric_equality_is_unchanged() {
        let old = Document::new().with("groupCount", 3);
        let new = Document::new().with("groupCount", 3.0);
        let diff = FieldDiff::compute(Some(&old), Some(&new));
        assert_eq!(
            diff.get("groupCount"),
            Some(&FieldChange::Unchanged {
                value: &FieldValue::Double(3.0)
            })
        );
    }

    #[test]
    fn test_large_integer_against_double_is_changed() {
        let old = Document::new().with("groupCount", 9_007_199_254_740_993_i64);
        let new = Document::new().with("groupCount", 9_007_199_254_740_992.0);
        let diff = FieldDiff::compute(Some(&old), Some(&new));
        assert_eq!(diff.changed_keys(), vec!["groupCount"]);
    }

    #[test]
    fn test_sentinel_never_equals_literal() {
        let ts: docrules_core::Timestamp = "2020-01-30T09:15:00Z".parse().unwrap();
        let old = Document::new().with("updatedAt", ts);
        let new = Document::new().with("updatedAt", FieldValue::server_timestamp());
        let diff = FieldDiff::compute(Some(&old), Some(&new));
        assert!(diff.affects("updatedAt"));

        let both = Document::new().with("updatedAt", FieldValue::server_timestamp());
        let diff = FieldDiff::compute(Some(&both), Some(&both));
        assert!(!diff.affects("updatedAt"));
    }

    #[test]
    fn test_null_and_absent_are_distinct() {
        let old = Document::new();
        let new = Document::new().with("completedAt", FieldValue::Null);
        let diff = FieldDiff::compute(Some(&old), Some(&new));
        assert_eq!(diff.added_keys(), vec!["completedAt"]);
    }

    #[test]
    fn test_serializes_with_status_tag() {
        let old = Document::new().with("a", 1);
        let new = Document::new().with("a", 2);
        let diff = FieldDiff::compute(Some(&old), Some(&new));
        let json = serde_json::to_value(&diff).unwrap();
        assert_eq!(json["a"]["status"], "changed");
        assert_eq!(json["a"]["old"], 1);
        assert_eq!(json["a"]["new"], 2);
    }
}
