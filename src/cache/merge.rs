//! Update merge engine.
//!
//! Computes a document's next local state from its current state and an
//! update payload, resolving field-value sentinels against the current state
//! along the way. Output is always a fresh map; the input is never mutated,
//! which preserves reference-based change detection in the hosting cache.

use crate::domain::document::{Document, DocumentData};
use crate::domain::dot_notation::{get_value, set_value};
use crate::domain::field_value::UpdateMap;

/// How an update payload lands on the current state.
#[derive(Debug, Clone, PartialEq)]
pub enum MergePolicy {
    /// No local re-derivation: a replace write does not guess the final
    /// shape, it awaits the remote round-trip. `merge_update` returns the
    /// current state unchanged; entry points substitute the new data
    /// wholesale where their contract calls for it.
    Replace,
    /// Every patch field lands on a shallow copy of the current state.
    Merge { allow_dot_notation: bool },
    /// Only the enumerated field paths land; everything else stays as-is.
    /// The patch is read by literal field-path key, the write into the copy
    /// honors dot-notation nesting.
    Fields(Vec<String>),
}

/// Produce the next state of `current` under `patch` and `policy`.
pub fn merge_update(current: &DocumentData, patch: &UpdateMap, policy: &MergePolicy) -> DocumentData {
    match policy {
        MergePolicy::Replace => current.clone(),
        MergePolicy::Merge { allow_dot_notation } => {
            let mut next = current.clone();
            for (path, value) in patch {
                let resolved = value.resolve(get_value(current, path, *allow_dot_notation));
                set_value(&mut next, path, resolved, *allow_dot_notation);
            }
            next
        }
        MergePolicy::Fields(fields) => {
            let mut next = current.clone();
            for path in fields {
                let Some(value) = patch.get(path) else {
                    continue;
                };
                let resolved = value.resolve(current.get(path.as_str()));
                set_value(&mut next, path, resolved, true);
            }
            next
        }
    }
}

/// Fully resolve an update payload with no base state: the local shape of a
/// replace write, which discards whatever was there before. Sentinels
/// resolve against the empty document.
pub fn resolve_update(patch: &UpdateMap) -> DocumentData {
    let mut next = DocumentData::new();
    for (path, value) in patch {
        next.insert(path.clone(), value.resolve(None));
    }
    next
}

/// The next local shape of a cached document under `patch`.
///
/// Metadata carries over (a merge cannot make a document more or less
/// validated) except `has_pending_writes`, which a local patch always sets.
pub fn patch_document(document: &Document, patch: &UpdateMap, policy: &MergePolicy) -> Document {
    Document {
        id: document.id.clone(),
        data: merge_update(&document.data, patch, policy),
        exists: document.exists,
        validated: document.validated,
        has_pending_writes: true,
        snapshot: document.snapshot.clone(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use crate::domain::field_value::{FieldValue, UpdateValue, update_map};

    use super::*;

    fn data(value: Value) -> DocumentData {
        value.as_object().expect("object literal").clone()
    }

    #[test]
    fn field_list_merge_changes_only_enumerated_fields() {
        let current = data(json!({ "name": "Ann", "age": 41, "tags": ["a"] }));
        let patch = update_map([
            ("name", json!("Bea")),
            ("age", json!(50)),
        ]);

        let next = merge_update(&current, &patch, &MergePolicy::Fields(vec!["name".to_string()]));

        assert_eq!(next["name"], json!("Bea"));
        assert_eq!(next["age"], json!(41));
        assert_eq!(next["tags"], current["tags"]);
    }

    #[test]
    fn field_list_merge_skips_paths_absent_from_the_patch() {
        let current = data(json!({ "name": "Ann" }));
        let patch = update_map([("other", json!(1))]);

        let next = merge_update(&current, &patch, &MergePolicy::Fields(vec!["name".to_string()]));
        assert_eq!(next, current);
    }

    #[test]
    fn whole_merge_copies_every_patch_field() {
        let current = data(json!({ "name": "Ann", "age": 41 }));
        let patch = update_map([("name", json!("Bea")), ("city", json!("Turin"))]);

        let next = merge_update(
            &current,
            &patch,
            &MergePolicy::Merge {
                allow_dot_notation: false,
            },
        );

        assert_eq!(
            Value::Object(next),
            json!({ "name": "Bea", "age": 41, "city": "Turin" })
        );
    }

    #[test]
    fn whole_merge_honors_dot_notation_when_allowed() {
        let current = data(json!({ "profile": { "city": "Rome", "zip": "00100" } }));
        let patch = update_map([("profile.city", json!("Turin"))]);

        let nested = merge_update(
            &current,
            &patch,
            &MergePolicy::Merge {
                allow_dot_notation: true,
            },
        );
        assert_eq!(
            Value::Object(nested),
            json!({ "profile": { "city": "Turin", "zip": "00100" } })
        );

        let literal = merge_update(
            &current,
            &patch,
            &MergePolicy::Merge {
                allow_dot_notation: false,
            },
        );
        assert_eq!(literal["profile.city"], json!("Turin"));
        assert_eq!(literal["profile"], current["profile"]);
    }

    #[test]
    fn sentinels_resolve_against_current_state() {
        let current = data(json!({ "count": 10, "tags": ["a"] }));
        let patch = update_map([
            ("count", FieldValue::increment(5)),
            ("tags", FieldValue::array_union([json!("b")])),
        ]);

        let next = merge_update(
            &current,
            &patch,
            &MergePolicy::Merge {
                allow_dot_notation: false,
            },
        );

        assert_eq!(next["count"], json!(15));
        assert_eq!(next["tags"], json!(["a", "b"]));
    }

    #[test]
    fn replace_policy_returns_current_unchanged() {
        let current = data(json!({ "name": "Ann" }));
        let patch = update_map([("name", json!("Bea"))]);

        assert_eq!(merge_update(&current, &patch, &MergePolicy::Replace), current);
    }

    #[test]
    fn resolve_update_builds_from_scratch() {
        let patch = update_map([
            ("count", UpdateValue::from(FieldValue::increment(3))),
            ("name", UpdateValue::from(json!("Ann"))),
        ]);

        let next = resolve_update(&patch);
        assert_eq!(Value::Object(next), json!({ "count": 3, "name": "Ann" }));
    }

    #[test]
    fn patch_document_preserves_metadata_and_marks_pending() {
        let mut doc = Document::local("1", data(json!({ "name": "Ann" })));
        doc.has_pending_writes = false;
        doc.validated = false;

        let patched = patch_document(
            &doc,
            &update_map([("name", json!("Bea"))]),
            &MergePolicy::Merge {
                allow_dot_notation: true,
            },
        );

        assert_eq!(patched.id, "1");
        assert_eq!(patched.data["name"], json!("Bea"));
        assert!(patched.has_pending_writes);
        assert!(!patched.validated);
    }
}
