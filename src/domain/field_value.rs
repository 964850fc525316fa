//! Field-value sentinels.
//!
//! A sentinel stands in for a server-side computation inside an update
//! payload. Resolution produces a best-effort local approximation; the
//! authoritative value arrives later through the store's own echo. Sentinels
//! are typed at the API boundary and are never stored in the cache.

use std::collections::BTreeMap;

use serde_json::Value;
use time::OffsetDateTime;

use super::timestamp::timestamp_value;

/// The four recognized deferred computations.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    ArrayUnion(Vec<Value>),
    ArrayRemove(Vec<Value>),
    Increment(f64),
    ServerTimestamp,
}

impl FieldValue {
    pub fn array_union(elements: impl IntoIterator<Item = Value>) -> Self {
        Self::ArrayUnion(elements.into_iter().collect())
    }

    pub fn array_remove(elements: impl IntoIterator<Item = Value>) -> Self {
        Self::ArrayRemove(elements.into_iter().collect())
    }

    pub fn increment(delta: impl Into<f64>) -> Self {
        Self::Increment(delta.into())
    }

    pub fn server_timestamp() -> Self {
        Self::ServerTimestamp
    }

    /// Resolve this sentinel against the currently cached value.
    ///
    /// Pure: `current` is never mutated. Array operations treat a non-array
    /// or absent current value as the empty set and de-duplicate while
    /// preserving first-seen order. Increment treats a non-finite or
    /// non-numeric current value as zero. The server-timestamp estimate is
    /// the local wall clock, in the store's timestamp shape.
    pub fn apply(&self, current: Option<&Value>) -> Value {
        match self {
            Self::ArrayUnion(elements) => {
                let mut out = current_as_set(current);
                for element in elements {
                    if !out.contains(element) {
                        out.push(element.clone());
                    }
                }
                Value::Array(out)
            }
            Self::ArrayRemove(elements) => {
                let mut out = current_as_set(current);
                out.retain(|existing| !elements.contains(existing));
                Value::Array(out)
            }
            Self::Increment(delta) => {
                let base = current
                    .and_then(Value::as_f64)
                    .filter(|n| n.is_finite())
                    .unwrap_or(0.0);
                number_value(base + delta)
            }
            Self::ServerTimestamp => timestamp_value(OffsetDateTime::now_utc()),
        }
    }
}

fn current_as_set(current: Option<&Value>) -> Vec<Value> {
    let mut out = Vec::new();
    if let Some(Value::Array(items)) = current {
        for item in items {
            if !out.contains(item) {
                out.push(item.clone());
            }
        }
    }
    out
}

// Collapse whole results back to integers so incrementing 10 by 5 reads as 15,
// not 15.0.
fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        Value::from(n)
    }
}

/// One value inside an update payload: ordinary data, or a sentinel.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateValue {
    Data(Value),
    Sentinel(FieldValue),
}

impl UpdateValue {
    /// The decoded sentinel, if this value is one; ordinary data yields
    /// `None` and passes through resolution unchanged.
    pub fn sentinel(&self) -> Option<&FieldValue> {
        match self {
            Self::Sentinel(field_value) => Some(field_value),
            Self::Data(_) => None,
        }
    }

    /// The concrete value this update produces against `current`.
    pub fn resolve(&self, current: Option<&Value>) -> Value {
        match self {
            Self::Data(value) => value.clone(),
            Self::Sentinel(field_value) => field_value.apply(current),
        }
    }
}

impl From<Value> for UpdateValue {
    fn from(value: Value) -> Self {
        Self::Data(value)
    }
}

impl From<FieldValue> for UpdateValue {
    fn from(field_value: FieldValue) -> Self {
        Self::Sentinel(field_value)
    }
}

/// An update payload: field path to update value, deterministically ordered.
pub type UpdateMap = BTreeMap<String, UpdateValue>;

/// Build an `UpdateMap` from `(path, value)` pairs.
pub fn update_map<K, V>(fields: impl IntoIterator<Item = (K, V)>) -> UpdateMap
where
    K: Into<String>,
    V: Into<UpdateValue>,
{
    fields
        .into_iter()
        .map(|(path, value)| (path.into(), value.into()))
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::domain::timestamp::is_timestamp;

    use super::*;

    #[test]
    fn ordinary_data_passes_through_unchanged() {
        let value = UpdateValue::from(json!({ "nested": [1, 2] }));
        assert!(value.sentinel().is_none());
        assert_eq!(value.resolve(Some(&json!("ignored"))), json!({ "nested": [1, 2] }));
    }

    #[test]
    fn array_union_deduplicates() {
        let union = FieldValue::array_union([json!("a"), json!("c")]);
        assert_eq!(
            union.apply(Some(&json!(["a", "b", "a"]))),
            json!(["a", "b", "c"])
        );
    }

    #[test]
    fn array_union_with_present_elements_is_idempotent() {
        let union = FieldValue::array_union([json!("a")]);
        assert_eq!(union.apply(Some(&json!(["a", "b"]))), json!(["a", "b"]));
    }

    #[test]
    fn array_union_treats_non_arrays_as_empty() {
        let union = FieldValue::array_union([json!(1)]);
        assert_eq!(union.apply(Some(&json!("scalar"))), json!([1]));
        assert_eq!(union.apply(None), json!([1]));
    }

    #[test]
    fn array_remove_subtracts() {
        let remove = FieldValue::array_remove([json!("b"), json!("missing")]);
        assert_eq!(remove.apply(Some(&json!(["a", "b", "c"]))), json!(["a", "c"]));
    }

    #[test]
    fn increment_against_missing_and_present_values() {
        let increment = FieldValue::increment(5);
        assert_eq!(increment.apply(None), json!(5));
        assert_eq!(increment.apply(Some(&json!(10))), json!(15));
        assert_eq!(increment.apply(Some(&json!("not a number"))), json!(5));
    }

    #[test]
    fn increment_keeps_fractional_results() {
        let increment = FieldValue::increment(0.5);
        assert_eq!(increment.apply(Some(&json!(1))), json!(1.5));
    }

    #[test]
    fn server_timestamp_resolves_to_timestamp_shape() {
        let value = FieldValue::server_timestamp().apply(None);
        assert!(is_timestamp(&value));
    }
}
