//! Conditional nested-field access on document payloads.
//!
//! Dot-notation is opt-in: callers pass `allow_dot_notation` explicitly, and a
//! disabled lookup treats the whole path string as a literal top-level key.

use serde_json::Value;

use super::document::DocumentData;

/// Read the value at `path`, descending through nested objects when
/// `allow_dot_notation` is set.
pub fn get_value<'a>(
    data: &'a DocumentData,
    path: &str,
    allow_dot_notation: bool,
) -> Option<&'a Value> {
    if !allow_dot_notation {
        return data.get(path);
    }
    let mut segments = path.split('.');
    let mut current = data.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Write `value` at `path`, creating intermediate objects as needed when
/// `allow_dot_notation` is set. A non-object intermediate is overwritten with
/// an object, matching the original update semantics.
pub fn set_value(data: &mut DocumentData, path: &str, value: Value, allow_dot_notation: bool) {
    if !allow_dot_notation || !path.contains('.') {
        data.insert(path.to_string(), value);
        return;
    }

    let mut segments = path.split('.').peekable();
    let first = match segments.next() {
        Some(segment) => segment,
        None => return,
    };

    let mut current = data
        .entry(first.to_string())
        .or_insert_with(|| Value::Object(DocumentData::new()));
    while let Some(segment) = segments.next() {
        if !current.is_object() {
            *current = Value::Object(DocumentData::new());
        }
        let map = current.as_object_mut().expect("object was just ensured");
        if segments.peek().is_none() {
            map.insert(segment.to_string(), value);
            return;
        }
        current = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(DocumentData::new()));
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn data(value: serde_json::Value) -> DocumentData {
        value.as_object().expect("object literal").clone()
    }

    #[test]
    fn literal_key_when_disabled() {
        let doc = data(json!({ "a.b": 1, "a": { "b": 2 } }));
        assert_eq!(get_value(&doc, "a.b", false), Some(&json!(1)));
    }

    #[test]
    fn nested_lookup_when_enabled() {
        let doc = data(json!({ "a": { "b": { "c": 3 } } }));
        assert_eq!(get_value(&doc, "a.b.c", true), Some(&json!(3)));
        assert_eq!(get_value(&doc, "a.b.missing", true), None);
        assert_eq!(get_value(&doc, "a.b.c.d", true), None);
    }

    #[test]
    fn set_creates_intermediate_objects() {
        let mut doc = DocumentData::new();
        set_value(&mut doc, "profile.address.city", json!("Turin"), true);
        assert_eq!(
            Value::Object(doc),
            json!({ "profile": { "address": { "city": "Turin" } } })
        );
    }

    #[test]
    fn set_overwrites_non_object_intermediates() {
        let mut doc = data(json!({ "profile": 7 }));
        set_value(&mut doc, "profile.city", json!("Turin"), true);
        assert_eq!(Value::Object(doc), json!({ "profile": { "city": "Turin" } }));
    }

    #[test]
    fn set_literal_when_disabled() {
        let mut doc = DocumentData::new();
        set_value(&mut doc, "a.b", json!(1), false);
        assert_eq!(Value::Object(doc), json!({ "a.b": 1 }));
    }
}
