//! Timestamp-shaped values.
//!
//! The remote store transports timestamps as `{seconds, nanoseconds}` maps.
//! Local server-timestamp estimates use the same shape, so the date-parsing
//! pipeline treats an estimate and the eventual authoritative echo
//! identically.

use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use super::document::DocumentData;
use super::dot_notation::{get_value, set_value};

/// Encode a point in time as a timestamp-shaped map.
pub fn timestamp_value(at: OffsetDateTime) -> Value {
    let mut map = DocumentData::new();
    map.insert("seconds".to_string(), Value::from(at.unix_timestamp()));
    map.insert("nanoseconds".to_string(), Value::from(at.nanosecond()));
    Value::Object(map)
}

/// Whether a value carries the timestamp shape.
pub fn is_timestamp(value: &Value) -> bool {
    match value.as_object() {
        Some(map) => {
            map.get("seconds").is_some_and(Value::is_i64)
                && map.get("nanoseconds").is_some_and(Value::is_u64)
        }
        None => false,
    }
}

/// Decode a timestamp-shaped value.
pub fn as_datetime(value: &Value) -> Option<OffsetDateTime> {
    let map = value.as_object()?;
    let seconds = map.get("seconds")?.as_i64()?;
    let nanoseconds = map.get("nanoseconds")?.as_u64()?;
    let base = OffsetDateTime::from_unix_timestamp(seconds).ok()?;
    Some(base + time::Duration::nanoseconds(nanoseconds as i64))
}

/// Replace timestamp-shaped values at the given field paths with RFC 3339
/// strings. Paths are dot-notation aware. Values that are absent or not
/// timestamp-shaped are left untouched.
pub fn parse_document_dates(data: &mut DocumentData, parse_dates: &[String]) {
    for path in parse_dates {
        let parsed = get_value(data, path, true)
            .and_then(as_datetime)
            .and_then(|at| at.format(&Rfc3339).ok());
        if let Some(formatted) = parsed {
            set_value(data, path, Value::String(formatted), true);
        }
    }
}
