//! Snapshot validation pipeline.
//!
//! Turns a raw store snapshot into a caller-facing `Document`: parse dates,
//! run the pluggable validator, enforce the `validated => exists` invariant.
//! Validation failure is non-fatal: the caller receives a degraded document
//! with the payload dropped, never an error.

use std::sync::Arc;

use tracing::warn;

use crate::domain::document::{Document, DocumentData, SharedDocument, Snapshot, reserved_fields_in};
use crate::domain::timestamp::parse_document_dates;

use super::options::FetchOptions;

const SOURCE: &str = "application::validate";

/// Build the caller-facing document for `snapshot`.
pub fn to_document(snapshot: Snapshot, options: &FetchOptions) -> SharedDocument {
    let mut data = snapshot.data.clone().unwrap_or_default();
    parse_document_dates(&mut data, &options.parse_dates);

    let validated_data = match &options.validator {
        None => Some(data),
        Some(validator) => match validator(&data, &snapshot) {
            Ok(validated) => Some(validated),
            Err(error) => {
                warn!(
                    target_module = SOURCE,
                    doc_id = %snapshot.id,
                    path = %snapshot.path,
                    %error,
                    "Document failed validation; returning degraded document"
                );
                None
            }
        },
    };

    // A document may not claim to be validated while missing.
    let (validated, data) = match validated_data {
        Some(data) if snapshot.exists => (true, data),
        _ => (false, DocumentData::new()),
    };

    if validated {
        let reserved = reserved_fields_in(&data);
        if !reserved.is_empty() {
            warn!(
                target_module = SOURCE,
                doc_id = %snapshot.id,
                fields = ?reserved,
                "Document payload uses reserved field names"
            );
        }
    }

    Arc::new(Document {
        id: snapshot.id.clone(),
        exists: snapshot.exists,
        has_pending_writes: snapshot.has_pending_writes,
        snapshot: options.keep_snapshot.then(|| Arc::new(snapshot)),
        validated,
        data,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::domain::error::DomainError;

    use super::*;

    fn snapshot(exists: bool, data: Option<serde_json::Value>) -> Snapshot {
        Snapshot {
            path: "users/1".to_string(),
            id: "1".to_string(),
            exists,
            data: data.map(|value| value.as_object().cloned().expect("object literal")),
            has_pending_writes: false,
        }
    }

    #[test]
    fn existing_document_without_validator_is_validated() {
        let doc = to_document(
            snapshot(true, Some(json!({ "name": "Ann" }))),
            &FetchOptions::new(),
        );
        assert!(doc.exists);
        assert!(doc.validated);
        assert_eq!(doc.data["name"], json!("Ann"));
        assert!(doc.snapshot.is_none());
    }

    #[test]
    fn missing_document_is_never_validated() {
        let doc = to_document(snapshot(false, None), &FetchOptions::new());
        assert!(!doc.exists);
        assert!(!doc.validated);
        assert!(doc.data.is_empty());
    }

    #[test]
    fn failed_validation_degrades_instead_of_failing() {
        let options = FetchOptions::new().validator(Arc::new(|_, _| {
            Err(DomainError::validation("name is required"))
        }));

        let doc = to_document(snapshot(true, Some(json!({ "age": 3 }))), &options);
        assert!(doc.exists);
        assert!(!doc.validated);
        assert!(doc.data.is_empty());
    }

    #[test]
    fn validator_may_reshape_the_payload() {
        let options = FetchOptions::new().validator(Arc::new(|data, _| {
            let mut out = data.clone();
            out.insert("normalized".to_string(), json!(true));
            Ok(out)
        }));

        let doc = to_document(snapshot(true, Some(json!({ "name": "Ann" }))), &options);
        assert!(doc.validated);
        assert_eq!(doc.data["normalized"], json!(true));
    }

    #[test]
    fn parse_dates_runs_before_the_validator() {
        let options = FetchOptions::new()
            .parse_dates(["createdAt"])
            .validator(Arc::new(|data, _| {
                assert!(data["createdAt"].is_string());
                Ok(data.clone())
            }));

        let doc = to_document(
            snapshot(
                true,
                Some(json!({ "createdAt": { "seconds": 0, "nanoseconds": 0 } })),
            ),
            &options,
        );
        assert_eq!(doc.data["createdAt"], json!("1970-01-01T00:00:00Z"));
    }

    #[test]
    fn snapshot_is_kept_only_on_request() {
        let doc = to_document(
            snapshot(true, Some(json!({}))),
            &FetchOptions::new().keep_snapshot(),
        );
        assert!(doc.snapshot.is_some());
    }
}
