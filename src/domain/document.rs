//! Document model.
//!
//! A `Document` is the caller-facing shape of one remote document: its payload
//! plus the metadata the sync engine maintains (`exists`, `validated`,
//! `has_pending_writes`). The invariant `validated => exists` is enforced at
//! construction; a document can never claim to be validated while missing.

use std::sync::Arc;

use serde_json::Value;

/// A document payload: field name to JSON value.
pub type DocumentData = serde_json::Map<String, Value>;

/// Documents are shared between the single-document cache and every cached
/// list that references them, so they travel as `Arc`s. Propagation relies on
/// this: an untouched list entry keeps its reference, observable with
/// `Arc::ptr_eq`.
pub type SharedDocument = Arc<Document>;

/// Field names reserved for metadata. Payloads using them still round-trip,
/// but a warning is logged during validation.
pub const RESERVED_FIELDS: [&str; 4] = ["id", "exists", "validated", "hasPendingWrites"];

/// The raw snapshot delivered by the remote store, before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Full document path.
    pub path: String,
    /// Document id (final path segment).
    pub id: String,
    /// Whether a remote counterpart exists.
    pub exists: bool,
    /// Payload; `None` when the document does not exist.
    pub data: Option<DocumentData>,
    /// Whether the snapshot reflects a write not yet acknowledged remotely.
    pub has_pending_writes: bool,
}

#[derive(Debug, Clone)]
pub struct Document {
    /// Stable identifier, immutable after creation.
    pub id: String,
    pub data: DocumentData,
    pub exists: bool,
    pub validated: bool,
    pub has_pending_writes: bool,
    /// Raw store snapshot, kept only when the caller asked for it.
    pub snapshot: Option<Arc<Snapshot>>,
}

impl Document {
    /// A document produced by an optimistic local write. It has not crossed
    /// the validator, so it is never `validated`.
    pub fn local(id: impl Into<String>, data: DocumentData) -> Self {
        Self {
            id: id.into(),
            data,
            exists: true,
            validated: false,
            has_pending_writes: true,
            snapshot: None,
        }
    }

    /// The local shape of a deleted document.
    pub fn tombstone(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            data: DocumentData::new(),
            exists: false,
            validated: false,
            has_pending_writes: true,
            snapshot: None,
        }
    }
}

/// Reserved field names present in a payload.
pub fn reserved_fields_in(data: &DocumentData) -> Vec<&'static str> {
    RESERVED_FIELDS
        .into_iter()
        .filter(|field| data.contains_key(*field))
        .collect()
}
