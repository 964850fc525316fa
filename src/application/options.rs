//! Per-call options for fetch and mutation operations.

use std::sync::Arc;

use crate::domain::document::{DocumentData, Snapshot};
use crate::domain::error::DomainError;

/// Validates a raw payload against a caller-owned schema.
///
/// An error marks the resulting document `validated = false` and drops the
/// payload; it never fails the fetch itself.
pub type Validator =
    Arc<dyn Fn(&DocumentData, &Snapshot) -> Result<DocumentData, DomainError> + Send + Sync>;

/// Options for operations that produce `Document`s.
#[derive(Clone, Default)]
pub struct FetchOptions {
    /// Field paths whose timestamp-shaped values become RFC 3339 strings.
    pub parse_dates: Vec<String>,
    /// Keep the raw store snapshot on the document. Off by default: the
    /// snapshot handle makes documents non-serializable.
    pub keep_snapshot: bool,
    pub validator: Option<Validator>,
}

impl FetchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse_dates(mut self, paths: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.parse_dates = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn keep_snapshot(mut self) -> Self {
        self.keep_snapshot = true;
        self
    }

    pub fn validator(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }
}

impl std::fmt::Debug for FetchOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchOptions")
            .field("parse_dates", &self.parse_dates)
            .field("keep_snapshot", &self.keep_snapshot)
            .field("validator", &self.validator.is_some())
            .finish()
    }
}

/// Options for write operations.
#[derive(Debug, Clone, Default)]
pub struct MutateOptions {
    /// Skip the optimistic local mutation entirely and only forward the
    /// write to the remote store.
    pub ignore_local_mutation: bool,
}

impl MutateOptions {
    pub fn remote_only() -> Self {
        Self {
            ignore_local_mutation: true,
        }
    }
}

/// How a `set_doc` write lands on an existing document.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum SetOptions {
    /// Overwrite the remote document in its entirety.
    #[default]
    Replace,
    /// Granular merge instead of overwriting the target in its entirety.
    Merge,
    /// Only replace the enumerated field paths; everything else remains
    /// untouched.
    MergeFields(Vec<String>),
}
