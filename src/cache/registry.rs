//! Collection key registry.
//!
//! Tracks which list-subscription cache keys exist for each collection path,
//! so a single-document mutation can fan out to every cached list that might
//! contain that document.
//!
//! The registry is a best-effort cache hint, not a correctness-critical
//! index: entries are append-only (a subscription going out of use leaves a
//! harmless stale key; propagation to it is a no-op once the cache entry is
//! gone), and a misclassified path logs a diagnostic instead of failing.

use std::collections::HashMap;
use std::sync::RwLock;

use tracing::error;

use crate::application::query::Query;
use crate::domain::path::{PathKind, classify};

use super::keys::ListKey;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::registry";

#[derive(Debug, Clone)]
struct Registration {
    key: ListKey,
    query: Query,
}

/// Per-collection, append-only, duplicate-suppressed key index.
///
/// Constructor-instantiated and shared by reference; tests get isolated
/// registries for free.
pub struct CollectionRegistry {
    collections: RwLock<HashMap<String, Vec<Registration>>>,
}

impl CollectionRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }

    /// Record that a list subscription exists at `path` for `query`.
    ///
    /// Idempotent by value: re-registering the same `(path, query)` pair is a
    /// no-op. Returns the key either way. Within one path, insertion order is
    /// preserved.
    pub fn register(&self, path: &str, query: &Query) -> ListKey {
        let key = ListKey::new(path, query);
        let mut collections = rw_write(&self.collections, SOURCE, "register");
        let registrations = collections.entry(path.to_string()).or_default();
        if !registrations.iter().any(|existing| existing.key == key) {
            registrations.push(Registration {
                key: key.clone(),
                query: query.clone(),
            });
        }
        key
    }

    /// All keys registered for `path`, in insertion order.
    ///
    /// A path that is not a collection gets a diagnostic but still returns
    /// whatever was previously registered; this lookup never fails.
    pub fn lookup(&self, path: &str) -> Vec<ListKey> {
        self.warn_on_misuse(path, "lookup");
        rw_read(&self.collections, SOURCE, "lookup")
            .get(path)
            .map(|registrations| {
                registrations
                    .iter()
                    .map(|registration| registration.key.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Registered keys with their queries, for refetch-driven revalidation.
    pub fn queries(&self, path: &str) -> Vec<(ListKey, Query)> {
        self.warn_on_misuse(path, "queries");
        rw_read(&self.collections, SOURCE, "queries")
            .get(path)
            .map(|registrations| {
                registrations
                    .iter()
                    .map(|registration| (registration.key.clone(), registration.query.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of collection paths with at least one registration.
    pub fn path_count(&self) -> usize {
        rw_read(&self.collections, SOURCE, "path_count").len()
    }

    /// Total number of registered keys.
    pub fn key_count(&self) -> usize {
        rw_read(&self.collections, SOURCE, "key_count")
            .values()
            .map(Vec::len)
            .sum()
    }

    fn warn_on_misuse(&self, path: &str, op: &'static str) {
        if classify(path) != Some(PathKind::Collection) {
            error!(
                op,
                target_module = SOURCE,
                path,
                "Registry queried with a path that is not a collection"
            );
        }
    }
}

impl Default for CollectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
