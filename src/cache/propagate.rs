//! Mutation propagator.
//!
//! Fans a single-document change out to every registered list cache entry for
//! the document's parent collection. Propagation is purely local and
//! synchronous: no network call is made, and each list updater runs to
//! completion under the cache lock.
//!
//! A list only ever shrinks or patches in place here. Membership is never
//! inferred from a side-channel document write: a list grows only through
//! its own refetch or re-subscription. Entries the change does not touch
//! keep their existing references, so an unaffected list allocates nothing
//! and triggers no redundant downstream comparison.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use metrics::{counter, histogram};
use tracing::debug;

use crate::domain::document::SharedDocument;

use super::events::{ChangeEvent, ChangeKind, ChangeOrigin, Epoch};
use super::merge::patch_document;
use super::registry::CollectionRegistry;
use super::store::{KeyedCache, SharedList};

const METRIC_PROPAGATE_TOTAL: &str = "specchio_propagate_total";
const METRIC_PROPAGATE_FANOUT: &str = "specchio_propagate_fanout";

/// Applies change events to every affected list cache entry.
///
/// Cheap to clone: listener callbacks carry their own handle and still share
/// the epoch counter with the optimistic write path.
#[derive(Clone)]
pub struct Propagator {
    cache: Arc<KeyedCache>,
    registry: Arc<CollectionRegistry>,
    epochs: Arc<AtomicU64>,
}

impl Propagator {
    pub fn new(cache: Arc<KeyedCache>, registry: Arc<CollectionRegistry>) -> Self {
        Self {
            cache,
            registry,
            epochs: Arc::new(AtomicU64::new(0)),
        }
    }

    fn next_epoch(&self) -> Epoch {
        self.epochs.fetch_add(1, Ordering::SeqCst)
    }

    /// Stamp a change with identity and the next epoch.
    pub fn event(&self, kind: ChangeKind, origin: ChangeOrigin) -> ChangeEvent {
        ChangeEvent::new(kind, origin, self.next_epoch())
    }

    /// Apply one change event to all registered lists for its parent path.
    ///
    /// A missing registration, a discarded cache entry, or a list that does
    /// not contain the document are all no-ops.
    pub fn apply(&self, event: &ChangeEvent) {
        let parent = event.kind.parent().as_str();
        let keys = self.registry.lookup(parent);

        counter!(METRIC_PROPAGATE_TOTAL).increment(1);
        histogram!(METRIC_PROPAGATE_FANOUT).record(keys.len() as f64);
        debug!(
            event_id = %event.id,
            event_epoch = event.epoch,
            event_origin = ?event.origin,
            change = event.kind.label(),
            doc_id = event.kind.doc_id(),
            parent,
            fanout = keys.len(),
            "Propagating document change"
        );

        for key in keys {
            self.cache.apply_list(&key, |current| match &event.kind {
                ChangeKind::DocumentReplaced { document, .. } => {
                    replace_entry(current, document)
                }
                ChangeKind::DocumentPatched {
                    doc_id,
                    patch,
                    policy,
                    ..
                } => {
                    let position = position_of(current, doc_id)?;
                    let mut next = current.as_ref().clone();
                    next[position] = Arc::new(patch_document(&current[position], patch, policy));
                    Some(Arc::new(next))
                }
                ChangeKind::DocumentDeleted { doc_id, .. } => {
                    position_of(current, doc_id)?;
                    let next = current
                        .iter()
                        .filter(|entry| entry.id != *doc_id)
                        .cloned()
                        .collect();
                    Some(Arc::new(next))
                }
            });
        }
    }
}

fn position_of(list: &SharedList, doc_id: &str) -> Option<usize> {
    list.iter().position(|entry| entry.id == doc_id)
}

fn replace_entry(current: &SharedList, document: &SharedDocument) -> Option<SharedList> {
    let position = position_of(current, &document.id)?;
    let mut next = current.as_ref().clone();
    next[position] = document.clone();
    Some(Arc::new(next))
}
