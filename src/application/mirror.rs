//! The `Mirror` facade.
//!
//! Owns the keyed cache, the collection key registry, and the remote-store
//! handle, and wires them into the propagator. Everything is
//! constructor-instantiated and `Arc`-shared, with no module-level
//! singletons, so tests get isolated mirrors per case.

use std::sync::Arc;

use crate::cache::{
    CacheConfig, ChangeKind, ChangeOrigin, CollectionRegistry, KeyedCache, ListKey, MergePolicy,
    Propagator, SharedList, merge_update, patch_document, resolve_update,
};
use crate::domain::document::{Document, DocumentData, SharedDocument};
use crate::domain::field_value::UpdateMap;
use crate::domain::path::{CollectionPath, DocumentPath};

use super::error::Error;
use super::query::Query;
use super::remote::{RemoteStore, WritePolicy};

/// A reactive local mirror of a remote document store.
pub struct Mirror {
    store: Arc<dyn RemoteStore>,
    cache: Arc<KeyedCache>,
    registry: Arc<CollectionRegistry>,
    propagator: Propagator,
}

impl Mirror {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self::with_config(store, CacheConfig::default())
    }

    pub fn with_config(store: Arc<dyn RemoteStore>, config: CacheConfig) -> Self {
        let cache = Arc::new(KeyedCache::new(config));
        let registry = Arc::new(CollectionRegistry::new());
        let propagator = Propagator::new(cache.clone(), registry.clone());
        Self {
            store,
            cache,
            registry,
            propagator,
        }
    }

    pub fn store(&self) -> &Arc<dyn RemoteStore> {
        &self.store
    }

    pub fn cache(&self) -> &Arc<KeyedCache> {
        &self.cache
    }

    pub fn registry(&self) -> &Arc<CollectionRegistry> {
        &self.registry
    }

    pub(crate) fn propagator(&self) -> &Propagator {
        &self.propagator
    }

    /// The cached document at `path`, if any. Purely local.
    pub fn cached_document(&self, path: &str) -> Result<Option<SharedDocument>, Error> {
        let path = DocumentPath::parse(path)?;
        Ok(self.cache.document(path.as_str()))
    }

    /// The cached list for `(path, query)`, if any. Purely local.
    pub fn cached_collection(&self, path: &str, query: &Query) -> Result<Option<SharedList>, Error> {
        let path = CollectionPath::parse(path)?;
        let key = ListKey::new(path.as_str(), query);
        Ok(self.cache.list(&key))
    }

    /// Apply the local half of a write: document entry first, then fan-out
    /// to registered lists. Fully synchronous; callers forward to the remote
    /// store only after this returns.
    pub(crate) fn apply_local_write(
        &self,
        path: &DocumentPath,
        data: &UpdateMap,
        policy: &WritePolicy,
        origin: ChangeOrigin,
    ) {
        match policy {
            WritePolicy::Replace => {
                // a replace discards the current document, so sentinels
                // resolve against the empty base
                let document = Arc::new(Document::local(path.id(), resolve_update(data)));
                self.cache.write_document(path.as_str(), document.clone());
                let event = self.propagator.event(
                    ChangeKind::DocumentReplaced {
                        parent: path.parent(),
                        document,
                    },
                    origin,
                );
                self.propagator.apply(&event);
            }
            WritePolicy::Merge | WritePolicy::MergeFields(_) => {
                let merge_policy = match policy {
                    WritePolicy::MergeFields(fields) => MergePolicy::Fields(fields.clone()),
                    _ => MergePolicy::Merge {
                        allow_dot_notation: false,
                    },
                };
                let next = match self.cache.document(path.as_str()) {
                    Some(current) => Arc::new(patch_document(&current, data, &merge_policy)),
                    // a merge-write may create the document, so the local
                    // entry appears even with nothing cached yet
                    None => Arc::new(Document::local(
                        path.id(),
                        merge_update(&DocumentData::new(), data, &merge_policy),
                    )),
                };
                self.cache.write_document(path.as_str(), next);
                self.propagate_patch(path, data, merge_policy, origin);
            }
            WritePolicy::Update => {
                let merge_policy = MergePolicy::Merge {
                    allow_dot_notation: true,
                };
                // an update cannot create the document; with nothing cached
                // there is no local state to re-derive
                self.cache.apply_document(path.as_str(), |current| {
                    Some(Arc::new(patch_document(current, data, &merge_policy)))
                });
                self.propagate_patch(path, data, merge_policy, origin);
            }
        }
    }

    fn propagate_patch(
        &self,
        path: &DocumentPath,
        data: &UpdateMap,
        policy: MergePolicy,
        origin: ChangeOrigin,
    ) {
        let event = self.propagator.event(
            ChangeKind::DocumentPatched {
                parent: path.parent(),
                doc_id: path.id().to_string(),
                patch: data.clone(),
                policy,
            },
            origin,
        );
        self.propagator.apply(&event);
    }

    /// Apply the local half of a delete: tombstone the document entry, then
    /// remove it from registered lists.
    pub(crate) fn apply_local_delete(&self, path: &DocumentPath, origin: ChangeOrigin) {
        self.cache
            .write_document(path.as_str(), Arc::new(Document::tombstone(path.id())));
        let event = self.propagator.event(
            ChangeKind::DocumentDeleted {
                parent: path.parent(),
                doc_id: path.id().to_string(),
            },
            origin,
        );
        self.propagator.apply(&event);
    }
}
