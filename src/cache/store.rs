//! Keyed cache storage.
//!
//! The minimal stale-while-revalidate contract the sync engine needs: read a
//! key, write a key, or mutate a key with an updater function. Writes never
//! trigger revalidation; refetching is an explicit, caller-driven operation.
//!
//! Both maps hold `Arc`ed values. An updater that returns `None` leaves the
//! entry untouched (same reference, no allocation), which is what keeps
//! unaffected lists from churning downstream comparisons.

use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use lru::LruCache;

use crate::domain::document::SharedDocument;

use super::config::CacheConfig;
use super::keys::ListKey;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

/// A cached list: shared entries behind a shared spine, so an untouched list
/// (or entry) keeps its reference across propagation.
pub type SharedList = std::sync::Arc<Vec<SharedDocument>>;

/// Keyed cache for single documents and list queries.
///
/// LRU-bounded per kind, with limits from `CacheConfig`. A disabled cache
/// turns every operation into a no-op, so callers never branch on it.
pub struct KeyedCache {
    config: CacheConfig,
    documents: RwLock<LruCache<String, SharedDocument>>,
    lists: RwLock<LruCache<ListKey, SharedList>>,
    stats: CacheStats,
}

impl KeyedCache {
    pub fn new(config: CacheConfig) -> Self {
        let documents = RwLock::new(LruCache::new(config.document_limit_non_zero()));
        let lists = RwLock::new(LruCache::new(config.list_limit_non_zero()));
        Self {
            config,
            documents,
            lists,
            stats: CacheStats::default(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Read the cached document at `path`.
    pub fn document(&self, path: &str) -> Option<SharedDocument> {
        if !self.config.is_enabled() {
            return None;
        }
        let cached = rw_write(&self.documents, SOURCE, "document")
            .get(path)
            .cloned();
        match cached {
            Some(doc) => {
                self.stats.document_hits.fetch_add(1, Ordering::Relaxed);
                Some(doc)
            }
            None => {
                self.stats.document_misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Write the document entry at `path`.
    pub fn write_document(&self, path: &str, document: SharedDocument) {
        if !self.config.is_enabled() {
            return;
        }
        rw_write(&self.documents, SOURCE, "write_document").put(path.to_string(), document);
        self.stats.document_writes.fetch_add(1, Ordering::Relaxed);
    }

    /// Mutate the document entry at `path` with an updater.
    ///
    /// The updater runs synchronously under the lock and only if an entry is
    /// cached; returning `None` leaves the entry untouched. Returns whether a
    /// write happened.
    pub fn apply_document(
        &self,
        path: &str,
        updater: impl FnOnce(&SharedDocument) -> Option<SharedDocument>,
    ) -> bool {
        if !self.config.is_enabled() {
            return false;
        }
        let mut documents = rw_write(&self.documents, SOURCE, "apply_document");
        let Some(current) = documents.get(path) else {
            return false;
        };
        match updater(current) {
            Some(next) => {
                documents.put(path.to_string(), next);
                drop(documents);
                self.stats.document_writes.fetch_add(1, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    /// Read the cached list under `key`.
    pub fn list(&self, key: &ListKey) -> Option<SharedList> {
        if !self.config.is_enabled() {
            return None;
        }
        rw_write(&self.lists, SOURCE, "list").get(key).cloned()
    }

    /// Write the list entry under `key`.
    pub fn write_list(&self, key: ListKey, list: SharedList) {
        if !self.config.is_enabled() {
            return;
        }
        rw_write(&self.lists, SOURCE, "write_list").put(key, list);
        self.stats.list_writes.fetch_add(1, Ordering::Relaxed);
    }

    /// Mutate the list entry under `key` with an updater.
    ///
    /// Same contract as [`KeyedCache::apply_document`]: synchronous, only
    /// applied to a cached entry, `None` means untouched.
    pub fn apply_list(
        &self,
        key: &ListKey,
        updater: impl FnOnce(&SharedList) -> Option<SharedList>,
    ) -> bool {
        if !self.config.is_enabled() {
            return false;
        }
        let mut lists = rw_write(&self.lists, SOURCE, "apply_list");
        let Some(current) = lists.get(key) else {
            return false;
        };
        match updater(current) {
            Some(next) => {
                lists.put(key.clone(), next);
                drop(lists);
                self.stats.list_writes.fetch_add(1, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    /// Clear all cached data.
    pub fn clear(&self) {
        rw_write(&self.documents, SOURCE, "clear.documents").clear();
        rw_write(&self.lists, SOURCE, "clear.lists").clear();
    }

    pub fn document_count(&self) -> usize {
        rw_read(&self.documents, SOURCE, "document_count").len()
    }

    pub fn list_count(&self) -> usize {
        rw_read(&self.lists, SOURCE, "list_count").len()
    }

    /// Counters since construction.
    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }
}

/// Internal write/hit counters, cheap enough to keep always-on.
#[derive(Default)]
struct CacheStats {
    document_hits: AtomicU64,
    document_misses: AtomicU64,
    document_writes: AtomicU64,
    list_writes: AtomicU64,
}

impl CacheStats {
    fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            document_hits: self.document_hits.load(Ordering::Relaxed),
            document_misses: self.document_misses.load(Ordering::Relaxed),
            document_writes: self.document_writes.load(Ordering::Relaxed),
            list_writes: self.list_writes.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStatsSnapshot {
    pub document_hits: u64,
    pub document_misses: u64,
    pub document_writes: u64,
    pub list_writes: u64,
}
