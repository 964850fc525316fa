//! Collection reads, real-time watches, and refetch-driven revalidation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures::channel::oneshot;
use tracing::debug;

use crate::cache::{KeyedCache, ListKey, SharedList};
use crate::domain::document::Snapshot;
use crate::domain::path::CollectionPath;

use super::error::Error;
use super::listener::{ListenerHandle, take_once};
use super::mirror::Mirror;
use super::options::FetchOptions;
use super::query::Query;
use super::remote::SnapshotsCallback;
use super::validate::to_document;

const SOURCE: &str = "application::collections";

/// Absorb one list result: validate every member, refresh each member's
/// single-document cache entry, and replace the list entry under `key`.
///
/// Member documents do not fan out to other lists here; a query result
/// speaks only for its own subscription, and sibling lists have their own
/// feed.
pub(crate) fn absorb_collection_snapshots(
    cache: &KeyedCache,
    path: &CollectionPath,
    key: &ListKey,
    snapshots: Vec<Snapshot>,
    options: &FetchOptions,
) -> SharedList {
    let documents = snapshots
        .into_iter()
        .map(|snapshot| {
            let doc_path = path.child(&snapshot.id);
            let document = to_document(snapshot, options);
            cache.write_document(doc_path.as_str(), document.clone());
            document
        })
        .collect::<Vec<_>>();

    debug!(
        target_module = SOURCE,
        path = %path,
        cache_key = %key,
        len = documents.len(),
        "Collection result absorbed"
    );

    let list: SharedList = Arc::new(documents);
    cache.write_list(key.clone(), list.clone());
    list
}

impl Mirror {
    /// Fetch the documents matching `query` and absorb them into the cache.
    ///
    /// Establishing the list entry also registers its cache key, so later
    /// single-document mutations propagate into it.
    pub async fn get_collection(
        &self,
        path: &str,
        query: &Query,
        options: &FetchOptions,
    ) -> Result<SharedList, Error> {
        let path = CollectionPath::parse(path)?;
        let key = self.registry().register(path.as_str(), query);
        let snapshots = self.store().get_many(&path, query).await?;
        Ok(absorb_collection_snapshots(
            self.cache(),
            &path,
            &key,
            snapshots,
            options,
        ))
    }

    /// Subscribe to a list query.
    ///
    /// Same contract as [`Mirror::watch_document`]: resolves on the first
    /// result, keeps the cache entry fresh until unsubscribed.
    pub async fn watch_collection(
        &self,
        path: &str,
        query: &Query,
        options: &FetchOptions,
    ) -> Result<(SharedList, ListenerHandle), Error> {
        let path = CollectionPath::parse(path)?;
        let key = self.registry().register(path.as_str(), query);
        let active = Arc::new(AtomicBool::new(true));
        let (first_tx, first_rx) = oneshot::channel();
        let first_tx = Arc::new(Mutex::new(Some(first_tx)));

        let cache = self.cache().clone();
        let callback_path = path.clone();
        let callback_options = options.clone();
        let callback_active = active.clone();
        let on_change: SnapshotsCallback = Arc::new(move |snapshots| {
            if !callback_active.load(Ordering::Acquire) {
                return;
            }
            let list = absorb_collection_snapshots(
                &cache,
                &callback_path,
                &key,
                snapshots,
                &callback_options,
            );
            if let Some(first_tx) = take_once(&first_tx) {
                let _ = first_tx.send(list);
            }
        });

        let subscription = self.store().subscribe_many(&path, query, on_change).await?;
        let handle = ListenerHandle::new(active, subscription);
        let initial = first_rx
            .await
            .map_err(|_| Error::unexpected("listener closed before the first result"))?;
        Ok((initial, handle))
    }

    /// Re-fetch every registered query under `path` and replace its cached
    /// list. Useful for a pull-to-refresh that is nowhere near the code that
    /// established the subscriptions.
    pub async fn revalidate_collection(
        &self,
        path: &str,
        options: &FetchOptions,
    ) -> Result<(), Error> {
        let path = CollectionPath::parse(path)?;
        for (key, query) in self.registry().queries(path.as_str()) {
            let snapshots = self.store().get_many(&path, &query).await?;
            absorb_collection_snapshots(self.cache(), &path, &key, snapshots, options);
        }
        Ok(())
    }
}
