//! Single-document reads and real-time watches.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures::channel::oneshot;

use crate::cache::{ChangeKind, ChangeOrigin, KeyedCache, Propagator};
use crate::domain::document::{SharedDocument, Snapshot};
use crate::domain::path::DocumentPath;

use super::error::Error;
use super::listener::{ListenerHandle, take_once};
use super::mirror::Mirror;
use super::options::FetchOptions;
use super::remote::SnapshotCallback;
use super::validate::to_document;

/// Absorb one document snapshot: validate, write the single-document cache
/// entry, and fan the full next state out to registered lists. Shared by
/// fetches, listeners, and committed transaction reads.
pub(crate) fn absorb_document_snapshot(
    cache: &KeyedCache,
    propagator: &Propagator,
    path: &DocumentPath,
    snapshot: Snapshot,
    options: &FetchOptions,
    origin: ChangeOrigin,
) -> SharedDocument {
    let document = to_document(snapshot, options);
    cache.write_document(path.as_str(), document.clone());
    let event = propagator.event(
        ChangeKind::DocumentReplaced {
            parent: path.parent(),
            document: document.clone(),
        },
        origin,
    );
    propagator.apply(&event);
    document
}

impl Mirror {
    /// Fetch one document from the remote store and absorb it into the
    /// cache. A missing document comes back with `exists = false`.
    pub async fn get_document(
        &self,
        path: &str,
        options: &FetchOptions,
    ) -> Result<SharedDocument, Error> {
        let path = DocumentPath::parse(path)?;
        let snapshot = self.store().get_one(&path).await?;
        Ok(absorb_document_snapshot(
            self.cache(),
            self.propagator(),
            &path,
            snapshot,
            options,
            ChangeOrigin::Fetch,
        ))
    }

    /// Subscribe to one document.
    ///
    /// Resolves once the first snapshot arrives; every snapshot, including
    /// the first, is absorbed into the cache through the same path as
    /// optimistic writes. The handle stops the feed idempotently and on drop.
    pub async fn watch_document(
        &self,
        path: &str,
        options: &FetchOptions,
    ) -> Result<(SharedDocument, ListenerHandle), Error> {
        let path = DocumentPath::parse(path)?;
        let active = Arc::new(AtomicBool::new(true));
        let (first_tx, first_rx) = oneshot::channel();
        let first_tx = Arc::new(Mutex::new(Some(first_tx)));

        let cache = self.cache().clone();
        let propagator = self.propagator().clone();
        let callback_path = path.clone();
        let callback_options = options.clone();
        let callback_active = active.clone();
        let on_change: SnapshotCallback = Arc::new(move |snapshot| {
            if !callback_active.load(Ordering::Acquire) {
                return;
            }
            let document = absorb_document_snapshot(
                &cache,
                &propagator,
                &callback_path,
                snapshot,
                &callback_options,
                ChangeOrigin::RemoteListener,
            );
            if let Some(first_tx) = take_once(&first_tx) {
                let _ = first_tx.send(document);
            }
        });

        let subscription = self.store().subscribe_one(&path, on_change).await?;
        let handle = ListenerHandle::new(active, subscription);
        let initial = first_rx
            .await
            .map_err(|_| Error::unexpected("listener closed before the first snapshot"))?;
        Ok((initial, handle))
    }
}
