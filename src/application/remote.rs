//! The remote-store port.
//!
//! Traits describing what the sync engine consumes from the backing document
//! store: point reads, query reads, per-document push subscriptions, writes,
//! and a native transaction primitive. Adapters live under `infra`.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::future::BoxFuture;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::document::Snapshot;
use crate::domain::field_value::UpdateMap;
use crate::domain::path::{CollectionPath, DocumentPath};

use super::query::Query;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("remote document not found at `{path}`")]
    NotFound { path: String },
    #[error("transaction contention: {message}")]
    Conflict { message: String },
    #[error("transaction aborted: {message}")]
    Aborted { message: String },
    #[error("remote store unavailable: {0}")]
    Unavailable(String),
    #[error("remote backend error: {0}")]
    Backend(String),
}

impl RemoteError {
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn aborted(message: impl Into<String>) -> Self {
        Self::Aborted {
            message: message.into(),
        }
    }
}

/// How a write lands on the remote document.
#[derive(Debug, Clone, PartialEq)]
pub enum WritePolicy {
    /// Replace the document in its entirety.
    Replace,
    /// Merge every payload field over the existing document.
    Merge,
    /// Merge only the enumerated field paths.
    MergeFields(Vec<String>),
    /// Patch an existing document; fails with `NotFound` if it is missing.
    Update,
}

/// Callback for single-document push notifications.
pub type SnapshotCallback = Arc<dyn Fn(Snapshot) + Send + Sync>;

/// Callback for list-query push notifications.
pub type SnapshotsCallback = Arc<dyn Fn(Vec<Snapshot>) + Send + Sync>;

/// A live remote subscription. Cancellation is idempotent; dropping the
/// subscription cancels it.
pub struct Subscription {
    id: Uuid,
    cancel: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl Subscription {
    pub fn new(id: Uuid, cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            id,
            cancel: Mutex::new(Some(Box::new(cancel))),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Detach from the remote store. Safe to call more than once.
    pub fn cancel(&self) {
        let cancel = match self.cancel.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(cancel) = cancel {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// One attempt's view of a native remote transaction.
///
/// Reads observe committed state plus this attempt's staged writes; staged
/// writes become visible to others only at commit. The view is handed out by
/// value; the store keeps its own handle on the attempt's state for commit.
#[async_trait]
pub trait RemoteTransaction: Send {
    async fn get(&mut self, path: &DocumentPath) -> Result<Snapshot, RemoteError>;
    fn set(&mut self, path: &DocumentPath, data: UpdateMap, policy: WritePolicy);
    fn delete(&mut self, path: &DocumentPath);
}

/// The update function handed to the store's transaction primitive. Called
/// once per attempt; an `Err` aborts without retry, while commit-time
/// contention retries up to the store's bound.
pub type TransactionFn<'a> = Box<
    dyn FnMut(Box<dyn RemoteTransaction>) -> BoxFuture<'a, Result<(), RemoteError>> + Send + 'a,
>;

/// The backing document store.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch one document. A missing document is a snapshot with
    /// `exists = false`, not an error.
    async fn get_one(&self, path: &DocumentPath) -> Result<Snapshot, RemoteError>;

    /// Fetch the documents matching `query` under `path`.
    async fn get_many(
        &self,
        path: &CollectionPath,
        query: &Query,
    ) -> Result<Vec<Snapshot>, RemoteError>;

    /// Subscribe to one document. Fires once with the current state, then on
    /// every change, until the subscription is cancelled.
    async fn subscribe_one(
        &self,
        path: &DocumentPath,
        on_change: SnapshotCallback,
    ) -> Result<Subscription, RemoteError>;

    /// Subscribe to a list query; same firing contract as `subscribe_one`.
    async fn subscribe_many(
        &self,
        path: &CollectionPath,
        query: &Query,
        on_change: SnapshotsCallback,
    ) -> Result<Subscription, RemoteError>;

    /// Apply a write. Sentinel values in `data` are resolved by the store,
    /// authoritatively.
    async fn write(
        &self,
        path: &DocumentPath,
        data: UpdateMap,
        policy: WritePolicy,
    ) -> Result<(), RemoteError>;

    /// Delete a document. Deleting a missing document succeeds.
    async fn delete(&self, path: &DocumentPath) -> Result<(), RemoteError>;

    /// Run `update` under the store's native transaction semantics:
    /// read-your-writes within an attempt, automatic retry on conflicting
    /// concurrent writes, bounded attempt count.
    async fn run_transaction(&self, update: TransactionFn<'_>) -> Result<(), RemoteError>;
}
