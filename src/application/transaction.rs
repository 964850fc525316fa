//! Transaction wrapper.
//!
//! Retry and consistency semantics belong entirely to the remote store's
//! native transaction primitive. The wrapper adds exactly one thing: every
//! read and write performed through the handle is mirrored into the local
//! cache after, and only after, a successful commit. Attempts that retry
//! never leak into the visible cache; a failed or aborted transaction leaves
//! the cache untouched and propagates the caller's error unchanged.

use std::sync::Mutex;

use futures::future::BoxFuture;

use crate::cache::ChangeOrigin;
use crate::domain::document::Snapshot;
use crate::domain::field_value::UpdateMap;
use crate::domain::path::DocumentPath;

use super::documents::absorb_document_snapshot;
use super::error::Error;
use super::mirror::Mirror;
use super::options::{FetchOptions, SetOptions};
use super::remote::{RemoteError, RemoteTransaction, WritePolicy};

/// One operation to replay into the cache once the transaction commits.
enum MirrorOp {
    Read {
        snapshot: Snapshot,
    },
    Write {
        path: DocumentPath,
        data: UpdateMap,
        policy: WritePolicy,
    },
    Delete {
        path: DocumentPath,
    },
}

/// The transaction view handed to the update function.
///
/// Wraps the store's own transaction handle and records each operation; the
/// log dies with the attempt unless that attempt commits.
pub struct TransactionHandle {
    inner: Box<dyn RemoteTransaction>,
    ops: Vec<MirrorOp>,
}

impl TransactionHandle {
    fn new(inner: Box<dyn RemoteTransaction>) -> Self {
        Self {
            inner,
            ops: Vec::new(),
        }
    }

    fn into_ops(self) -> Vec<MirrorOp> {
        self.ops
    }

    /// Read a document inside the transaction. Reads observe committed state
    /// plus this attempt's staged writes.
    pub async fn get(&mut self, path: &str) -> Result<Snapshot, Error> {
        let path = DocumentPath::parse(path)?;
        let snapshot = self.inner.get(&path).await?;
        self.ops.push(MirrorOp::Read {
            snapshot: snapshot.clone(),
        });
        Ok(snapshot)
    }

    /// Stage a set. Applied remotely at commit.
    pub fn set(&mut self, path: &str, data: UpdateMap, options: &SetOptions) -> Result<(), Error> {
        let policy = match options {
            SetOptions::Replace => WritePolicy::Replace,
            SetOptions::Merge => WritePolicy::Merge,
            SetOptions::MergeFields(fields) => WritePolicy::MergeFields(fields.clone()),
        };
        self.stage_write(path, data, policy)
    }

    /// Stage an update of an existing document.
    pub fn update(&mut self, path: &str, data: UpdateMap) -> Result<(), Error> {
        self.stage_write(path, data, WritePolicy::Update)
    }

    /// Stage a delete.
    pub fn delete(&mut self, path: &str) -> Result<(), Error> {
        let path = DocumentPath::parse(path)?;
        self.inner.delete(&path);
        self.ops.push(MirrorOp::Delete { path });
        Ok(())
    }

    fn stage_write(&mut self, path: &str, data: UpdateMap, policy: WritePolicy) -> Result<(), Error> {
        let path = DocumentPath::parse(path)?;
        self.inner.set(&path, data.clone(), policy.clone());
        self.ops.push(MirrorOp::Write { path, data, policy });
        Ok(())
    }
}

fn store_in<T>(slot: &Mutex<T>, value: T) {
    match slot.lock() {
        Ok(mut guard) => *guard = value,
        Err(poisoned) => *poisoned.into_inner() = value,
    }
}

fn take_out<T>(slot: Mutex<T>) -> T {
    match slot.into_inner() {
        Ok(value) => value,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl Mirror {
    /// Run `update_fn` under the remote store's native transaction.
    ///
    /// The update function may run several times; only the attempt that
    /// commits has its reads and writes mirrored into the cache, exactly
    /// once. An `Err` from `update_fn` aborts the transaction and comes back
    /// unchanged.
    pub async fn run_transaction<T, F>(
        &self,
        update_fn: F,
        options: &FetchOptions,
    ) -> Result<T, Error>
    where
        T: Send,
        F: for<'h> Fn(&'h mut TransactionHandle) -> BoxFuture<'h, Result<T, Error>> + Send + Sync,
    {
        let committed_ops: Mutex<Vec<MirrorOp>> = Mutex::new(Vec::new());
        let outcome: Mutex<Option<Result<T, Error>>> = Mutex::new(None);

        let remote_result = self
            .store()
            .run_transaction(Box::new(|tx| {
                let update_fn = &update_fn;
                let committed_ops = &committed_ops;
                let outcome = &outcome;
                Box::pin(async move {
                    let mut handle = TransactionHandle::new(tx);
                    let result = update_fn(&mut handle).await;
                    let ops = handle.into_ops();
                    match result {
                        Ok(value) => {
                            store_in(committed_ops, ops);
                            store_in(outcome, Some(Ok(value)));
                            Ok(())
                        }
                        Err(error) => {
                            store_in(outcome, Some(Err(error)));
                            Err(RemoteError::aborted("transaction update function failed"))
                        }
                    }
                })
            }))
            .await;

        match remote_result {
            Ok(()) => {
                self.mirror_committed_ops(take_out(committed_ops), options);
                match take_out(outcome) {
                    Some(Ok(value)) => Ok(value),
                    Some(Err(error)) => Err(error),
                    None => Err(Error::unexpected("transaction committed without a result")),
                }
            }
            Err(remote_error) => match take_out(outcome) {
                // surface the update function's own error, not our wrapper
                Some(Err(error)) if matches!(remote_error, RemoteError::Aborted { .. }) => {
                    Err(error)
                }
                _ => Err(remote_error.into()),
            },
        }
    }

    fn mirror_committed_ops(&self, ops: Vec<MirrorOp>, options: &FetchOptions) {
        for op in ops {
            match op {
                MirrorOp::Read { snapshot } => {
                    if let Ok(path) = DocumentPath::parse(&snapshot.path) {
                        absorb_document_snapshot(
                            self.cache(),
                            self.propagator(),
                            &path,
                            snapshot,
                            options,
                            ChangeOrigin::Transaction,
                        );
                    }
                }
                MirrorOp::Write { path, data, policy } => {
                    self.apply_local_write(&path, &data, &policy, ChangeOrigin::Transaction);
                }
                MirrorOp::Delete { path } => {
                    self.apply_local_delete(&path, ChangeOrigin::Transaction);
                }
            }
        }
    }
}
