//! Embedded in-memory remote store.
//!
//! A small but honest implementation of the remote port: versioned documents,
//! query evaluation good enough for local work, push notifications delivered
//! synchronously on change, and native transactions with read-version
//! validation and bounded retry on contention. Integration tests and examples
//! run against this adapter.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::application::query::{Constraint, Direction, FilterOp, Query};
use crate::application::remote::{
    RemoteError, RemoteStore, RemoteTransaction, SnapshotCallback, SnapshotsCallback,
    Subscription, TransactionFn, WritePolicy,
};
use crate::cache::{MergePolicy, merge_update, resolve_update};
use crate::domain::document::{DocumentData, Snapshot};
use crate::domain::dot_notation::get_value;
use crate::domain::field_value::UpdateMap;
use crate::domain::path::{CollectionPath, DocumentPath};

const SOURCE: &str = "infra::memory";

/// Commit attempts before a contended transaction gives up.
pub const MAX_TRANSACTION_ATTEMPTS: u32 = 5;

struct StoredDocument {
    data: DocumentData,
    version: u64,
}

struct DocListener {
    id: Uuid,
    path: String,
    callback: SnapshotCallback,
}

struct QueryListener {
    id: Uuid,
    path: CollectionPath,
    query: Query,
    callback: SnapshotsCallback,
}

#[derive(Default)]
struct MemoryState {
    documents: HashMap<String, StoredDocument>,
    doc_listeners: Vec<DocListener>,
    query_listeners: Vec<QueryListener>,
    next_version: u64,
}

/// One queued push notification, fired after the state lock is released.
enum Notification {
    Document(SnapshotCallback, Snapshot),
    List(SnapshotsCallback, Vec<Snapshot>),
}

fn dispatch(notifications: Vec<Notification>) {
    for notification in notifications {
        match notification {
            Notification::Document(callback, snapshot) => callback(snapshot),
            Notification::List(callback, snapshots) => callback(snapshots),
        }
    }
}

impl MemoryState {
    fn bump_version(&mut self) -> u64 {
        self.next_version += 1;
        self.next_version
    }

    fn version_of(&self, path: &str) -> u64 {
        self.documents.get(path).map(|doc| doc.version).unwrap_or(0)
    }

    fn snapshot_of(&self, path: &DocumentPath) -> Snapshot {
        let stored = self.documents.get(path.as_str());
        Snapshot {
            path: path.as_str().to_string(),
            id: path.id().to_string(),
            exists: stored.is_some(),
            data: stored.map(|doc| doc.data.clone()),
            has_pending_writes: false,
        }
    }

    fn eval_query(&self, path: &CollectionPath, query: &Query) -> Vec<Snapshot> {
        let mut members: Vec<(&String, &StoredDocument)> = self
            .documents
            .iter()
            .filter(|(doc_path, _)| {
                parent_of(doc_path).is_some_and(|parent| collection_matches(path, query, parent))
            })
            .filter(|(_, stored)| matches_filters(&stored.data, query))
            .collect();

        // HashMap iteration order is arbitrary; anchor on the path before
        // applying the query's own ordering so results are deterministic.
        members.sort_by(|(a, _), (b, _)| a.cmp(b));
        order_members(&mut members, query);

        let mut snapshots: Vec<Snapshot> = members
            .into_iter()
            .map(|(doc_path, stored)| Snapshot {
                path: doc_path.clone(),
                id: doc_path.rsplit('/').next().unwrap_or(doc_path).to_string(),
                exists: true,
                data: Some(stored.data.clone()),
                has_pending_writes: false,
            })
            .collect();

        for constraint in &query.constraints {
            if let Constraint::Limit(count) = constraint {
                snapshots.truncate(*count);
            }
        }
        snapshots
    }

    fn apply_write(
        &mut self,
        path: &DocumentPath,
        data: &UpdateMap,
        policy: &WritePolicy,
    ) -> Result<(), RemoteError> {
        let current = self.documents.get(path.as_str()).map(|doc| &doc.data);
        if matches!(policy, WritePolicy::Update) && current.is_none() {
            return Err(RemoteError::not_found(path.as_str()));
        }
        let next = next_data(current, data, policy);
        let version = self.bump_version();
        self.documents.insert(
            path.as_str().to_string(),
            StoredDocument {
                data: next,
                version,
            },
        );
        Ok(())
    }

    /// Notifications for changes to `paths`: one per matching document
    /// listener, one per affected query listener (even when several changed
    /// documents share it).
    fn notifications_for(&self, paths: &[DocumentPath]) -> Vec<Notification> {
        let mut notifications = Vec::new();
        for path in paths {
            for listener in &self.doc_listeners {
                if listener.path == path.as_str() {
                    notifications.push(Notification::Document(
                        listener.callback.clone(),
                        self.snapshot_of(path),
                    ));
                }
            }
        }

        let parents: Vec<CollectionPath> = paths.iter().map(DocumentPath::parent).collect();
        for listener in &self.query_listeners {
            let affected = parents
                .iter()
                .any(|parent| collection_matches(&listener.path, &listener.query, parent.as_str()));
            if affected {
                notifications.push(Notification::List(
                    listener.callback.clone(),
                    self.eval_query(&listener.path, &listener.query),
                ));
            }
        }
        notifications
    }
}

fn parent_of(doc_path: &str) -> Option<&str> {
    doc_path.rsplit_once('/').map(|(parent, _)| parent)
}

fn collection_matches(path: &CollectionPath, query: &Query, parent: &str) -> bool {
    if query.collection_group {
        parent.rsplit('/').next() == Some(path.as_str())
    } else {
        parent == path.as_str()
    }
}

fn next_data(current: Option<&DocumentData>, data: &UpdateMap, policy: &WritePolicy) -> DocumentData {
    let empty = DocumentData::new();
    let base = current.unwrap_or(&empty);
    match policy {
        WritePolicy::Replace => resolve_update(data),
        WritePolicy::Merge => merge_update(
            base,
            data,
            &MergePolicy::Merge {
                allow_dot_notation: false,
            },
        ),
        WritePolicy::MergeFields(fields) => {
            merge_update(base, data, &MergePolicy::Fields(fields.clone()))
        }
        WritePolicy::Update => merge_update(
            base,
            data,
            &MergePolicy::Merge {
                allow_dot_notation: true,
            },
        ),
    }
}

fn matches_filters(data: &DocumentData, query: &Query) -> bool {
    query.constraints.iter().all(|constraint| match constraint {
        Constraint::Where { field, op, value } => eval_where(data, field, *op, value),
        _ => true,
    })
}

fn eval_where(data: &DocumentData, field: &str, op: FilterOp, expected: &Value) -> bool {
    let actual = get_value(data, field, true);
    match op {
        FilterOp::Eq => actual == Some(expected),
        FilterOp::Ne => actual.is_some_and(|value| value != expected),
        FilterOp::Lt => ordered(actual, expected, Ordering::is_lt),
        FilterOp::Le => ordered(actual, expected, Ordering::is_le),
        FilterOp::Gt => ordered(actual, expected, Ordering::is_gt),
        FilterOp::Ge => ordered(actual, expected, Ordering::is_ge),
        FilterOp::ArrayContains => actual
            .and_then(Value::as_array)
            .is_some_and(|items| items.contains(expected)),
        FilterOp::In => expected
            .as_array()
            .zip(actual)
            .is_some_and(|(candidates, value)| candidates.contains(value)),
        FilterOp::NotIn => expected
            .as_array()
            .zip(actual)
            .is_some_and(|(candidates, value)| !candidates.contains(value)),
    }
}

fn ordered(actual: Option<&Value>, expected: &Value, check: fn(Ordering) -> bool) -> bool {
    actual
        .and_then(|value| compare_values(value, expected))
        .is_some_and(check)
}

fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn order_members(members: &mut [(&String, &StoredDocument)], query: &Query) {
    // Stable sorts applied in reverse give the first order_by the highest
    // priority.
    for constraint in query.constraints.iter().rev() {
        let Constraint::OrderBy { field, direction } = constraint else {
            continue;
        };
        members.sort_by(|(_, a), (_, b)| {
            let ordering = match (
                get_value(&a.data, field, true),
                get_value(&b.data, field, true),
            ) {
                (Some(a), Some(b)) => compare_values(a, b).unwrap_or(Ordering::Equal),
                (Some(_), None) => Ordering::Greater,
                (None, Some(_)) => Ordering::Less,
                (None, None) => Ordering::Equal,
            };
            match direction {
                Direction::Ascending => ordering,
                Direction::Descending => ordering.reverse(),
            }
        });
    }
}

/// In-memory implementation of [`RemoteStore`].
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a document directly, without firing listeners. Handy for
    /// arranging fixtures.
    pub fn seed(&self, path: &DocumentPath, data: DocumentData) {
        let mut state = self.lock();
        let version = state.bump_version();
        state.documents.insert(
            path.as_str().to_string(),
            StoredDocument { data, version },
        );
    }

    pub fn document_count(&self) -> usize {
        self.lock().documents.len()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        lock_state(&self.state)
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn get_one(&self, path: &DocumentPath) -> Result<Snapshot, RemoteError> {
        Ok(self.lock().snapshot_of(path))
    }

    async fn get_many(
        &self,
        path: &CollectionPath,
        query: &Query,
    ) -> Result<Vec<Snapshot>, RemoteError> {
        Ok(self.lock().eval_query(path, query))
    }

    async fn subscribe_one(
        &self,
        path: &DocumentPath,
        on_change: SnapshotCallback,
    ) -> Result<Subscription, RemoteError> {
        let id = Uuid::new_v4();
        let initial = {
            let mut state = self.lock();
            state.doc_listeners.push(DocListener {
                id,
                path: path.as_str().to_string(),
                callback: on_change.clone(),
            });
            state.snapshot_of(path)
        };
        on_change(initial);

        let state = self.state.clone();
        Ok(Subscription::new(id, move || {
            let mut state = lock_state(&state);
            state.doc_listeners.retain(|listener| listener.id != id);
        }))
    }

    async fn subscribe_many(
        &self,
        path: &CollectionPath,
        query: &Query,
        on_change: SnapshotsCallback,
    ) -> Result<Subscription, RemoteError> {
        let id = Uuid::new_v4();
        let initial = {
            let mut state = self.lock();
            state.query_listeners.push(QueryListener {
                id,
                path: path.clone(),
                query: query.clone(),
                callback: on_change.clone(),
            });
            state.eval_query(path, query)
        };
        on_change(initial);

        let state = self.state.clone();
        Ok(Subscription::new(id, move || {
            let mut state = lock_state(&state);
            state.query_listeners.retain(|listener| listener.id != id);
        }))
    }

    async fn write(
        &self,
        path: &DocumentPath,
        data: UpdateMap,
        policy: WritePolicy,
    ) -> Result<(), RemoteError> {
        let notifications = {
            let mut state = self.lock();
            state.apply_write(path, &data, &policy)?;
            state.notifications_for(std::slice::from_ref(path))
        };
        dispatch(notifications);
        Ok(())
    }

    async fn delete(&self, path: &DocumentPath) -> Result<(), RemoteError> {
        let notifications = {
            let mut state = self.lock();
            if state.documents.remove(path.as_str()).is_none() {
                return Ok(());
            }
            state.notifications_for(std::slice::from_ref(path))
        };
        dispatch(notifications);
        Ok(())
    }

    async fn run_transaction(&self, mut update: TransactionFn<'_>) -> Result<(), RemoteError> {
        for attempt in 1..=MAX_TRANSACTION_ATTEMPTS {
            let attempt_state = Arc::new(Mutex::new(TxState::default()));
            let tx = MemoryTransaction {
                state: self.state.clone(),
                attempt: attempt_state.clone(),
            };
            update(Box::new(tx)).await?;
            match commit(&self.state, &attempt_state) {
                Ok(notifications) => {
                    dispatch(notifications);
                    return Ok(());
                }
                Err(error @ RemoteError::Conflict { .. }) => {
                    if attempt == MAX_TRANSACTION_ATTEMPTS {
                        return Err(error);
                    }
                    debug!(
                        target_module = SOURCE,
                        attempt,
                        "Transaction contended; retrying"
                    );
                }
                Err(error) => return Err(error),
            }
        }
        Err(RemoteError::conflict("transaction attempts exhausted"))
    }
}

enum StagedOp {
    Write {
        path: DocumentPath,
        data: UpdateMap,
        policy: WritePolicy,
    },
    Delete {
        path: DocumentPath,
    },
}

/// One attempt's reads and staged writes. Shared between the view handed to
/// the update function and the store's own commit step.
#[derive(Default)]
struct TxState {
    /// First-read version per path; validated at commit.
    reads: Vec<(String, u64)>,
    staged: Vec<StagedOp>,
}

fn lock_state<T>(state: &Mutex<T>) -> MutexGuard<'_, T> {
    match state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn commit(
    state: &Mutex<MemoryState>,
    attempt: &Mutex<TxState>,
) -> Result<Vec<Notification>, RemoteError> {
    let attempt = std::mem::take(&mut *lock_state(attempt));
    let mut state = lock_state(state);

    for (path, version) in &attempt.reads {
        if state.version_of(path) != *version {
            return Err(RemoteError::conflict(format!(
                "document `{path}` changed during the transaction"
            )));
        }
    }

    // Validate before mutating so a failing commit applies nothing.
    let mut existing: HashSet<String> = state.documents.keys().cloned().collect();
    for op in &attempt.staged {
        match op {
            StagedOp::Write { path, policy, .. } => {
                if matches!(policy, WritePolicy::Update) && !existing.contains(path.as_str()) {
                    return Err(RemoteError::not_found(path.as_str()));
                }
                existing.insert(path.as_str().to_string());
            }
            StagedOp::Delete { path } => {
                existing.remove(path.as_str());
            }
        }
    }

    let mut affected: Vec<DocumentPath> = Vec::new();
    for op in attempt.staged {
        let path = match op {
            StagedOp::Write { path, data, policy } => {
                state.apply_write(&path, &data, &policy)?;
                path
            }
            StagedOp::Delete { path } => {
                state.documents.remove(path.as_str());
                path
            }
        };
        if !affected.contains(&path) {
            affected.push(path);
        }
    }

    Ok(state.notifications_for(&affected))
}

struct MemoryTransaction {
    state: Arc<Mutex<MemoryState>>,
    attempt: Arc<Mutex<TxState>>,
}

#[async_trait]
impl RemoteTransaction for MemoryTransaction {
    async fn get(&mut self, path: &DocumentPath) -> Result<Snapshot, RemoteError> {
        let mut attempt = lock_state(&self.attempt);
        let mut snapshot = {
            let state = lock_state(&self.state);
            let version = state.version_of(path.as_str());
            if !attempt.reads.iter().any(|(read, _)| read == path.as_str()) {
                attempt.reads.push((path.as_str().to_string(), version));
            }
            state.snapshot_of(path)
        };

        // Read-your-writes within this attempt.
        let mut overlaid = false;
        for op in &attempt.staged {
            match op {
                StagedOp::Write {
                    path: staged,
                    data,
                    policy,
                } if staged == path => {
                    let current = snapshot.data.take();
                    if matches!(policy, WritePolicy::Update) && current.is_none() {
                        continue;
                    }
                    snapshot.data = Some(next_data(current.as_ref(), data, policy));
                    overlaid = true;
                }
                StagedOp::Delete { path: staged } if staged == path => {
                    snapshot.data = None;
                    overlaid = true;
                }
                _ => {}
            }
        }
        if overlaid {
            snapshot.exists = snapshot.data.is_some();
            snapshot.has_pending_writes = true;
        }
        Ok(snapshot)
    }

    fn set(&mut self, path: &DocumentPath, data: UpdateMap, policy: WritePolicy) {
        lock_state(&self.attempt).staged.push(StagedOp::Write {
            path: path.clone(),
            data,
            policy,
        });
    }

    fn delete(&mut self, path: &DocumentPath) {
        lock_state(&self.attempt)
            .staged
            .push(StagedOp::Delete { path: path.clone() });
    }
}
