//! Specchio: a reactive local mirror for remote document stores.
//!
//! Specchio keeps a keyed local cache synchronized with a remote document
//! store that supports per-document real-time push notifications. Reads go
//! through cached documents and lists; writes apply optimistically to the
//! cache (single-document entry first, then every cached list that might
//! contain the document) before they are forwarded to the store. Real-time
//! notifications re-enter through the same propagation path, so
//! listener-driven and optimistic updates stay structurally identical.
//!
//! The [`Mirror`] facade owns the cache, the collection key registry, and a
//! remote-store handle behind the [`RemoteStore`] port; an embedded
//! in-memory adapter lives in [`infra::memory`].
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use serde_json::json;
//! use specchio::infra::memory::MemoryStore;
//! use specchio::{FetchOptions, Mirror, MutateOptions, Query, update_map};
//!
//! # async fn demo() -> Result<(), specchio::Error> {
//! let mirror = Mirror::new(Arc::new(MemoryStore::new()));
//!
//! let users = mirror
//!     .get_collection("users", &Query::new(), &FetchOptions::new())
//!     .await?;
//!
//! // Applied to the cache (and every cached `users` list) before the
//! // remote write is even issued.
//! mirror
//!     .update_doc(
//!         "users/1",
//!         update_map([("name", json!("Bea"))]),
//!         &MutateOptions::default(),
//!     )
//!     .await?;
//! # let _ = users;
//! # Ok(())
//! # }
//! ```

pub mod application;
pub mod cache;
pub mod domain;
pub mod infra;

// Re-export the caller-facing surface at the crate root for convenience.
pub use application::error::Error;
pub use application::listener::ListenerHandle;
pub use application::mirror::Mirror;
pub use application::options::{FetchOptions, MutateOptions, SetOptions, Validator};
pub use application::query::{
    Constraint, Direction, FilterOp, Query, limit, order_by, where_field,
};
pub use application::remote::{
    RemoteError, RemoteStore, RemoteTransaction, Subscription, WritePolicy,
};
pub use application::transaction::TransactionHandle;
pub use cache::{CacheConfig, CollectionRegistry, KeyedCache, ListKey, SharedList};
pub use domain::document::{Document, DocumentData, SharedDocument, Snapshot};
pub use domain::error::DomainError;
pub use domain::field_value::{FieldValue, UpdateMap, UpdateValue, update_map};
pub use domain::path::{CollectionPath, DocumentPath, PathKind, StorePath, classify};
