//! Specchio cache system.
//!
//! The local half of the sync engine: a keyed cache for single documents and
//! list queries, the registry that remembers which lists exist per collection
//! path, the merge engine that computes a document's next local state, and
//! the propagator that fans one document change out to every cached list that
//! might contain it.

mod config;
mod events;
mod keys;
mod lock;
mod merge;
mod propagate;
mod registry;
mod store;

pub use config::CacheConfig;
pub use events::{ChangeEvent, ChangeKind, ChangeOrigin, Epoch};
pub use keys::{ListKey, stable_query_key};
pub use merge::{MergePolicy, merge_update, patch_document, resolve_update};
pub use propagate::Propagator;
pub use registry::CollectionRegistry;
pub use store::{CacheStatsSnapshot, KeyedCache, SharedList};
