//! Real-time listener flows: push notifications land in both cache layers
//! through the same propagation path as optimistic writes, and unsubscribing
//! is idempotent and final.

use std::sync::Arc;

use serde_json::json;

use specchio::infra::memory::MemoryStore;
use specchio::{
    DocumentData, DocumentPath, FetchOptions, Mirror, MutateOptions, Query, RemoteStore,
    WritePolicy, update_map,
};

fn object(value: serde_json::Value) -> DocumentData {
    value.as_object().cloned().expect("object literal")
}

fn doc_path(raw: &str) -> DocumentPath {
    DocumentPath::parse(raw).expect("document path")
}

fn fixture() -> (Mirror, MemoryStore) {
    let store = MemoryStore::new();
    store.seed(&doc_path("users/1"), object(json!({ "name": "Ann" })));
    (Mirror::new(Arc::new(store.clone())), store)
}

#[tokio::test]
async fn watch_document_delivers_the_initial_snapshot_and_stays_fresh() {
    let (mirror, store) = fixture();

    let (initial, handle) = mirror
        .watch_document("users/1", &FetchOptions::new())
        .await
        .expect("watch");
    assert_eq!(initial.data["name"], json!("Ann"));
    assert!(initial.validated);
    assert!(handle.is_active());

    // a push from another writer
    store
        .write(
            &doc_path("users/1"),
            update_map([("name", json!("Bea"))]),
            WritePolicy::Merge,
        )
        .await
        .expect("remote write");

    let cached = mirror
        .cached_document("users/1")
        .expect("document path")
        .expect("cached document");
    assert_eq!(cached.data["name"], json!("Bea"));
    assert!(!cached.has_pending_writes);
}

#[tokio::test]
async fn listener_updates_fan_out_to_registered_lists() {
    let (mirror, store) = fixture();

    mirror
        .get_collection("users", &Query::new(), &FetchOptions::new())
        .await
        .expect("fetch collection");
    let _handle = mirror
        .watch_document("users/1", &FetchOptions::new())
        .await
        .expect("watch");

    store
        .write(
            &doc_path("users/1"),
            update_map([("name", json!("Bea"))]),
            WritePolicy::Merge,
        )
        .await
        .expect("remote write");

    let list = mirror
        .cached_collection("users", &Query::new())
        .expect("collection path")
        .expect("cached list");
    assert_eq!(list[0].data["name"], json!("Bea"));
}

#[tokio::test]
async fn watch_collection_tracks_membership_changes() {
    let (mirror, store) = fixture();

    let (initial, handle) = mirror
        .watch_collection("users", &Query::new(), &FetchOptions::new())
        .await
        .expect("watch");
    assert_eq!(initial.len(), 1);

    store
        .write(
            &doc_path("users/2"),
            update_map([("name", json!("Bob"))]),
            WritePolicy::Replace,
        )
        .await
        .expect("remote write");

    let list = mirror
        .cached_collection("users", &Query::new())
        .expect("collection path")
        .expect("cached list");
    assert_eq!(list.len(), 2);
    // member documents land in the single-document cache too
    let bob = mirror
        .cached_document("users/2")
        .expect("document path")
        .expect("cached document");
    assert_eq!(bob.data["name"], json!("Bob"));

    handle.unsubscribe();
}

#[tokio::test]
async fn unsubscribe_is_idempotent_and_stops_propagation() {
    let (mirror, store) = fixture();

    let (_initial, handle) = mirror
        .watch_document("users/1", &FetchOptions::new())
        .await
        .expect("watch");

    handle.unsubscribe();
    handle.unsubscribe();
    assert!(!handle.is_active());

    store
        .write(
            &doc_path("users/1"),
            update_map([("name", json!("Bea"))]),
            WritePolicy::Merge,
        )
        .await
        .expect("remote write");

    let cached = mirror
        .cached_document("users/1")
        .expect("document path")
        .expect("cached document");
    assert_eq!(cached.data["name"], json!("Ann"));
}

#[tokio::test]
async fn dropping_the_handle_unsubscribes() {
    let (mirror, store) = fixture();

    {
        let _watch = mirror
            .watch_document("users/1", &FetchOptions::new())
            .await
            .expect("watch");
    }

    store
        .write(
            &doc_path("users/1"),
            update_map([("name", json!("Bea"))]),
            WritePolicy::Merge,
        )
        .await
        .expect("remote write");

    let cached = mirror
        .cached_document("users/1")
        .expect("document path")
        .expect("cached document");
    assert_eq!(cached.data["name"], json!("Ann"));
}

#[tokio::test]
async fn optimistic_writes_and_listener_echoes_converge() {
    let (mirror, _store) = fixture();

    let (_initial, _handle) = mirror
        .watch_document("users/1", &FetchOptions::new())
        .await
        .expect("watch");

    // the optimistic patch is visible synchronously; the store's echo then
    // replaces it with the acknowledged state through the same path
    mirror
        .update_doc(
            "users/1",
            update_map([("name", json!("Bea"))]),
            &MutateOptions::default(),
        )
        .await
        .expect("update");

    let cached = mirror
        .cached_document("users/1")
        .expect("document path")
        .expect("cached document");
    assert_eq!(cached.data["name"], json!("Bea"));
    // the echo carried no pending writes, so the flag cleared
    assert!(!cached.has_pending_writes);
}
