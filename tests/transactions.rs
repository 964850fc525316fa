//! Transaction wrapper behavior: cache mirroring happens exactly once, after
//! commit, and never on abort.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::json;

use specchio::infra::memory::MemoryStore;
use specchio::{
    DocumentData, DocumentPath, Error, FetchOptions, Mirror, Query, RemoteError, RemoteStore,
    WritePolicy, update_map,
};

fn object(value: serde_json::Value) -> DocumentData {
    value.as_object().cloned().expect("object literal")
}

fn doc_path(raw: &str) -> DocumentPath {
    DocumentPath::parse(raw).expect("document path")
}

async fn fixture() -> (Mirror, MemoryStore) {
    let store = MemoryStore::new();
    store.seed(&doc_path("counters/hits"), object(json!({ "count": 1 })));
    let mirror = Mirror::new(Arc::new(store.clone()));
    mirror
        .get_collection("counters", &Query::new(), &FetchOptions::new())
        .await
        .expect("fetch collection");
    (mirror, store)
}

#[tokio::test]
async fn committed_writes_are_mirrored_into_document_and_list_caches() {
    let (mirror, _store) = fixture().await;
    let before = mirror.cache().stats();

    let result: i64 = mirror
        .run_transaction(
            |tx| {
                Box::pin(async move {
                    tx.update("counters/hits", update_map([("count", json!(7))]))?;
                    Ok(7)
                })
            },
            &FetchOptions::new(),
        )
        .await
        .expect("transaction");
    assert_eq!(result, 7);

    let cached = mirror
        .cached_document("counters/hits")
        .expect("document path")
        .expect("cached document");
    assert_eq!(cached.data["count"], json!(7));

    let list = mirror
        .cached_collection("counters", &Query::new())
        .expect("collection path")
        .expect("cached list");
    assert_eq!(list[0].data["count"], json!(7));

    // one staged write, one list propagation
    let after = mirror.cache().stats();
    assert_eq!(after.list_writes - before.list_writes, 1);
}

#[tokio::test]
async fn a_retried_transaction_propagates_exactly_once() {
    let (mirror, store) = fixture().await;
    let before = mirror.cache().stats();

    let attempts = Arc::new(AtomicUsize::new(0));
    let seen = attempts.clone();
    let interfering = store.clone();

    let result: i64 = mirror
        .run_transaction(
            move |tx| {
                let seen = seen.clone();
                let interfering = interfering.clone();
                Box::pin(async move {
                    let attempt = seen.fetch_add(1, Ordering::SeqCst);
                    let snapshot = tx.get("counters/hits").await?;
                    let count = snapshot.data.expect("payload")["count"]
                        .as_i64()
                        .expect("count");
                    if attempt == 0 {
                        // invalidate this attempt's read before it commits
                        interfering
                            .write(
                                &doc_path("counters/hits"),
                                update_map([("count", json!(100))]),
                                WritePolicy::Merge,
                            )
                            .await?;
                    }
                    tx.update(
                        "counters/hits",
                        update_map([("count", json!(count + 1))]),
                    )?;
                    Ok(count + 1)
                })
            },
            &FetchOptions::new(),
        )
        .await
        .expect("transaction");

    // first attempt read 1, conflicted; second read 100 and committed 101
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    assert_eq!(result, 101);

    let cached = mirror
        .cached_document("counters/hits")
        .expect("document path")
        .expect("cached document");
    assert_eq!(cached.data["count"], json!(101));

    // only the committed attempt reached the cache: one read mirror, one
    // write mirror — two list propagations, not four
    let after = mirror.cache().stats();
    assert_eq!(after.list_writes - before.list_writes, 2);
}

#[tokio::test]
async fn transaction_reads_are_mirrored_after_commit() {
    let (mirror, store) = fixture().await;

    // out-of-band change the mirror has not seen
    store
        .write(
            &doc_path("counters/hits"),
            update_map([("count", json!(41))]),
            WritePolicy::Merge,
        )
        .await
        .expect("out-of-band write");

    mirror
        .run_transaction(
            |tx| {
                Box::pin(async move {
                    let _ = tx.get("counters/hits").await?;
                    Ok(())
                })
            },
            &FetchOptions::new(),
        )
        .await
        .expect("transaction");

    let cached = mirror
        .cached_document("counters/hits")
        .expect("document path")
        .expect("cached document");
    assert_eq!(cached.data["count"], json!(41));
    assert!(!cached.has_pending_writes);
}

#[tokio::test]
async fn an_aborted_transaction_leaves_the_cache_untouched() {
    let (mirror, _store) = fixture().await;
    let before = mirror.cache().stats();

    let result: Result<(), Error> = mirror
        .run_transaction(
            |tx| {
                Box::pin(async move {
                    tx.update("counters/hits", update_map([("count", json!(999))]))?;
                    Err(Error::unexpected("caller changed its mind"))
                })
            },
            &FetchOptions::new(),
        )
        .await;

    // the caller's own error comes back, not the wrapper's
    assert!(matches!(result, Err(Error::Unexpected(message)) if message.contains("changed its mind")));

    let cached = mirror
        .cached_document("counters/hits")
        .expect("document path")
        .expect("cached document");
    assert_eq!(cached.data["count"], json!(1));

    let after = mirror.cache().stats();
    assert_eq!(after.document_writes, before.document_writes);
    assert_eq!(after.list_writes, before.list_writes);
}

#[tokio::test]
async fn transaction_updates_of_missing_documents_fail_without_cache_effects() {
    let (mirror, _store) = fixture().await;
    let before = mirror.cache().stats();

    let result: Result<(), Error> = mirror
        .run_transaction(
            |tx| {
                Box::pin(async move {
                    tx.update("counters/missing", update_map([("count", json!(1))]))?;
                    Ok(())
                })
            },
            &FetchOptions::new(),
        )
        .await;

    assert!(matches!(
        result,
        Err(Error::Remote(RemoteError::NotFound { .. }))
    ));
    let after = mirror.cache().stats();
    assert_eq!(after.list_writes, before.list_writes);
}
