//! Behavior every BlobStore backend must share

#![allow(clippy::unwrap_used)]

use bytes::Bytes;
use ripple_store::{
    BlobStore, DiskStore, Entry, MemoryStore, Metadata, RetryPolicy, RetryingStore, StoreError,
};
use std::sync::Arc;
use tempfile::TempDir;

async fn exercise(store: Arc<dyn BlobStore>) {
    let mut metadata = Metadata::new();
    metadata.insert("count".to_string(), "3".to_string());
    store
        .put(
            "1/1700000000.5-42/1-2/1-1-1-out.txt",
            Bytes::from_static(b"one\ntwo\nthree\n"),
            metadata,
        )
        .await
        .unwrap();
    store
        .put(
            "1/1700000000.5-42/2-2/1-1-1-out.txt",
            Bytes::new(),
            Metadata::new(),
        )
        .await
        .unwrap();

    let listed = store.list("1/1700000000.5-42/").await.unwrap();
    assert_eq!(listed.len(), 2);
    assert!(listed[0].key < listed[1].key);
    assert_eq!(listed[1].content_length, 0);

    let entry = Entry::open(Arc::clone(&store), &listed[0].key).await.unwrap();
    assert_eq!(entry.content_length(), 14);
    assert_eq!(entry.metadata_u64("count"), Some(3));
    assert_eq!(entry.get_range(4, 7).await.unwrap(), Bytes::from_static(b"two\n"));

    let empty = Entry::open(Arc::clone(&store), &listed[1].key).await.unwrap();
    assert!(empty.is_empty());
    assert!(empty.get_content().await.unwrap().is_empty());

    assert!(store.list("2/").await.unwrap().is_empty());
    assert!(matches!(
        store.head("1/nothing.txt").await,
        Err(StoreError::NotFound(_))
    ));
}

#[tokio::test]
async fn memory_store_contract() {
    exercise(Arc::new(MemoryStore::new())).await;
}

#[tokio::test]
async fn disk_store_contract() {
    let dir = TempDir::new().unwrap();
    exercise(Arc::new(DiskStore::open(dir.path()).await.unwrap())).await;
}

#[tokio::test]
async fn retrying_store_contract() {
    let inner = MemoryStore::new();
    inner.throttle_next(1);
    let policy = RetryPolicy {
        jitter: false,
        initial_backoff: std::time::Duration::from_millis(1),
        ..RetryPolicy::default()
    };
    exercise(Arc::new(RetryingStore::new(inner, policy))).await;
}
