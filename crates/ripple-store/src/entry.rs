//! Immutable handle to one stored object

use crate::error::StoreResult;
use crate::traits::{BlobStore, Metadata, ObjectMeta, check_range};
use bytes::Bytes;
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

/// A stored object plus the store it lives in.
///
/// Content length and metadata are captured when the entry is opened. Since
/// objects are never modified in place, they stay valid for the entry's lifetime.
#[derive(Clone)]
pub struct Entry {
    store: Arc<dyn BlobStore>,
    meta: ObjectMeta,
}

impl Entry {
    pub fn new(store: Arc<dyn BlobStore>, meta: ObjectMeta) -> Self {
        Self { store, meta }
    }

    /// Look up `key` and capture its metadata.
    pub async fn open(store: Arc<dyn BlobStore>, key: &str) -> StoreResult<Self> {
        let meta = store.head(key).await?;
        Ok(Self { store, meta })
    }

    pub fn key(&self) -> &str {
        &self.meta.key
    }

    pub fn content_length(&self) -> u64 {
        self.meta.content_length
    }

    pub fn is_empty(&self) -> bool {
        self.meta.content_length == 0
    }

    pub fn metadata(&self) -> &Metadata {
        &self.meta.metadata
    }

    /// Parse a numeric metadata value, ignoring absent or malformed values.
    pub fn metadata_u64(&self, name: &str) -> Option<u64> {
        self.meta.metadata.get(name).and_then(|v| v.parse().ok())
    }

    pub fn last_modified(&self) -> SystemTime {
        self.meta.last_modified
    }

    pub fn meta(&self) -> &ObjectMeta {
        &self.meta
    }

    pub fn store(&self) -> &Arc<dyn BlobStore> {
        &self.store
    }

    /// Read `[start, end]` inclusive.
    pub async fn get_range(&self, start: u64, end: u64) -> StoreResult<Bytes> {
        check_range(&self.meta.key, start, end, self.meta.content_length)?;
        self.store.get_range(&self.meta.key, start, end).await
    }

    pub async fn get_content(&self) -> StoreResult<Bytes> {
        if self.is_empty() {
            return Ok(Bytes::new());
        }
        self.store.get_content(&self.meta.key).await
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("key", &self.meta.key)
            .field("content_length", &self.meta.content_length)
            .field("metadata", &self.meta.metadata)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::memory::MemoryStore;

    #[tokio::test]
    async fn test_entry_ranged_reads() {
        let store = Arc::new(MemoryStore::new());
        store
            .put("0/a.txt", Bytes::from_static(b"hello world"), Metadata::new())
            .await
            .unwrap();

        let entry = Entry::open(store, "0/a.txt").await.unwrap();
        assert_eq!(entry.content_length(), 11);
        assert_eq!(entry.get_range(0, 4).await.unwrap(), Bytes::from_static(b"hello"));
        assert_eq!(entry.get_range(6, 10).await.unwrap(), Bytes::from_static(b"world"));
        assert_eq!(entry.get_content().await.unwrap().len(), 11);
    }

    #[tokio::test]
    async fn test_entry_rejects_bad_ranges() {
        let store = Arc::new(MemoryStore::new());
        store
            .put("0/a.txt", Bytes::from_static(b"abc"), Metadata::new())
            .await
            .unwrap();
        let entry = Entry::open(store, "0/a.txt").await.unwrap();

        assert!(matches!(
            entry.get_range(2, 1).await,
            Err(StoreError::InvalidRange { .. })
        ));
        assert!(matches!(
            entry.get_range(0, 3).await,
            Err(StoreError::InvalidRange { .. })
        ));
    }

    #[tokio::test]
    async fn test_metadata_lookup() {
        let store = Arc::new(MemoryStore::new());
        let mut metadata = Metadata::new();
        metadata.insert("count".to_string(), "12".to_string());
        metadata.insert("bad".to_string(), "x".to_string());
        store
            .put("0/a.txt", Bytes::from_static(b"abc"), metadata)
            .await
            .unwrap();

        let entry = Entry::open(store, "0/a.txt").await.unwrap();
        assert_eq!(entry.metadata_u64("count"), Some(12));
        assert_eq!(entry.metadata_u64("bad"), None);
        assert_eq!(entry.metadata_u64("missing"), None);
    }
}
