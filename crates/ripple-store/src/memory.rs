//! In-process object store
//!
//! Backs tests and local runs. Supports injecting throttling failures so that
//! retry behavior can be exercised without a remote service.

use crate::error::{StoreError, StoreResult};
use crate::stats::StoreStatistics;
use crate::traits::{BlobStore, Metadata, ObjectMeta, check_range, validate_key};
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::SystemTime;
use tracing::trace;

#[derive(Debug, Clone)]
struct StoredObject {
    content: Bytes,
    meta: ObjectMeta,
}

/// DashMap-backed [`BlobStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: DashMap<String, StoredObject>,
    stats: Arc<StoreStatistics>,
    throttle_remaining: AtomicU32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> &Arc<StoreStatistics> {
        &self.stats
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Make the next `count` requests fail with [`StoreError::Throttled`].
    pub fn throttle_next(&self, count: u32) {
        self.throttle_remaining.store(count, Ordering::SeqCst);
    }

    fn check_throttle(&self) -> StoreResult<()> {
        let throttled = self
            .throttle_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if throttled {
            self.stats.record_throttle();
            return Err(StoreError::Throttled);
        }
        Ok(())
    }

    fn lookup(&self, key: &str) -> StoreResult<StoredObject> {
        self.objects
            .get(key)
            .map(|obj| obj.value().clone())
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn head(&self, key: &str) -> StoreResult<ObjectMeta> {
        self.check_throttle()?;
        let obj = self.lookup(key)?;
        self.stats.record_read(0);
        Ok(obj.meta)
    }

    async fn get_range(&self, key: &str, start: u64, end: u64) -> StoreResult<Bytes> {
        self.check_throttle()?;
        let obj = self.lookup(key)?;
        check_range(key, start, end, obj.meta.content_length)?;
        let data = obj.content.slice(start as usize..=end as usize);
        self.stats.record_read(data.len() as u64);
        trace!("Read {} bytes from {} [{}, {}]", data.len(), key, start, end);
        Ok(data)
    }

    async fn get_content(&self, key: &str) -> StoreResult<Bytes> {
        self.check_throttle()?;
        let obj = self.lookup(key)?;
        self.stats.record_read(obj.content.len() as u64);
        Ok(obj.content)
    }

    async fn put(&self, key: &str, content: Bytes, metadata: Metadata) -> StoreResult<()> {
        validate_key(key)?;
        self.check_throttle()?;
        let meta = ObjectMeta {
            key: key.to_string(),
            content_length: content.len() as u64,
            metadata,
            last_modified: SystemTime::now(),
        };
        self.stats.record_write(content.len() as u64);
        trace!("Wrote {} bytes to {}", content.len(), key);
        self.objects
            .insert(key.to_string(), StoredObject { content, meta });
        Ok(())
    }

    async fn list(&self, prefix: &str) -> StoreResult<Vec<ObjectMeta>> {
        self.check_throttle()?;
        self.stats.record_list();
        let mut listed: Vec<ObjectMeta> = self
            .objects
            .iter()
            .filter(|obj| obj.key().starts_with(prefix))
            .map(|obj| obj.value().meta.clone())
            .collect();
        listed.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(listed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_list() {
        let store = MemoryStore::new();
        store
            .put("1/b.txt", Bytes::from_static(b"bbb"), Metadata::new())
            .await
            .unwrap();
        store
            .put("1/a.txt", Bytes::from_static(b"aa"), Metadata::new())
            .await
            .unwrap();
        store
            .put("2/c.txt", Bytes::from_static(b"c"), Metadata::new())
            .await
            .unwrap();

        let listed = store.list("1/").await.unwrap();
        let keys: Vec<&str> = listed.iter().map(|m| m.key.as_str()).collect();
        assert_eq!(keys, vec!["1/a.txt", "1/b.txt"]);
        assert_eq!(listed[1].content_length, 3);

        assert_eq!(
            store.get_range("1/b.txt", 1, 2).await.unwrap(),
            Bytes::from_static(b"bb")
        );
        assert!(store.contains("2/c.txt").await.unwrap());
        assert!(!store.contains("2/d.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_object() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.get_content("nope").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_rejects_unsafe_keys() {
        let store = MemoryStore::new();
        for key in ["", "/abs", "a/../b", "a//b"] {
            assert!(matches!(
                store.put(key, Bytes::new(), Metadata::new()).await,
                Err(StoreError::InvalidKey(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_throttle_injection() {
        let store = MemoryStore::new();
        store.throttle_next(2);
        assert!(matches!(
            store.list("").await,
            Err(StoreError::Throttled)
        ));
        assert!(matches!(
            store.list("").await,
            Err(StoreError::Throttled)
        ));
        assert!(store.list("").await.is_ok());
        assert_eq!(store.stats().snapshot().throttled_count, 2);
    }
}
