//! Core store traits
//!
//! A pipeline worker only ever talks to the outside world through these two
//! seams: a [`BlobStore`] holding immutable objects that support ranged reads,
//! and an [`Invoker`] that schedules downstream workers.

use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::SystemTime;

/// String-keyed object metadata. Ordered so that serialized metadata is stable.
pub type Metadata = BTreeMap<String, String>;

/// Listing/head information for one stored object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub key: String,
    pub content_length: u64,
    #[serde(default)]
    pub metadata: Metadata,
    pub last_modified: SystemTime,
}

/// Ranged object storage.
///
/// Objects are written once and never modified; new content is always a new key.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn head(&self, key: &str) -> StoreResult<ObjectMeta>;

    /// Inclusive on both ends, like an HTTP `Range: bytes=start-end` header.
    async fn get_range(&self, key: &str, start: u64, end: u64) -> StoreResult<Bytes>;

    async fn get_content(&self, key: &str) -> StoreResult<Bytes>;

    /// Replaces any existing object with the same key.
    async fn put(&self, key: &str, content: Bytes, metadata: Metadata) -> StoreResult<()>;

    /// Objects whose key starts with `prefix`, sorted by key.
    async fn list(&self, prefix: &str) -> StoreResult<Vec<ObjectMeta>>;

    async fn contains(&self, key: &str) -> StoreResult<bool> {
        match self.head(key).await {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Fire-and-forget function invocation.
#[async_trait]
pub trait Invoker: Send + Sync {
    /// Resolves once the invocation has been accepted, not when it has run.
    async fn invoke(&self, function: &str, payload: serde_json::Value) -> StoreResult<()>;
}

#[async_trait]
impl<T: BlobStore + ?Sized> BlobStore for Arc<T> {
    async fn head(&self, key: &str) -> StoreResult<ObjectMeta> {
        (**self).head(key).await
    }

    async fn get_range(&self, key: &str, start: u64, end: u64) -> StoreResult<Bytes> {
        (**self).get_range(key, start, end).await
    }

    async fn get_content(&self, key: &str) -> StoreResult<Bytes> {
        (**self).get_content(key).await
    }

    async fn put(&self, key: &str, content: Bytes, metadata: Metadata) -> StoreResult<()> {
        (**self).put(key, content, metadata).await
    }

    async fn list(&self, prefix: &str) -> StoreResult<Vec<ObjectMeta>> {
        (**self).list(prefix).await
    }

    async fn contains(&self, key: &str) -> StoreResult<bool> {
        (**self).contains(key).await
    }
}

#[async_trait]
impl<T: Invoker + ?Sized> Invoker for Arc<T> {
    async fn invoke(&self, function: &str, payload: serde_json::Value) -> StoreResult<()> {
        (**self).invoke(function, payload).await
    }
}

/// Validate an inclusive range against an object length.
pub(crate) fn check_range(key: &str, start: u64, end: u64, length: u64) -> StoreResult<()> {
    if start > end || end >= length {
        return Err(StoreError::invalid_range(key, start, end, length));
    }
    Ok(())
}

/// Reject keys that could escape a store root or collide with store internals.
pub(crate) fn validate_key(key: &str) -> StoreResult<()> {
    if key.is_empty()
        || key.starts_with('/')
        || key.split('/').any(|part| part.is_empty() || part == "." || part == "..")
        || key.starts_with(crate::disk::META_DIR)
    {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}
