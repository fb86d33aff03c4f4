//! Retry policy with exponential backoff, and a store wrapper that applies it
//!
//! Reads give up after a bounded number of attempts. Writes retry transient
//! failures without limit, since a lost write stalls every downstream stage.

use crate::error::StoreResult;
use crate::traits::{BlobStore, Metadata, ObjectMeta};
use async_trait::async_trait;
use bytes::Bytes;
use rand::RngExt;
use rand::rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum retry attempts after the first try
    pub max_attempts: u32,

    /// Initial backoff duration
    pub initial_backoff: Duration,

    /// Maximum backoff duration
    pub max_backoff: Duration,

    /// Backoff multiplier
    pub multiplier: f64,

    /// Add up to 30% random delay to each backoff
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Create retry policy from `RIPPLE_*` environment variables
    pub fn from_env() -> Self {
        Self {
            max_attempts: env_or("RIPPLE_MAX_RETRIES", 3),
            initial_backoff: Duration::from_millis(env_or("RIPPLE_RETRY_BACKOFF", 100)),
            max_backoff: Duration::from_secs(env_or("RIPPLE_MAX_BACKOFF", 5)),
            multiplier: env_or("RIPPLE_BACKOFF_MULTIPLIER", 2.0),
            jitter: env_or("RIPPLE_RETRY_JITTER", true),
        }
    }

    /// Same backoff schedule, but never gives up on a retryable error.
    #[must_use]
    pub fn unbounded(mut self) -> Self {
        self.max_attempts = u32::MAX;
        self
    }

    /// Never retry.
    pub fn none() -> Self {
        Self {
            max_attempts: 0,
            ..Self::default()
        }
    }

    /// Execute a function with retry logic
    pub async fn execute<F, Fut, T>(&self, mut f: F) -> StoreResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        let mut attempt = 0;
        let mut backoff = self.initial_backoff;

        loop {
            match f().await {
                Ok(result) => return Ok(result),
                Err(e) if !e.should_retry() || attempt >= self.max_attempts => {
                    return Err(e);
                }
                Err(e) => {
                    attempt += 1;
                    tracing::warn!("Attempt {} failed: {}", attempt, e);

                    let mut delay = backoff;
                    if self.jitter {
                        let jitter = rng().random_range(0.0..0.3);
                        let jitter_ms = (delay.as_millis() as f64 * jitter) as u64;
                        delay += Duration::from_millis(jitter_ms);
                    }

                    tokio::time::sleep(delay).await;

                    backoff = Duration::from_secs_f64(
                        (backoff.as_secs_f64() * self.multiplier)
                            .min(self.max_backoff.as_secs_f64()),
                    );
                }
            }
        }
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// [`BlobStore`] decorator applying a read policy and a write policy.
#[derive(Debug)]
pub struct RetryingStore<S> {
    inner: S,
    read_policy: RetryPolicy,
    write_policy: RetryPolicy,
}

impl<S: BlobStore> RetryingStore<S> {
    /// Bounded reads and unbounded writes, both from `policy`'s schedule.
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self {
            inner,
            write_policy: policy.clone().unbounded(),
            read_policy: policy,
        }
    }

    pub fn with_policies(inner: S, read_policy: RetryPolicy, write_policy: RetryPolicy) -> Self {
        Self {
            inner,
            read_policy,
            write_policy,
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: BlobStore> BlobStore for RetryingStore<S> {
    async fn head(&self, key: &str) -> StoreResult<ObjectMeta> {
        self.read_policy.execute(|| self.inner.head(key)).await
    }

    async fn get_range(&self, key: &str, start: u64, end: u64) -> StoreResult<Bytes> {
        self.read_policy
            .execute(|| self.inner.get_range(key, start, end))
            .await
    }

    async fn get_content(&self, key: &str) -> StoreResult<Bytes> {
        self.read_policy.execute(|| self.inner.get_content(key)).await
    }

    async fn put(&self, key: &str, content: Bytes, metadata: Metadata) -> StoreResult<()> {
        self.write_policy
            .execute(|| self.inner.put(key, content.clone(), metadata.clone()))
            .await
    }

    async fn list(&self, prefix: &str) -> StoreResult<Vec<ObjectMeta>> {
        self.read_policy.execute(|| self.inner.list(prefix)).await
    }
}
