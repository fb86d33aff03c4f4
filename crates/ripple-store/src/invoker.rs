//! Local invocation queue

use crate::error::{StoreError, StoreResult};
use crate::traits::Invoker;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::debug;

/// One accepted invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub function: String,
    pub payload: serde_json::Value,
}

/// [`Invoker`] that records invocations in FIFO order for a driver to run.
#[derive(Debug, Default)]
pub struct QueueInvoker {
    queue: Mutex<VecDeque<Invocation>>,
    accepted: AtomicU64,
    closed: AtomicBool,
}

impl QueueInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pop(&self) -> Option<Invocation> {
        self.queue.lock().pop_front()
    }

    /// Remove every pending invocation.
    pub fn drain(&self) -> Vec<Invocation> {
        self.queue.lock().drain(..).collect()
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Total invocations accepted since creation.
    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    /// Reject all further invocations.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Invoker for QueueInvoker {
    async fn invoke(&self, function: &str, payload: serde_json::Value) -> StoreResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::InvokeRejected {
                function: function.to_string(),
                reason: "invoker closed".to_string(),
            });
        }
        debug!("Queued invocation of {}", function);
        self.queue.lock().push_back(Invocation {
            function: function.to_string(),
            payload,
        });
        self.accepted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_fifo_order() {
        let invoker = QueueInvoker::new();
        invoker.invoke("split", json!({"n": 1})).await.unwrap();
        invoker.invoke("pivot", json!({"n": 2})).await.unwrap();

        assert_eq!(invoker.pending(), 2);
        assert_eq!(invoker.pop().unwrap().function, "split");
        assert_eq!(invoker.pop().unwrap().payload, json!({"n": 2}));
        assert!(invoker.pop().is_none());
        assert_eq!(invoker.accepted(), 2);
    }

    #[tokio::test]
    async fn test_closed_invoker_rejects() {
        let invoker = QueueInvoker::new();
        invoker.close();
        assert!(matches!(
            invoker.invoke("split", json!({})).await,
            Err(StoreError::InvokeRejected { .. })
        ));
        assert_eq!(invoker.pending(), 0);
    }
}
