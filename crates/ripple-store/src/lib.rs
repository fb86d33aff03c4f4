//! Object storage and invocation seams for ripple pipelines
//!
//! Pipeline stages communicate only through immutable objects in a
//! [`BlobStore`] and through fire-and-forget calls on an [`Invoker`]. This
//! crate provides those traits plus:
//!
//! - [`MemoryStore`]: in-process store for tests and local runs
//! - [`DiskStore`]: filesystem store with metadata sidecars and atomic writes
//! - [`RetryingStore`]: bounded-read, unbounded-write retry decorator
//! - [`QueueInvoker`]: FIFO invocation queue drained by a local driver
//! - [`StoreStatistics`]: request counters with cost estimation
//!
//! # Example
//!
//! ```
//! use bytes::Bytes;
//! use ripple_store::{BlobStore, Entry, MemoryStore, Metadata};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # let rt = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
//! # rt.block_on(async {
//! let store = Arc::new(MemoryStore::new());
//! store
//!     .put("0/input.txt", Bytes::from_static(b"a\nb\n"), Metadata::new())
//!     .await?;
//!
//! let entry = Entry::open(store, "0/input.txt").await?;
//! assert_eq!(entry.get_range(0, 1).await?, Bytes::from_static(b"a\n"));
//! # Ok::<(), ripple_store::StoreError>(())
//! # })?;
//! # Ok(())
//! # }
//! ```

pub mod disk;
pub mod entry;
pub mod error;
pub mod invoker;
pub mod memory;
pub mod retry;
pub mod stats;
pub mod traits;

pub use disk::DiskStore;
pub use entry::Entry;
pub use error::{StoreError, StoreResult};
pub use invoker::{Invocation, QueueInvoker};
pub use memory::MemoryStore;
pub use retry::{RetryPolicy, RetryingStore};
pub use stats::{StatsSnapshot, StoreStatistics};
pub use traits::{BlobStore, Invoker, Metadata, ObjectMeta};
