//! Record formats and chunked iteration for ripple pipelines
//!
//! Inputs are immutable objects holding many delimited records. This crate
//! reads arbitrary byte ranges of them without ever splitting a record,
//! extracts numeric sort keys, and writes record lists back out:
//!
//! - [`ChunkedIterator`]: bounded-memory record reads over an owned byte range
//! - [`RecordCodec`]: per-format delimiters, identifiers and serialization
//! - [`FormatTag`]: the closed set of formats and their static codecs
//! - [`combine`]: concatenation and sort-merge of partial outputs
//! - [`BoundedHeap`]: top-k selection used by the knn and top phases
//! - [`formats::pivot`]: pivot sampling and key-range bins for sorting
//!
//! A requested range owns exactly the records that end inside it, so any
//! contiguous partition of an object yields every record once.
//!
//! # Example
//!
//! ```
//! use bytes::Bytes;
//! use ripple_formats::{ChunkedIterator, FormatTag, IteratorOptions, OffsetBounds};
//! use ripple_store::{BlobStore, Entry, MemoryStore, Metadata};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # let rt = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
//! # rt.block_on(async {
//! let store = Arc::new(MemoryStore::new());
//! store
//!     .put("0/a.txt", Bytes::from_static(b"alpha\nbeta\ngamma\n"), Metadata::new())
//!     .await?;
//! let entry = Entry::open(store, "0/a.txt").await?;
//!
//! // [7, 12] holds the end of "beta" but not of "gamma"
//! let codec = FormatTag::NewLine.codec();
//! let bounds = OffsetBounds::new(7, 12)?;
//! let mut it = ChunkedIterator::new(entry, codec, Some(bounds), IteratorOptions::default()).await?;
//! assert_eq!(it.read_all().await?, vec![Bytes::from_static(b"beta")]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # })?;
//! # Ok(())
//! # }
//! ```

pub mod bounds;
pub mod codec;
pub mod combine;
pub mod delimiter;
pub mod error;
pub mod formats;
pub mod identifier;
pub mod iterator;
pub mod tag;
pub mod topk;

pub use bounds::OffsetBounds;
pub use codec::{CodecContext, Encoded, Layout, RecordCodec};
pub use combine::{CombineOptions, DEFAULT_NUM_BINS};
pub use delimiter::{Delimiter, DelimiterPosition};
pub use error::{FormatError, FormatResult};
pub use formats::{PivotFile, PivotRange, PivotSet, reduce_pivots, sample_pivots};
pub use identifier::Identifier;
pub use iterator::{
    Chunk, ChunkedIterator, DEFAULT_ADJUST_WINDOW, DEFAULT_CHUNK_SIZE, IteratorOptions,
};
pub use tag::FormatTag;
pub use topk::{BoundedHeap, Ranking};
