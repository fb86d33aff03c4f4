//! Chunked record iteration over a ranged-read entry
//!
//! A worker handed an arbitrary byte range `[start, end]` of an entry owns
//! exactly the records whose last byte falls inside that range. Each edge is
//! moved back to the start of the record containing it by scanning a bounded
//! window for the delimiter, so two workers with contiguous ranges never
//! share or drop a record.
//!
//! Once the owned range is known, [`ChunkedIterator::next`] streams it in
//! fixed-size reads. Bytes after the last complete boundary of a read are
//! carried into the next one; the final read flushes whatever is left.

use crate::bounds::OffsetBounds;
use crate::codec::{CodecContext, Layout, RecordCodec};
use crate::delimiter::{Delimiter, DelimiterPosition};
use crate::error::{FormatError, FormatResult};
use bytes::{Bytes, BytesMut};
use ripple_store::{Entry, Metadata};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Default bytes fetched per [`ChunkedIterator::next`] call.
pub const DEFAULT_CHUNK_SIZE: u64 = 10 * 1000 * 1000;

/// Default bytes scanned when moving a range edge to a record boundary.
pub const DEFAULT_ADJUST_WINDOW: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IteratorOptions {
    pub chunk_size: u64,
    pub adjust_window: u64,
}

impl Default for IteratorOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            adjust_window: DEFAULT_ADJUST_WINDOW,
        }
    }
}

impl IteratorOptions {
    pub fn new(chunk_size: u64, adjust_window: u64) -> Self {
        Self {
            chunk_size,
            adjust_window,
        }
    }
}

/// One batch of whole records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub records: Vec<Bytes>,
    /// Entry bytes the records were parsed from, `None` when no record was yielded
    pub bounds: Option<OffsetBounds>,
    /// Whether another call can yield more records
    pub more: bool,
}

impl Chunk {
    fn finished() -> Self {
        Self {
            records: Vec::new(),
            bounds: None,
            more: false,
        }
    }
}

/// Lazy, one-shot reader of the records owned by a byte range.
pub struct ChunkedIterator<'c, C: RecordCodec + ?Sized = dyn RecordCodec> {
    entry: Entry,
    codec: &'c C,
    options: IteratorOptions,
    layout: Layout,
    cursor: u64,
    remainder: Bytes,
    done: bool,
}

impl<'c, C: RecordCodec + ?Sized> ChunkedIterator<'c, C> {
    /// Resolve the owned range of `requested` (the whole entry when `None`).
    pub async fn new(
        entry: Entry,
        codec: &'c C,
        requested: Option<OffsetBounds>,
        options: IteratorOptions,
    ) -> FormatResult<Self> {
        let layout = codec.layout(&entry, requested, &options).await?;
        debug!(
            "{} {}: requested {:?}, owns {:?}",
            codec.tag(),
            entry.key(),
            requested.map(|b| b.to_string()),
            layout.owned.map(|b| b.to_string())
        );
        Ok(Self {
            cursor: layout.owned.map_or(0, |b| b.start()),
            done: layout.owned.is_none(),
            entry,
            codec,
            options,
            layout,
            remainder: Bytes::new(),
        })
    }

    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    pub fn codec(&self) -> &'c C {
        self.codec
    }

    pub fn owned(&self) -> Option<OffsetBounds> {
        self.layout.owned
    }

    pub fn context(&self) -> &CodecContext {
        &self.layout.context
    }

    pub fn discovered(&self) -> &Metadata {
        &self.layout.discovered
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Read the next chunk of whole records.
    pub async fn next(&mut self) -> FormatResult<Chunk> {
        let Some(owned) = self.layout.owned else {
            return Ok(Chunk::finished());
        };
        if self.done {
            return Ok(Chunk::finished());
        }

        let read_end = self
            .cursor
            .saturating_add(self.options.chunk_size.max(1) - 1)
            .min(owned.end());
        let data = self.entry.get_range(self.cursor, read_end).await?;
        let stream_start = self.cursor - self.remainder.len() as u64;
        let stream = if self.remainder.is_empty() {
            data
        } else {
            let mut joined = BytesMut::with_capacity(self.remainder.len() + data.len());
            joined.extend_from_slice(&self.remainder);
            joined.extend_from_slice(&data);
            joined.freeze()
        };
        self.remainder = Bytes::new();
        self.cursor = read_end + 1;

        if read_end == owned.end() {
            self.done = true;
            let bounds = if stream.is_empty() {
                None
            } else {
                Some(OffsetBounds::new(stream_start, read_end)?)
            };
            return Ok(Chunk {
                records: self.codec.to_array(&stream)?,
                bounds,
                more: false,
            });
        }

        match self.codec.delimiter().last_boundary(&stream) {
            Some(cut) if cut > 0 => {
                self.remainder = stream.slice(cut..);
                let body = stream.slice(..cut);
                trace!(
                    "Yielding [{}, {}], carrying {} bytes",
                    stream_start,
                    stream_start + cut as u64 - 1,
                    self.remainder.len()
                );
                Ok(Chunk {
                    records: self.codec.to_array(&body)?,
                    bounds: Some(OffsetBounds::new(stream_start, stream_start + cut as u64 - 1)?),
                    more: true,
                })
            }
            _ => {
                trace!("No boundary in {} bytes, carrying all", stream.len());
                self.remainder = stream;
                Ok(Chunk {
                    records: Vec::new(),
                    bounds: None,
                    more: true,
                })
            }
        }
    }

    /// Drain the iterator.
    pub async fn read_all(&mut self) -> FormatResult<Vec<Bytes>> {
        let mut records = Vec::new();
        loop {
            let chunk = self.next().await?;
            records.extend(chunk.records);
            if !chunk.more {
                return Ok(records);
            }
        }
    }

    /// Eagerly read and parse `bounds` in a single request.
    pub async fn get(&self, bounds: OffsetBounds) -> FormatResult<Vec<Bytes>> {
        check_in_bounds(&self.entry, bounds)?;
        let content = self.entry.get_range(bounds.start(), bounds.end()).await?;
        self.codec.to_array(&content)
    }

    /// Eagerly read every owned record.
    pub async fn owned_records(&self) -> FormatResult<Vec<Bytes>> {
        match self.layout.owned {
            Some(owned) => self.get(owned).await,
            None => Ok(Vec::new()),
        }
    }
}

fn check_in_bounds(entry: &Entry, bounds: OffsetBounds) -> FormatResult<()> {
    if bounds.end() >= entry.content_length() {
        return Err(FormatError::OutOfBounds {
            key: entry.key().to_string(),
            start: bounds.start(),
            end: bounds.end(),
            length: entry.content_length(),
        });
    }
    Ok(())
}

/// Layout for formats whose records are found purely by delimiter.
pub(crate) async fn delimited_layout<C: RecordCodec + ?Sized>(
    codec: &C,
    entry: &Entry,
    requested: Option<OffsetBounds>,
    options: &IteratorOptions,
) -> FormatResult<Layout> {
    if let Some(bounds) = requested {
        check_in_bounds(entry, bounds)?;
    }
    let length = entry.content_length();
    let (context, data_start) = if codec.has_header() {
        read_header_line(entry, options.chunk_size).await?
    } else {
        (CodecContext::default(), 0)
    };

    let mut layout = Layout {
        context,
        ..Layout::default()
    };
    if data_start >= length {
        return Ok(layout);
    }

    let delimiter = codec.delimiter();
    let window = options.adjust_window.max(1);
    let (start, end_exclusive) = match requested {
        None => (data_start, length),
        Some(bounds) if bounds.end() < data_start => return Ok(layout),
        Some(bounds) => {
            let start = if bounds.start() <= data_start {
                data_start
            } else {
                record_start(delimiter, entry, bounds.start(), data_start, window).await?
            };
            let end_exclusive = if bounds.end() + 1 >= length {
                length
            } else {
                record_start(delimiter, entry, bounds.end() + 1, data_start, window).await?
            };
            (start, end_exclusive)
        }
    };

    if start < end_exclusive {
        layout.owned = Some(OffsetBounds::new(start, end_exclusive - 1)?);
    }
    Ok(layout)
}

/// Start offset of the record containing byte `offset`.
///
/// Only the `window` bytes before `offset` are scanned (never below `floor`,
/// the first record byte of the entry).
pub(crate) async fn record_start(
    delimiter: &Delimiter,
    entry: &Entry,
    offset: u64,
    floor: u64,
    window: u64,
) -> FormatResult<u64> {
    if offset <= floor {
        return Ok(floor);
    }
    let tok = delimiter.token().len() as u64;
    let lo = offset.saturating_sub(window).max(floor);

    let found = match delimiter.position() {
        DelimiterPosition::Inbetween | DelimiterPosition::End => {
            let data = entry.get_range(lo, offset - 1).await?;
            delimiter
                .occurrences(&data, lo == 0)
                .last()
                .map(|&o| lo + o as u64 + tok)
        }
        DelimiterPosition::Start => {
            let hi = (offset + tok - 1).min(entry.content_length() - 1);
            // Anchored tokens need the byte before the window to confirm a line start
            let read_lo = if delimiter.is_line_anchored() && lo > 0 {
                lo - 1
            } else {
                lo
            };
            let data = entry.get_range(read_lo, hi).await?;
            delimiter
                .occurrences(&data, read_lo == 0)
                .into_iter()
                .map(|o| read_lo + o as u64)
                .rfind(|&abs| lo <= abs && abs <= offset)
        }
    };

    match found {
        Some(start) => Ok(start),
        None if lo == floor => Ok(floor),
        None => Err(FormatError::NoDelimiter {
            key: entry.key().to_string(),
            offset,
            window,
        }),
    }
}

/// Read the first line of an entry as its header.
async fn read_header_line(entry: &Entry, chunk_size: u64) -> FormatResult<(CodecContext, u64)> {
    let length = entry.content_length();
    if length == 0 {
        return Ok((CodecContext::default(), 0));
    }
    let step = chunk_size.max(1);
    let mut end = step.min(length) - 1;
    loop {
        let head = entry.get_range(0, end).await?;
        if let Some(pos) = head.iter().position(|&b| b == b'\n') {
            return Ok((CodecContext::with_header(head.slice(..=pos)), pos as u64 + 1));
        }
        if end + 1 >= length {
            return Ok((CodecContext::with_header(head), length));
        }
        end = end.saturating_add(step).min(length - 1);
    }
}
