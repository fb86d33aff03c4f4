//! The record codec contract
//!
//! A codec tells the iterator where records begin and end, extracts sort keys
//! from records, and turns record lists back into bytes. Most formats only
//! declare a [`Delimiter`] and inherit everything else; container formats
//! override [`RecordCodec::layout`], [`RecordCodec::from_array`] and
//! [`RecordCodec::combine`].

use crate::bounds::OffsetBounds;
use crate::combine::{CombineOptions, default_combine};
use crate::delimiter::Delimiter;
use crate::error::{FormatError, FormatResult};
use crate::identifier::Identifier;
use crate::iterator::{IteratorOptions, delimited_layout};
use crate::tag::FormatTag;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use ripple_store::{Entry, Metadata};
use std::fmt;

/// Per-entry state a codec needs to serialize records taken from that entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodecContext {
    /// Global header bytes, re-emitted in front of serialized records
    pub header: Option<Bytes>,
}

impl CodecContext {
    pub fn with_header(header: impl Into<Bytes>) -> Self {
        Self {
            header: Some(header.into()),
        }
    }
}

/// Serialized records plus the metadata to store alongside them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Encoded {
    pub content: Bytes,
    pub metadata: Metadata,
}

impl Encoded {
    pub fn new(content: impl Into<Bytes>) -> Self {
        Self {
            content: content.into(),
            metadata: Metadata::new(),
        }
    }
}

/// Which bytes of an entry a range request owns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Layout {
    /// Owned record bytes, `None` when the request owns no record
    pub owned: Option<OffsetBounds>,
    pub context: CodecContext,
    /// Offsets discovered while resolving the layout, in the same metadata
    /// vocabulary the codec writes on its outputs
    pub discovered: Metadata,
}

#[async_trait]
pub trait RecordCodec: Send + Sync + fmt::Debug {
    fn tag(&self) -> FormatTag;

    fn delimiter(&self) -> &Delimiter;

    /// Whether entries start with a header line that is not a record.
    fn has_header(&self) -> bool {
        false
    }

    fn supports(&self, _identifier: Identifier) -> bool {
        false
    }

    fn identifier_value(&self, _record: &[u8], identifier: Identifier) -> FormatResult<f64> {
        Err(FormatError::UnsupportedIdentifier {
            format: self.tag(),
            identifier,
        })
    }

    fn to_array(&self, content: &Bytes) -> FormatResult<Vec<Bytes>> {
        Ok(self.delimiter().split(content))
    }

    fn from_array(&self, records: &[Bytes], context: &CodecContext) -> FormatResult<Encoded> {
        let body = self.delimiter().join(records);
        let content = match &context.header {
            Some(header) => {
                let mut out = BytesMut::with_capacity(header.len() + body.len());
                out.extend_from_slice(header);
                out.extend_from_slice(&body);
                out.freeze()
            }
            None => body,
        };
        Ok(Encoded::new(content))
    }

    /// Resolve the bytes of `entry` owned by `requested` (the whole entry when `None`).
    async fn layout(
        &self,
        entry: &Entry,
        requested: Option<OffsetBounds>,
        options: &IteratorOptions,
    ) -> FormatResult<Layout> {
        delimited_layout(self, entry, requested, options).await
    }

    async fn combine(&self, entries: &[Entry], options: &CombineOptions) -> FormatResult<Encoded> {
        default_combine(self, entries, options).await
    }
}

/// Parse a whitespace- or tab-separated numeric field.
pub(crate) fn parse_field(
    format: FormatTag,
    record: &[u8],
    separator: Option<u8>,
    column: usize,
) -> FormatResult<f64> {
    let text = std::str::from_utf8(record)
        .map_err(|e| FormatError::malformed(format, format!("invalid UTF-8: {e}")))?;
    let line = text.trim_end_matches(['\r', '\n']);
    let field = match separator {
        Some(sep) => line.split(char::from(sep)).nth(column),
        None => line.split_whitespace().nth(column),
    }
    .ok_or_else(|| FormatError::malformed(format, format!("no column {column} in {line:?}")))?;
    field
        .trim()
        .parse()
        .map_err(|_| FormatError::malformed(format, format!("column {column} is not numeric: {field:?}")))
}
