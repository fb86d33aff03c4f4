//! Merging many partial files into one
//!
//! Without `sort`, entries are concatenated in caller order: empty entries are
//! skipped, headers after the first entry are stripped, and `inbetween`
//! formats get exactly one separator between entries. With `sort`, every
//! record of every entry is decoded, keyed and stable-sorted before being
//! serialized again, since independently sorted partials do not interleave.

use crate::codec::{CodecContext, Encoded, RecordCodec};
use crate::delimiter::DelimiterPosition;
use crate::error::{FormatError, FormatResult};
use crate::identifier::Identifier;
use crate::iterator::{ChunkedIterator, IteratorOptions};
use bytes::{Bytes, BytesMut};
use ripple_store::Entry;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default number of bins produced by pivot reduction.
pub const DEFAULT_NUM_BINS: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombineOptions {
    pub sort: bool,
    pub identifier: Option<Identifier>,
    /// Neighbors kept per point by top-k merges
    pub k: Option<usize>,
    /// Bins produced by pivot reduction
    pub num_bins: usize,
    pub iterator: IteratorOptions,
}

impl Default for CombineOptions {
    fn default() -> Self {
        Self {
            sort: false,
            identifier: None,
            k: None,
            num_bins: DEFAULT_NUM_BINS,
            iterator: IteratorOptions::default(),
        }
    }
}

impl CombineOptions {
    pub fn sorted_by(identifier: Identifier) -> Self {
        Self {
            sort: true,
            identifier: Some(identifier),
            ..Self::default()
        }
    }
}

/// Concatenate or sort-merge, depending on `options.sort`.
pub async fn default_combine<C: RecordCodec + ?Sized>(
    codec: &C,
    entries: &[Entry],
    options: &CombineOptions,
) -> FormatResult<Encoded> {
    if options.sort {
        let identifier = options.identifier.ok_or_else(|| {
            FormatError::InvalidOptions("sorted combine requires an identifier".to_string())
        })?;
        sort_combine(codec, entries, identifier, options.iterator).await
    } else {
        concat_combine(codec, entries).await
    }
}

/// Every record of every non-empty entry, in entry order, plus the context of
/// the first entry.
pub async fn collect_records<C: RecordCodec + ?Sized>(
    codec: &C,
    entries: &[Entry],
    options: IteratorOptions,
) -> FormatResult<(Vec<Bytes>, CodecContext)> {
    let mut records = Vec::new();
    let mut context = None;
    for entry in entries {
        if entry.is_empty() {
            debug!("Skipping empty entry {}", entry.key());
            continue;
        }
        let mut it = ChunkedIterator::new(entry.clone(), codec, None, options).await?;
        if context.is_none() {
            context = Some(it.context().clone());
        }
        records.extend(it.read_all().await?);
    }
    Ok((records, context.unwrap_or_default()))
}

async fn sort_combine<C: RecordCodec + ?Sized>(
    codec: &C,
    entries: &[Entry],
    identifier: Identifier,
    options: IteratorOptions,
) -> FormatResult<Encoded> {
    let (records, context) = collect_records(codec, entries, options).await?;
    let sorted = sort_records(codec, records, identifier)?;
    debug!(
        "Sort-merged {} records from {} entries",
        sorted.len(),
        entries.len()
    );
    codec.from_array(&sorted, &context)
}

/// Stable ascending sort by identifier value.
pub fn sort_records<C: RecordCodec + ?Sized>(
    codec: &C,
    records: Vec<Bytes>,
    identifier: Identifier,
) -> FormatResult<Vec<Bytes>> {
    let mut keyed = records
        .into_iter()
        .map(|record| Ok((codec.identifier_value(&record, identifier)?, record)))
        .collect::<FormatResult<Vec<(f64, Bytes)>>>()?;
    keyed.sort_by(|a, b| a.0.total_cmp(&b.0));
    Ok(keyed.into_iter().map(|(_, record)| record).collect())
}

async fn concat_combine<C: RecordCodec + ?Sized>(
    codec: &C,
    entries: &[Entry],
) -> FormatResult<Encoded> {
    let token = codec.delimiter().token();
    let inbetween = codec.delimiter().position() == DelimiterPosition::Inbetween;
    let mut out = BytesMut::new();
    let mut count = 0usize;

    for entry in entries {
        if entry.is_empty() {
            debug!("Skipping empty entry {}", entry.key());
            continue;
        }
        let content = entry.get_content().await?;
        let body = if codec.has_header() && count > 0 {
            match content.iter().position(|&b| b == b'\n') {
                Some(pos) => content.slice(pos + 1..),
                None => Bytes::new(),
            }
        } else {
            content
        };
        if body.is_empty() {
            continue;
        }
        if count > 0 && inbetween && !out.ends_with(token) {
            out.extend_from_slice(token);
        }
        out.extend_from_slice(&body);
        count += 1;
    }

    debug!("Concatenated {} of {} entries", count, entries.len());
    Ok(Encoded::new(out.freeze()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag::FormatTag;
    use pretty_assertions::assert_eq;
    use ripple_store::{BlobStore, MemoryStore, Metadata};
    use std::sync::Arc;

    async fn entries(contents: &[&'static str]) -> Vec<Entry> {
        let store: Arc<dyn BlobStore> = Arc::new(MemoryStore::new());
        let mut out = Vec::new();
        for (i, content) in contents.iter().enumerate() {
            let key = format!("1/run/1-1/{}-{}-1-part.txt", i + 1, contents.len());
            store
                .put(&key, Bytes::from_static(content.as_bytes()), Metadata::new())
                .await
                .unwrap();
            out.push(Entry::open(Arc::clone(&store), &key).await.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn test_concat_single_separator() {
        let codec = FormatTag::NewLine.codec();
        let parts = entries(&["a\nb\n", "", "c\nd", "e"]).await;
        let out = codec
            .combine(&parts, &CombineOptions::default())
            .await
            .unwrap();
        assert_eq!(out.content, Bytes::from_static(b"a\nb\nc\nd\ne"));
    }

    #[tokio::test]
    async fn test_concat_strips_later_headers() {
        let codec = FormatTag::Tsv.codec();
        let parts = entries(&["h1\th2\nx\t1", "h1\th2\ny\t2", "h1\th2\n"]).await;
        let out = codec
            .combine(&parts, &CombineOptions::default())
            .await
            .unwrap();
        assert_eq!(out.content, Bytes::from_static(b"h1\th2\nx\t1\ny\t2"));
    }

    #[tokio::test]
    async fn test_sort_merges_interleaved_partials() {
        let codec = FormatTag::Tsv.codec();
        let parts = entries(&["id\tv\na\t5\nb\t1\n", "", "id\tv\nc\t3\nd\t1\n"]).await;
        let out = codec
            .combine(&parts, &CombineOptions::sorted_by(Identifier::Column(1)))
            .await
            .unwrap();
        assert_eq!(
            out.content,
            Bytes::from_static(b"id\tv\nb\t1\nd\t1\nc\t3\na\t5")
        );
    }

    #[tokio::test]
    async fn test_sort_requires_identifier() {
        let codec = FormatTag::NewLine.codec();
        let parts = entries(&["1\n2"]).await;
        let options = CombineOptions {
            sort: true,
            ..CombineOptions::default()
        };
        assert!(matches!(
            codec.combine(&parts, &options).await,
            Err(FormatError::InvalidOptions(_))
        ));
    }

    #[tokio::test]
    async fn test_all_empty_entries() {
        let codec = FormatTag::NewLine.codec();
        let parts = entries(&["", ""]).await;
        let out = codec
            .combine(&parts, &CombineOptions::sorted_by(Identifier::Column(0)))
            .await
            .unwrap();
        assert!(out.content.is_empty());
    }
}
