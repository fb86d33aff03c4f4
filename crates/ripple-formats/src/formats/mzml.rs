//! Indexed mzML mass spectrometry containers
//!
//! An indexed mzML document is a global header, a body of `<spectrum>`
//! elements, and a footer holding a byte-offset index of every spectrum, the
//! offset of that index, and a SHA-1 checksum of everything before it.
//!
//! Reading resolves the header/body/footer split from entry metadata when
//! present and otherwise by scanning backward from the end of the entry for
//! `<indexListOffset>` and `</spectrumList>`. A sub-range owns the spectra
//! whose indexed offsets fall inside it. Documents without an index are
//! re-indexed by scanning the body.
//!
//! Writing never concatenates documents: the header count is corrected,
//! spectra are re-numbered and a fresh index and checksum are appended.

use crate::bounds::OffsetBounds;
use crate::codec::{CodecContext, Encoded, Layout, RecordCodec};
use crate::combine::{CombineOptions, collect_records, sort_records};
use crate::delimiter::{Delimiter, DelimiterPosition};
use crate::error::{FormatError, FormatResult};
use crate::identifier::Identifier;
use crate::iterator::IteratorOptions;
use crate::tag::FormatTag;
use async_trait::async_trait;
use bytes::Bytes;
use regex::bytes::Regex;
use ripple_store::{Entry, Metadata};
use sha1::{Digest, Sha1};
use std::sync::LazyLock;
use tracing::debug;

pub const HEADER_START_INDEX: &str = "header_start_index";
pub const HEADER_END_INDEX: &str = "header_end_index";
pub const SPECTRA_START_INDEX: &str = "spectra_start_index";
pub const SPECTRA_END_INDEX: &str = "spectra_end_index";
pub const FOOTER_START_INDEX: &str = "footer_start_index";
pub const FOOTER_END_INDEX: &str = "footer_end_index";
pub const INDEX_LIST_OFFSET: &str = "index_list_offset";
pub const NUM_SPECTRA: &str = "num_spectra";
pub const COUNT: &str = "count";

const SPECTRUM_DELIMITER: Delimiter = Delimiter::new(b"</spectrum>", DelimiterPosition::End);
const SPECTRUM_LIST_CLOSE: &[u8] = b"</spectrumList>";

/// Minimum tail scanned for `<indexListOffset>`.
const MIN_TAIL_SCAN: u64 = 4096;

macro_rules! regex {
    ($name:ident, $pattern:literal) => {
        #[allow(clippy::expect_used)]
        static $name: LazyLock<Regex> =
            LazyLock::new(|| Regex::new($pattern).expect("valid regex"));
    };
}

regex!(INDEX_LIST_OFFSET_RE, r"<indexListOffset>\s*([0-9]+)\s*</indexListOffset>");
regex!(SPECTRUM_INDEX_RE, r#"(?s)<index\s+name="spectrum"\s*>(.*?)</index>"#);
regex!(OFFSET_RE, r"<offset\b[^>]*>\s*([0-9]+)\s*</offset>");
regex!(SPECTRUM_START_RE, r"<spectrum[\s>]");
regex!(LIST_COUNT_RE, r#"(<spectrumList\b[^>]*?\bcount=")[0-9]+(")"#);
regex!(SPECTRUM_INDEX_ATTR_RE, r#"^(<spectrum\b[^>]*?\bindex=")[0-9]+(")"#);
regex!(SPECTRUM_ID_RE, r#"^<spectrum\b[^>]*?\bid="([^"]*)""#);
regex!(CV_PARAM_RE, r"<cvParam\b[^>]*>");
regex!(NAME_ATTR_RE, r#"\bname="([^"]*)""#);
regex!(VALUE_ATTR_RE, r#"\bvalue="([^"]*)""#);

#[derive(Debug, Clone, Copy, Default)]
pub struct MzmlCodec;

/// Where the parts of one document live.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Sections {
    header_end: u64,
    footer_start: u64,
    index_list_offset: Option<u64>,
    /// Spectrum start offsets, when they had to be read to find the header
    offsets: Option<Vec<u64>>,
}

impl Sections {
    fn from_metadata(metadata: &Metadata) -> Option<Self> {
        let get = |name: &str| metadata.get(name).and_then(|v| v.parse::<u64>().ok());
        Some(Self {
            header_end: get(HEADER_END_INDEX)?,
            footer_start: get(FOOTER_START_INDEX)?,
            index_list_offset: get(INDEX_LIST_OFFSET),
            offsets: None,
        })
    }

    fn to_metadata(&self) -> Metadata {
        let mut metadata = Metadata::new();
        metadata.insert(HEADER_START_INDEX.to_string(), "0".to_string());
        metadata.insert(HEADER_END_INDEX.to_string(), self.header_end.to_string());
        metadata.insert(
            SPECTRA_START_INDEX.to_string(),
            (self.header_end + 1).to_string(),
        );
        metadata.insert(
            SPECTRA_END_INDEX.to_string(),
            self.footer_start.saturating_sub(1).to_string(),
        );
        metadata.insert(FOOTER_START_INDEX.to_string(), self.footer_start.to_string());
        if let Some(offset) = self.index_list_offset {
            metadata.insert(INDEX_LIST_OFFSET.to_string(), offset.to_string());
        }
        if let Some(offsets) = &self.offsets {
            metadata.insert(NUM_SPECTRA.to_string(), offsets.len().to_string());
        }
        metadata
    }
}

fn container_error(entry: &Entry, reason: impl Into<String>) -> FormatError {
    FormatError::MalformedContainer {
        format: FormatTag::Mzml,
        key: entry.key().to_string(),
        reason: reason.into(),
    }
}

fn parse_u64(bytes: &[u8]) -> Option<u64> {
    std::str::from_utf8(bytes).ok()?.parse().ok()
}

/// Last occurrence of `marker` starting before `before`, scanning backward
/// `window` bytes at a time.
async fn rfind_backward(
    entry: &Entry,
    marker: &[u8],
    before: u64,
    window: u64,
) -> FormatResult<Option<u64>> {
    let tok = marker.len() as u64;
    let mut end = before;
    while end > 0 {
        let start = end.saturating_sub(window.max(tok));
        // Overlap by the marker length so a marker straddling windows is found
        let read_end = (end + tok - 1).min(before.min(entry.content_length())) - 1;
        if read_end < start {
            break;
        }
        let data = entry.get_range(start, read_end).await?;
        if let Some(pos) = data.windows(marker.len()).rposition(|w| w == marker) {
            return Ok(Some(start + pos as u64));
        }
        end = start;
    }
    Ok(None)
}

/// Spectrum offsets listed in the index starting at `index_list_offset`.
async fn read_index(entry: &Entry, index_list_offset: u64) -> FormatResult<Vec<u64>> {
    let length = entry.content_length();
    if index_list_offset >= length {
        return Err(container_error(entry, "index list offset past end of entry"));
    }
    let index = entry.get_range(index_list_offset, length - 1).await?;
    let block = SPECTRUM_INDEX_RE
        .captures(&index)
        .and_then(|c| c.get(1))
        .ok_or_else(|| container_error(entry, "no spectrum index"))?;
    let mut offsets = OFFSET_RE
        .captures_iter(block.as_bytes())
        .filter_map(|c| c.get(1).and_then(|m| parse_u64(m.as_bytes())))
        .collect::<Vec<_>>();
    offsets.sort_unstable();
    Ok(offsets)
}

/// Locate the sections of a document with no usable metadata.
async fn discover(entry: &Entry, options: &IteratorOptions) -> FormatResult<Sections> {
    let length = entry.content_length();
    let window = options.chunk_size.max(MIN_TAIL_SCAN);
    let tail_start = length.saturating_sub(window);
    let tail = entry.get_range(tail_start, length - 1).await?;
    let index_list_offset = INDEX_LIST_OFFSET_RE
        .captures_iter(&tail)
        .last()
        .and_then(|c| c.get(1))
        .and_then(|m| parse_u64(m.as_bytes()));

    let (offsets, scan_before) = match index_list_offset {
        Some(offset) => (read_index(entry, offset).await?, offset),
        None => {
            debug!("{} has no index, rebuilding from body", entry.key());
            let content = entry.get_content().await?;
            let offsets = SPECTRUM_START_RE
                .find_iter(&content)
                .map(|m| m.start() as u64)
                .collect();
            (offsets, length)
        }
    };

    let footer_start = rfind_backward(entry, SPECTRUM_LIST_CLOSE, scan_before, window)
        .await?
        .ok_or_else(|| container_error(entry, "no </spectrumList>"))?;
    let header_end = match offsets.first() {
        Some(&first) if first > 0 => first - 1,
        Some(_) => return Err(container_error(entry, "spectrum at offset 0")),
        None => footer_start.saturating_sub(1),
    };
    if offsets.last().is_some_and(|&last| last >= footer_start) {
        return Err(container_error(entry, "spectrum offset inside footer"));
    }

    Ok(Sections {
        header_end,
        footer_start,
        index_list_offset,
        offsets: Some(offsets),
    })
}

fn cv_param(record: &[u8], name: &str) -> Option<f64> {
    CV_PARAM_RE.find_iter(record).find_map(|tag| {
        let tag = tag.as_bytes();
        let tag_name = NAME_ATTR_RE.captures(tag)?.get(1)?;
        if tag_name.as_bytes() != name.as_bytes() {
            return None;
        }
        let value = VALUE_ATTR_RE.captures(tag)?.get(1)?;
        std::str::from_utf8(value.as_bytes()).ok()?.parse().ok()
    })
}

fn trim_start(record: &[u8]) -> &[u8] {
    let skip = record
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(record.len());
    &record[skip..]
}

/// Replace the first capture-delimited number matched by `regex` with `value`.
fn rewrite_number(regex: &Regex, data: &[u8], value: usize) -> Option<Vec<u8>> {
    let caps = regex.captures(data)?;
    let whole = caps.get(0)?;
    let mut out = Vec::with_capacity(data.len() + 8);
    out.extend_from_slice(&data[..whole.start()]);
    out.extend_from_slice(caps.get(1)?.as_bytes());
    out.extend_from_slice(value.to_string().as_bytes());
    out.extend_from_slice(caps.get(2)?.as_bytes());
    out.extend_from_slice(&data[whole.end()..]);
    Some(out)
}

/// Bytes of the spectra whose offsets fall in `bounds`; the last one runs to
/// the next spectrum or the end of the body.
fn owned_spectra(
    offsets: &[u64],
    bounds: OffsetBounds,
    body_end: u64,
) -> FormatResult<Option<OffsetBounds>> {
    let Some(first) = offsets.iter().position(|&o| bounds.contains(o)) else {
        return Ok(None);
    };
    let end = offsets
        .iter()
        .find(|&&o| o > bounds.end())
        .map_or(body_end, |&next| next - 1);
    Ok(Some(OffsetBounds::new(offsets[first], end)?))
}

#[async_trait]
impl RecordCodec for MzmlCodec {
    fn tag(&self) -> FormatTag {
        FormatTag::Mzml
    }

    fn delimiter(&self) -> &Delimiter {
        &SPECTRUM_DELIMITER
    }

    fn has_header(&self) -> bool {
        true
    }

    fn supports(&self, identifier: Identifier) -> bool {
        matches!(identifier, Identifier::Mass | Identifier::Tic)
    }

    fn identifier_value(&self, record: &[u8], identifier: Identifier) -> FormatResult<f64> {
        let name = match identifier {
            Identifier::Mass => "base peak m/z",
            Identifier::Tic => "total ion current",
            other => {
                return Err(FormatError::UnsupportedIdentifier {
                    format: self.tag(),
                    identifier: other,
                });
            }
        };
        cv_param(record, name)
            .ok_or_else(|| FormatError::malformed(self.tag(), format!("no {name:?} cvParam")))
    }

    fn to_array(&self, content: &Bytes) -> FormatResult<Vec<Bytes>> {
        Ok(self
            .delimiter()
            .split(content)
            .into_iter()
            .map(|record| {
                let skip = record.len() - trim_start(&record).len();
                record.slice(skip..)
            })
            .collect())
    }

    fn from_array(&self, records: &[Bytes], context: &CodecContext) -> FormatResult<Encoded> {
        let header = context
            .header
            .as_ref()
            .ok_or(FormatError::MissingHeader(self.tag()))?;
        let header = rewrite_number(&LIST_COUNT_RE, header, records.len()).ok_or_else(|| {
            FormatError::malformed(self.tag(), "header has no spectrumList count")
        })?;

        let mut out = Vec::with_capacity(header.len() + records.iter().map(Bytes::len).sum::<usize>());
        out.extend_from_slice(&header);
        let spectra_start = out.len();

        let mut index = Vec::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            let record = trim_start(record);
            let id = SPECTRUM_ID_RE
                .captures(record)
                .and_then(|c| c.get(1))
                .ok_or_else(|| FormatError::malformed(self.tag(), "spectrum without id"))?;
            index.push((id.as_bytes().to_vec(), out.len()));
            match rewrite_number(&SPECTRUM_INDEX_ATTR_RE, record, i) {
                Some(renumbered) => out.extend_from_slice(&renumbered),
                None => out.extend_from_slice(record),
            }
            out.push(b'\n');
        }

        let footer_start = out.len();
        out.extend_from_slice(b"</spectrumList>\n</run>\n</mzML>\n");
        let index_list_offset = out.len();
        out.extend_from_slice(b"<indexList count=\"1\">\n<index name=\"spectrum\">\n");
        for (id, offset) in &index {
            out.extend_from_slice(b"<offset idRef=\"");
            out.extend_from_slice(id);
            out.extend_from_slice(format!("\">{offset}</offset>\n").as_bytes());
        }
        out.extend_from_slice(b"</index>\n</indexList>\n");
        out.extend_from_slice(
            format!("<indexListOffset>{index_list_offset}</indexListOffset>\n<fileChecksum>")
                .as_bytes(),
        );
        let checksum = hex::encode(Sha1::digest(&out));
        out.extend_from_slice(checksum.as_bytes());
        out.extend_from_slice(b"</fileChecksum>\n</indexedmzML>\n");

        let mut metadata = Sections {
            header_end: spectra_start as u64 - 1,
            footer_start: footer_start as u64,
            index_list_offset: Some(index_list_offset as u64),
            offsets: None,
        }
        .to_metadata();
        metadata.insert(FOOTER_END_INDEX.to_string(), (out.len() - 1).to_string());
        metadata.insert(NUM_SPECTRA.to_string(), records.len().to_string());
        metadata.insert(COUNT.to_string(), records.len().to_string());

        Ok(Encoded {
            content: Bytes::from(out),
            metadata,
        })
    }

    async fn layout(
        &self,
        entry: &Entry,
        requested: Option<OffsetBounds>,
        options: &IteratorOptions,
    ) -> FormatResult<Layout> {
        let length = entry.content_length();
        if let Some(bounds) = requested
            && bounds.end() >= length
        {
            return Err(FormatError::OutOfBounds {
                key: entry.key().to_string(),
                start: bounds.start(),
                end: bounds.end(),
                length,
            });
        }
        if length == 0 {
            return Ok(Layout::default());
        }

        let mut sections = match Sections::from_metadata(entry.metadata()) {
            Some(sections) => sections,
            None => discover(entry, options).await?,
        };
        if sections.header_end >= sections.footer_start || sections.footer_start > length {
            return Err(container_error(entry, "inconsistent section offsets"));
        }

        let header = entry.get_range(0, sections.header_end).await?;
        let body_start = sections.header_end + 1;
        let body_end = sections.footer_start - 1;

        let owned = match requested {
            _ if body_start > body_end => None,
            None => Some(OffsetBounds::new(body_start, body_end)?),
            Some(bounds) => {
                let offsets = match sections.offsets.take() {
                    Some(offsets) => offsets,
                    None => match sections.index_list_offset {
                        Some(offset) => read_index(entry, offset).await?,
                        None => discover(entry, options).await?.offsets.unwrap_or_default(),
                    },
                };
                let owned = owned_spectra(&offsets, bounds, body_end)?;
                sections.offsets = Some(offsets);
                owned
            }
        };

        Ok(Layout {
            owned,
            context: CodecContext::with_header(header),
            discovered: sections.to_metadata(),
        })
    }

    /// Records from every entry (sorted when requested) written as one new document.
    async fn combine(&self, entries: &[Entry], options: &CombineOptions) -> FormatResult<Encoded> {
        let (records, context) = collect_records(self, entries, options.iterator).await?;
        if context.header.is_none() {
            return Ok(Encoded::default());
        }
        let records = if options.sort {
            let identifier = options.identifier.ok_or_else(|| {
                FormatError::InvalidOptions("sorted combine requires an identifier".to_string())
            })?;
            sort_records(self, records, identifier)?
        } else {
            records
        };
        debug!("Writing {} spectra from {} entries", records.len(), entries.len());
        self.from_array(&records, &context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iterator::ChunkedIterator;
    use pretty_assertions::assert_eq;
    use ripple_store::{BlobStore, MemoryStore};
    use std::sync::Arc;

    const HEADER: &str = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\
        <indexedmzML xmlns=\"http://psi.hupo.org/ms/mzml\">\n\
        <mzML id=\"tide\">\n\
        <run id=\"run1\">\n\
        <spectrumList count=\"99\" defaultDataProcessingRef=\"pwiz\">\n";

    fn spectrum(scan: u32, mass: f64, tic: f64) -> Bytes {
        Bytes::from(format!(
            "    <spectrum index=\"{scan}\" id=\"scan={scan}\" defaultArrayLength=\"0\">\n\
             <cvParam cvRef=\"MS\" accession=\"MS:1000504\" name=\"base peak m/z\" value=\"{mass}\"/>\n\
             <cvParam cvRef=\"MS\" accession=\"MS:1000285\" name=\"total ion current\" value=\"{tic}\"/>\n\
             </spectrum>"
        ))
    }

    fn spectra() -> Vec<Bytes> {
        vec![
            spectrum(7, 445.12, 1.5e6),
            spectrum(8, 212.5, 3.0e5),
            spectrum(9, 301.0, 9.9e5),
        ]
    }

    fn document(records: &[Bytes]) -> Encoded {
        MzmlCodec
            .from_array(records, &CodecContext::with_header(HEADER))
            .unwrap()
    }

    async fn put(store: &Arc<dyn BlobStore>, key: &str, content: Bytes, metadata: Metadata) -> Entry {
        store.put(key, content, metadata).await.unwrap();
        Entry::open(Arc::clone(store), key).await.unwrap()
    }

    fn ids(records: &[Bytes]) -> Vec<String> {
        records
            .iter()
            .map(|r| {
                let caps = SPECTRUM_ID_RE.captures(r).unwrap();
                String::from_utf8_lossy(&caps[1]).into_owned()
            })
            .collect()
    }

    fn offset(metadata: &Metadata, name: &str) -> usize {
        metadata[name].parse().unwrap()
    }

    #[test]
    fn test_from_array_writes_index_and_checksum() {
        let encoded = document(&spectra());
        let content = &encoded.content;
        let metadata = &encoded.metadata;

        assert_eq!(metadata[COUNT], "3");
        assert_eq!(metadata[NUM_SPECTRA], "3");
        assert_eq!(metadata[HEADER_START_INDEX], "0");
        assert_eq!(offset(metadata, FOOTER_END_INDEX), content.len() - 1);

        let header_end = offset(metadata, HEADER_END_INDEX);
        assert!(content[..=header_end].ends_with(b"count=\"3\" defaultDataProcessingRef=\"pwiz\">\n"));
        assert!(content[header_end + 1..].starts_with(b"<spectrum index=\"0\" id=\"scan=7\""));
        assert!(content[offset(metadata, FOOTER_START_INDEX)..].starts_with(b"</spectrumList>"));
        assert!(content[offset(metadata, INDEX_LIST_OFFSET)..].starts_with(b"<indexList"));

        let text = String::from_utf8(content.to_vec()).unwrap();
        assert!(text.contains("<spectrum index=\"2\" id=\"scan=9\""));
        assert!(text.contains(&format!("<offset idRef=\"scan=7\">{}</offset>", header_end + 1)));

        let checksum_at = text.find("<fileChecksum>").unwrap() + "<fileChecksum>".len();
        let expected = hex::encode(Sha1::digest(&content[..checksum_at]));
        assert_eq!(&text[checksum_at..checksum_at + 40], expected);
        assert!(text.ends_with("</fileChecksum>\n</indexedmzML>\n"));
    }

    #[test]
    fn test_from_array_requires_header() {
        let err = MzmlCodec
            .from_array(&spectra(), &CodecContext::default())
            .unwrap_err();
        assert!(matches!(err, FormatError::MissingHeader(FormatTag::Mzml)));

        let err = MzmlCodec
            .from_array(&spectra(), &CodecContext::with_header("<mzML>\n"))
            .unwrap_err();
        assert!(matches!(err, FormatError::MalformedRecord { .. }));
    }

    #[test]
    fn test_identifiers() {
        let record = spectrum(1, 445.12, 1.5e6);
        assert_eq!(MzmlCodec.identifier_value(&record, Identifier::Mass).unwrap(), 445.12);
        assert_eq!(MzmlCodec.identifier_value(&record, Identifier::Tic).unwrap(), 1.5e6);
        assert!(MzmlCodec.identifier_value(&record, Identifier::Score).is_err());
        assert!(
            MzmlCodec
                .identifier_value(b"<spectrum id=\"x\"></spectrum>", Identifier::Mass)
                .is_err()
        );
        assert!(MzmlCodec.supports(Identifier::Tic));
        assert!(!MzmlCodec.supports(Identifier::Column(0)));
    }

    #[tokio::test]
    async fn test_layout_discovered_by_scanning() {
        let store: Arc<dyn BlobStore> = Arc::new(MemoryStore::new());
        let encoded = document(&spectra());
        let entry = put(&store, "0/a.mzML", encoded.content.clone(), Metadata::new()).await;

        let options = IteratorOptions::new(64, 16);
        let mut it = ChunkedIterator::new(entry, &MzmlCodec, None, options).await.unwrap();
        for name in [HEADER_END_INDEX, FOOTER_START_INDEX, INDEX_LIST_OFFSET, NUM_SPECTRA] {
            assert_eq!(it.discovered()[name], encoded.metadata[name], "{name}");
        }
        let records = it.read_all().await.unwrap();
        assert_eq!(ids(&records), vec!["scan=7", "scan=8", "scan=9"]);
        assert!(records.iter().all(|r| r.starts_with(b"<spectrum ")));
    }

    #[tokio::test]
    async fn test_sub_ranges_own_each_spectrum_once() {
        let store: Arc<dyn BlobStore> = Arc::new(MemoryStore::new());
        let encoded = document(&spectra());
        let length = encoded.content.len() as u64;
        let with_metadata =
            put(&store, "0/a.mzML", encoded.content.clone(), encoded.metadata.clone()).await;
        let without_metadata = put(&store, "0/b.mzML", encoded.content.clone(), Metadata::new()).await;

        for entry in [with_metadata, without_metadata] {
            for size in [37, 200, 512, length] {
                let mut seen = Vec::new();
                for bounds in OffsetBounds::split(length, size) {
                    let mut it = ChunkedIterator::new(
                        entry.clone(),
                        &MzmlCodec,
                        Some(bounds),
                        IteratorOptions::new(48, 16),
                    )
                    .await
                    .unwrap();
                    seen.extend(it.read_all().await.unwrap());
                }
                assert_eq!(ids(&seen), vec!["scan=7", "scan=8", "scan=9"], "size {size}");
            }
        }
    }

    #[tokio::test]
    async fn test_unindexed_document_is_reindexed() {
        let store: Arc<dyn BlobStore> = Arc::new(MemoryStore::new());
        let mut content = HEADER.as_bytes().to_vec();
        for record in spectra() {
            content.extend_from_slice(&record);
            content.push(b'\n');
        }
        content.extend_from_slice(b"</spectrumList>\n</run>\n</mzML>\n</indexedmzML>\n");
        let length = content.len() as u64;
        let entry = put(&store, "0/plain.mzML", Bytes::from(content), Metadata::new()).await;

        let mut it = ChunkedIterator::new(entry.clone(), &MzmlCodec, None, IteratorOptions::default())
            .await
            .unwrap();
        assert_eq!(it.read_all().await.unwrap().len(), 3);
        assert!(!it.discovered().contains_key(INDEX_LIST_OFFSET));

        let mut seen = Vec::new();
        for bounds in OffsetBounds::split(length, 300) {
            let mut it =
                ChunkedIterator::new(entry.clone(), &MzmlCodec, Some(bounds), IteratorOptions::default())
                    .await
                    .unwrap();
            seen.extend(it.read_all().await.unwrap());
        }
        assert_eq!(ids(&seen), vec!["scan=7", "scan=8", "scan=9"]);
    }

    #[tokio::test]
    async fn test_combine_sorted_by_mass() {
        let store: Arc<dyn BlobStore> = Arc::new(MemoryStore::new());
        let first = document(&spectra());
        let second = document(&[spectrum(1, 100.25, 2.0e5), spectrum(2, 999.0, 1.0e4)]);
        let entries = vec![
            put(&store, "1/a.mzML", first.content, first.metadata).await,
            put(&store, "1/empty.mzML", Bytes::new(), Metadata::new()).await,
            put(&store, "1/b.mzML", second.content, second.metadata).await,
        ];

        let combined = MzmlCodec
            .combine(&entries, &CombineOptions::sorted_by(Identifier::Mass))
            .await
            .unwrap();
        assert_eq!(combined.metadata[COUNT], "5");

        let out = put(&store, "2/out.mzML", combined.content.clone(), Metadata::new()).await;
        let records = ChunkedIterator::new(out, &MzmlCodec, None, IteratorOptions::default())
            .await
            .unwrap()
            .read_all()
            .await
            .unwrap();
        assert_eq!(ids(&records), vec!["scan=1", "scan=8", "scan=9", "scan=7", "scan=2"]);

        let text = String::from_utf8(combined.content.to_vec()).unwrap();
        assert!(text.contains("<spectrumList count=\"5\""));
        for i in 0..5 {
            assert!(text.contains(&format!("<spectrum index=\"{i}\"")));
        }
    }

    #[tokio::test]
    async fn test_combine_of_empty_entries_is_empty() {
        let store: Arc<dyn BlobStore> = Arc::new(MemoryStore::new());
        let entries = vec![put(&store, "1/empty.mzML", Bytes::new(), Metadata::new()).await];
        let combined = MzmlCodec
            .combine(&entries, &CombineOptions::default())
            .await
            .unwrap();
        assert!(combined.content.is_empty());
    }
}
