use crate::codec::{RecordCodec, parse_field};
use crate::delimiter::Delimiter;
use crate::error::{FormatError, FormatResult};
use crate::formats::new_line::NEW_LINE_DELIMITER;
use crate::identifier::Identifier;
use crate::tag::FormatTag;

/// BED intervals: `chrom \t start \t end ...`, one per line. Every line is
/// an interval; there is no header.
#[derive(Debug, Clone, Copy, Default)]
pub struct BedCodec;

impl RecordCodec for BedCodec {
    fn tag(&self) -> FormatTag {
        FormatTag::Bed
    }

    fn delimiter(&self) -> &Delimiter {
        &NEW_LINE_DELIMITER
    }

    fn supports(&self, identifier: Identifier) -> bool {
        matches!(
            identifier,
            Identifier::StartPosition | Identifier::EndPosition | Identifier::Column(_)
        )
    }

    fn identifier_value(&self, record: &[u8], identifier: Identifier) -> FormatResult<f64> {
        let column = match identifier {
            Identifier::StartPosition => 1,
            Identifier::EndPosition => 2,
            Identifier::Column(n) => n,
            other => {
                return Err(FormatError::UnsupportedIdentifier {
                    format: self.tag(),
                    identifier: other,
                });
            }
        };
        parse_field(self.tag(), record, Some(b'\t'), column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combine::CombineOptions;
    use bytes::Bytes;
    use pretty_assertions::assert_eq;
    use ripple_store::{BlobStore, Entry, MemoryStore, Metadata};
    use std::sync::Arc;

    #[test]
    fn test_positions() {
        let codec = BedCodec;
        let record = b"chr1\t1200\t1350\tname";
        assert_eq!(
            codec
                .identifier_value(record, Identifier::StartPosition)
                .unwrap(),
            1200.0
        );
        assert_eq!(
            codec.identifier_value(record, Identifier::EndPosition).unwrap(),
            1350.0
        );
        assert!(!codec.supports(Identifier::Mass));
    }

    #[tokio::test]
    async fn test_first_interval_is_sorted() {
        let store: Arc<dyn BlobStore> = Arc::new(MemoryStore::new());
        store
            .put(
                "5/run/1-1/1-1-1-peaks.bed",
                Bytes::from_static(b"chr1\t900\t950\nchr1\t5\t8\nchr1\t40\t60\n"),
                Metadata::new(),
            )
            .await
            .unwrap();
        let entry = Entry::open(Arc::clone(&store), "5/run/1-1/1-1-1-peaks.bed")
            .await
            .unwrap();

        let options = CombineOptions {
            sort: true,
            identifier: Some(Identifier::StartPosition),
            ..CombineOptions::default()
        };
        let out = BedCodec.combine(&[entry], &options).await.unwrap();
        assert_eq!(
            out.content,
            Bytes::from_static(b"chr1\t5\t8\nchr1\t40\t60\nchr1\t900\t950")
        );
    }
}
