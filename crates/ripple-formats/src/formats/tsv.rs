use crate::codec::{RecordCodec, parse_field};
use crate::delimiter::Delimiter;
use crate::error::{FormatError, FormatResult};
use crate::formats::new_line::NEW_LINE_DELIMITER;
use crate::identifier::Identifier;
use crate::tag::FormatTag;

/// Tab-separated rows under a single header line.
#[derive(Debug, Clone, Copy, Default)]
pub struct TsvCodec;

impl RecordCodec for TsvCodec {
    fn tag(&self) -> FormatTag {
        FormatTag::Tsv
    }

    fn delimiter(&self) -> &Delimiter {
        &NEW_LINE_DELIMITER
    }

    fn has_header(&self) -> bool {
        true
    }

    fn supports(&self, identifier: Identifier) -> bool {
        matches!(identifier, Identifier::Column(_))
    }

    fn identifier_value(&self, record: &[u8], identifier: Identifier) -> FormatResult<f64> {
        match identifier {
            Identifier::Column(n) => parse_field(self.tag(), record, Some(b'\t'), n),
            other => Err(FormatError::UnsupportedIdentifier {
                format: self.tag(),
                identifier: other,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::CodecContext;
    use bytes::Bytes;

    #[test]
    fn test_tab_columns() {
        let codec = TsvCodec;
        assert_eq!(
            codec
                .identifier_value(b"peptide one\t0.25\t12", Identifier::Column(1))
                .unwrap(),
            0.25
        );
        assert!(codec.identifier_value(b"a\tb", Identifier::Column(5)).is_err());
    }

    #[test]
    fn test_header_re_emitted() {
        let codec = TsvCodec;
        let records = vec![Bytes::from_static(b"x\t1"), Bytes::from_static(b"y\t2")];
        let encoded = codec
            .from_array(&records, &CodecContext::with_header(Bytes::from_static(b"k\tv\n")))
            .unwrap();
        assert_eq!(encoded.content, Bytes::from_static(b"k\tv\nx\t1\ny\t2"));
    }
}
