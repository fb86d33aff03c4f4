use crate::codec::{RecordCodec, parse_field};
use crate::delimiter::{Delimiter, DelimiterPosition};
use crate::error::{FormatError, FormatResult};
use crate::identifier::Identifier;
use crate::tag::FormatTag;

pub(crate) const NEW_LINE_DELIMITER: Delimiter = Delimiter::new(b"\n", DelimiterPosition::Inbetween);

/// One record per line. Fields are whitespace separated.
#[derive(Debug, Clone, Copy, Default)]
pub struct NewLineCodec;

impl RecordCodec for NewLineCodec {
    fn tag(&self) -> FormatTag {
        FormatTag::NewLine
    }

    fn delimiter(&self) -> &Delimiter {
        &NEW_LINE_DELIMITER
    }

    fn supports(&self, identifier: Identifier) -> bool {
        matches!(identifier, Identifier::Column(_))
    }

    fn identifier_value(&self, record: &[u8], identifier: Identifier) -> FormatResult<f64> {
        match identifier {
            Identifier::Column(n) => parse_field(self.tag(), record, None, n),
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

    #[test]
    fn test_column_identifier() {
        let codec = NewLineCodec;
        assert_eq!(
            codec.identifier_value(b"7 2.5  -3", Identifier::Column(2)).unwrap(),
            -3.0
        );
        assert!(matches!(
            codec.identifier_value(b"7 x", Identifier::Column(1)),
            Err(FormatError::MalformedRecord { .. })
        ));
        assert!(matches!(
            codec.identifier_value(b"7", Identifier::Score),
            Err(FormatError::UnsupportedIdentifier { .. })
        ));
    }
}
