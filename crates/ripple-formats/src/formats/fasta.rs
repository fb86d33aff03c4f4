use crate::codec::RecordCodec;
use crate::delimiter::{Delimiter, DelimiterPosition};
use crate::tag::FormatTag;

const FASTA_DELIMITER: Delimiter = Delimiter::new(b">", DelimiterPosition::Start).line_anchored();

/// FASTA sequences. Every record starts with a `>` description line.
#[derive(Debug, Clone, Copy, Default)]
pub struct FastaCodec;

impl RecordCodec for FastaCodec {
    fn tag(&self) -> FormatTag {
        FormatTag::Fasta
    }

    fn delimiter(&self) -> &Delimiter {
        &FASTA_DELIMITER
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::CodecContext;
    use bytes::Bytes;

    #[test]
    fn test_round_trip() {
        let codec = FastaCodec;
        let content = Bytes::from_static(b">a desc\nACGT\nAC\n>b\nTT\n");
        let records = codec.to_array(&content).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(
            codec
                .from_array(&records, &CodecContext::default())
                .unwrap()
                .content,
            content
        );
    }
}
