use crate::codec::RecordCodec;
use crate::delimiter::{Delimiter, DelimiterPosition};
use crate::error::{FormatError, FormatResult};
use crate::identifier::Identifier;
use crate::tag::FormatTag;
use regex::bytes::Regex;
use std::sync::LazyLock;

const BLAST_DELIMITER: Delimiter = Delimiter::new(b"\n\n", DelimiterPosition::Inbetween);

#[allow(clippy::expect_used)]
static OPTIMAL_SCORE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^optimal_alignment_score:\s*([0-9]+)").expect("valid regex")
});

#[allow(clippy::expect_used)]
static SUBOPTIMAL_SCORE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"suboptimal_alignment_score:\s*([0-9]+)").expect("valid regex")
});

/// Alignment reports separated by a blank line.
///
/// The `score` identifier ranks by optimal alignment score, breaking ties by
/// the suboptimal score: `optimal * 1000 + suboptimal`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlastCodec;

fn capture(regex: &Regex, record: &[u8]) -> Option<f64> {
    regex
        .captures(record)
        .and_then(|c| c.get(1))
        .and_then(|m| std::str::from_utf8(m.as_bytes()).ok())
        .and_then(|s| s.parse().ok())
}

impl RecordCodec for BlastCodec {
    fn tag(&self) -> FormatTag {
        FormatTag::Blast
    }

    fn delimiter(&self) -> &Delimiter {
        &BLAST_DELIMITER
    }

    fn supports(&self, identifier: Identifier) -> bool {
        identifier == Identifier::Score
    }

    fn identifier_value(&self, record: &[u8], identifier: Identifier) -> FormatResult<f64> {
        if identifier != Identifier::Score {
            return Err(FormatError::UnsupportedIdentifier {
                format: self.tag(),
                identifier,
            });
        }
        let optimal = capture(&OPTIMAL_SCORE, record)
            .ok_or_else(|| FormatError::malformed(self.tag(), "missing optimal_alignment_score"))?;
        let suboptimal = capture(&SUBOPTIMAL_SCORE, record).unwrap_or(0.0);
        Ok(optimal * 1000.0 + suboptimal)
    }
}
