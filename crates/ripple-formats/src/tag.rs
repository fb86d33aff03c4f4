//! Format tags and the static codec registry

use crate::codec::RecordCodec;
use crate::error::{FormatError, FormatResult};
use crate::formats::{
    BedCodec, BlastCodec, FastaCodec, KnnCodec, MzmlCodec, NewLineCodec, PivotCodec, TsvCodec,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Every record format the pipeline understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FormatTag {
    #[serde(rename = "new_line")]
    NewLine,
    #[serde(rename = "tsv")]
    Tsv,
    #[serde(rename = "bed")]
    Bed,
    #[serde(rename = "fasta")]
    Fasta,
    #[serde(rename = "blast")]
    Blast,
    #[serde(rename = "knn")]
    Knn,
    #[serde(rename = "pivot")]
    Pivot,
    #[serde(rename = "mzML")]
    Mzml,
}

static NEW_LINE: NewLineCodec = NewLineCodec;
static TSV: TsvCodec = TsvCodec;
static BED: BedCodec = BedCodec;
static FASTA: FastaCodec = FastaCodec;
static BLAST: BlastCodec = BlastCodec;
static KNN: KnnCodec = KnnCodec;
static PIVOT: PivotCodec = PivotCodec;
static MZML: MzmlCodec = MzmlCodec;

impl FormatTag {
    pub const ALL: [Self; 8] = [
        Self::NewLine,
        Self::Tsv,
        Self::Bed,
        Self::Fasta,
        Self::Blast,
        Self::Knn,
        Self::Pivot,
        Self::Mzml,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::NewLine => "new_line",
            Self::Tsv => "tsv",
            Self::Bed => "bed",
            Self::Fasta => "fasta",
            Self::Blast => "blast",
            Self::Knn => "knn",
            Self::Pivot => "pivot",
            Self::Mzml => "mzML",
        }
    }

    /// File extension used in object keys.
    pub fn extension(self) -> &'static str {
        match self {
            Self::NewLine => "txt",
            Self::Mzml => "mzML",
            other => other.name(),
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tag| tag.extension() == ext)
    }

    /// The codec implementing this format.
    pub fn codec(self) -> &'static dyn RecordCodec {
        match self {
            Self::NewLine => &NEW_LINE,
            Self::Tsv => &TSV,
            Self::Bed => &BED,
            Self::Fasta => &FASTA,
            Self::Blast => &BLAST,
            Self::Knn => &KNN,
            Self::Pivot => &PIVOT,
            Self::Mzml => &MZML,
        }
    }
}

impl fmt::Display for FormatTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FormatTag {
    type Err = FormatError;

    fn from_str(s: &str) -> FormatResult<Self> {
        Self::ALL
            .into_iter()
            .find(|tag| tag.name() == s || tag.extension() == s)
            .ok_or_else(|| FormatError::UnknownFormat(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for tag in FormatTag::ALL {
            assert_eq!(tag.name().parse::<FormatTag>().unwrap(), tag);
            assert_eq!(FormatTag::from_extension(tag.extension()), Some(tag));
            assert_eq!(tag.codec().tag(), tag);
        }
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(serde_json::to_string(&FormatTag::Mzml).unwrap(), "\"mzML\"");
        assert_eq!(
            serde_json::from_str::<FormatTag>("\"new_line\"").unwrap(),
            FormatTag::NewLine
        );
        assert!("xlsx".parse::<FormatTag>().is_err());
    }
}
