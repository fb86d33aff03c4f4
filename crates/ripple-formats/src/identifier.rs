//! Sort keys a codec can extract from a record

use crate::error::{FormatError, FormatResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A numeric key extracted from one record.
///
/// Serialized as a plain string: `start_position`, `end_position`, `score`,
/// `mass`, `tic` or `column:N` (zero-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Identifier {
    StartPosition,
    EndPosition,
    Score,
    Mass,
    Tic,
    Column(usize),
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StartPosition => f.write_str("start_position"),
            Self::EndPosition => f.write_str("end_position"),
            Self::Score => f.write_str("score"),
            Self::Mass => f.write_str("mass"),
            Self::Tic => f.write_str("tic"),
            Self::Column(n) => write!(f, "column:{n}"),
        }
    }
}

impl FromStr for Identifier {
    type Err = FormatError;

    fn from_str(s: &str) -> FormatResult<Self> {
        match s {
            "start_position" => Ok(Self::StartPosition),
            "end_position" => Ok(Self::EndPosition),
            "score" => Ok(Self::Score),
            "mass" => Ok(Self::Mass),
            "tic" => Ok(Self::Tic),
            other => other
                .strip_prefix("column:")
                .and_then(|n| n.parse().ok())
                .map(Self::Column)
                .ok_or_else(|| FormatError::InvalidIdentifier(s.to_string())),
        }
    }
}

impl TryFrom<String> for Identifier {
    type Error = FormatError;

    fn try_from(value: String) -> FormatResult<Self> {
        value.parse()
    }
}

impl From<Identifier> for String {
    fn from(value: Identifier) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        for id in [
            Identifier::StartPosition,
            Identifier::EndPosition,
            Identifier::Score,
            Identifier::Mass,
            Identifier::Tic,
            Identifier::Column(3),
        ] {
            assert_eq!(id.to_string().parse::<Identifier>().unwrap(), id);
        }
        assert!("column:x".parse::<Identifier>().is_err());
        assert!("depth".parse::<Identifier>().is_err());
    }

    #[test]
    fn test_serde_as_string() {
        assert_eq!(
            serde_json::to_string(&Identifier::Column(2)).unwrap(),
            "\"column:2\""
        );
        assert_eq!(
            serde_json::from_str::<Identifier>("\"mass\"").unwrap(),
            Identifier::Mass
        );
        assert!(serde_json::from_str::<Identifier>("\"weight\"").is_err());
    }
}
