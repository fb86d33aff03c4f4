//! Inclusive byte ranges

use crate::error::{FormatError, FormatResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Inclusive byte range `[start, end]` with `start <= end`.
///
/// Serialized as a two-element array so trigger payloads stay compact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "[u64; 2]", into = "[u64; 2]")]
pub struct OffsetBounds {
    start: u64,
    end: u64,
}

impl OffsetBounds {
    pub fn new(start: u64, end: u64) -> FormatResult<Self> {
        if start > end {
            return Err(FormatError::ReversedRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    /// Number of bytes covered; never zero.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn contains(&self, offset: u64) -> bool {
        self.start <= offset && offset <= self.end
    }

    /// Split `[0, length)` into contiguous ranges of at most `size` bytes.
    pub fn split(length: u64, size: u64) -> Vec<Self> {
        let size = size.max(1);
        (0..length)
            .step_by(size as usize)
            .map(|start| Self {
                start,
                end: (start + size - 1).min(length - 1),
            })
            .collect()
    }
}

impl fmt::Display for OffsetBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{}]", self.start, self.end)
    }
}

impl TryFrom<[u64; 2]> for OffsetBounds {
    type Error = FormatError;

    fn try_from([start, end]: [u64; 2]) -> FormatResult<Self> {
        Self::new(start, end)
    }
}

impl From<OffsetBounds> for [u64; 2] {
    fn from(bounds: OffsetBounds) -> Self {
        [bounds.start, bounds.end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_reversed() {
        assert!(matches!(
            OffsetBounds::new(5, 4),
            Err(FormatError::ReversedRange { start: 5, end: 4 })
        ));
        let single = OffsetBounds::new(4, 4).unwrap();
        assert_eq!(single.len(), 1);
        assert_eq!(single.to_string(), "[4,4]");
    }

    #[test]
    fn test_split_covers_length() {
        let ranges = OffsetBounds::split(25, 10);
        assert_eq!(
            ranges,
            vec![
                OffsetBounds::new(0, 9).unwrap(),
                OffsetBounds::new(10, 19).unwrap(),
                OffsetBounds::new(20, 24).unwrap(),
            ]
        );
        assert!(OffsetBounds::split(0, 10).is_empty());
    }

    #[test]
    fn test_serde_array() {
        let bounds = OffsetBounds::new(3, 9).unwrap();
        assert_eq!(serde_json::to_string(&bounds).unwrap(), "[3,9]");
        assert_eq!(serde_json::from_str::<OffsetBounds>("[3,9]").unwrap(), bounds);
        assert!(serde_json::from_str::<OffsetBounds>("[9,3]").is_err());
    }
}
