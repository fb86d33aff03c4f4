//! Error types for record iteration and codecs

use crate::identifier::Identifier;
use crate::tag::FormatTag;
use ripple_store::StoreError;
use thiserror::Error;

/// Format operation result type
pub type FormatResult<T> = Result<T, FormatError>;

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Reversed range [{start},{end}]")]
    ReversedRange { start: u64, end: u64 },

    #[error("Range [{start},{end}] out of bounds for {key} (content length {length})")]
    OutOfBounds {
        key: String,
        start: u64,
        end: u64,
        length: u64,
    },

    #[error("No delimiter within {window} bytes before offset {offset} in {key}")]
    NoDelimiter { key: String, offset: u64, window: u64 },

    #[error("Format {format} does not support identifier {identifier}")]
    UnsupportedIdentifier {
        format: FormatTag,
        identifier: Identifier,
    },

    #[error("Malformed {format} record: {reason}")]
    MalformedRecord { format: FormatTag, reason: String },

    #[error("Malformed {format} container {key}: {reason}")]
    MalformedContainer {
        format: FormatTag,
        key: String,
        reason: String,
    },

    #[error("Format {0} requires a header to serialize records")]
    MissingHeader(FormatTag),

    #[error("Unknown format: {0}")]
    UnknownFormat(String),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Invalid pivot file: {0}")]
    InvalidPivots(String),

    #[error("Invalid combine options: {0}")]
    InvalidOptions(String),
}

impl FormatError {
    pub(crate) fn malformed(format: FormatTag, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            format,
            reason: reason.into(),
        }
    }

    /// Transient store failures are worth retrying; everything else is a
    /// property of the input and will fail again.
    pub fn should_retry(&self) -> bool {
        match self {
            Self::Store(e) => e.should_retry(),
            _ => false,
        }
    }
}
