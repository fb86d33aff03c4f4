//! Error types for store operations

use thiserror::Error;

/// Store operation result type
pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid range [{start},{end}] for {key} (content length {length})")]
    InvalidRange {
        key: String,
        start: u64,
        end: u64,
        length: u64,
    },

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Rate limited")]
    Throttled,

    #[error("Timeout")]
    Timeout,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Metadata error: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("Invocation of {function} rejected: {reason}")]
    InvokeRejected { function: String, reason: String },

    #[error("Other error: {0}")]
    Other(String),
}

impl StoreError {
    /// Check if error is retryable
    pub fn should_retry(&self) -> bool {
        match self {
            Self::Throttled | Self::Timeout => true,
            Self::Io(e) => !matches!(
                e.kind(),
                std::io::ErrorKind::NotFound
                    | std::io::ErrorKind::PermissionDenied
                    | std::io::ErrorKind::InvalidInput
                    | std::io::ErrorKind::InvalidData
            ),
            _ => false,
        }
    }

    pub(crate) fn invalid_range(key: &str, start: u64, end: u64, length: u64) -> Self {
        Self::InvalidRange {
            key: key.to_string(),
            start,
            end,
            length,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors_retry() {
        assert!(StoreError::Throttled.should_retry());
        assert!(StoreError::Timeout.should_retry());
        assert!(
            StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "reset"
            ))
            .should_retry()
        );
    }

    #[test]
    fn test_permanent_errors_do_not_retry() {
        assert!(!StoreError::NotFound("a".to_string()).should_retry());
        assert!(!StoreError::invalid_range("a", 4, 2, 10).should_retry());
        assert!(
            !StoreError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone")).should_retry()
        );
    }

    #[test]
    fn test_range_error_message() {
        let err = StoreError::invalid_range("0/a.txt", 10, 20, 15);
        assert_eq!(
            err.to_string(),
            "Invalid range [10,20] for 0/a.txt (content length 15)"
        );
    }
}
