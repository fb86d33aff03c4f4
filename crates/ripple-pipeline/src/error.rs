//! Error types for pipeline workers

use ripple_formats::FormatError;
use ripple_store::StoreError;
use std::time::Duration;
use thiserror::Error;

/// Pipeline operation result type
pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    #[error("Invalid payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("Invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("Invalid pipeline configuration: {0}")]
    InvalidConfig(String),

    #[error("Step {step} does not exist in a pipeline of {steps} steps")]
    UnknownStep { step: usize, steps: usize },

    #[error("Payload for step {step} is missing {field}")]
    MissingParam { step: usize, field: &'static str },

    #[error("Unknown application: {0}")]
    UnknownApplication(String),

    #[error("Application {name} failed: {reason}")]
    Application { name: String, reason: String },

    #[error("Input {0} is empty")]
    EmptyInput(String),

    #[error("Time budget exceeded after {elapsed:?} of {budget:?}")]
    DeadlineExceeded { elapsed: Duration, budget: Duration },
}

impl PipelineError {
    pub(crate) fn invalid_key(key: &str, reason: impl Into<String>) -> Self {
        Self::InvalidKey {
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether re-running the same invocation can succeed. Deadline overruns
    /// count as transient.
    pub fn should_retry(&self) -> bool {
        match self {
            Self::Store(e) => e.should_retry(),
            Self::Format(e) => e.should_retry(),
            Self::DeadlineExceeded { .. } => true,
            _ => false,
        }
    }
}
