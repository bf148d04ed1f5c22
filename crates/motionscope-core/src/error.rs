//! Error types for MotionScope.

use thiserror::Error;

/// Main error type for MotionScope operations.
#[derive(Error, Debug)]
pub enum MotionScopeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Insufficient history: need {required} frames, have {available}")]
    InsufficientHistory { required: usize, available: usize },

    #[error("Dimension mismatch: expected {expected:?}, got {actual:?}")]
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("Transform '{transform}' failed: {reason}")]
    TransformFailure { transform: String, reason: String },

    #[error("Compute backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Frame source exhausted")]
    SourceExhausted,

    #[error("Allocation failed: {0}")]
    Allocation(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for MotionScope operations.
pub type Result<T> = std::result::Result<T, MotionScopeError>;
