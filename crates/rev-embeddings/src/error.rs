//! Embedding error type.

use rev_core::errors::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding model initialization failed: {0}")]
    ModelInitialization(String),

    #[error("embedding generation failed: {0}")]
    Generation(String),

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("embedding call timed out after {0} seconds")]
    Timeout(u64),
}

impl EmbeddingError {
    /// Typed code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::ModelInitialization(_) => ErrorCode::ModelInitialization,
            Self::Generation(_) => ErrorCode::EmbeddingGeneration,
            Self::DimensionMismatch { .. } => ErrorCode::EmbeddingDimensionMismatch,
            Self::Timeout(_) => ErrorCode::EmbeddingTimeout,
        }
    }

    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.code().is_retryable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_map_to_taxonomy() {
        assert_eq!(
            EmbeddingError::Timeout(30).code(),
            ErrorCode::EmbeddingTimeout
        );
        assert!(EmbeddingError::Timeout(30).is_retryable());
        assert!(!EmbeddingError::Generation("x".to_string()).is_retryable());
    }
}
