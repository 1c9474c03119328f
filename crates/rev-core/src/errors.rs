//! Cross-cutting error taxonomy.
//!
//! Domain crates define their own `thiserror` enums (`StoreError`,
//! `EmbeddingError`, ...) and map each variant onto an [`ErrorCode`] here.
//! Retryability is a property of the code, not of the individual error site,
//! so callers that retry only need to consult `code().is_retryable()`.

use thiserror::Error;

/// Typed error codes shared across the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ErrorCode {
    Validation,
    ModelInitialization,
    ModelNotInitialized,
    DatabaseConnection,
    DatabaseQuery,
    DatabaseInsertion,
    TableMissing,
    EmbeddingGeneration,
    EmbeddingDimensionMismatch,
    EmbeddingTimeout,
    FileNotFound,
    FileRead,
    FileTooLarge,
    CacheRead,
    CacheWrite,
    SearchTimeout,
    Network,
    ServiceUnavailable,
}

impl ErrorCode {
    /// Whether an operation failing with this code is worth retrying.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::Network
                | Self::ServiceUnavailable
                | Self::EmbeddingTimeout
                | Self::SearchTimeout
                | Self::CacheRead
                | Self::CacheWrite
                | Self::DatabaseConnection
        )
    }
}

/// A code-tagged error with optional context, used where a concrete crate
/// error is not available (e.g., normalized at task boundaries).
#[derive(Debug, Error)]
#[error("{message}")]
pub struct TaggedError {
    pub code: ErrorCode,
    pub message: String,
    /// Free-form context such as the file or table involved.
    pub context: Option<String>,
    #[source]
    pub source: Option<anyhow::Error>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl TaggedError {
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: None,
            source: None,
            timestamp: chrono::Utc::now(),
        }
    }

    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_codes() {
        assert!(ErrorCode::Network.is_retryable());
        assert!(ErrorCode::ServiceUnavailable.is_retryable());
        assert!(ErrorCode::EmbeddingTimeout.is_retryable());
        assert!(ErrorCode::SearchTimeout.is_retryable());
        assert!(ErrorCode::CacheRead.is_retryable());
        assert!(ErrorCode::CacheWrite.is_retryable());
        assert!(ErrorCode::DatabaseConnection.is_retryable());
    }

    #[test]
    fn non_retryable_codes() {
        assert!(!ErrorCode::Validation.is_retryable());
        assert!(!ErrorCode::TableMissing.is_retryable());
        assert!(!ErrorCode::FileNotFound.is_retryable());
        assert!(!ErrorCode::EmbeddingDimensionMismatch.is_retryable());
        assert!(!ErrorCode::DatabaseQuery.is_retryable());
    }

    #[test]
    fn tagged_error_carries_context() {
        let err = TaggedError::new(ErrorCode::FileRead, "read failed")
            .with_context("src/main.rs");
        assert_eq!(err.context.as_deref(), Some("src/main.rs"));
        assert!(!err.is_retryable());
    }
}
