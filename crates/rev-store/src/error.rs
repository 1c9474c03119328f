//! Store error type.

use rev_core::errors::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("vector database connection failed: {0}")]
    Connection(String),

    #[error("table '{0}' has not been initialized")]
    TableMissing(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("insertion failed: {0}")]
    Insertion(String),

    #[error("arrow conversion failed: {0}")]
    Arrow(String),

    /// Non-fatal: rebuilding the ANN index over a legacy-format dataset.
    #[error("optimize skipped for legacy dataset format: {0}")]
    OptimizeLegacyFormat(String),
}

impl StoreError {
    /// Typed code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Connection(_) => ErrorCode::DatabaseConnection,
            Self::TableMissing(_) => ErrorCode::TableMissing,
            Self::Query(_) | Self::OptimizeLegacyFormat(_) => ErrorCode::DatabaseQuery,
            Self::Insertion(_) => ErrorCode::DatabaseInsertion,
            Self::Arrow(_) => ErrorCode::Validation,
        }
    }

    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.code().is_retryable()
    }
}
