//! Indexing error type.

use rev_core::errors::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("failed to read {path}: {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("directory scan exceeded {0} seconds")]
    ScanTimeout(u64),

    #[error("git invocation failed: {0}")]
    Git(String),

    #[error(transparent)]
    Store(#[from] rev_store::StoreError),

    #[error(transparent)]
    Embedding(#[from] rev_embeddings::EmbeddingError),
}

impl IndexError {
    /// Typed code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidPattern(_) => ErrorCode::Validation,
            Self::FileRead { .. } => ErrorCode::FileRead,
            Self::ScanTimeout(_) => ErrorCode::SearchTimeout,
            Self::Git(_) => ErrorCode::FileRead,
            Self::Store(e) => e.code(),
            Self::Embedding(e) => e.code(),
        }
    }
}
