//! Retrieval error type.

use rev_core::errors::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContextError {
    /// A retrieval channel failed below the store boundary.
    #[error("{what} failed: {source}")]
    Retrieval {
        what: &'static str,
        #[source]
        source: rev_store::StoreError,
    },

    #[error(transparent)]
    Embedding(#[from] rev_embeddings::EmbeddingError),
}

impl ContextError {
    /// Typed code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Retrieval { source, .. } => source.code(),
            Self::Embedding(e) => e.code(),
        }
    }
}
