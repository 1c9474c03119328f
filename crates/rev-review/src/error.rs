//! Review error type.

use rev_core::errors::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("ANTHROPIC_API_KEY is not set")]
    MissingApiKey,

    #[error("LLM request failed: {0}")]
    Llm(String),

    #[error("LLM request timed out after {0} seconds")]
    LlmTimeout(u64),

    #[error("git {operation} failed: {message}")]
    Git {
        operation: &'static str,
        message: String,
    },

    #[error("not a git repository: {0}")]
    NotARepository(String),

    #[error("cannot resolve branch '{0}'")]
    UnknownBranch(String),

    #[error("GitHub API request failed: {0}")]
    GitHub(String),

    #[error(transparent)]
    Store(#[from] rev_store::StoreError),

    #[error(transparent)]
    Embedding(#[from] rev_embeddings::EmbeddingError),

    #[error(transparent)]
    Context(#[from] rev_context::ContextError),
}

impl ReviewError {
    /// Typed code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::MissingApiKey | Self::UnknownBranch(_) => ErrorCode::Validation,
            Self::Llm(_) | Self::GitHub(_) => ErrorCode::Network,
            Self::LlmTimeout(_) => ErrorCode::SearchTimeout,
            Self::Git { .. } | Self::NotARepository(_) => ErrorCode::FileRead,
            Self::Store(e) => e.code(),
            Self::Embedding(e) => e.code(),
            Self::Context(e) => e.code(),
        }
    }

    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.code().is_retryable()
    }
}
