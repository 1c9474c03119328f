//! # rev-context
//!
//! Context classification, retrieval, and reranking for Reverie.
//!
//! The classifier tags code and documents with `{area, tech, readme-style,
//! keywords}`; the retriever runs project-scoped hybrid searches; the scorer
//! fuses similarity with contextual signals into the final ordering.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod classifier;
pub mod error;
pub mod retriever;
pub mod scorer;
pub mod zero_shot;

pub use classifier::{DocumentContextCache, infer_from_code, infer_from_document};
pub use error::ContextError;
pub use retriever::{CodeQuery, DocQuery, Retriever, ScoredCode};
pub use scorer::{DocumentRollup, ScoredChunk, Scorer, rollup_documents};

/// Shared per-process caches: document contexts (with in-flight coalescing)
/// and H1 title embeddings.
#[derive(Debug, Default)]
pub struct ContextCaches {
    pub doc_contexts: DocumentContextCache,
    h1: Mutex<HashMap<String, Vec<f32>>>,
}

impl ContextCaches {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn h1_embeddings(&self) -> MutexGuard<'_, HashMap<String, Vec<f32>>> {
        self.h1.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Release everything cached so far. Used by shutdown cleanup.
    pub fn clear(&self) {
        self.doc_contexts.clear();
        self.h1_embeddings().clear();
    }
}
