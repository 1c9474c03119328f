//! # rev-embeddings
//!
//! Local embedding generation using fastembed (ONNX runtime).
//!
//! Generates 384-dimensional vectors with `AllMiniLML6V2` (mean pooling, no
//! query/passage prefixes) without requiring any external API keys. fastembed
//! is synchronous — the ONNX runtime parallelizes internally — so the engine
//! exposes an async facade that hops through `spawn_blocking`.
//!
//! First use downloads the model (~80MB) to `~/.reverie/cache/fastembed/`.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use fastembed::{EmbeddingModel, TextEmbedding, TextInitOptions};
use rev_core::VECTOR_DIM;

pub mod error;

pub use error::EmbeddingError;

/// Truncation bound for code content.
pub const MAX_EMBED_CHARS_CODE: usize = 10_000;

/// Truncation bound for PR comment content.
pub const MAX_EMBED_CHARS_PR: usize = 8_000;

/// Seam between retrieval code and the embedding model.
///
/// The production implementation is [`EmbeddingEngine`]; tests substitute a
/// deterministic stand-in so no model download happens under `cargo test`.
pub trait Embedder: Send + Sync {
    /// Embed a single text into a `VECTOR_DIM`-length vector.
    fn embed_one(
        &self,
        text: &str,
    ) -> impl Future<Output = Result<Vec<f32>, EmbeddingError>> + Send;

    /// Embed a batch. A failed item yields `None` in its slot rather than
    /// failing the whole batch.
    fn embed_batch(
        &self,
        texts: Vec<String>,
    ) -> impl Future<Output = Result<Vec<Option<Vec<f32>>>, EmbeddingError>> + Send;
}

/// Truncate `text` to at most `max_chars` characters on a char boundary.
#[must_use]
pub fn truncate_for_embedding(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

/// Process-wide fastembed engine.
///
/// `TextEmbedding::embed` takes `&mut self`, so the model sits behind a
/// mutex; callers serialize on embed-call boundaries only.
#[derive(Clone)]
pub struct EmbeddingEngine {
    model: Arc<Mutex<TextEmbedding>>,
}

impl std::fmt::Debug for EmbeddingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingEngine").finish_non_exhaustive()
    }
}

/// Stable cache directory so models persist across builds and test runs.
fn cache_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".reverie")
        .join("cache")
        .join("fastembed")
}

impl EmbeddingEngine {
    /// Initialize the model, downloading it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`EmbeddingError::ModelInitialization`] if the ONNX model
    /// cannot be loaded or downloaded.
    pub async fn init(show_download_progress: bool) -> Result<Self, EmbeddingError> {
        let model = tokio::task::spawn_blocking(move || {
            TextEmbedding::try_new(
                TextInitOptions::new(EmbeddingModel::AllMiniLML6V2)
                    .with_cache_dir(cache_dir())
                    .with_show_download_progress(show_download_progress),
            )
        })
        .await
        .map_err(|e| EmbeddingError::ModelInitialization(e.to_string()))?
        .map_err(|e| EmbeddingError::ModelInitialization(e.to_string()))?;

        Ok(Self {
            model: Arc::new(Mutex::new(model)),
        })
    }

    /// Run one synchronous embed call on the blocking pool.
    async fn embed_blocking(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let model = Arc::clone(&self.model);
        tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .map_err(|_| EmbeddingError::Generation("model mutex poisoned".to_string()))?;
            model
                .embed(texts, None)
                .map_err(|e| EmbeddingError::Generation(e.to_string()))
        })
        .await
        .map_err(|e| EmbeddingError::Generation(e.to_string()))?
    }

    fn check_dimension(vector: &[f32]) -> Result<(), EmbeddingError> {
        if vector.len() == VECTOR_DIM {
            Ok(())
        } else {
            Err(EmbeddingError::DimensionMismatch {
                expected: VECTOR_DIM,
                actual: vector.len(),
            })
        }
    }
}

impl Embedder for EmbeddingEngine {
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self.embed_blocking(vec![text.to_string()]).await?;
        let vector = vectors
            .pop()
            .ok_or_else(|| EmbeddingError::Generation("model returned no vector".to_string()))?;
        Self::check_dimension(&vector)?;
        Ok(vector)
    }

    async fn embed_batch(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Option<Vec<f32>>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        // Fast path: embed the whole batch in one model call.
        match self.embed_blocking(texts.clone()).await {
            Ok(vectors) if vectors.len() == texts.len() => {
                return vectors
                    .into_iter()
                    .map(|v| {
                        Self::check_dimension(&v)?;
                        Ok(Some(v))
                    })
                    .collect();
            }
            Ok(vectors) => {
                tracing::warn!(
                    expected = texts.len(),
                    actual = vectors.len(),
                    "batch embed returned wrong count, retrying per item"
                );
            }
            Err(error) => {
                tracing::warn!(%error, "batch embed failed, retrying per item");
            }
        }

        // Slow path: one item failing must not sink its batch-mates, so
        // retry item by item and map failures to None.
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            match self.embed_blocking(vec![text]).await {
                Ok(mut vectors) => match vectors.pop() {
                    Some(v) if v.len() == VECTOR_DIM => out.push(Some(v)),
                    _ => out.push(None),
                },
                Err(error) => {
                    tracing::warn!(%error, "embed item failed, propagating null");
                    out.push(None);
                }
            }
        }
        Ok(out)
    }
}
