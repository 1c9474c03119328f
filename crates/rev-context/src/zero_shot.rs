//! Embedding-based zero-shot classification.
//!
//! Labels are embedded as short hypothesis sentences and scored against the
//! input text by cosine similarity, normalized from [-1, 1] to [0, 1].
//! No extra model is required; the same MiniLM engine that powers retrieval
//! does the scoring.

use rev_embeddings::Embedder;

use rev_core::similarity::cosine_similarity;

use crate::error::ContextError;

/// One label with its normalized confidence.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelScore {
    pub label: String,
    pub score: f64,
}

/// Technology taxonomy for document classification.
pub const TECHNOLOGIES: &[&str] = &[
    "React",
    "Angular",
    "Vue",
    "Node.js",
    "Express",
    "Django",
    "Flask",
    "FastAPI",
    "GraphQL",
    "PostgreSQL",
    "Docker",
    "Kubernetes",
    "Terraform",
];

/// Domain taxonomy; order is meaningless, mapping happens on the label text.
pub const DOMAINS: &[&str] = &[
    "frontend user interface",
    "backend server API",
    "devops infrastructure deployment",
    "developer tooling and internal scripts",
    "getting started setup guide",
];

/// Normalize a cosine similarity from [-1, 1] to [0, 1].
const fn normalize_score(score: f64) -> f64 {
    f64::midpoint(score, 1.0)
}

/// Score `text` against every label, keeping those at or above `threshold`.
///
/// Results are sorted by descending score. An empty text yields no labels.
///
/// # Errors
///
/// Returns [`ContextError::Embedding`] when the engine fails; callers fall
/// back to keyword extraction.
pub async fn classify<E: Embedder>(
    embedder: &E,
    text: &str,
    labels: &[&str],
    threshold: f64,
) -> Result<Vec<LabelScore>, ContextError> {
    if text.trim().is_empty() || labels.is_empty() {
        return Ok(Vec::new());
    }

    let mut texts = Vec::with_capacity(labels.len() + 1);
    texts.push(text.to_string());
    for label in labels {
        texts.push(format!("This text is about {label}."));
    }

    let embeddings = embedder.embed_batch(texts).await?;
    let Some(Some(text_vec)) = embeddings.first() else {
        return Ok(Vec::new());
    };

    let mut scored: Vec<LabelScore> = labels
        .iter()
        .zip(embeddings.iter().skip(1))
        .filter_map(|(label, vec)| {
            let vec = vec.as_ref()?;
            let score = normalize_score(cosine_similarity(text_vec, vec));
            (score >= threshold).then(|| LabelScore {
                label: (*label).to_string(),
                score,
            })
        })
        .collect();

    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    Ok(scored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rev_core::VECTOR_DIM;
    use rev_embeddings::EmbeddingError;

    /// Embedder whose vectors make "alpha"-ish texts cluster.
    struct DirectionalEmbedder;

    impl Embedder for DirectionalEmbedder {
        async fn embed_one(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            let mut v = vec![0.0f32; VECTOR_DIM];
            if text.contains("alpha") {
                v[0] = 1.0;
            } else {
                v[1] = 1.0;
            }
            Ok(v)
        }

        async fn embed_batch(
            &self,
            texts: Vec<String>,
        ) -> Result<Vec<Option<Vec<f32>>>, EmbeddingError> {
            let mut out = Vec::new();
            for text in texts {
                out.push(Some(self.embed_one(&text).await?));
            }
            Ok(out)
        }
    }

    #[tokio::test]
    async fn matching_label_outranks_others() {
        let scores = classify(&DirectionalEmbedder, "all about alpha", &["alpha", "beta"], 0.5)
            .await
            .unwrap();
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].label, "alpha");
        assert!(scores[0].score > 0.9);
    }

    #[tokio::test]
    async fn empty_text_yields_no_labels() {
        let scores = classify(&DirectionalEmbedder, "   ", &["alpha"], 0.5)
            .await
            .unwrap();
        assert!(scores.is_empty());
    }

    #[test]
    fn normalization_bounds() {
        assert!((normalize_score(1.0) - 1.0).abs() < 1e-9);
        assert!((normalize_score(-1.0)).abs() < 1e-9);
        assert!((normalize_score(0.0) - 0.5).abs() < 1e-9);
    }
}
