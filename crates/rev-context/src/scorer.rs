//! Contextual reranking of documentation chunks.
//!
//! Each candidate chunk starts from its retrieval similarity and is adjusted
//! by area match, technology overlap, H1-to-query relevance, and path
//! proximity; generic onboarding documents are penalized multiplicatively.
//! A document-level rollup condenses chunk scores into at most a handful of
//! documents for the prompt.

use std::collections::HashMap;
use std::path::Path;

use rev_core::context::{Area, ContextTag};
use rev_core::record::DocChunkRecord;
use rev_core::similarity::{cosine_similarity, path_similarity};
use rev_embeddings::Embedder;
use rev_store::DocHit;

use crate::ContextCaches;
use crate::classifier::{infer_from_document, is_generic_doc_name};

/// Bonus for an exact area match.
const AREA_MATCH_BONUS: f64 = 0.8;
/// Penalty for an area mismatch.
const AREA_MISMATCH_PENALTY: f64 = -0.2;
/// Bonus on the first technology overlap.
const TECH_OVERLAP_BONUS: f64 = 0.2;
/// Weight of the H1-to-query relevance term.
const H1_WEIGHT: f64 = 0.2;
/// Weight of the path-proximity term.
const PATH_WEIGHT: f64 = 0.15;
/// Multiplicative generic-document penalty.
const GENERIC_DOC_PENALTY: f64 = 0.7;
/// Chunks below this similarity do not count toward a document's rollup.
const RELEVANT_CHUNK_THRESHOLD: f64 = 0.1;
/// Documents scoring below this are dropped from the rollup.
const MIN_DOC_SCORE: f64 = 0.3;

/// How the chunk's area relates to the query's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AreaMatch {
    Exact,
    Mismatch,
    /// One side was too generic to judge.
    Skipped,
}

/// A chunk with its contextual final score.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub record: DocChunkRecord,
    pub similarity: f64,
    pub final_score: f64,
    pub doc_context: ContextTag,
    pub area_match: AreaMatch,
    pub tech_overlap: bool,
    /// H1-to-query relevance, normalized to [0, 1].
    pub h1_relevance: f64,
    /// Whether the generic-document penalty applied.
    pub penalized: bool,
}

/// One document surviving the rollup, represented by its best chunk.
#[derive(Debug, Clone)]
pub struct DocumentRollup {
    pub document_path: String,
    pub doc_score: f64,
    pub best_chunk: ScoredChunk,
}

/// Reranker over one embedding engine and the shared caches.
pub struct Scorer<'a, E: Embedder> {
    embedder: &'a E,
    caches: &'a ContextCaches,
}

impl<'a, E: Embedder> Scorer<'a, E> {
    #[must_use]
    pub const fn new(embedder: &'a E, caches: &'a ContextCaches) -> Self {
        Self { embedder, caches }
    }

    /// Rerank retrieved chunks against the query context.
    ///
    /// `query_embedding` powers the H1-relevance term and may be omitted;
    /// `query_file_path` powers the path-proximity term.
    pub async fn rerank(
        &self,
        query_context: &ContextTag,
        query_embedding: Option<&[f32]>,
        query_file_path: Option<&str>,
        hits: Vec<DocHit>,
    ) -> Vec<ScoredChunk> {
        // Resolve document contexts first, one classification per document.
        let mut doc_contexts: HashMap<String, ContextTag> = HashMap::new();
        let mut doc_chunks: HashMap<String, Vec<(String, String)>> = HashMap::new();
        for hit in &hits {
            doc_chunks
                .entry(hit.record.original_document_path.clone())
                .or_default()
                .push((hit.record.heading_text.clone(), hit.record.content.clone()));
        }
        for hit in &hits {
            let doc_path = &hit.record.original_document_path;
            if doc_contexts.contains_key(doc_path) {
                continue;
            }
            let chunks = doc_chunks.get(doc_path).cloned().unwrap_or_default();
            let title = hit.record.document_title.clone();
            let cache_key = Path::new(doc_path).to_path_buf();
            let infer_path = cache_key.clone();
            let embedder = self.embedder;
            let context = self
                .caches
                .doc_contexts
                .get_or_infer(&cache_key, move || async move {
                    infer_from_document(embedder, &infer_path, &title, &chunks).await
                })
                .await;
            doc_contexts.insert(doc_path.clone(), context);
        }

        let h1_embeddings = self.resolve_h1_embeddings(&hits).await;

        let mut scored = Vec::with_capacity(hits.len());
        for hit in hits {
            let similarity = hit.score.similarity();
            let record = hit.record;
            let doc_context = doc_contexts
                .get(&record.original_document_path)
                .cloned()
                .unwrap_or_default();

            let area_match = judge_area(query_context, &doc_context);
            let area_bonus = match area_match {
                AreaMatch::Exact => AREA_MATCH_BONUS,
                AreaMatch::Mismatch => AREA_MISMATCH_PENALTY,
                AreaMatch::Skipped => 0.0,
            };

            let tech_overlap = query_context.shares_tech_with(&doc_context);
            let tech_bonus = if tech_overlap { TECH_OVERLAP_BONUS } else { 0.0 };

            let h1_relevance = query_embedding
                .and_then(|query| {
                    h1_embeddings
                        .get(&record.document_title)
                        .map(|h1| f64::midpoint(cosine_similarity(query, h1), 1.0))
                })
                .unwrap_or(0.0);

            let path_score = query_file_path
                .map(|query_path| path_similarity(&record.original_document_path, query_path))
                .unwrap_or(0.0);

            let mut final_score = similarity
                + area_bonus
                + tech_bonus
                + H1_WEIGHT * h1_relevance
                + PATH_WEIGHT * path_score;

            let generic = doc_context.is_readme_style
                || is_generic_doc_name(Path::new(&record.original_document_path));
            let penalized = generic
                && query_context.area != Area::DevOps
                && area_match != AreaMatch::Exact;
            if penalized {
                final_score *= GENERIC_DOC_PENALTY;
            }

            scored.push(ScoredChunk {
                record,
                similarity,
                final_score,
                doc_context,
                area_match,
                tech_overlap,
                h1_relevance,
                penalized,
            });
        }

        scored.sort_by(|a, b| {
            b.final_score
                .partial_cmp(&a.final_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.record.original_document_path.cmp(&b.record.original_document_path))
                .then_with(|| a.record.start_line_in_doc.cmp(&b.record.start_line_in_doc))
        });
        scored
    }

    /// H1 embeddings for every distinct title, resolving cache misses with a
    /// single batch call.
    async fn resolve_h1_embeddings(&self, hits: &[DocHit]) -> HashMap<String, Vec<f32>> {
        let mut titles: Vec<String> = hits
            .iter()
            .map(|h| h.record.document_title.clone())
            .filter(|t| !t.trim().is_empty())
            .collect();
        titles.sort();
        titles.dedup();

        let mut resolved = HashMap::new();
        let mut misses = Vec::new();
        {
            let cache = self.caches.h1_embeddings();
            for title in titles {
                if let Some(vector) = cache.get(&title) {
                    resolved.insert(title, vector.clone());
                } else {
                    misses.push(title);
                }
            }
        }

        if !misses.is_empty() {
            match self.embedder.embed_batch(misses.clone()).await {
                Ok(vectors) => {
                    let mut cache = self.caches.h1_embeddings();
                    for (title, vector) in misses.into_iter().zip(vectors) {
                        if let Some(vector) = vector {
                            cache.insert(title.clone(), vector.clone());
                            resolved.insert(title, vector);
                        }
                    }
                }
                Err(error) => {
                    tracing::warn!(%error, "H1 embedding batch failed, scoring without titles");
                }
            }
        }
        resolved
    }
}

/// Area comparison with the generic-area skip rules.
fn judge_area(query: &ContextTag, doc: &ContextTag) -> AreaMatch {
    if query.area.is_generic() || doc.area.is_generic() || query.area == Area::GeneralJsTs {
        return AreaMatch::Skipped;
    }
    if query.area == doc.area {
        AreaMatch::Exact
    } else {
        AreaMatch::Mismatch
    }
}

/// Collapse scored chunks into at most `max_docs` documents.
///
/// Chunks below the relevance floor are ignored; each surviving document is
/// represented by its best chunk and a blended document score.
#[must_use]
pub fn rollup_documents(chunks: &[ScoredChunk], max_docs: usize) -> Vec<DocumentRollup> {
    let mut by_doc: HashMap<&str, Vec<&ScoredChunk>> = HashMap::new();
    for chunk in chunks {
        if chunk.similarity >= RELEVANT_CHUNK_THRESHOLD {
            by_doc
                .entry(chunk.record.original_document_path.as_str())
                .or_default()
                .push(chunk);
        }
    }

    let mut rollups = Vec::new();
    for (document_path, doc_chunks) in by_doc {
        let sims: Vec<f64> = doc_chunks.iter().map(|c| c.similarity).collect();
        let max = sims.iter().copied().fold(0.0f64, f64::max);
        #[allow(clippy::cast_precision_loss)]
        let avg = sims.iter().sum::<f64>() / sims.len() as f64;
        #[allow(clippy::cast_precision_loss)]
        let count_term = 0.04 * (sims.len().min(5)) as f64;
        let semantic_quality = 0.5 * max + 0.3 * avg + count_term;

        let best = doc_chunks
            .iter()
            .max_by(|a, b| {
                a.final_score
                    .partial_cmp(&b.final_score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .expect("group is non-empty");

        let area_score = match best.area_match {
            AreaMatch::Exact => 1.0,
            AreaMatch::Skipped => 0.5,
            AreaMatch::Mismatch => 0.0,
        };

        let mut doc_score =
            0.2 * semantic_quality + 0.6 * area_score + 0.2 * best.h1_relevance;
        if best.penalized {
            doc_score *= GENERIC_DOC_PENALTY;
        }

        let strong_mismatch = best.area_match == AreaMatch::Mismatch && !best.tech_overlap;
        if doc_score < MIN_DOC_SCORE || strong_mismatch {
            continue;
        }

        rollups.push(DocumentRollup {
            document_path: document_path.to_string(),
            doc_score,
            best_chunk: (*best).clone(),
        });
    }

    rollups.sort_by(|a, b| {
        b.doc_score
            .partial_cmp(&a.doc_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.document_path.cmp(&b.document_path))
    });
    rollups.truncate(max_docs);
    rollups
}

#[cfg(test)]
mod tests {
    use super::*;
    use rev_core::VECTOR_DIM;
    use rev_embeddings::EmbeddingError;
    use rev_store::HitScore;

    struct FlatEmbedder;

    impl Embedder for FlatEmbedder {
        async fn embed_one(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Ok(vec![0.1; VECTOR_DIM])
        }

        async fn embed_batch(
            &self,
            texts: Vec<String>,
        ) -> Result<Vec<Option<Vec<f32>>>, EmbeddingError> {
            Ok(texts.iter().map(|_| Some(vec![0.1; VECTOR_DIM])).collect())
        }
    }

    fn doc_hit(doc_path: &str, title: &str, similarity: f64) -> DocHit {
        DocHit {
            record: DocChunkRecord {
                id: format!("{doc_path}#{title}"),
                project_path: "/repo".to_string(),
                original_document_path: doc_path.to_string(),
                document_title: title.to_string(),
                heading_text: "Section".to_string(),
                start_line_in_doc: 1,
                content: "body".to_string(),
                content_hash: "00000000".to_string(),
                language: "markdown".to_string(),
                embedding: vec![0.1; VECTOR_DIM],
            },
            score: HitScore {
                distance: Some(1.0 - similarity),
                score: None,
            },
        }
    }

    fn frontend_query() -> ContextTag {
        ContextTag {
            area: Area::Frontend,
            dominant_tech: vec!["React".to_string()],
            is_readme_style: false,
            keywords: vec![],
        }
    }

    async fn seeded_caches() -> ContextCaches {
        let caches = ContextCaches::new();
        caches
            .doc_contexts
            .get_or_infer(Path::new("/repo/README.md"), || async {
                ContextTag {
                    area: Area::General,
                    dominant_tech: vec![],
                    is_readme_style: true,
                    keywords: vec![],
                }
            })
            .await;
        caches
            .doc_contexts
            .get_or_infer(Path::new("/repo/docs/react-guide.md"), || async {
                ContextTag {
                    area: Area::Frontend,
                    dominant_tech: vec!["React".to_string()],
                    is_readme_style: false,
                    keywords: vec![],
                }
            })
            .await;
        caches
    }

    #[tokio::test]
    async fn generic_doc_penalty_favors_specific_guide() {
        let caches = seeded_caches().await;
        let embedder = FlatEmbedder;
        let scorer = Scorer::new(&embedder, &caches);

        let hits = vec![
            doc_hit("/repo/README.md", "My Project", 0.5),
            doc_hit("/repo/docs/react-guide.md", "React Components", 0.5),
        ];
        let scored = scorer
            .rerank(&frontend_query(), None, None, hits)
            .await;

        assert_eq!(
            scored[0].record.original_document_path,
            "/repo/docs/react-guide.md"
        );
        let guide = &scored[0];
        let readme = &scored[1];
        assert!(!guide.penalized);
        assert!(readme.penalized);
        assert!(
            guide.final_score >= 1.3 * readme.final_score,
            "guide {} vs readme {}",
            guide.final_score,
            readme.final_score
        );
    }

    #[tokio::test]
    async fn devops_queries_skip_generic_penalty() {
        let caches = seeded_caches().await;
        let embedder = FlatEmbedder;
        let scorer = Scorer::new(&embedder, &caches);

        let query = ContextTag {
            area: Area::DevOps,
            dominant_tech: vec![],
            is_readme_style: false,
            keywords: vec![],
        };
        let hits = vec![doc_hit("/repo/README.md", "My Project", 0.5)];
        let scored = scorer.rerank(&query, None, None, hits).await;
        assert!(!scored[0].penalized);
    }

    #[tokio::test]
    async fn general_js_query_skips_area_judgement() {
        let caches = seeded_caches().await;
        let embedder = FlatEmbedder;
        let scorer = Scorer::new(&embedder, &caches);

        let query = ContextTag::for_area(Area::GeneralJsTs);
        let hits = vec![doc_hit("/repo/docs/react-guide.md", "React Components", 0.5)];
        let scored = scorer.rerank(&query, None, None, hits).await;
        assert_eq!(scored[0].area_match, AreaMatch::Skipped);
    }

    #[tokio::test]
    async fn path_proximity_breaks_ties() {
        let caches = ContextCaches::new();
        for path in ["/repo/docs/api/auth.md", "/repo/docs/other/misc.md"] {
            caches
                .doc_contexts
                .get_or_infer(Path::new(path), || async {
                    ContextTag::for_area(Area::Backend)
                })
                .await;
        }
        let embedder = FlatEmbedder;
        let scorer = Scorer::new(&embedder, &caches);

        let query = ContextTag::for_area(Area::Backend);
        let hits = vec![
            doc_hit("/repo/docs/other/misc.md", "Misc", 0.5),
            doc_hit("/repo/docs/api/auth.md", "Auth", 0.5),
        ];
        let scored = scorer
            .rerank(&query, None, Some("/repo/docs/api/handlers.md"), hits)
            .await;
        assert_eq!(scored[0].record.original_document_path, "/repo/docs/api/auth.md");
    }

    #[tokio::test]
    async fn rerank_is_deterministic() {
        let caches = seeded_caches().await;
        let embedder = FlatEmbedder;
        let scorer = Scorer::new(&embedder, &caches);

        let hits = || {
            vec![
                doc_hit("/repo/README.md", "My Project", 0.4),
                doc_hit("/repo/docs/react-guide.md", "React Components", 0.4),
            ]
        };
        let first = scorer.rerank(&frontend_query(), None, None, hits()).await;
        let second = scorer.rerank(&frontend_query(), None, None, hits()).await;
        let order = |v: &[ScoredChunk]| {
            v.iter()
                .map(|c| c.record.id.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(order(&first), order(&second));
    }

    fn scored(
        doc_path: &str,
        similarity: f64,
        area_match: AreaMatch,
        penalized: bool,
        tech_overlap: bool,
    ) -> ScoredChunk {
        let hit = doc_hit(doc_path, "T", similarity);
        ScoredChunk {
            record: hit.record,
            similarity,
            final_score: similarity,
            doc_context: ContextTag::for_area(Area::Backend),
            area_match,
            tech_overlap,
            h1_relevance: 0.5,
            penalized,
        }
    }

    #[test]
    fn rollup_drops_low_similarity_chunks() {
        let chunks = vec![
            scored("/repo/a.md", 0.05, AreaMatch::Exact, false, false),
        ];
        assert!(rollup_documents(&chunks, 4).is_empty());
    }

    #[test]
    fn rollup_drops_strong_mismatch_without_overlap() {
        let chunks = vec![scored("/repo/a.md", 0.9, AreaMatch::Mismatch, false, false)];
        assert!(rollup_documents(&chunks, 4).is_empty());

        let with_overlap = vec![scored("/repo/a.md", 0.9, AreaMatch::Mismatch, false, true)];
        // Still dropped: mismatch area score of 0 keeps the doc under the
        // score floor even with overlapping tech.
        assert!(rollup_documents(&with_overlap, 4).is_empty());
    }

    #[test]
    fn rollup_keeps_best_chunk_per_document() {
        let chunks = vec![
            scored("/repo/a.md", 0.6, AreaMatch::Exact, false, false),
            scored("/repo/a.md", 0.9, AreaMatch::Exact, false, false),
            scored("/repo/b.md", 0.8, AreaMatch::Exact, false, false),
        ];
        let rollups = rollup_documents(&chunks, 4);
        assert_eq!(rollups.len(), 2);
        let a = rollups
            .iter()
            .find(|r| r.document_path == "/repo/a.md")
            .unwrap();
        assert!((a.best_chunk.similarity - 0.9).abs() < 1e-9);
    }

    #[test]
    fn rollup_caps_document_count() {
        let chunks: Vec<ScoredChunk> = (0..6)
            .map(|i| scored(&format!("/repo/doc{i}.md"), 0.8, AreaMatch::Exact, false, false))
            .collect();
        assert_eq!(rollup_documents(&chunks, 4).len(), 4);
    }
}
