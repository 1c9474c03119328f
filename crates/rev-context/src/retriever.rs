//! Project-scoped retrieval of similar code and relevant documentation.
//!
//! Both operations embed the query (unless a precomputed vector is passed),
//! run a hybrid search, normalize similarities, and apply the project
//! scoping, self-exclusion, and test-file rules before thresholding. The
//! documentation path optionally hands candidates to the contextual
//! reranker.

use std::path::Path;

use rev_core::context::ContextTag;
use rev_core::record::{FileRecord, PROJECT_STRUCTURE_ID, RecordKind};
use rev_core::similarity::cosine_similarity;
use rev_embeddings::{Embedder, MAX_EMBED_CHARS_CODE, truncate_for_embedding};
use rev_store::{DocHit, StoreError, VectorStore, sql_quote};

use rev_core::language::is_test_path;

use crate::error::ContextError;
use crate::scorer::{ScoredChunk, Scorer};
use crate::{ContextCaches, scorer};

/// Options for [`Retriever::find_relevant_docs`].
#[derive(Debug, Clone)]
pub struct DocQuery<'a> {
    pub project_path: &'a str,
    pub similarity_threshold: f64,
    pub limit: usize,
    pub candidate_limit: usize,
    pub use_reranking: bool,
    pub query_context: Option<&'a ContextTag>,
    pub query_file_path: Option<&'a str>,
    pub precomputed_query_embedding: Option<&'a [f32]>,
}

impl<'a> DocQuery<'a> {
    #[must_use]
    pub const fn new(project_path: &'a str) -> Self {
        Self {
            project_path,
            similarity_threshold: 0.05,
            limit: 20,
            candidate_limit: 100,
            use_reranking: true,
            query_context: None,
            query_file_path: None,
            precomputed_query_embedding: None,
        }
    }
}

/// Options for [`Retriever::find_similar_code`].
#[derive(Debug, Clone)]
pub struct CodeQuery<'a> {
    pub project_path: &'a str,
    pub similarity_threshold: f64,
    pub limit: usize,
    pub candidate_limit: usize,
    pub is_test_file: bool,
    pub include_project_structure: bool,
    pub query_file_path: Option<&'a str>,
    pub precomputed_query_embedding: Option<&'a [f32]>,
}

impl<'a> CodeQuery<'a> {
    #[must_use]
    pub const fn new(project_path: &'a str) -> Self {
        Self {
            project_path,
            similarity_threshold: 0.3,
            limit: 10,
            candidate_limit: 40,
            is_test_file: false,
            include_project_structure: false,
            query_file_path: None,
            precomputed_query_embedding: None,
        }
    }
}

/// A similar-code result.
#[derive(Debug, Clone)]
pub struct ScoredCode {
    pub record: FileRecord,
    pub similarity: f64,
}

/// Retrieval front-end over the store, engine, and shared caches.
pub struct Retriever<'a, E: Embedder> {
    store: &'a VectorStore,
    embedder: &'a E,
    caches: &'a ContextCaches,
}

impl<'a, E: Embedder> Retriever<'a, E> {
    #[must_use]
    pub const fn new(store: &'a VectorStore, embedder: &'a E, caches: &'a ContextCaches) -> Self {
        Self {
            store,
            embedder,
            caches,
        }
    }

    async fn query_embedding(
        &self,
        query_text: &str,
        precomputed: Option<&[f32]>,
    ) -> Result<Vec<f32>, ContextError> {
        if let Some(vector) = precomputed {
            return Ok(vector.to_vec());
        }
        Ok(self
            .embedder
            .embed_one(truncate_for_embedding(query_text, MAX_EMBED_CHARS_CODE))
            .await?)
    }

    /// Find documentation chunks relevant to `query_text`.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::Retrieval`] when the search fails below the
    /// store boundary. A table that was never indexed yields an empty list.
    pub async fn find_relevant_docs(
        &self,
        query_text: &str,
        opts: &DocQuery<'_>,
    ) -> Result<Vec<ScoredChunk>, ContextError> {
        if query_text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let vector = self
            .query_embedding(query_text, opts.precomputed_query_embedding)
            .await?;
        let where_expr = project_scope_expr(opts.project_path);

        let hits = match self
            .store
            .search_docs(query_text, Some(&vector), Some(&where_expr), opts.candidate_limit)
            .await
        {
            Ok(hits) => hits,
            Err(StoreError::TableMissing(table)) => {
                tracing::warn!(%table, "documentation table missing, returning no guidelines");
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(ContextError::Retrieval {
                    what: "documentation search",
                    source,
                });
            }
        };

        let hits: Vec<DocHit> = hits
            .into_iter()
            .filter(|hit| doc_belongs_to_project(&hit.record.project_path, &hit.record.original_document_path, opts.project_path))
            .filter(|hit| hit.score.similarity() >= opts.similarity_threshold)
            .collect();

        let mut scored = if opts.use_reranking
            && let Some(query_context) = opts.query_context
        {
            Scorer::new(self.embedder, self.caches)
                .rerank(query_context, Some(&vector), opts.query_file_path, hits)
                .await
        } else {
            let mut plain: Vec<ScoredChunk> = hits
                .into_iter()
                .map(|hit| {
                    let similarity = hit.score.similarity();
                    ScoredChunk {
                        record: hit.record,
                        similarity,
                        final_score: similarity,
                        doc_context: ContextTag::default(),
                        area_match: scorer::AreaMatch::Skipped,
                        tech_overlap: false,
                        h1_relevance: 0.0,
                        penalized: false,
                    }
                })
                .collect();
            plain.sort_by(|a, b| {
                b.final_score
                    .partial_cmp(&a.final_score)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.record.id.cmp(&b.record.id))
            });
            plain
        };

        scored.truncate(opts.limit);
        Ok(scored)
    }

    /// Find code records similar to `query_text`.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::Retrieval`] when the search fails below the
    /// store boundary. A table that was never indexed yields an empty list.
    pub async fn find_similar_code(
        &self,
        query_text: &str,
        opts: &CodeQuery<'_>,
    ) -> Result<Vec<ScoredCode>, ContextError> {
        if query_text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let vector = self
            .query_embedding(query_text, opts.precomputed_query_embedding)
            .await?;
        let where_expr = format!(
            "record_type != '{}' AND {}",
            RecordKind::DirectoryStructure.as_str(),
            project_scope_expr(opts.project_path)
        );

        let hits = match self
            .store
            .search_code(query_text, Some(&vector), Some(&where_expr), opts.candidate_limit)
            .await
        {
            Ok(hits) => hits,
            Err(StoreError::TableMissing(table)) => {
                tracing::warn!(%table, "code table missing, returning no examples");
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(ContextError::Retrieval {
                    what: "code search",
                    source,
                });
            }
        };

        let query_basename = opts
            .query_file_path
            .and_then(|p| Path::new(p).file_name())
            .map(|n| n.to_string_lossy().to_string());

        let mut results: Vec<ScoredCode> = hits
            .into_iter()
            .filter(|hit| {
                // Self-exclusion by basename suffix.
                query_basename.as_deref().is_none_or(|basename| {
                    !hit.record.path.replace('\\', "/").ends_with(basename)
                })
            })
            .filter(|hit| is_test_path(&hit.record.path) == opts.is_test_file)
            .map(|hit| ScoredCode {
                similarity: hit.score.similarity(),
                record: hit.record,
            })
            .filter(|scored| scored.similarity >= opts.similarity_threshold)
            .collect();

        results.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.record.path.cmp(&b.record.path))
        });
        results.truncate(opts.limit);

        if opts.include_project_structure
            && let Some(structure) = self.project_structure(opts.project_path).await?
        {
            let similarity = cosine_similarity(&vector, &structure.embedding);
            if similarity >= opts.similarity_threshold {
                results.push(ScoredCode {
                    record: structure,
                    similarity,
                });
            }
        }

        Ok(results)
    }

    /// The project's structure record, falling back to an unscoped one.
    async fn project_structure(
        &self,
        project_path: &str,
    ) -> Result<Option<FileRecord>, ContextError> {
        for scope in [project_path, ""] {
            match self.store.file_record_by_id(scope, PROJECT_STRUCTURE_ID).await {
                Ok(Some(record)) => return Ok(Some(record)),
                Ok(None) => {}
                Err(StoreError::TableMissing(_)) => return Ok(None),
                Err(source) => {
                    return Err(ContextError::Retrieval {
                        what: "project structure lookup",
                        source,
                    });
                }
            }
        }
        Ok(None)
    }
}

/// Scope expression keeping this project's records plus unscoped ones.
fn project_scope_expr(project_path: &str) -> String {
    format!(
        "(project_path = '{}' OR project_path = '')",
        sql_quote(project_path)
    )
}

/// Whether an unscoped document record resolves into the project.
fn doc_belongs_to_project(record_project: &str, doc_path: &str, project_path: &str) -> bool {
    if !record_project.is_empty() {
        return record_project == project_path;
    }
    let path = Path::new(doc_path);
    if path.is_absolute() {
        path.starts_with(project_path)
    } else {
        Path::new(project_path).join(path).exists()
    }
}
