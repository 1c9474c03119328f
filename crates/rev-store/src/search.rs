//! Hybrid search over the vector tables.
//!
//! The vector side comes from Lance ANN (`_distance`, 0 = identical). The
//! lexical side is computed in-process over the candidate rows as query-token
//! coverage, and the two are alpha-blended into `_score` (0–1, higher =
//! better), favoring the semantic signal. When only one side is available the
//! other stays `None`; [`HitScore::similarity`] applies the uniform
//! normalization policy (prefer `_score`, else `1 − distance`, else 0.5).

use std::collections::HashSet;

use lancedb::query::QueryBase;

use rev_core::record::{DocChunkRecord, FileRecord, PrCommentRecord};
use rev_core::similarity::normalize_similarity;

use crate::error::StoreError;
use crate::{TableKind, VectorStore, collect_query, schema};

/// Blend weight for the semantic side.
const ALPHA: f64 = 0.7;

/// Raw relevance signals attached to a hit at the store edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitScore {
    /// ANN distance from the query vector (0 = identical).
    pub distance: Option<f64>,
    /// Blended hybrid relevance in `[0, 1]`.
    pub score: Option<f64>,
}

impl HitScore {
    /// Normalized similarity in `[0, 1]`.
    #[must_use]
    pub fn similarity(&self) -> f64 {
        normalize_similarity(self.score, self.distance)
    }
}

/// A `file_embeddings` search hit.
#[derive(Debug, Clone)]
pub struct CodeHit {
    pub record: FileRecord,
    pub score: HitScore,
}

/// A `document_chunk_embeddings` search hit.
#[derive(Debug, Clone)]
pub struct DocHit {
    pub record: DocChunkRecord,
    pub score: HitScore,
}

/// A `pr_comments` search hit.
#[derive(Debug, Clone)]
pub struct PrHit {
    pub record: PrCommentRecord,
    pub score: HitScore,
}

/// Lowercased alphanumeric tokens of at least two characters.
fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= 2)
        .map(str::to_lowercase)
        .collect()
}

/// Fraction of query tokens present in the candidate text, in `[0, 1]`.
#[must_use]
pub fn lexical_relevance(query: &str, candidate: &str) -> f64 {
    let query_tokens = tokenize(query);
    if query_tokens.is_empty() {
        return 0.0;
    }
    let candidate_tokens = tokenize(candidate);
    let matched = query_tokens
        .iter()
        .filter(|t| candidate_tokens.contains(*t))
        .count();
    #[allow(clippy::cast_precision_loss)]
    let ratio = matched as f64 / query_tokens.len() as f64;
    ratio
}

/// Alpha-blend the two sides; a side that is absent stays out of the blend.
fn blended_score(lexical: Option<f64>, distance: Option<f64>) -> Option<f64> {
    match (lexical, distance) {
        (Some(lex), Some(dist)) => {
            Some(ALPHA * (1.0 - dist.min(1.0)) + (1.0 - ALPHA) * lex)
        }
        (Some(lex), None) => Some(lex),
        (None, _) => None,
    }
}

fn hit_score(query_text: &str, candidate_text: &str, distance: Option<f64>) -> HitScore {
    let lexical = if query_text.trim().is_empty() {
        None
    } else {
        Some(lexical_relevance(query_text, candidate_text))
    };
    HitScore {
        distance,
        score: blended_score(lexical, distance),
    }
}

impl VectorStore {
    async fn hybrid_batches(
        &self,
        kind: TableKind,
        query_vec: Option<&[f32]>,
        where_expr: Option<&str>,
        limit: usize,
    ) -> Result<Vec<arrow_array::RecordBatch>, StoreError> {
        let table = self.open_existing(kind).await?;

        if let Some(vector) = query_vec {
            let mut query = table
                .query()
                .nearest_to(vector)
                .map_err(|e| StoreError::Query(e.to_string()))?
                .limit(limit);
            if let Some(expr) = where_expr {
                query = query.only_if(expr.to_string());
            }
            collect_query(query).await
        } else {
            let mut query = table.query().limit(limit);
            if let Some(expr) = where_expr {
                query = query.only_if(expr.to_string());
            }
            collect_query(query).await
        }
    }

    /// Hybrid search over `file_embeddings`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::TableMissing`] when the table was never
    /// initialized, [`StoreError::Query`] on query failure.
    pub async fn search_code(
        &self,
        query_text: &str,
        query_vec: Option<&[f32]>,
        where_expr: Option<&str>,
        limit: usize,
    ) -> Result<Vec<CodeHit>, StoreError> {
        let batches = self
            .hybrid_batches(TableKind::Files, query_vec, where_expr, limit)
            .await?;

        let mut hits = Vec::new();
        for batch in &batches {
            for row in 0..batch.num_rows() {
                let record = schema::file_record_from_batch(batch, row)?;
                let distance = schema::get_distance(batch, row);
                let score = hit_score(query_text, &record.content, distance);
                hits.push(CodeHit { record, score });
            }
        }
        sort_by_similarity(&mut hits, |h| h.score.similarity());
        Ok(hits)
    }

    /// Hybrid search over `document_chunk_embeddings`.
    ///
    /// The lexical side also sees the document title and chunk heading so a
    /// heading-only match still scores.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::TableMissing`] when the table was never
    /// initialized, [`StoreError::Query`] on query failure.
    pub async fn search_docs(
        &self,
        query_text: &str,
        query_vec: Option<&[f32]>,
        where_expr: Option<&str>,
        limit: usize,
    ) -> Result<Vec<DocHit>, StoreError> {
        let batches = self
            .hybrid_batches(TableKind::Docs, query_vec, where_expr, limit)
            .await?;

        let mut hits = Vec::new();
        for batch in &batches {
            for row in 0..batch.num_rows() {
                let record = schema::doc_record_from_batch(batch, row)?;
                let lexical_target = format!(
                    "{} {} {}",
                    record.document_title, record.heading_text, record.content
                );
                let distance = schema::get_distance(batch, row);
                let score = hit_score(query_text, &lexical_target, distance);
                hits.push(DocHit { record, score });
            }
        }
        sort_by_similarity(&mut hits, |h| h.score.similarity());
        Ok(hits)
    }

    /// Hybrid search over `pr_comments`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::TableMissing`] when the table was never
    /// initialized, [`StoreError::Query`] on query failure.
    pub async fn search_prs(
        &self,
        query_text: &str,
        query_vec: Option<&[f32]>,
        where_expr: Option<&str>,
        limit: usize,
    ) -> Result<Vec<PrHit>, StoreError> {
        let batches = self
            .hybrid_batches(TableKind::Prs, query_vec, where_expr, limit)
            .await?;

        let mut hits = Vec::new();
        for batch in &batches {
            for row in 0..batch.num_rows() {
                let record = schema::pr_record_from_batch(batch, row)?;
                let lexical_target = format!("{} {}", record.body, record.matched_chunk);
                let distance = schema::get_distance(batch, row);
                let score = hit_score(query_text, &lexical_target, distance);
                hits.push(PrHit { record, score });
            }
        }
        sort_by_similarity(&mut hits, |h| h.score.similarity());
        Ok(hits)
    }
}

fn sort_by_similarity<T>(hits: &mut [T], similarity: impl Fn(&T) -> f64) {
    hits.sort_by(|a, b| {
        similarity(b)
            .partial_cmp(&similarity(a))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}
