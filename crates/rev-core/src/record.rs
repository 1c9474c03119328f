//! Row structs for the three vector tables.
//!
//! These are the shapes persisted to Lance datasets. The `embedding` column
//! is stored as `FixedSizeList<Float32, 384>`; everything else is scalar.
//! Dynamic-shape normalization (records with or without `project_path`,
//! `_score` vs `_distance`) happens at the store edge so everything above
//! sees exactly these structs.

use serde::{Deserialize, Serialize};

/// Reserved record id for the per-project directory tree rendering.
pub const PROJECT_STRUCTURE_ID: &str = "__project_structure__";

/// Kind of a file embedding record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordKind {
    /// Regular source or documentation file content.
    Code,
    /// Textual directory tree rendering for a project.
    DirectoryStructure,
}

impl RecordKind {
    /// Column value stored in the `record_type` field.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::DirectoryStructure => "directory-structure",
        }
    }

    /// Parse a stored column value. Unknown values normalize to `Code`.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        if value == "directory-structure" {
            Self::DirectoryStructure
        } else {
            Self::Code
        }
    }
}

/// Row in the `file_embeddings` table.
///
/// Invariant: at most one row per `(project_path, path, record_type)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: String,
    /// Absolute repository root; scopes every query.
    pub project_path: String,
    /// Absolute file path.
    pub path: String,
    /// Trimmed text, truncated to the configured max line count.
    pub content: String,
    pub language: String,
    /// First 8 hex chars of the SHA-256 of the raw content.
    pub content_hash: String,
    /// ISO-8601 modification timestamp.
    pub last_modified: String,
    /// `"code"` or `"directory-structure"`.
    pub record_type: String,
    pub embedding: Vec<f32>,
}

/// Row in the `document_chunk_embeddings` table.
///
/// Invariant: all chunks sharing `original_document_path` share
/// `document_title`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocChunkRecord {
    pub id: String,
    pub project_path: String,
    pub original_document_path: String,
    /// Document H1, or the base filename when no H1 was found.
    pub document_title: String,
    /// H2/H3 heading text; empty for the pre-heading prelude chunk.
    pub heading_text: String,
    /// 1-based line of the chunk's first line in the source document.
    pub start_line_in_doc: i64,
    pub content: String,
    pub content_hash: String,
    pub language: String,
    pub embedding: Vec<f32>,
}

/// Row in the `pr_comments` table.
///
/// Invariant: `(repository, id)` unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrCommentRecord {
    pub id: String,
    pub project_path: String,
    pub repository: String,
    pub pr_number: i64,
    pub author: String,
    pub created_at: String,
    pub file_path: String,
    pub body: String,
    /// `"review"`, `"issue"`, or `"diff"` per the crawler's output schema.
    pub comment_type: String,
    /// Code snippet the comment refers to, when the crawler matched one.
    pub matched_chunk: String,
    pub embedding: Vec<f32>,
}
