//! # rev-store
//!
//! Lance-backed vector store for Reverie.
//!
//! One database directory per project holds three tables: `file_embeddings`,
//! `document_chunk_embeddings`, and `pr_comments`, each with a
//! `FixedSizeList<Float32, 384>` embedding column. Writes go through
//! `merge_insert` keyed on `id` so re-indexing is idempotent at the storage
//! layer; reads are hybrid (ANN `_distance` plus an in-process lexical
//! `_score`) and normalized into typed hits at this crate's edge.

use std::path::Path;
use std::sync::Arc;

use arrow_array::{RecordBatch, RecordBatchIterator};
use arrow_schema::Schema;
use futures_util::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::table::OptimizeAction;

use rev_core::record::{DocChunkRecord, FileRecord, PrCommentRecord};

pub mod error;
pub mod pr;
pub mod schema;
pub mod search;

pub use error::StoreError;
pub use search::{CodeHit, DocHit, HitScore, PrHit};

/// Logical tables in a project database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Files,
    Docs,
    Prs,
}

impl TableKind {
    /// Persisted table name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Files => "file_embeddings",
            Self::Docs => "document_chunk_embeddings",
            Self::Prs => "pr_comments",
        }
    }

    fn schema(self) -> Result<Arc<Schema>, StoreError> {
        match self {
            Self::Files => schema::file_schema(),
            Self::Docs => schema::doc_schema(),
            Self::Prs => schema::pr_schema(),
        }
    }
}

/// Escape a string for use inside a single-quoted SQL literal.
#[must_use]
pub fn sql_quote(value: &str) -> String {
    value.replace('\'', "''")
}

/// Handle to one project's vector database.
#[derive(Clone)]
pub struct VectorStore {
    conn: lancedb::Connection,
}

impl std::fmt::Debug for VectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStore").finish_non_exhaustive()
    }
}

impl VectorStore {
    /// Connect to (creating if needed) the database directory at `db_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connection`] if the directory cannot be opened.
    pub async fn connect(db_dir: &Path) -> Result<Self, StoreError> {
        let uri = db_dir.to_string_lossy().to_string();
        let conn = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(Self { conn })
    }

    /// Open a table, creating its schema on first use.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connection`] if creation or opening fails.
    pub async fn open_or_create(&self, kind: TableKind) -> Result<lancedb::Table, StoreError> {
        match self.conn.open_table(kind.name()).execute().await {
            Ok(table) => Ok(table),
            Err(lancedb::Error::TableNotFound { .. }) => {
                tracing::debug!(table = kind.name(), "creating table on first use");
                self.conn
                    .create_empty_table(kind.name(), kind.schema()?)
                    .execute()
                    .await
                    .map_err(|e| StoreError::Connection(e.to_string()))
            }
            Err(e) => Err(StoreError::Connection(e.to_string())),
        }
    }

    /// Open a table that must already exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::TableMissing`] if the table was never
    /// initialized, [`StoreError::Connection`] on other failures.
    pub async fn open_existing(&self, kind: TableKind) -> Result<lancedb::Table, StoreError> {
        match self.conn.open_table(kind.name()).execute().await {
            Ok(table) => Ok(table),
            Err(lancedb::Error::TableNotFound { .. }) => {
                Err(StoreError::TableMissing(kind.name().to_string()))
            }
            Err(e) => Err(StoreError::Connection(e.to_string())),
        }
    }

    async fn merge_batch(
        &self,
        kind: TableKind,
        batch: RecordBatch,
    ) -> Result<(), StoreError> {
        let table = self.open_or_create(kind).await?;
        let schema = batch.schema();
        let reader = RecordBatchIterator::new(vec![Ok(batch)], schema);

        let mut builder = table.merge_insert(&["id"]);
        builder
            .when_matched_update_all(None)
            .when_not_matched_insert_all();
        builder
            .execute(Box::new(reader))
            .await
            .map_err(|e| StoreError::Insertion(e.to_string()))?;
        Ok(())
    }

    /// Upsert file records, keyed on `id`. Atomic per batch.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Insertion`] if the merge fails.
    pub async fn upsert_files(&self, records: &[FileRecord]) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }
        let batch = schema::rows_to_batch(records)?;
        self.merge_batch(TableKind::Files, batch).await
    }

    /// Upsert document chunk records, keyed on `id`. Atomic per batch.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Insertion`] if the merge fails.
    pub async fn upsert_docs(&self, records: &[DocChunkRecord]) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }
        let batch = schema::rows_to_batch(records)?;
        self.merge_batch(TableKind::Docs, batch).await
    }

    /// Upsert PR comment records, keyed on `id`. Atomic per batch.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Insertion`] if the merge fails.
    pub async fn upsert_prs(&self, records: &[PrCommentRecord]) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }
        let batch = schema::rows_to_batch(records)?;
        self.merge_batch(TableKind::Prs, batch).await
    }

    /// Delete rows matching a SQL predicate. A missing table is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Query`] if the delete fails.
    pub async fn delete_where(&self, kind: TableKind, expr: &str) -> Result<(), StoreError> {
        let table = match self.open_existing(kind).await {
            Ok(table) => table,
            Err(StoreError::TableMissing(_)) => return Ok(()),
            Err(e) => return Err(e),
        };
        table
            .delete(expr)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(())
    }

    /// Row count for a table; 0 when the table does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Query`] if the count fails.
    pub async fn count_rows(&self, kind: TableKind) -> Result<usize, StoreError> {
        let table = match self.open_existing(kind).await {
            Ok(table) => table,
            Err(StoreError::TableMissing(_)) => return Ok(0),
            Err(e) => return Err(e),
        };
        table
            .count_rows(None)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))
    }

    /// Rebuild indexes and compact fragments.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::OptimizeLegacyFormat`] (non-fatal, callers log
    /// and continue) when the dataset predates the current manifest format;
    /// [`StoreError::Query`] for other failures.
    pub async fn optimize(&self, kind: TableKind) -> Result<(), StoreError> {
        let table = match self.open_existing(kind).await {
            Ok(table) => table,
            Err(StoreError::TableMissing(_)) => return Ok(()),
            Err(e) => return Err(e),
        };
        match table.optimize(OptimizeAction::All).await {
            Ok(_) => Ok(()),
            Err(e) => {
                let message = e.to_string();
                if message.to_lowercase().contains("legacy") {
                    Err(StoreError::OptimizeLegacyFormat(message))
                } else {
                    Err(StoreError::Query(message))
                }
            }
        }
    }

    /// All file records for one `(project_path, path)` pair.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Query`] if the scan fails.
    pub async fn files_for_path(
        &self,
        project_path: &str,
        path: &str,
    ) -> Result<Vec<FileRecord>, StoreError> {
        let table = match self.open_existing(TableKind::Files).await {
            Ok(table) => table,
            Err(StoreError::TableMissing(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let expr = format!(
            "project_path = '{}' AND path = '{}'",
            sql_quote(project_path),
            sql_quote(path)
        );
        let batches = collect_query(table.query().only_if(expr)).await?;

        let mut records = Vec::new();
        for batch in &batches {
            for row in 0..batch.num_rows() {
                records.push(schema::file_record_from_batch(batch, row)?);
            }
        }
        Ok(records)
    }

    /// All document chunk records for one source document.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Query`] if the scan fails.
    pub async fn docs_for_path(
        &self,
        project_path: &str,
        original_document_path: &str,
    ) -> Result<Vec<DocChunkRecord>, StoreError> {
        let table = match self.open_existing(TableKind::Docs).await {
            Ok(table) => table,
            Err(StoreError::TableMissing(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let expr = format!(
            "project_path = '{}' AND original_document_path = '{}'",
            sql_quote(project_path),
            sql_quote(original_document_path)
        );
        let batches = collect_query(table.query().only_if(expr)).await?;

        let mut records = Vec::new();
        for batch in &batches {
            for row in 0..batch.num_rows() {
                records.push(schema::doc_record_from_batch(batch, row)?);
            }
        }
        Ok(records)
    }

    /// Fetch a single file record by id within a project, if present.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Query`] if the scan fails.
    pub async fn file_record_by_id(
        &self,
        project_path: &str,
        id: &str,
    ) -> Result<Option<FileRecord>, StoreError> {
        let table = match self.open_existing(TableKind::Files).await {
            Ok(table) => table,
            Err(StoreError::TableMissing(_)) => return Ok(None),
            Err(e) => return Err(e),
        };

        let expr = format!(
            "project_path = '{}' AND id = '{}'",
            sql_quote(project_path),
            sql_quote(id)
        );
        let batches = collect_query(table.query().only_if(expr).limit(1)).await?;
        for batch in &batches {
            if batch.num_rows() > 0 {
                return Ok(Some(schema::file_record_from_batch(batch, 0)?));
            }
        }
        Ok(None)
    }

    /// Distinct `project_path` values present in a table.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Query`] if the scan fails.
    pub async fn distinct_projects(&self, kind: TableKind) -> Result<Vec<String>, StoreError> {
        let table = match self.open_existing(kind).await {
            Ok(table) => table,
            Err(StoreError::TableMissing(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let batches = collect_query(
            table
                .query()
                .select(lancedb::query::Select::columns(&["project_path"])),
        )
        .await?;

        let mut projects = std::collections::BTreeSet::new();
        for batch in &batches {
            for row in 0..batch.num_rows() {
                if let Some(project) = schema::get_opt_string(batch, "project_path", row)? {
                    if !project.is_empty() {
                        projects.insert(project);
                    }
                }
            }
        }
        Ok(projects.into_iter().collect())
    }
}

/// Drain an executable query into record batches.
pub(crate) async fn collect_query<Q: ExecutableQuery>(
    query: Q,
) -> Result<Vec<RecordBatch>, StoreError> {
    let mut stream = query
        .execute()
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

    let mut batches = Vec::new();
    while let Some(batch) = stream
        .try_next()
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?
    {
        batches.push(batch);
    }
    Ok(batches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rev_core::VECTOR_DIM;

    /// Deterministic 384-dim embedding from a seed.
    pub(crate) fn synthetic_embedding(seed: u32) -> Vec<f32> {
        (0..VECTOR_DIM)
            .map(|i| {
                #[allow(clippy::cast_precision_loss)]
                let base = (seed as f32) / 100.0;
                #[allow(clippy::cast_precision_loss)]
                let variation = (i as f32) / 384.0;
                (base + variation).sin()
            })
            .collect()
    }

    pub(crate) fn sample_file_record(id: &str, path: &str, seed: u32) -> FileRecord {
        FileRecord {
            id: id.to_string(),
            project_path: "/repo".to_string(),
            path: path.to_string(),
            content: format!("content of {path}"),
            language: "rust".to_string(),
            content_hash: "aabbccdd".to_string(),
            last_modified: "2026-01-01T00:00:00Z".to_string(),
            record_type: "code".to_string(),
            embedding: synthetic_embedding(seed),
        }
    }

    #[test]
    fn sql_quote_escapes_single_quotes() {
        assert_eq!(sql_quote("it's"), "it''s");
        assert_eq!(sql_quote("plain"), "plain");
    }

    #[tokio::test]
    async fn missing_table_surfaces_table_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let store = VectorStore::connect(tmp.path()).await.unwrap();

        let err = store.open_existing(TableKind::Docs).await.unwrap_err();
        assert!(matches!(err, StoreError::TableMissing(name) if name == "document_chunk_embeddings"));
    }

    #[tokio::test]
    async fn missing_table_count_is_zero() {
        let tmp = tempfile::tempdir().unwrap();
        let store = VectorStore::connect(tmp.path()).await.unwrap();
        assert_eq!(store.count_rows(TableKind::Files).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn upsert_then_count_and_fetch() {
        let tmp = tempfile::tempdir().unwrap();
        let store = VectorStore::connect(tmp.path()).await.unwrap();

        store
            .upsert_files(&[
                sample_file_record("r1", "/repo/src/a.rs", 1),
                sample_file_record("r2", "/repo/src/b.rs", 2),
            ])
            .await
            .unwrap();

        assert_eq!(store.count_rows(TableKind::Files).await.unwrap(), 2);

        let records = store.files_for_path("/repo", "/repo/src/a.rs").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "r1");
        assert_eq!(records[0].embedding.len(), VECTOR_DIM);
    }

    #[tokio::test]
    async fn upsert_same_id_replaces_row() {
        let tmp = tempfile::tempdir().unwrap();
        let store = VectorStore::connect(tmp.path()).await.unwrap();

        let mut record = sample_file_record("r1", "/repo/src/a.rs", 1);
        store.upsert_files(std::slice::from_ref(&record)).await.unwrap();

        record.content_hash = "11223344".to_string();
        store.upsert_files(std::slice::from_ref(&record)).await.unwrap();

        assert_eq!(store.count_rows(TableKind::Files).await.unwrap(), 1);
        let records = store.files_for_path("/repo", "/repo/src/a.rs").await.unwrap();
        assert_eq!(records[0].content_hash, "11223344");
    }

    #[tokio::test]
    async fn delete_where_removes_matching_rows() {
        let tmp = tempfile::tempdir().unwrap();
        let store = VectorStore::connect(tmp.path()).await.unwrap();

        store
            .upsert_files(&[
                sample_file_record("r1", "/repo/src/a.rs", 1),
                sample_file_record("r2", "/repo/src/b.rs", 2),
            ])
            .await
            .unwrap();

        store
            .delete_where(
                TableKind::Files,
                &format!("path = '{}'", sql_quote("/repo/src/a.rs")),
            )
            .await
            .unwrap();

        assert_eq!(store.count_rows(TableKind::Files).await.unwrap(), 1);
        assert!(store.files_for_path("/repo", "/repo/src/a.rs").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_where_on_missing_table_is_noop() {
        let tmp = tempfile::tempdir().unwrap();
        let store = VectorStore::connect(tmp.path()).await.unwrap();
        store
            .delete_where(TableKind::Prs, "id = 'nope'")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn distinct_projects_deduplicates() {
        let tmp = tempfile::tempdir().unwrap();
        let store = VectorStore::connect(tmp.path()).await.unwrap();

        store
            .upsert_files(&[
                sample_file_record("r1", "/repo/src/a.rs", 1),
                sample_file_record("r2", "/repo/src/b.rs", 2),
            ])
            .await
            .unwrap();

        let projects = store.distinct_projects(TableKind::Files).await.unwrap();
        assert_eq!(projects, vec!["/repo".to_string()]);
    }
}
