//! PR-comment retrieval over the `pr_comments` table.
//!
//! Queried with the embedding of the file under review (truncated upstream
//! to the PR bound). Comments attached to test files are kept or dropped
//! according to whether the reviewed file itself is a test.

use rev_core::language::is_test_path;

use crate::error::StoreError;
use crate::search::PrHit;
use crate::{TableKind, VectorStore, sql_quote};

impl VectorStore {
    /// Find historical review comments relevant to the file under review.
    ///
    /// `is_test_file` post-filters comment paths by test markers: a test
    /// file only sees comments on test files, a non-test file never does.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::TableMissing`] when no PR history was ever
    /// ingested, [`StoreError::Query`] on query failure.
    pub async fn search_pr_comments(
        &self,
        project_path: &str,
        query_text: &str,
        query_vec: Option<&[f32]>,
        limit: usize,
        is_test_file: bool,
    ) -> Result<Vec<PrHit>, StoreError> {
        let expr = format!("project_path = '{}'", sql_quote(project_path));
        // Over-fetch so the test-marker post-filter does not starve the
        // caller's limit.
        let hits = self
            .search_prs(query_text, query_vec, Some(&expr), limit * 2)
            .await?;

        let mut filtered: Vec<PrHit> = hits
            .into_iter()
            .filter(|hit| is_test_path(&hit.record.file_path) == is_test_file)
            .collect();
        filtered.truncate(limit);
        Ok(filtered)
    }

    /// Number of ingested comments for a repository.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Query`] if the count fails.
    pub async fn count_pr_comments(&self, repository: &str) -> Result<usize, StoreError> {
        let table = match self.open_existing(TableKind::Prs).await {
            Ok(table) => table,
            Err(StoreError::TableMissing(_)) => return Ok(0),
            Err(e) => return Err(e),
        };
        table
            .count_rows(Some(format!(
                "repository = '{}'",
                sql_quote(repository)
            )))
            .await
            .map_err(|e| StoreError::Query(e.to_string()))
    }

    /// Delete all comments for a repository.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Query`] if the delete fails.
    pub async fn clear_pr_comments(&self, repository: &str) -> Result<(), StoreError> {
        self.delete_where(
            TableKind::Prs,
            &format!("repository = '{}'", sql_quote(repository)),
        )
        .await
    }
}
