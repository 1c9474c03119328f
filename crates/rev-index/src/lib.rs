//! # rev-index
//!
//! Repository indexing for Reverie: markdown chunking, file filtering with
//! gitignore support, and the concurrent embedding indexer that keeps the
//! vector tables in sync with the working tree.

pub mod chunker;
pub mod error;
pub mod filter;
pub mod gitignore;
pub mod indexer;
pub mod structure;

pub use chunker::{Chunk, ChunkedDocument, chunk_markdown};
pub use error::IndexError;
pub use indexer::{FileStatus, IndexReport, Indexer, clear_all, clear_project};

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::Mutex;

    use rev_config::IndexConfig;
    use rev_core::VECTOR_DIM;
    use rev_core::record::RecordKind;
    use rev_embeddings::{Embedder, EmbeddingError};
    use rev_store::{TableKind, VectorStore};

    /// Deterministic embedder: token hashes folded into a fixed vector.
    struct FakeEmbedder;

    fn synthetic(text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; VECTOR_DIM];
        for (i, byte) in text.bytes().enumerate() {
            v[i % VECTOR_DIM] += f32::from(byte) / 255.0;
        }
        v
    }

    impl Embedder for FakeEmbedder {
        async fn embed_one(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Ok(synthetic(text))
        }

        async fn embed_batch(
            &self,
            texts: Vec<String>,
        ) -> Result<Vec<Option<Vec<f32>>>, EmbeddingError> {
            Ok(texts.iter().map(|t| Some(synthetic(t))).collect())
        }
    }

    fn test_config() -> IndexConfig {
        IndexConfig {
            concurrency: 2,
            batch_size: 3,
            respect_gitignore: false,
            ..IndexConfig::default()
        }
    }

    #[tokio::test]
    async fn fresh_index_writes_code_and_doc_records() {
        let repo = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(repo.path().join("src")).unwrap();
        std::fs::write(repo.path().join("src/app.ts"), "export const x = 1;").unwrap();
        std::fs::write(
            repo.path().join("README.md"),
            "# Demo\n\nIntro.\n\n## Usage\n\nRun it.",
        )
        .unwrap();

        let db = tempfile::tempdir().unwrap();
        let store = VectorStore::connect(db.path()).await.unwrap();
        let embedder = FakeEmbedder;
        let indexer = Indexer::new(&store, &embedder, test_config());

        let report = indexer.index_project(repo.path(), None, None).await.unwrap();
        assert_eq!(report.processed, 2, "one code file + one document");
        assert_eq!(report.failed, 0);

        assert_eq!(store.count_rows(TableKind::Files).await.unwrap(), 1);
        assert_eq!(store.count_rows(TableKind::Docs).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn second_run_skips_unchanged_files() {
        let repo = tempfile::tempdir().unwrap();
        std::fs::write(repo.path().join("a.js"), "X").unwrap();

        let db = tempfile::tempdir().unwrap();
        let store = VectorStore::connect(db.path()).await.unwrap();
        let embedder = FakeEmbedder;
        let indexer = Indexer::new(&store, &embedder, test_config());

        let first = indexer.index_project(repo.path(), None, None).await.unwrap();
        assert_eq!(first.processed, 1);

        let second = indexer.index_project(repo.path(), None, None).await.unwrap();
        assert_eq!(second.processed, 0);
        assert_eq!(second.skipped, 1);
        assert_eq!(store.count_rows(TableKind::Files).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn changed_content_replaces_prior_records() {
        let repo = tempfile::tempdir().unwrap();
        std::fs::write(repo.path().join("a.js"), "X").unwrap();

        let db = tempfile::tempdir().unwrap();
        let store = VectorStore::connect(db.path()).await.unwrap();
        let embedder = FakeEmbedder;
        let indexer = Indexer::new(&store, &embedder, test_config());

        indexer.index_project(repo.path(), None, None).await.unwrap();
        let before = store
            .files_for_path(
                &repo.path().to_string_lossy(),
                &repo.path().join("a.js").to_string_lossy(),
            )
            .await
            .unwrap();
        let old_hash = before[0].content_hash.clone();

        std::fs::write(repo.path().join("a.js"), "Y").unwrap();
        let report = indexer.index_project(repo.path(), None, None).await.unwrap();
        assert_eq!(report.processed, 1);

        let after = store
            .files_for_path(
                &repo.path().to_string_lossy(),
                &repo.path().join("a.js").to_string_lossy(),
            )
            .await
            .unwrap();
        assert_eq!(after.len(), 1, "no residual record for the old content");
        assert_ne!(after[0].content_hash, old_hash);
        assert_eq!(after[0].content, "Y");
    }

    #[tokio::test]
    async fn empty_files_are_skipped() {
        let repo = tempfile::tempdir().unwrap();
        std::fs::write(repo.path().join("empty.js"), "   \n\t\n").unwrap();

        let db = tempfile::tempdir().unwrap();
        let store = VectorStore::connect(db.path()).await.unwrap();
        let embedder = FakeEmbedder;
        let indexer = Indexer::new(&store, &embedder, test_config());

        let report = indexer.index_project(repo.path(), None, None).await.unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(store.count_rows(TableKind::Files).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn excluded_files_are_reported() {
        let repo = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(repo.path().join("node_modules/pkg")).unwrap();
        std::fs::write(repo.path().join("node_modules/pkg/index.js"), "x").unwrap();
        std::fs::write(repo.path().join("app.min.js"), "x").unwrap();
        std::fs::write(repo.path().join("app.js"), "const a = 1;").unwrap();

        let db = tempfile::tempdir().unwrap();
        let store = VectorStore::connect(db.path()).await.unwrap();
        let embedder = FakeEmbedder;
        let indexer = Indexer::new(&store, &embedder, test_config());

        let statuses: Mutex<Vec<(FileStatus, String)>> = Mutex::new(Vec::new());
        let report = indexer
            .index_project(
                repo.path(),
                None,
                Some(&|status, path: &Path| {
                    statuses
                        .lock()
                        .unwrap()
                        .push((status, path.display().to_string()));
                }),
            )
            .await
            .unwrap();

        assert_eq!(report.processed, 1);
        assert_eq!(report.excluded, 2);

        let statuses = statuses.into_inner().unwrap();
        assert!(
            statuses
                .iter()
                .any(|(s, p)| *s == FileStatus::Excluded && p.contains("app.min.js"))
        );
    }

    #[tokio::test]
    async fn explicit_patterns_replace_default_extensions() {
        let repo = tempfile::tempdir().unwrap();
        std::fs::write(repo.path().join("a.ts"), "const a = 1;").unwrap();
        std::fs::write(repo.path().join("b.py"), "b = 1").unwrap();

        let db = tempfile::tempdir().unwrap();
        let store = VectorStore::connect(db.path()).await.unwrap();
        let embedder = FakeEmbedder;
        let indexer = Indexer::new(&store, &embedder, test_config());

        let report = indexer
            .index_project(repo.path(), Some(&["*.py".to_string()]), None)
            .await
            .unwrap();
        assert_eq!(report.processed, 1);
    }

    #[tokio::test]
    async fn structure_record_round_trip() {
        let repo = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(repo.path().join("src")).unwrap();
        std::fs::write(repo.path().join("src/main.rs"), "fn main() {}").unwrap();

        let db = tempfile::tempdir().unwrap();
        let store = VectorStore::connect(db.path()).await.unwrap();
        let embedder = FakeEmbedder;

        structure::write_structure_record(&store, &embedder, repo.path(), 3, true)
            .await
            .unwrap();

        let record = store
            .file_record_by_id(
                &repo.path().to_string_lossy(),
                rev_core::record::PROJECT_STRUCTURE_ID,
            )
            .await
            .unwrap()
            .expect("structure record should exist");
        assert_eq!(record.record_type, RecordKind::DirectoryStructure.as_str());
        assert!(record.content.contains("src/"));

        // Re-writing replaces rather than duplicates.
        structure::write_structure_record(&store, &embedder, repo.path(), 3, true)
            .await
            .unwrap();
        assert_eq!(store.count_rows(TableKind::Files).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn clear_project_removes_both_tables() {
        let repo = tempfile::tempdir().unwrap();
        std::fs::write(repo.path().join("a.js"), "X").unwrap();
        std::fs::write(repo.path().join("d.md"), "# D\n\n## S\n\nbody").unwrap();

        let db = tempfile::tempdir().unwrap();
        let store = VectorStore::connect(db.path()).await.unwrap();
        let embedder = FakeEmbedder;
        let indexer = Indexer::new(&store, &embedder, test_config());
        indexer.index_project(repo.path(), None, None).await.unwrap();

        clear_project(&store, &repo.path().to_string_lossy()).await.unwrap();
        assert_eq!(store.count_rows(TableKind::Files).await.unwrap(), 0);
        assert_eq!(store.count_rows(TableKind::Docs).await.unwrap(), 0);
    }
}
