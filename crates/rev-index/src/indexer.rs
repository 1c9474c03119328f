//! Concurrent repository indexer.
//!
//! Walks the project, filters candidates, hashes content, and writes
//! embedding records. Unchanged files (same content hash) are skipped;
//! changed files have their prior records deleted before the new set is
//! inserted, so the table never holds two generations of one file.
//!
//! File reads and hashing run under a semaphore-bounded `JoinSet`; embedding
//! happens afterwards in `batch_size` groups so the model sees large batches
//! regardless of per-file parallelism.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use rev_config::IndexConfig;
use rev_core::hash::{content_hash, record_id};
use rev_core::language::{is_documentation_file, language_for_path};
use rev_core::record::{DocChunkRecord, FileRecord, RecordKind};
use rev_embeddings::{Embedder, MAX_EMBED_CHARS_CODE, truncate_for_embedding};
use rev_store::{StoreError, TableKind, VectorStore, sql_quote};

use crate::chunker::chunk_markdown;
use crate::error::IndexError;
use crate::filter::{ExcludeGlobs, exclusion_reason, has_default_extension};
use crate::gitignore::GitignoreCache;

/// Per-file outcome reported through the progress callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Processed,
    Skipped,
    Excluded,
    Failed,
}

/// Progress callback invoked on every per-file state change.
pub type ProgressFn = dyn Fn(FileStatus, &Path) + Send + Sync;

/// Aggregate counts for one indexing run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IndexReport {
    pub processed: usize,
    pub skipped: usize,
    pub excluded: usize,
    pub failed: usize,
}

impl IndexReport {
    fn record(&mut self, status: FileStatus) {
        match status {
            FileStatus::Processed => self.processed += 1,
            FileStatus::Skipped => self.skipped += 1,
            FileStatus::Excluded => self.excluded += 1,
            FileStatus::Failed => self.failed += 1,
        }
    }
}

/// What a prepared file is waiting to write.
enum Pending {
    Code {
        path: PathBuf,
        record: FileRecord,
        text: String,
    },
    Doc {
        path: PathBuf,
        doc_path: String,
        records: Vec<DocChunkRecord>,
        texts: Vec<String>,
    },
}

impl Pending {
    const fn path(&self) -> &PathBuf {
        match self {
            Self::Code { path, .. } | Self::Doc { path, .. } => path,
        }
    }

    fn text_count(&self) -> usize {
        match self {
            Self::Code { .. } => 1,
            Self::Doc { texts, .. } => texts.len(),
        }
    }
}

/// Outcome of the per-file preparation stage.
enum Prepared {
    Unchanged,
    Empty,
    Ready(Pending),
}

/// Repository indexer over one store and embedding engine.
pub struct Indexer<'a, E: Embedder> {
    store: &'a VectorStore,
    embedder: &'a E,
    config: IndexConfig,
    gitignore: Arc<GitignoreCache>,
}

impl<'a, E: Embedder> Indexer<'a, E> {
    #[must_use]
    pub fn new(store: &'a VectorStore, embedder: &'a E, config: IndexConfig) -> Self {
        Self {
            store,
            embedder,
            config,
            gitignore: Arc::new(GitignoreCache::new()),
        }
    }

    /// Index every accepted file under `project_root`.
    ///
    /// `patterns` replaces the default extension filter with explicit file
    /// globs. `on_progress` is invoked for every per-file state change.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] for setup failures (bad patterns, store
    /// connection). Per-file read and write failures are counted as `failed`
    /// and do not abort the run.
    pub async fn index_project(
        &self,
        project_root: &Path,
        patterns: Option<&[String]>,
        on_progress: Option<&ProgressFn>,
    ) -> Result<IndexReport, IndexError> {
        let mut report = IndexReport::default();
        let project_path = project_root.to_string_lossy().to_string();

        let include = patterns.map(compile_globs).transpose()?;
        let excludes = ExcludeGlobs::compile(&self.config.exclude)?;

        let candidates = self.scan(project_root).await;
        let mut accepted = Vec::new();
        for (rel, size) in candidates {
            let matches_include = include
                .as_ref()
                .map_or_else(|| has_default_extension(&rel), |set| set.is_match(&rel));
            if !matches_include {
                continue;
            }
            if exclusion_reason(&rel, size, &excludes).is_some() {
                report.record(FileStatus::Excluded);
                notify(on_progress, FileStatus::Excluded, &rel);
                continue;
            }
            accepted.push(rel);
        }

        if self.config.respect_gitignore {
            let ignored = self
                .gitignore
                .ignored_paths(project_root, &accepted)
                .await
                .unwrap_or_else(|error| {
                    tracing::warn!(%error, "git check-ignore unavailable, indexing unfiltered");
                    std::collections::HashSet::new()
                });
            accepted.retain(|rel| {
                if ignored.contains(rel) {
                    report.record(FileStatus::Excluded);
                    notify(on_progress, FileStatus::Excluded, rel);
                    false
                } else {
                    true
                }
            });
        }

        // Stage 1: read + hash + compare against existing records, bounded
        // by the configured concurrency.
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut join_set: JoinSet<(PathBuf, Result<Prepared, IndexError>)> = JoinSet::new();
        for rel in accepted {
            let permit_source = Arc::clone(&semaphore);
            let abs = project_root.join(&rel);
            let project_path = project_path.clone();
            let store = self.store.clone();
            let max_lines = self.config.max_lines;
            join_set.spawn(async move {
                let _permit = permit_source.acquire_owned().await;
                let prepared = prepare_file(&store, &project_path, &abs, max_lines).await;
                (rel, prepared)
            });
        }

        let mut pending = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            let Ok((rel, prepared)) = joined else {
                report.record(FileStatus::Failed);
                continue;
            };
            match prepared {
                Ok(Prepared::Ready(p)) => pending.push(p),
                Ok(Prepared::Unchanged | Prepared::Empty) => {
                    report.record(FileStatus::Skipped);
                    notify(on_progress, FileStatus::Skipped, &rel);
                }
                Err(error) => {
                    tracing::warn!(path = %rel.display(), %error, "file preparation failed");
                    report.record(FileStatus::Failed);
                    notify(on_progress, FileStatus::Failed, &rel);
                }
            }
        }

        // Deterministic write order regardless of task completion order.
        pending.sort_by(|a, b| a.path().cmp(b.path()));

        // Stage 2: embed in batches, then delete-before-insert per file.
        self.write_pending(&project_path, pending, on_progress, &mut report)
            .await;

        self.optimize_after_write().await;
        Ok(report)
    }

    /// Walk the project tree, honoring the scan deadline. On timeout the
    /// scan yields nothing, matching the "abort returns an empty list"
    /// contract.
    async fn scan(&self, project_root: &Path) -> Vec<(PathBuf, u64)> {
        let root = project_root.to_path_buf();
        let walk = tokio::task::spawn_blocking(move || {
            let mut files = Vec::new();
            let walker = ignore::WalkBuilder::new(&root)
                .hidden(false)
                .standard_filters(false)
                .build();
            for entry in walker.into_iter().filter_map(Result::ok) {
                if !entry.file_type().is_some_and(|t| t.is_file()) {
                    continue;
                }
                let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
                if let Ok(rel) = entry.path().strip_prefix(&root) {
                    files.push((rel.to_path_buf(), size));
                }
            }
            files
        });

        let deadline = std::time::Duration::from_secs(self.config.scan_timeout_secs);
        match tokio::time::timeout(deadline, walk).await {
            Ok(Ok(files)) => files,
            Ok(Err(error)) => {
                tracing::warn!(%error, "directory scan task failed");
                Vec::new()
            }
            Err(_) => {
                tracing::warn!(
                    timeout_secs = self.config.scan_timeout_secs,
                    "directory scan timed out, returning no candidates"
                );
                Vec::new()
            }
        }
    }

    async fn write_pending(
        &self,
        project_path: &str,
        pending: Vec<Pending>,
        on_progress: Option<&ProgressFn>,
        report: &mut IndexReport,
    ) {
        let batch_size = self.config.batch_size.max(1);
        let mut queue = pending.into_iter().peekable();

        while queue.peek().is_some() {
            // Take files until the embed batch is full.
            let mut batch_files = Vec::new();
            let mut text_total = 0usize;
            while let Some(next) = queue.peek() {
                let count = next.text_count();
                if !batch_files.is_empty() && text_total + count > batch_size {
                    break;
                }
                text_total += count;
                batch_files.push(queue.next().expect("peeked element exists"));
            }

            let mut texts = Vec::with_capacity(text_total);
            for file in &batch_files {
                match file {
                    Pending::Code { text, .. } => texts.push(text.clone()),
                    Pending::Doc { texts: t, .. } => texts.extend(t.iter().cloned()),
                }
            }

            let embeddings = match self.embedder.embed_batch(texts).await {
                Ok(embeddings) => embeddings,
                Err(error) => {
                    tracing::error!(%error, "batch embedding failed");
                    for file in &batch_files {
                        report.record(FileStatus::Failed);
                        notify(on_progress, FileStatus::Failed, file.path());
                    }
                    continue;
                }
            };

            let mut cursor = 0usize;
            for file in batch_files {
                let (path, status) = self
                    .write_one(project_path, file, &embeddings, &mut cursor)
                    .await;
                report.record(status);
                notify(on_progress, status, &path);
            }
        }
    }

    /// Write a single file's records. The prior generation is deleted
    /// before the new rows are inserted.
    async fn write_one(
        &self,
        project_path: &str,
        file: Pending,
        embeddings: &[Option<Vec<f32>>],
        cursor: &mut usize,
    ) -> (PathBuf, FileStatus) {
        match file {
            Pending::Code {
                path, mut record, ..
            } => {
                let embedding = embeddings.get(*cursor).cloned().flatten();
                *cursor += 1;
                let Some(embedding) = embedding else {
                    tracing::warn!(path = %path.display(), "embedding missing for file");
                    return (path, FileStatus::Failed);
                };
                record.embedding = embedding;

                let expr = format!(
                    "project_path = '{}' AND path = '{}' AND record_type = '{}'",
                    sql_quote(project_path),
                    sql_quote(&record.path),
                    RecordKind::Code.as_str()
                );
                if let Err(error) = self.store.delete_where(TableKind::Files, &expr).await {
                    tracing::warn!(path = %path.display(), %error, "stale record delete failed");
                    return (path, FileStatus::Failed);
                }
                match self.store.upsert_files(&[record]).await {
                    Ok(()) => (path, FileStatus::Processed),
                    Err(error) => {
                        tracing::warn!(path = %path.display(), %error, "file record insert failed");
                        (path, FileStatus::Failed)
                    }
                }
            }
            Pending::Doc {
                path,
                doc_path,
                mut records,
                texts: _,
            } => {
                let mut kept = Vec::new();
                for record in records.drain(..) {
                    let embedding = embeddings.get(*cursor).cloned().flatten();
                    *cursor += 1;
                    match embedding {
                        Some(embedding) => {
                            let mut record = record;
                            record.embedding = embedding;
                            kept.push(record);
                        }
                        None => {
                            tracing::warn!(
                                path = %path.display(),
                                heading = %record.heading_text,
                                "chunk embedding missing, dropping chunk"
                            );
                        }
                    }
                }

                if kept.is_empty() {
                    return (path, FileStatus::Failed);
                }

                let expr = format!(
                    "project_path = '{}' AND original_document_path = '{}'",
                    sql_quote(project_path),
                    sql_quote(&doc_path)
                );
                if let Err(error) = self.store.delete_where(TableKind::Docs, &expr).await {
                    tracing::warn!(path = %path.display(), %error, "stale chunk delete failed");
                    return (path, FileStatus::Failed);
                }
                match self.store.upsert_docs(&kept).await {
                    Ok(()) => (path, FileStatus::Processed),
                    Err(StoreError::TableMissing(table)) => {
                        tracing::warn!(%table, "document table unavailable, skipping documentation");
                        (path, FileStatus::Failed)
                    }
                    Err(error) => {
                        tracing::warn!(path = %path.display(), %error, "chunk insert failed");
                        (path, FileStatus::Failed)
                    }
                }
            }
        }
    }

    async fn optimize_after_write(&self) {
        for kind in [TableKind::Files, TableKind::Docs] {
            match self.store.optimize(kind).await {
                Ok(()) => {}
                Err(StoreError::OptimizeLegacyFormat(message)) => {
                    tracing::info!(table = kind.name(), %message, "legacy dataset left unoptimized");
                }
                Err(error) => {
                    tracing::warn!(table = kind.name(), %error, "optimize failed");
                }
            }
        }
    }
}

/// Read, hash, and diff one file against its existing records.
async fn prepare_file(
    store: &VectorStore,
    project_path: &str,
    abs: &Path,
    max_lines: usize,
) -> Result<Prepared, IndexError> {
    let raw = tokio::fs::read_to_string(abs)
        .await
        .map_err(|source| IndexError::FileRead {
            path: abs.display().to_string(),
            source,
        })?;

    let hash = content_hash(&raw);
    let abs_str = abs.to_string_lossy().to_string();
    let last_modified = modification_time(abs).await;

    if is_documentation_file(abs) {
        let existing = store.docs_for_path(project_path, &abs_str).await?;
        if existing.iter().any(|r| r.content_hash == hash) {
            return Ok(Prepared::Unchanged);
        }

        let chunked = chunk_markdown(&raw, &abs_str);
        if chunked.chunks.is_empty() {
            return Ok(Prepared::Empty);
        }

        let mut records = Vec::with_capacity(chunked.chunks.len());
        let mut texts = Vec::with_capacity(chunked.chunks.len());
        for (index, chunk) in chunked.chunks.iter().enumerate() {
            let id = record_id(&[
                project_path,
                &abs_str,
                "doc",
                &index.to_string(),
                &hash,
            ]);
            texts.push(
                truncate_for_embedding(&chunk.content, MAX_EMBED_CHARS_CODE).to_string(),
            );
            let start_line_in_doc = i64::try_from(chunk.start_line).unwrap_or(i64::MAX);
            records.push(DocChunkRecord {
                id,
                project_path: project_path.to_string(),
                original_document_path: abs_str.clone(),
                document_title: chunked.document_h1.clone(),
                heading_text: chunk.heading.clone().unwrap_or_default(),
                start_line_in_doc,
                content: chunk.content.clone(),
                content_hash: hash.clone(),
                language: "markdown".to_string(),
                embedding: Vec::new(),
            });
        }

        return Ok(Prepared::Ready(Pending::Doc {
            path: abs.to_path_buf(),
            doc_path: abs_str,
            records,
            texts,
        }));
    }

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Prepared::Empty);
    }

    let existing = store.files_for_path(project_path, &abs_str).await?;
    if existing.iter().any(|r| r.content_hash == hash) {
        return Ok(Prepared::Unchanged);
    }

    let content = truncate_lines(trimmed, max_lines);
    let text = truncate_for_embedding(&content, MAX_EMBED_CHARS_CODE).to_string();
    let record = FileRecord {
        id: record_id(&[project_path, &abs_str, "code"]),
        project_path: project_path.to_string(),
        path: abs_str,
        language: language_for_path(abs).to_string(),
        content_hash: hash,
        last_modified,
        record_type: RecordKind::Code.as_str().to_string(),
        content,
        embedding: Vec::new(),
    };

    Ok(Prepared::Ready(Pending::Code {
        path: abs.to_path_buf(),
        record,
        text,
    }))
}

/// Cap content at `max_lines`, noting how much was dropped.
fn truncate_lines(content: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = content.lines().collect();
    if lines.len() <= max_lines {
        return content.to_string();
    }
    let dropped = lines.len() - max_lines;
    let mut truncated = lines[..max_lines].join("\n");
    truncated.push_str(&format!("\n(truncated, {dropped} more lines)"));
    truncated
}

async fn modification_time(path: &Path) -> String {
    let mtime = tokio::fs::metadata(path)
        .await
        .ok()
        .and_then(|m| m.modified().ok())
        .map_or_else(Utc::now, DateTime::<Utc>::from);
    mtime.to_rfc3339()
}

fn compile_globs(patterns: &[String]) -> Result<GlobSet, IndexError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(
            Glob::new(pattern).map_err(|e| IndexError::InvalidPattern(format!("{pattern}: {e}")))?,
        );
    }
    builder
        .build()
        .map_err(|e| IndexError::InvalidPattern(e.to_string()))
}

fn notify(on_progress: Option<&ProgressFn>, status: FileStatus, path: &Path) {
    if let Some(callback) = on_progress {
        callback(status, path);
    }
}

/// Remove every record for one project from the code and doc tables.
///
/// # Errors
///
/// Returns [`IndexError::Store`] when a delete fails.
pub async fn clear_project(store: &VectorStore, project_path: &str) -> Result<(), IndexError> {
    let expr = format!("project_path = '{}'", sql_quote(project_path));
    store.delete_where(TableKind::Files, &expr).await?;
    store.delete_where(TableKind::Docs, &expr).await?;
    Ok(())
}

/// Remove every record from the code and doc tables across all projects.
///
/// # Errors
///
/// Returns [`IndexError::Store`] when a delete fails.
pub async fn clear_all(store: &VectorStore) -> Result<(), IndexError> {
    store.delete_where(TableKind::Files, "true").await?;
    store.delete_where(TableKind::Docs, "true").await?;
    Ok(())
}
