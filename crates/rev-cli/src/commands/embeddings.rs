//! `rvw embeddings` — generate, clear, clear-all, stats.

use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Context as _;

use rev_index::{FileStatus, Indexer, structure};
use rev_store::{TableKind, VectorStore};

use crate::cli::GenerateArgs;
use crate::context::{AppContext, project_db_dir, projects_dir, resolve_project_root};
use crate::progress::Progress;

pub async fn generate(args: &GenerateArgs, ctx: &AppContext, quiet: bool) -> anyhow::Result<()> {
    let mut index_config = ctx.config.index.clone();
    if let Some(concurrency) = args.concurrency {
        index_config.concurrency = concurrency;
    }
    if let Some(max_lines) = args.max_lines {
        index_config.max_lines = max_lines;
    }
    if args.no_gitignore {
        index_config.respect_gitignore = false;
    }
    index_config.exclude.extend(args.exclude.iter().cloned());
    if let Some(exclude_file) = &args.exclude_file {
        let raw = std::fs::read_to_string(exclude_file)
            .with_context(|| format!("failed to read exclude file '{exclude_file}'"))?;
        index_config.exclude.extend(
            raw.lines()
                .map(str::trim)
                .filter(|l| !l.is_empty() && !l.starts_with('#'))
                .map(String::from),
        );
    }

    let indexer = Indexer::new(&ctx.store, &ctx.embedder, index_config.clone());
    let patterns = (!args.files.is_empty()).then(|| args.files.clone());

    let progress = Progress::spinner(!quiet, "indexing project");
    let processed = AtomicU64::new(0);
    let report = indexer
        .index_project(
            &ctx.project_root,
            patterns.as_deref(),
            Some(&|status, path| {
                if status == FileStatus::Processed {
                    let n = processed.fetch_add(1, Ordering::Relaxed) + 1;
                    tracing::debug!(path = %path.display(), "indexed");
                    progress.set_message(&format!("indexed {n} file(s)"));
                }
            }),
        )
        .await
        .context("indexing failed")?;

    structure::write_structure_record(
        &ctx.store,
        &ctx.embedder,
        &ctx.project_root,
        index_config.structure_max_depth,
        true,
    )
    .await
    .context("failed to write the project structure record")?;

    progress.finish_ok(&format!(
        "indexed: {} processed, {} skipped, {} excluded, {} failed",
        report.processed, report.skipped, report.excluded, report.failed
    ));
    if quiet {
        println!(
            "processed={} skipped={} excluded={} failed={}",
            report.processed, report.skipped, report.excluded, report.failed
        );
    }
    Ok(())
}

pub async fn clear(directory: Option<&str>) -> anyhow::Result<()> {
    let project_root = resolve_project_root(directory)?;
    let db_dir = project_db_dir(&project_root);
    if !db_dir.exists() {
        println!("no embeddings found for {}", project_root.display());
        return Ok(());
    }
    let store = VectorStore::connect(&db_dir).await?;
    rev_index::clear_project(&store, &project_root.to_string_lossy()).await?;
    println!("cleared embeddings for {}", project_root.display());
    Ok(())
}

pub async fn clear_all() -> anyhow::Result<()> {
    let dir = projects_dir();
    if !dir.exists() {
        println!("no embeddings stored");
        return Ok(());
    }
    let mut cleared = 0usize;
    let mut entries = tokio::fs::read_dir(&dir)
        .await
        .with_context(|| format!("failed to list {}", dir.display()))?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
            tokio::fs::remove_dir_all(entry.path())
                .await
                .with_context(|| format!("failed to remove {}", entry.path().display()))?;
            cleared += 1;
        }
    }
    println!("cleared {cleared} project database(s)");
    Ok(())
}

pub async fn stats(directory: Option<&str>) -> anyhow::Result<()> {
    let project_root = resolve_project_root(directory)?;
    let db_dir = project_db_dir(&project_root);
    if !db_dir.exists() {
        println!("no embeddings found for {}", project_root.display());
        return Ok(());
    }
    let store = VectorStore::connect(&db_dir).await?;

    let files = store.count_rows(TableKind::Files).await?;
    let docs = store.count_rows(TableKind::Docs).await?;
    let prs = store.count_rows(TableKind::Prs).await?;

    println!("project: {}", project_root.display());
    println!("  file embeddings:     {files}");
    println!("  document chunks:     {docs}");
    println!("  pr comments:         {prs}");

    let projects = store.distinct_projects(TableKind::Files).await?;
    if projects.len() > 1 {
        println!("  projects in this database:");
        for project in projects {
            println!("    {project}");
        }
    }
    Ok(())
}
