//! `rvw analyze` — single-file, glob, and branch-diff review.

use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use anyhow::Context as _;

use rev_core::language::language_for_path;
use rev_review::orchestrator::{Orchestrator, PinnedDoc, ReviewFile};
use rev_review::{AnthropicClient, FileReview, git};

use crate::cli::{AnalyzeArgs, OutputFormat};
use crate::context::AppContext;
use crate::output::RunOutput;
use crate::progress::Progress;

pub async fn handle(args: &AnalyzeArgs, ctx: &AppContext, quiet: bool) -> anyhow::Result<()> {
    let mut llm_config = ctx.config.llm.clone();
    if let Some(model) = &args.model {
        llm_config.model.clone_from(model);
    }
    if let Some(temperature) = args.temperature {
        llm_config.temperature = temperature;
    }
    if let Some(max_tokens) = args.max_tokens {
        llm_config.max_tokens = max_tokens;
    }

    let mut general = ctx.config.general.clone();
    if let Some(threshold) = args.similarity_threshold {
        general.code_similarity_threshold = threshold;
    }
    if let Some(max_examples) = args.max_examples {
        general.max_examples = max_examples;
    }

    let llm = AnthropicClient::from_env(&llm_config)?;
    let mut orchestrator = Orchestrator::new(
        &ctx.store,
        &ctx.embedder,
        &ctx.caches,
        &llm,
        general,
        llm_config,
        ctx.project_root.to_string_lossy().to_string(),
    );
    orchestrator.pinned_docs = parse_pinned_docs(&args.docs)?;

    let concurrency = args.concurrency.unwrap_or(3).max(1);
    let progress = Progress::spinner(!quiet, "gathering context and reviewing");
    let (output, failed) = if let Some(base) = &args.diff_with {
        run_diff_review(&orchestrator, ctx, base).await?
    } else if let Some(file) = &args.file {
        run_single_review(&orchestrator, ctx, Path::new(file)).await?
    } else if !args.files.is_empty() {
        run_glob_review(&orchestrator, ctx, &args.files, concurrency).await?
    } else {
        anyhow::bail!("one of --file, --files, or --diff-with is required");
    };
    progress.finish_ok("review complete");

    render(&output, args.output);
    if failed {
        anyhow::bail!("review finished with errors");
    }
    Ok(())
}

fn render(output: &RunOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{}", output.to_json()),
        OutputFormat::Markdown => println!("{}", output.to_markdown()),
        OutputFormat::Text => {
            let color = std::io::stdout().is_terminal();
            print!("{}", output.to_text(color));
        }
    }
}

fn parse_pinned_docs(specs: &[String]) -> anyhow::Result<Vec<PinnedDoc>> {
    specs
        .iter()
        .map(|spec| {
            let (title, path) = spec
                .split_once(':')
                .with_context(|| format!("--doc '{spec}' is not in Title:path form"))?;
            Ok(PinnedDoc {
                title: title.to_string(),
                path: PathBuf::from(path),
            })
        })
        .collect()
}

async fn load_review_file(
    project_root: &Path,
    path: &Path,
) -> anyhow::Result<ReviewFile> {
    let abs = if path.is_absolute() {
        path.to_path_buf()
    } else {
        project_root.join(path)
    };
    let content = tokio::fs::read_to_string(&abs)
        .await
        .with_context(|| format!("failed to read {}", abs.display()))?;
    let rel_path = abs
        .strip_prefix(project_root)
        .map_or_else(|_| abs.clone(), Path::to_path_buf);
    Ok(ReviewFile {
        language: language_for_path(&abs).to_string(),
        path: abs,
        rel_path,
        content,
    })
}

async fn run_single_review(
    orchestrator: &Orchestrator<'_, rev_embeddings::EmbeddingEngine, AnthropicClient>,
    ctx: &AppContext,
    path: &Path,
) -> anyhow::Result<(RunOutput, bool)> {
    let file = load_review_file(&ctx.project_root, path).await?;
    let (reviews, failed) = collect_reviews(orchestrator, vec![file], 1).await;
    Ok((RunOutput::from_reviews(reviews, 0), failed))
}

async fn run_glob_review(
    orchestrator: &Orchestrator<'_, rev_embeddings::EmbeddingEngine, AnthropicClient>,
    ctx: &AppContext,
    patterns: &[String],
    concurrency: usize,
) -> anyhow::Result<(RunOutput, bool)> {
    let mut builder = globset::GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(
            globset::Glob::new(pattern)
                .with_context(|| format!("invalid glob '{pattern}'"))?,
        );
    }
    let set = builder.build().context("failed to compile globs")?;

    let mut files = Vec::new();
    let mut skipped = 0usize;
    let walker = ignore::WalkBuilder::new(&ctx.project_root).hidden(false).build();
    for entry in walker.into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(&ctx.project_root) else {
            continue;
        };
        if !set.is_match(rel) {
            continue;
        }
        match load_review_file(&ctx.project_root, rel).await {
            Ok(file) => files.push(file),
            Err(error) => {
                tracing::warn!(path = %rel.display(), %error, "skipping unreadable file");
                skipped += 1;
            }
        }
    }
    anyhow::ensure!(!files.is_empty(), "no files matched the given globs");

    let (reviews, failed) = collect_reviews(orchestrator, files, concurrency).await;
    Ok((RunOutput::from_reviews(reviews, skipped), failed))
}

async fn run_diff_review(
    orchestrator: &Orchestrator<'_, rev_embeddings::EmbeddingEngine, AnthropicClient>,
    ctx: &AppContext,
    base: &str,
) -> anyhow::Result<(RunOutput, bool)> {
    let repo = git::repo_root(&ctx.project_root).await?;
    git::resolve_branch(&repo, base).await?;
    let changed = git::changed_files(&repo, base).await?;
    anyhow::ensure!(!changed.is_empty(), "no files changed relative to '{base}'");

    let mut files = Vec::new();
    let mut diffs = Vec::new();
    let mut skipped = 0usize;
    for change in changed {
        match load_review_file(&repo, &change.path).await {
            Ok(file) => {
                diffs.push((change.path.to_string_lossy().to_string(), change.diff));
                files.push(file);
            }
            Err(error) => {
                // Deleted on the branch; nothing to review.
                tracing::debug!(path = %change.path.display(), %error, "skipping unreadable changed file");
                skipped += 1;
            }
        }
    }
    anyhow::ensure!(!files.is_empty(), "every changed file was unreadable");

    let branch_review = orchestrator.review_branch(&files, &diffs).await?;

    if !branch_review.cross_file_issues.is_empty() {
        tracing::info!(
            count = branch_review.cross_file_issues.len(),
            "cross-file issues found"
        );
    }
    let mut reviews = branch_review.file_reviews;
    // Surface cross-file issues on the first file so every format shows them.
    if let (Some(first), false) = (reviews.first_mut(), branch_review.cross_file_issues.is_empty())
    {
        first
            .review
            .issues
            .splice(0..0, branch_review.cross_file_issues.clone());
    }

    let failed = reviews.iter().any(|r| !r.success);
    Ok((RunOutput::from_reviews(reviews, skipped), failed))
}

async fn collect_reviews(
    orchestrator: &Orchestrator<'_, rev_embeddings::EmbeddingEngine, AnthropicClient>,
    files: Vec<ReviewFile>,
    concurrency: usize,
) -> (Vec<FileReview>, bool) {
    use futures_util::StreamExt;

    let reviews: Vec<FileReview> = futures_util::stream::iter(files)
        .map(|file| async move {
            match orchestrator.review_file(&file).await {
                Ok(review) => review,
                Err(error) => FileReview {
                    file_path: file.rel_path.to_string_lossy().to_string(),
                    language: file.language,
                    success: false,
                    review: rev_review::ReviewReport::default(),
                    error: Some(error.to_string()),
                },
            }
        })
        .buffered(concurrency)
        .collect()
        .await;

    let failed = reviews.iter().any(|r| !r.success);
    (reviews, failed)
}
