//! `rvw pr-history` — analyze, status, clear.

use anyhow::Context as _;

use rev_config::GithubConfig;
use rev_review::comments::{self, PrHistoryOptions};

use crate::cli::PrHistoryArgs;
use crate::context::AppContext;
use crate::progress::Progress;

pub async fn analyze(args: &PrHistoryArgs, ctx: &AppContext, quiet: bool) -> anyhow::Result<()> {
    let token = args
        .token
        .clone()
        .or_else(GithubConfig::token)
        .context("a GitHub token is required (set GITHUB_TOKEN or pass --token)")?;

    let opts = PrHistoryOptions {
        repository: args.repository.clone(),
        since: args.since.clone(),
        until: args.until.clone(),
        limit: args.limit,
        resume: args.resume,
    };

    let progress = Progress::spinner(!quiet, &format!("ingesting {}", args.repository));
    let ingested = comments::ingest_pr_history(
        &ctx.store,
        &ctx.embedder,
        &reqwest::Client::new(),
        &ctx.config.github,
        &token,
        &ctx.project_root.to_string_lossy(),
        &rev_config::data_dir(),
        &opts,
    )
    .await
    .context("PR-history ingestion failed")?;
    progress.finish_ok(&format!("ingested {ingested} comment(s)"));

    println!("ingested {ingested} comment(s) from {}", args.repository);
    Ok(())
}

pub async fn status(repository: &str, ctx: &AppContext) -> anyhow::Result<()> {
    let state = comments::load_state(&rev_config::data_dir(), repository);
    let stored = ctx.store.count_pr_comments(repository).await?;

    println!("repository: {repository}");
    println!("  comments stored:     {stored}");
    println!("  pages completed:     {}", state.last_completed_page);
    println!("  total ingested:      {}", state.ingested);
    if !state.updated_at.is_empty() {
        println!("  last updated:        {}", state.updated_at);
    }
    Ok(())
}

pub async fn clear(repository: &str, force: bool, ctx: &AppContext) -> anyhow::Result<()> {
    ctx.store.clear_pr_comments(repository).await?;
    if force {
        comments::clear_state(&rev_config::data_dir(), repository);
    }
    println!("cleared PR history for {repository}");
    Ok(())
}
