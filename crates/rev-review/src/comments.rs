//! PR-history ingestion from the GitHub review-comment feed.
//!
//! Only the crawler's output schema matters here: each review comment maps
//! onto one `pr_comments` record with the diff hunk as its matched chunk.
//! Ingestion progress is persisted per repository so interrupted runs can
//! resume from the last completed page.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use rev_config::GithubConfig;
use rev_core::record::PrCommentRecord;
use rev_embeddings::{Embedder, MAX_EMBED_CHARS_PR, truncate_for_embedding};
use rev_store::VectorStore;

use crate::error::ReviewError;

const PER_PAGE: usize = 100;

/// Options for one ingestion run.
#[derive(Debug, Clone, Default)]
pub struct PrHistoryOptions {
    /// `owner/repo`.
    pub repository: String,
    /// Keep comments created at or after this ISO-8601 instant.
    pub since: Option<String>,
    /// Keep comments created at or before this ISO-8601 instant.
    pub until: Option<String>,
    /// Stop after ingesting this many comments.
    pub limit: Option<usize>,
    /// Continue from the last persisted page instead of page one.
    pub resume: bool,
}

/// Persisted ingestion progress for one repository.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrHistoryState {
    pub repository: String,
    pub last_completed_page: usize,
    pub ingested: usize,
    pub updated_at: String,
}

/// State file location under the data directory.
#[must_use]
pub fn state_path(data_dir: &Path, repository: &str) -> PathBuf {
    let safe = repository.replace(['/', ':'], "_");
    data_dir.join("pr-history").join(format!("{safe}.json"))
}

/// Load persisted state, defaulting to a fresh one.
#[must_use]
pub fn load_state(data_dir: &Path, repository: &str) -> PrHistoryState {
    let path = state_path(data_dir, repository);
    std::fs::read_to_string(&path)
        .ok()
        .and_then(|raw| serde_json::from_str(&raw).ok())
        .unwrap_or_else(|| PrHistoryState {
            repository: repository.to_string(),
            ..PrHistoryState::default()
        })
}

fn save_state(data_dir: &Path, state: &PrHistoryState) {
    let path = state_path(data_dir, &state.repository);
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    match serde_json::to_string_pretty(state) {
        Ok(raw) => {
            if let Err(error) = std::fs::write(&path, raw) {
                tracing::warn!(path = %path.display(), %error, "failed to persist ingestion state");
            }
        }
        Err(error) => tracing::warn!(%error, "failed to serialize ingestion state"),
    }
}

/// Remove persisted state for a repository.
pub fn clear_state(data_dir: &Path, repository: &str) {
    let _ = std::fs::remove_file(state_path(data_dir, repository));
}

/// Review comment as returned by `GET /repos/{repo}/pulls/comments`.
#[derive(Debug, Deserialize)]
struct ApiComment {
    id: u64,
    #[serde(default)]
    user: Option<ApiUser>,
    created_at: String,
    #[serde(default)]
    path: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    diff_hunk: String,
    #[serde(default)]
    pull_request_url: String,
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    login: String,
}

impl ApiComment {
    /// PR number from the trailing segment of `pull_request_url`.
    fn pr_number(&self) -> i64 {
        self.pull_request_url
            .rsplit('/')
            .next()
            .and_then(|n| n.parse().ok())
            .unwrap_or(0)
    }

    fn within(&self, since: Option<&str>, until: Option<&str>) -> bool {
        // ISO-8601 timestamps compare correctly as strings.
        since.is_none_or(|s| self.created_at.as_str() >= s)
            && until.is_none_or(|u| self.created_at.as_str() <= u)
    }
}

/// Ingest historical review comments for a repository.
///
/// Returns the number of comments ingested by this run.
///
/// # Errors
///
/// Returns [`ReviewError::GitHub`] on API failures and
/// [`ReviewError::Store`] when persisting records fails.
#[allow(clippy::too_many_arguments)]
pub async fn ingest_pr_history<E: Embedder>(
    store: &VectorStore,
    embedder: &E,
    http: &reqwest::Client,
    github: &GithubConfig,
    token: &str,
    project_path: &str,
    data_dir: &Path,
    opts: &PrHistoryOptions,
) -> Result<usize, ReviewError> {
    let mut state = if opts.resume {
        load_state(data_dir, &opts.repository)
    } else {
        PrHistoryState {
            repository: opts.repository.clone(),
            ..PrHistoryState::default()
        }
    };

    let mut ingested_this_run = 0usize;
    let mut page = state.last_completed_page + 1;

    loop {
        let url = format!(
            "{}/repos/{}/pulls/comments?sort=created&direction=asc&per_page={PER_PAGE}&page={page}",
            github.api_base, opts.repository
        );
        let response = http
            .get(&url)
            .bearer_auth(token)
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", "reverie")
            .send()
            .await
            .map_err(|e| ReviewError::GitHub(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ReviewError::GitHub(format!("HTTP {status}: {detail}")));
        }

        let comments: Vec<ApiComment> = response
            .json()
            .await
            .map_err(|e| ReviewError::GitHub(format!("malformed comment page: {e}")))?;
        if comments.is_empty() {
            break;
        }
        let page_len = comments.len();

        let kept: Vec<ApiComment> = comments
            .into_iter()
            .filter(|c| !c.body.trim().is_empty())
            .filter(|c| c.within(opts.since.as_deref(), opts.until.as_deref()))
            .collect();

        let mut page_added = 0usize;
        if !kept.is_empty() {
            let texts: Vec<String> = kept
                .iter()
                .map(|c| truncate_for_embedding(&c.body, MAX_EMBED_CHARS_PR).to_string())
                .collect();
            let embeddings = embedder.embed_batch(texts).await?;

            let records: Vec<PrCommentRecord> = kept
                .iter()
                .zip(embeddings)
                .filter_map(|(comment, embedding)| {
                    let embedding = embedding?;
                    Some(PrCommentRecord {
                        id: format!("{}#{}", opts.repository, comment.id),
                        project_path: project_path.to_string(),
                        repository: opts.repository.clone(),
                        pr_number: comment.pr_number(),
                        author: comment
                            .user
                            .as_ref()
                            .map_or_else(String::new, |u| u.login.clone()),
                        created_at: comment.created_at.clone(),
                        file_path: comment.path.clone(),
                        body: comment.body.clone(),
                        comment_type: "review".to_string(),
                        matched_chunk: comment.diff_hunk.clone(),
                        embedding,
                    })
                })
                .collect();

            store.upsert_prs(&records).await?;
            page_added = records.len();
        }

        ingested_this_run += page_added;
        state.last_completed_page = page;
        state.ingested += page_added;
        state.updated_at = chrono::Utc::now().to_rfc3339();
        save_state(data_dir, &state);

        if opts.limit.is_some_and(|limit| ingested_this_run >= limit) {
            break;
        }
        if page_len < PER_PAGE {
            break;
        }
        page += 1;
    }

    Ok(ingested_this_run)
}
