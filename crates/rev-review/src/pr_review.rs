//! Multi-file (branch diff) review.
//!
//! Each changed file gets a context-only pass with bounded parallelism; the
//! three channels are merged across files with max-by-similarity dedup, then
//! one holistic LLM call covers cross-file and per-file issues. When the
//! holistic call fails, the engine falls back to per-file reviews over the
//! shared context.

use futures_util::StreamExt;
use futures_util::stream;

use rev_context::{DocumentRollup, ScoredCode};
use rev_embeddings::Embedder;
use rev_store::PrHit;

use crate::error::ReviewError;
use crate::llm::{CompletionRequest, LlmClient};
use crate::orchestrator::{FileReview, GatheredContext, Orchestrator, ReviewFile, dedup_max_by};
use crate::parse::{ReviewIssue, ReviewReport, parse_json_value, parse_review_response};
use crate::prompt;

/// Changed files processed concurrently during context gathering.
const GATHER_PARALLELISM: usize = 3;

/// Merged context across all changed files.
#[derive(Debug, Default)]
pub struct MergedContext {
    pub code_examples: Vec<ScoredCode>,
    pub guidelines: Vec<DocumentRollup>,
    pub pr_comments: Vec<PrHit>,
}

/// Result of a branch review.
#[derive(Debug)]
pub struct BranchReview {
    pub summary: String,
    pub cross_file_issues: Vec<ReviewIssue>,
    pub positives: Vec<String>,
    pub file_reviews: Vec<FileReview>,
}

impl<E: Embedder, L: LlmClient> Orchestrator<'_, E, L> {
    /// Merge per-file contexts with per-channel dedup and caps.
    #[must_use]
    pub fn merge_contexts(&self, contexts: Vec<GatheredContext>) -> MergedContext {
        let mut code = Vec::new();
        let mut guidelines = Vec::new();
        let mut comments = Vec::new();
        for context in contexts {
            code.extend(context.code_examples);
            guidelines.extend(context.guidelines);
            comments.extend(context.pr_comments);
        }

        let limits = self.general.merge_limits;
        let mut code = dedup_max_by(code, |c| c.record.path.clone(), |c| c.similarity);
        code.truncate(limits.code);

        let mut guidelines = dedup_max_by(
            guidelines,
            |g| {
                format!(
                    "{}\u{0}{}",
                    g.best_chunk.record.original_document_path, g.best_chunk.record.heading_text
                )
            },
            |g| g.doc_score,
        );
        guidelines.truncate(limits.docs);

        let mut comments = dedup_max_by(
            comments,
            |c| format!("{}\u{0}{}", c.record.id, c.record.file_path),
            |c| c.score.similarity(),
        );
        comments.truncate(limits.comments);

        MergedContext {
            code_examples: code,
            guidelines,
            pr_comments: comments,
        }
    }

    /// Review a set of changed files holistically.
    ///
    /// `diffs` pairs each file's relative path with its unified diff.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError`] only when both the holistic call and every
    /// per-file fallback call fail to produce any review.
    pub async fn review_branch(
        &self,
        files: &[ReviewFile],
        diffs: &[(String, String)],
    ) -> Result<BranchReview, ReviewError> {
        // Context-only pass per file, bounded parallelism.
        let contexts: Vec<GatheredContext> = stream::iter(files)
            .map(|file| self.gather_context(file))
            .buffered(GATHER_PARALLELISM)
            .collect()
            .await;
        let merged = self.merge_contexts(contexts);

        let sections = prompt::context_sections(
            &merged.code_examples,
            &merged.guidelines,
            &merged.pr_comments,
        );

        match self.holistic_review(files, diffs, &sections).await {
            Ok(review) => Ok(review),
            Err(error) => {
                tracing::warn!(%error, "holistic review failed, falling back to per-file reviews");
                self.per_file_fallback(files, &sections).await
            }
        }
    }

    async fn holistic_review(
        &self,
        files: &[ReviewFile],
        diffs: &[(String, String)],
        sections: &str,
    ) -> Result<BranchReview, ReviewError> {
        let request = CompletionRequest {
            prompt: prompt::holistic_prompt(diffs, sections),
            model: self.llm_config.model.clone(),
            temperature: 0.0,
            max_tokens: self.llm_config.max_tokens,
            json_mode: true,
        };
        let completion = self.llm.complete(request).await?;

        let value = parse_json_value(&completion.content)
            .ok_or_else(|| ReviewError::Llm("holistic response was not JSON".to_string()))?;

        let summary = value
            .get("summary")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let cross_file_issues = issues_from(value.get("crossFileIssues"));
        let positives = value
            .get("positives")
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();

        let file_issues = value.get("fileIssues").cloned().unwrap_or_default();
        let file_reviews = files
            .iter()
            .map(|file| {
                let issues = lookup_file_issues(&file_issues, file);
                FileReview {
                    file_path: file.rel_path.to_string_lossy().to_string(),
                    language: file.language.clone(),
                    success: true,
                    review: ReviewReport {
                        summary: summary.clone(),
                        issues,
                        positives: Vec::new(),
                        raw_response: None,
                    },
                    error: None,
                }
            })
            .collect();

        Ok(BranchReview {
            summary,
            cross_file_issues,
            positives,
            file_reviews,
        })
    }

    /// Per-file reviews over the already-merged shared context.
    async fn per_file_fallback(
        &self,
        files: &[ReviewFile],
        sections: &str,
    ) -> Result<BranchReview, ReviewError> {
        let mut file_reviews = Vec::with_capacity(files.len());
        let mut any_success = false;

        for file in files {
            let request = CompletionRequest {
                prompt: prompt::single_file_prompt(
                    &file.rel_path.to_string_lossy(),
                    &file.language,
                    &file.content,
                    sections,
                ),
                model: self.llm_config.model.clone(),
                temperature: 0.0,
                max_tokens: self.llm_config.max_tokens,
                json_mode: true,
            };
            match self.llm.complete(request).await {
                Ok(completion) => {
                    any_success = true;
                    file_reviews.push(FileReview {
                        file_path: file.rel_path.to_string_lossy().to_string(),
                        language: file.language.clone(),
                        success: true,
                        review: parse_review_response(&completion.content),
                        error: None,
                    });
                }
                Err(error) => {
                    file_reviews.push(FileReview {
                        file_path: file.rel_path.to_string_lossy().to_string(),
                        language: file.language.clone(),
                        success: false,
                        review: ReviewReport::default(),
                        error: Some(error.to_string()),
                    });
                }
            }
        }

        if !any_success && !files.is_empty() {
            return Err(ReviewError::Llm(
                "all per-file fallback reviews failed".to_string(),
            ));
        }

        Ok(BranchReview {
            summary: "Holistic review unavailable; individual file reviews follow.".to_string(),
            cross_file_issues: Vec::new(),
            positives: Vec::new(),
            file_reviews,
        })
    }
}

fn issues_from(value: Option<&serde_json::Value>) -> Vec<ReviewIssue> {
    value
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default()
}

/// Per-file issues keyed by relative path, basename, or absolute path —
/// tried in that order.
fn lookup_file_issues(file_issues: &serde_json::Value, file: &ReviewFile) -> Vec<ReviewIssue> {
    let rel = file.rel_path.to_string_lossy().to_string();
    let basename = file
        .rel_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let abs = file.path.to_string_lossy().to_string();

    for key in [rel.as_str(), basename.as_str(), abs.as_str()] {
        if key.is_empty() {
            continue;
        }
        if let Some(value) = file_issues.get(key) {
            return issues_from(Some(value));
        }
    }
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::synthetic_pr_hit;
    use std::path::PathBuf;

    fn review_file(rel: &str) -> ReviewFile {
        ReviewFile {
            path: PathBuf::from("/repo").join(rel),
            rel_path: PathBuf::from(rel),
            content: "function a() {}".to_string(),
            language: "javascript".to_string(),
        }
    }

    #[test]
    fn file_issue_lookup_tries_keys_in_order() {
        let file = review_file("src/app.ts");
        let issue = serde_json::json!([{"severity": "high", "description": "d"}]);

        let by_rel = serde_json::json!({"src/app.ts": issue});
        assert_eq!(lookup_file_issues(&by_rel, &file).len(), 1);

        let by_basename = serde_json::json!({"app.ts": issue});
        assert_eq!(lookup_file_issues(&by_basename, &file).len(), 1);

        let by_abs = serde_json::json!({"/repo/src/app.ts": issue});
        assert_eq!(lookup_file_issues(&by_abs, &file).len(), 1);

        let none = serde_json::json!({"other.ts": issue});
        assert!(lookup_file_issues(&none, &file).is_empty());
    }

    #[test]
    fn relative_key_wins_over_basename() {
        let file = review_file("src/app.ts");
        let file_issues = serde_json::json!({
            "src/app.ts": [{"severity": "high", "description": "from rel"}],
            "app.ts": [{"severity": "low", "description": "from basename"}],
        });
        let issues = lookup_file_issues(&file_issues, &file);
        assert_eq!(issues[0].description, "from rel");
    }

    #[test]
    fn merged_comment_dedup_uses_id_and_path() {
        // Same comment id on two different files stays distinct.
        let comments = vec![
            synthetic_pr_hit("c1", "src/a.ts", 0.5),
            synthetic_pr_hit("c1", "src/b.ts", 0.6),
        ];
        let deduped = dedup_max_by(
            comments,
            |c| format!("{}\u{0}{}", c.record.id, c.record.file_path),
            |c| c.score.similarity(),
        );
        assert_eq!(deduped.len(), 2);
    }

    #[test]
    fn issues_from_tolerates_garbage() {
        assert!(issues_from(Some(&serde_json::json!("not an array"))).is_empty());
        assert!(issues_from(None).is_empty());
        let issues = issues_from(Some(&serde_json::json!([
            {"description": "d", "lineNumbers": [1]}
        ])));
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].line_numbers, vec![1]);
    }
}
