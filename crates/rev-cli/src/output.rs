//! Review output rendering: text, JSON, and markdown.

use serde::Serialize;

use rev_review::{FileReview, ReviewIssue};

const RED: &str = "\u{1b}[31m";
const YELLOW: &str = "\u{1b}[33m";
const CYAN: &str = "\u{1b}[36m";
const GREEN: &str = "\u{1b}[32m";
const RESET: &str = "\u{1b}[0m";

/// Aggregate counters for one run.
#[derive(Debug, Default, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub total_files_reviewed: usize,
    pub files_with_issues: usize,
    pub total_issues: usize,
    pub skipped_files: usize,
    pub error_files: usize,
}

/// Full run output in the stable JSON contract.
#[derive(Debug, Serialize)]
pub struct RunOutput {
    pub summary: RunSummary,
    pub details: Vec<FileDetail>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDetail {
    pub file_path: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub review: rev_review::ReviewReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunOutput {
    /// Build the output contract from per-file reviews.
    #[must_use]
    pub fn from_reviews(reviews: Vec<FileReview>, skipped_files: usize) -> Self {
        let mut summary = RunSummary {
            skipped_files,
            ..RunSummary::default()
        };
        let mut details = Vec::with_capacity(reviews.len());

        for review in reviews {
            if review.success {
                summary.total_files_reviewed += 1;
                if !review.review.issues.is_empty() {
                    summary.files_with_issues += 1;
                    summary.total_issues += review.review.issues.len();
                }
            } else {
                summary.error_files += 1;
            }
            details.push(FileDetail {
                file_path: review.file_path,
                success: review.success,
                language: Some(review.language),
                review: review.review,
                error: review.error,
            });
        }

        Self { summary, details }
    }

    /// Stable JSON rendering.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Terminal rendering with colored severity tags.
    #[must_use]
    pub fn to_text(&self, color: bool) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "Reviewed {} file(s): {} with issues, {} issue(s) total, {} skipped, {} failed\n\n",
            self.summary.total_files_reviewed,
            self.summary.files_with_issues,
            self.summary.total_issues,
            self.summary.skipped_files,
            self.summary.error_files,
        ));

        for detail in &self.details {
            out.push_str(&format!("=== {}\n", detail.file_path));
            if let Some(error) = &detail.error {
                out.push_str(&format!("{}error:{} {error}\n\n", tint(RED, color), reset(color)));
                continue;
            }
            if !detail.review.summary.is_empty() {
                out.push_str(&format!("{}\n", detail.review.summary));
            }
            for issue in &detail.review.issues {
                out.push_str(&format!(
                    "  [{}{}{}] {}{}\n",
                    tint(severity_color(&issue.severity), color),
                    issue.severity,
                    reset(color),
                    issue.description,
                    render_lines(issue),
                ));
                if let Some(suggestion) = &issue.suggestion {
                    out.push_str(&format!("      suggestion: {suggestion}\n"));
                }
            }
            for positive in &detail.review.positives {
                out.push_str(&format!(
                    "  [{}+{}] {positive}\n",
                    tint(GREEN, color),
                    reset(color)
                ));
            }
            out.push('\n');
        }
        out
    }

    /// Markdown rendering with emoji severity.
    #[must_use]
    pub fn to_markdown(&self) -> String {
        let mut out = String::from("# Review results\n\n");
        out.push_str(&format!(
            "{} file(s) reviewed, {} issue(s) found.\n\n",
            self.summary.total_files_reviewed, self.summary.total_issues
        ));

        for detail in &self.details {
            out.push_str(&format!("## `{}`\n\n", detail.file_path));
            if let Some(error) = &detail.error {
                out.push_str(&format!("⚠️ review failed: {error}\n\n"));
                continue;
            }
            if !detail.review.summary.is_empty() {
                out.push_str(&format!("{}\n\n", detail.review.summary));
            }
            if detail.review.issues.is_empty() {
                out.push_str("✅ no issues found\n\n");
            }
            for issue in &detail.review.issues {
                out.push_str(&format!(
                    "- {} **{}** {}{}\n",
                    severity_emoji(&issue.severity),
                    issue.severity,
                    issue.description,
                    render_lines(issue),
                ));
                if let Some(suggestion) = &issue.suggestion {
                    out.push_str(&format!("  - suggestion: {suggestion}\n"));
                }
            }
            if !detail.review.issues.is_empty() {
                out.push('\n');
            }
        }
        out
    }
}

fn render_lines(issue: &ReviewIssue) -> String {
    if issue.line_numbers.is_empty() {
        String::new()
    } else {
        let lines: Vec<String> = issue.line_numbers.iter().map(ToString::to_string).collect();
        format!(" (line {})", lines.join(", "))
    }
}

fn severity_color(severity: &str) -> &'static str {
    match severity.to_ascii_lowercase().as_str() {
        "high" | "critical" => RED,
        "medium" => YELLOW,
        _ => CYAN,
    }
}

fn severity_emoji(severity: &str) -> &'static str {
    match severity.to_ascii_lowercase().as_str() {
        "high" | "critical" => "🔴",
        "medium" => "🟡",
        _ => "🔵",
    }
}

const fn tint(code: &'static str, color: bool) -> &'static str {
    if color { code } else { "" }
}

const fn reset(color: bool) -> &'static str {
    if color { RESET } else { "" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rev_review::ReviewReport;

    fn sample_reviews() -> Vec<FileReview> {
        vec![
            FileReview {
                file_path: "src/a.ts".to_string(),
                language: "typescript".to_string(),
                success: true,
                review: ReviewReport {
                    summary: "One problem.".to_string(),
                    issues: vec![ReviewIssue {
                        severity: "high".to_string(),
                        description: "bug".to_string(),
                        line_numbers: vec![3, 9],
                        suggestion: Some("fix it".to_string()),
                    }],
                    positives: vec!["good names".to_string()],
                    raw_response: None,
                },
                error: None,
            },
            FileReview {
                file_path: "src/b.ts".to_string(),
                language: "typescript".to_string(),
                success: false,
                review: ReviewReport::default(),
                error: Some("llm failed".to_string()),
            },
        ]
    }

    #[test]
    fn json_matches_the_output_contract() {
        let output = RunOutput::from_reviews(sample_reviews(), 2);
        let value: serde_json::Value = serde_json::from_str(&output.to_json()).unwrap();

        assert_eq!(value["summary"]["totalFilesReviewed"], 1);
        assert_eq!(value["summary"]["filesWithIssues"], 1);
        assert_eq!(value["summary"]["totalIssues"], 1);
        assert_eq!(value["summary"]["skippedFiles"], 2);
        assert_eq!(value["summary"]["errorFiles"], 1);
        assert_eq!(value["details"][0]["filePath"], "src/a.ts");
        assert_eq!(value["details"][0]["review"]["issues"][0]["severity"], "high");
    }

    #[test]
    fn text_includes_summary_and_severities() {
        let output = RunOutput::from_reviews(sample_reviews(), 0);
        let text = output.to_text(false);
        assert!(text.contains("Reviewed 1 file(s)"));
        assert!(text.contains("[high] bug (line 3, 9)"));
        assert!(text.contains("suggestion: fix it"));
        assert!(text.contains("error: llm failed"));
        assert!(!text.contains("\u{1b}["), "no ANSI codes without color");
    }

    #[test]
    fn text_color_mode_uses_ansi() {
        let output = RunOutput::from_reviews(sample_reviews(), 0);
        assert!(output.to_text(true).contains(RED));
    }

    #[test]
    fn markdown_uses_emoji_severity() {
        let output = RunOutput::from_reviews(sample_reviews(), 0);
        let md = output.to_markdown();
        assert!(md.contains("## `src/a.ts`"));
        assert!(md.contains("🔴 **high** bug"));
        assert!(md.contains("⚠️ review failed"));
    }

    #[test]
    fn clean_file_renders_check_mark() {
        let reviews = vec![FileReview {
            file_path: "src/c.ts".to_string(),
            language: "typescript".to_string(),
            success: true,
            review: ReviewReport::default(),
            error: None,
        }];
        let md = RunOutput::from_reviews(reviews, 0).to_markdown();
        assert!(md.contains("✅ no issues found"));
    }
}
