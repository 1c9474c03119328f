//! Prompt assembly for single-file and holistic reviews.

use rev_context::{DocumentRollup, ScoredCode};
use rev_core::context::ContextTag;
use rev_store::PrHit;

/// Code excerpt length used in the guideline query.
const GUIDELINE_EXCERPT_CHARS: usize = 1500;
/// Code examples are truncated to this many lines in the prompt.
const EXAMPLE_MAX_LINES: usize = 300;
/// Guideline chunks are truncated to this many lines in the prompt.
const GUIDELINE_MAX_LINES: usize = 400;
/// PR comment bodies are truncated to this many characters.
const COMMENT_MAX_CHARS: usize = 500;

/// English retrieval query templated from the reviewed file's context.
#[must_use]
pub fn guideline_query(context: &ContextTag, language: &str, content: &str) -> String {
    let mut query = String::from("coding guidelines and best practices");

    if !context.area.is_generic() {
        query.push_str(&format!(" for {} code", context.area.label()));
    }
    if !context.dominant_tech.is_empty() {
        query.push_str(&format!(" using {}", context.dominant_tech.join(", ")));
    }
    query.push_str(&format!(" in {language}"));
    if !context.keywords.is_empty() {
        query.push_str(&format!(". Topics: {}", context.keywords.join(", ")));
    }

    let excerpt: String = content.chars().take(GUIDELINE_EXCERPT_CHARS).collect();
    if !excerpt.trim().is_empty() {
        query.push_str("\n\nCode excerpt:\n");
        query.push_str(&excerpt);
    }
    query
}

fn clip_lines(text: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    if lines.len() <= max_lines {
        return text.to_string();
    }
    format!("{}\n…", lines[..max_lines].join("\n"))
}

fn clip_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let clipped: String = text.chars().take(max_chars).collect();
    format!("{clipped}…")
}

/// Render the retrieval channels into prompt sections.
#[must_use]
pub fn context_sections(
    code_examples: &[ScoredCode],
    guidelines: &[DocumentRollup],
    pr_comments: &[PrHit],
) -> String {
    let mut sections = String::new();

    if !code_examples.is_empty() {
        sections.push_str("## Similar code in this project\n\n");
        for example in code_examples {
            sections.push_str(&format!(
                "### {} ({})\n```{}\n{}\n```\n\n",
                example.record.path,
                example.record.language,
                example.record.language,
                clip_lines(&example.record.content, EXAMPLE_MAX_LINES)
            ));
        }
    }

    if !guidelines.is_empty() {
        sections.push_str("## Project guidelines\n\n");
        for rollup in guidelines {
            let chunk = &rollup.best_chunk.record;
            let heading = if chunk.heading_text.is_empty() {
                chunk.document_title.clone()
            } else {
                format!("{} — {}", chunk.document_title, chunk.heading_text)
            };
            sections.push_str(&format!(
                "### {heading} ({})\n{}\n\n",
                chunk.original_document_path,
                clip_lines(&chunk.content, GUIDELINE_MAX_LINES)
            ));
        }
    }

    if !pr_comments.is_empty() {
        sections.push_str("## Historical review comments\n\n");
        for hit in pr_comments {
            let comment = &hit.record;
            sections.push_str(&format!(
                "- [{} on {} #{}] {}\n",
                comment.author,
                comment.file_path,
                comment.pr_number,
                clip_chars(&comment.body, COMMENT_MAX_CHARS)
            ));
        }
        sections.push('\n');
    }

    sections
}

/// Full prompt for one file review.
#[must_use]
pub fn single_file_prompt(
    file_path: &str,
    language: &str,
    content: &str,
    sections: &str,
) -> String {
    format!(
        "You are reviewing a source file from this project. Use the provided \
         project context (similar code, guidelines, historical review comments) \
         to ground your findings in this project's conventions.\n\n\
         {sections}\
         ## File under review: {file_path} ({language})\n\
         ```{language}\n{content}\n```\n\n\
         Return a JSON object: {{\"summary\": string, \"issues\": \
         [{{\"severity\": \"high\"|\"medium\"|\"low\", \"description\": string, \
         \"line_numbers\": [int], \"suggestion\": string}}], \
         \"positives\": [string]}}."
    )
}

/// Full prompt for the holistic multi-file review.
#[must_use]
pub fn holistic_prompt(diffs: &[(String, String)], sections: &str) -> String {
    let mut files_block = String::new();
    for (path, diff) in diffs {
        files_block.push_str(&format!("### {path}\n```diff\n{diff}\n```\n\n"));
    }

    format!(
        "You are reviewing a set of changed files from one branch. Consider \
         cross-file consistency as well as per-file problems, grounded in the \
         provided project context.\n\n\
         {sections}\
         ## Changed files\n\n{files_block}\
         Return a JSON object: {{\"summary\": string, \"crossFileIssues\": \
         [{{\"severity\": string, \"description\": string, \"line_numbers\": \
         [int], \"suggestion\": string}}], \"fileIssues\": {{\"<relative file \
         path>\": [same issue shape]}}, \"positives\": [string]}}. Key \
         fileIssues strictly by the relative paths shown above."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rev_core::context::Area;

    #[test]
    fn guideline_query_names_area_tech_and_keywords() {
        let context = ContextTag {
            area: Area::Frontend,
            dominant_tech: vec!["React".to_string()],
            is_readme_style: false,
            keywords: vec!["component".to_string(), "props".to_string()],
        };
        let query = guideline_query(&context, "typescriptreact", "function Button() {}");
        assert!(query.contains("frontend"));
        assert!(query.contains("React"));
        assert!(query.contains("component, props"));
        assert!(query.contains("function Button"));
    }

    #[test]
    fn guideline_query_skips_generic_area() {
        let context = ContextTag::for_area(Area::Unknown);
        let query = guideline_query(&context, "rust", "");
        assert!(!query.contains("Unknown code"));
        assert!(query.contains("in rust"));
    }

    #[test]
    fn guideline_excerpt_is_capped() {
        let context = ContextTag::for_area(Area::Backend);
        let long = "x".repeat(5000);
        let query = guideline_query(&context, "go", &long);
        assert!(query.len() < 2000);
    }

    #[test]
    fn clip_lines_appends_ellipsis() {
        let text = (0..10).map(|i| i.to_string()).collect::<Vec<_>>().join("\n");
        let clipped = clip_lines(&text, 3);
        assert!(clipped.ends_with('…'));
        assert_eq!(clipped.lines().count(), 4);
        assert_eq!(clip_lines("a\nb", 5), "a\nb");
    }

    #[test]
    fn clip_chars_appends_ellipsis() {
        assert_eq!(clip_chars("short", 10), "short");
        let clipped = clip_chars(&"y".repeat(600), 500);
        assert_eq!(clipped.chars().count(), 501);
    }

    #[test]
    fn empty_channels_produce_no_sections() {
        let sections = context_sections(&[], &[], &[]);
        assert!(sections.is_empty());
    }

    #[test]
    fn single_file_prompt_demands_json() {
        let prompt = single_file_prompt("src/a.ts", "typescript", "const a = 1;", "");
        assert!(prompt.contains("src/a.ts"));
        assert!(prompt.contains("\"summary\""));
        assert!(prompt.contains("positives"));
    }

    #[test]
    fn holistic_prompt_keys_by_relative_path() {
        let diffs = vec![("src/a.ts".to_string(), "+new line".to_string())];
        let prompt = holistic_prompt(&diffs, "");
        assert!(prompt.contains("### src/a.ts"));
        assert!(prompt.contains("fileIssues"));
        assert!(prompt.contains("relative"));
    }
}
