//! LLM response parsing with a guaranteed-valid fallback.
//!
//! Strategies run in a fixed order: direct JSON decode, fenced code block
//! extraction, first balanced `{...}` extraction. When all fail the result
//! is still a valid [`ReviewReport`] carrying the raw response, never an
//! error.

use serde::{Deserialize, Serialize};

/// One issue found by the review.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReviewIssue {
    #[serde(default = "default_severity")]
    pub severity: String,
    pub description: String,
    #[serde(default, alias = "lineNumbers")]
    pub line_numbers: Vec<u32>,
    #[serde(default)]
    pub suggestion: Option<String>,
}

fn default_severity() -> String {
    "low".to_string()
}

/// The structured review returned for one file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReviewReport {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub issues: Vec<ReviewIssue>,
    #[serde(default)]
    pub positives: Vec<String>,
    /// Present only when no strategy could parse the response.
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "rawResponse")]
    pub raw_response: Option<String>,
}

/// Parse an LLM response into a [`ReviewReport`].
#[must_use]
pub fn parse_review_response(response: &str) -> ReviewReport {
    for candidate in candidates(response) {
        if let Ok(report) = serde_json::from_str::<ReviewReport>(candidate) {
            return report;
        }
    }
    fallback_report(response)
}

/// Parse an arbitrary JSON value with the same strategy ladder; used by the
/// holistic PR review whose shape differs from the per-file report.
#[must_use]
pub fn parse_json_value(response: &str) -> Option<serde_json::Value> {
    for candidate in candidates(response) {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(candidate) {
            return Some(value);
        }
    }
    None
}

/// Extraction candidates in strategy order.
fn candidates(response: &str) -> impl Iterator<Item = &str> {
    let direct = Some(response.trim());
    let fenced = extract_fenced_block(response);
    let balanced = extract_balanced_object(response);
    direct.into_iter().chain(fenced).chain(balanced)
}

/// Content of the first fenced code block, tolerant of a `json` tag.
fn extract_fenced_block(response: &str) -> Option<&str> {
    let open = response.find("```")?;
    let after_ticks = &response[open + 3..];
    let body_start = after_ticks.find('\n')? + 1;
    let body = &after_ticks[body_start..];
    let close = body.find("```")?;
    Some(body[..close].trim())
}

/// First balanced `{...}` span, respecting strings and escapes.
fn extract_balanced_object(response: &str) -> Option<&str> {
    let start = response.find('{')?;
    let bytes = response.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, byte) in bytes[start..].iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match byte {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&response[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

/// The guaranteed-shape fallback for unparseable responses.
fn fallback_report(response: &str) -> ReviewReport {
    ReviewReport {
        summary: "The review response could not be parsed as JSON.".to_string(),
        issues: vec![ReviewIssue {
            severity: "low".to_string(),
            description: "The model returned an unstructured response; see raw_response."
                .to_string(),
            line_numbers: Vec::new(),
            suggestion: None,
        }],
        positives: Vec::new(),
        raw_response: Some(response.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn direct_json_parses() {
        let response = r#"{"summary": "ok", "issues": [], "positives": ["clean"]}"#;
        let report = parse_review_response(response);
        assert_eq!(report.summary, "ok");
        assert_eq!(report.positives, vec!["clean".to_string()]);
        assert!(report.raw_response.is_none());
    }

    #[test]
    fn fenced_block_parses() {
        let response = "Here is the review:\n```json\n{\"summary\": \"fenced\", \"issues\": []}\n```\nThanks!";
        let report = parse_review_response(response);
        assert_eq!(report.summary, "fenced");
    }

    #[test]
    fn balanced_object_parses() {
        let response = "Sure! {\"summary\": \"embedded\", \"issues\": []} hope that helps";
        let report = parse_review_response(response);
        assert_eq!(report.summary, "embedded");
    }

    #[test]
    fn braces_inside_strings_do_not_confuse_extraction() {
        let response = "prefix {\"summary\": \"has } brace\", \"issues\": []} suffix";
        let report = parse_review_response(response);
        assert_eq!(report.summary, "has } brace");
    }

    #[test]
    fn unparseable_response_falls_back() {
        let response = "I could not produce JSON, sorry.";
        let report = parse_review_response(response);
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].severity, "low");
        assert_eq!(report.raw_response.as_deref(), Some(response));
    }

    #[test]
    fn camel_case_line_numbers_accepted() {
        let response = r#"{"summary": "s", "issues": [{"description": "d", "lineNumbers": [3, 7]}]}"#;
        let report = parse_review_response(response);
        assert_eq!(report.issues[0].line_numbers, vec![3, 7]);
        assert_eq!(report.issues[0].severity, "low", "severity defaults");
    }

    #[test]
    fn json_value_ladder_for_holistic_shape() {
        let response = "```\n{\"crossFileIssues\": []}\n```";
        let value = parse_json_value(response).unwrap();
        assert!(value.get("crossFileIssues").is_some());
        assert!(parse_json_value("no json here").is_none());
    }
}
