//! Retrieval thresholds and result limits.

use serde::{Deserialize, Serialize};

const fn default_doc_similarity_threshold() -> f64 {
    0.05
}

const fn default_code_similarity_threshold() -> f64 {
    0.3
}

const fn default_pr_similarity_threshold() -> f64 {
    0.3
}

const fn default_max_examples() -> usize {
    8
}

const fn default_max_guideline_docs() -> usize {
    4
}

const fn default_pr_timeout_secs() -> u64 {
    300
}

const fn default_merge_limits() -> MergeLimits {
    MergeLimits {
        code: 40,
        docs: 100,
        comments: 40,
    }
}

/// Per-channel retention caps for the multi-file merge.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct MergeLimits {
    pub code: usize,
    pub docs: usize,
    pub comments: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeneralConfig {
    /// Minimum similarity for a documentation chunk to survive retrieval.
    #[serde(default = "default_doc_similarity_threshold")]
    pub doc_similarity_threshold: f64,

    /// Minimum similarity for a code example to survive retrieval.
    #[serde(default = "default_code_similarity_threshold")]
    pub code_similarity_threshold: f64,

    /// Minimum similarity for a historical PR comment to be included.
    #[serde(default = "default_pr_similarity_threshold")]
    pub pr_similarity_threshold: f64,

    /// Maximum code examples included in a review prompt.
    #[serde(default = "default_max_examples")]
    pub max_examples: usize,

    /// Maximum guideline documents after the document-level rollup.
    #[serde(default = "default_max_guideline_docs")]
    pub max_guideline_docs: usize,

    /// Deadline for the PR-comment retrieval channel, in seconds.
    #[serde(default = "default_pr_timeout_secs")]
    pub pr_timeout_secs: u64,

    /// Per-channel caps when merging context across changed files.
    #[serde(default = "default_merge_limits")]
    pub merge_limits: MergeLimits,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            doc_similarity_threshold: default_doc_similarity_threshold(),
            code_similarity_threshold: default_code_similarity_threshold(),
            pr_similarity_threshold: default_pr_similarity_threshold(),
            max_examples: default_max_examples(),
            max_guideline_docs: default_max_guideline_docs(),
            pr_timeout_secs: default_pr_timeout_secs(),
            merge_limits: default_merge_limits(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_correct() {
        let config = GeneralConfig::default();
        assert!((config.doc_similarity_threshold - 0.05).abs() < f64::EPSILON);
        assert!((config.code_similarity_threshold - 0.3).abs() < f64::EPSILON);
        assert!((config.pr_similarity_threshold - 0.3).abs() < f64::EPSILON);
        assert_eq!(config.max_examples, 8);
        assert_eq!(config.max_guideline_docs, 4);
        assert_eq!(config.pr_timeout_secs, 300);
        assert_eq!(config.merge_limits.code, 40);
        assert_eq!(config.merge_limits.docs, 100);
        assert_eq!(config.merge_limits.comments, 40);
    }
}
