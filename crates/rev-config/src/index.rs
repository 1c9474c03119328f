//! Indexer tunables.

use serde::{Deserialize, Serialize};

const fn default_concurrency() -> usize {
    10
}

const fn default_batch_size() -> usize {
    100
}

const fn default_max_lines() -> usize {
    1000
}

const fn default_respect_gitignore() -> bool {
    true
}

const fn default_scan_timeout_secs() -> u64 {
    120
}

const fn default_structure_max_depth() -> usize {
    4
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexConfig {
    /// Parallel file processors.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Texts per embedding batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Code files are truncated to this many lines before embedding.
    #[serde(default = "default_max_lines")]
    pub max_lines: usize,

    /// Whether `git check-ignore` filters candidate files.
    #[serde(default = "default_respect_gitignore")]
    pub respect_gitignore: bool,

    /// Additional exclude globs (matched with `dot` semantics).
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Deadline for a full directory scan, in seconds.
    #[serde(default = "default_scan_timeout_secs")]
    pub scan_timeout_secs: u64,

    /// Maximum depth of the directory-structure tree rendering.
    #[serde(default = "default_structure_max_depth")]
    pub structure_max_depth: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            batch_size: default_batch_size(),
            max_lines: default_max_lines(),
            respect_gitignore: default_respect_gitignore(),
            exclude: Vec::new(),
            scan_timeout_secs: default_scan_timeout_secs(),
            structure_max_depth: default_structure_max_depth(),
        }
    }
}
