//! GitHub access configuration for PR-history ingestion.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GithubConfig {
    /// Default `owner/repo` when the flag is omitted.
    #[serde(default)]
    pub repository: String,

    /// GitHub REST API base, overridable for GitHub Enterprise.
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

fn default_api_base() -> String {
    "https://api.github.com".to_string()
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            repository: String::new(),
            api_base: default_api_base(),
        }
    }
}

impl GithubConfig {
    /// Token from the environment: `GITHUB_TOKEN`, falling back to `GH_TOKEN`.
    #[must_use]
    pub fn token() -> Option<String> {
        std::env::var("GITHUB_TOKEN")
            .or_else(|_| std::env::var("GH_TOKEN"))
            .ok()
            .filter(|token| !token.is_empty())
    }
}
