//! LLM client configuration.

use serde::{Deserialize, Serialize};

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

const fn default_temperature() -> f64 {
    0.0
}

const fn default_max_tokens() -> u32 {
    8192
}

const fn default_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    /// Model identifier passed to the Messages API.
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature. Reviews run at 0 for stable JSON output.
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Response token budget.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Request timeout, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl LlmConfig {
    /// API key from the environment (`ANTHROPIC_API_KEY`). Never read from
    /// config files so keys stay out of dotfiles.
    #[must_use]
    pub fn api_key() -> Option<String> {
        std::env::var("ANTHROPIC_API_KEY")
            .ok()
            .filter(|key| !key.is_empty())
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_correct() {
        let config = LlmConfig::default();
        assert_eq!(config.model, "claude-sonnet-4-20250514");
        assert!((config.temperature - 0.0).abs() < f64::EPSILON);
        assert_eq!(config.max_tokens, 8192);
        assert_eq!(config.timeout_secs, 120);
    }
}
