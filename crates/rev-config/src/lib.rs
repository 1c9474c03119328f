//! # rev-config
//!
//! Layered configuration loading for Reverie using figment.
//!
//! Configuration sources (in priority order):
//! 1. Environment variables (`REVERIE_*`, `__`-nested)
//! 2. Project-level `.reverie/config.toml`
//! 3. User-level `~/.config/reverie/config.toml`
//! 4. Built-in defaults

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

pub mod general;
pub mod github;
pub mod index;
pub mod llm;

pub use general::GeneralConfig;
pub use github::GithubConfig;
pub use index::IndexConfig;
pub use llm::LlmConfig;

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to extract configuration: {0}")]
    Extract(#[from] Box<figment::Error>),
}

/// Full application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReverieConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub github: GithubConfig,
    #[serde(default)]
    pub index: IndexConfig,
}

impl ReverieConfig {
    /// Load configuration with the standard layering.
    ///
    /// `project_root` contributes `.reverie/config.toml` when present.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Extract`] if a source fails to parse or a
    /// value fails type extraction.
    pub fn load(project_root: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(user_config) = user_config_path() {
            figment = figment.merge(Toml::file(user_config));
        }
        if let Some(root) = project_root {
            figment = figment.merge(Toml::file(root.join(".reverie").join("config.toml")));
        }
        figment = figment.merge(Env::prefixed("REVERIE_").split("__"));

        figment.extract().map_err(|e| ConfigError::Extract(Box::new(e)))
    }
}

/// User-level config file path (`~/.config/reverie/config.toml`).
#[must_use]
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("reverie").join("config.toml"))
}

/// User-level data directory (`~/.reverie`), where vector databases and
/// ingestion state live.
#[must_use]
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".reverie")
}
