//! Application context: config, store, embedding engine, shared caches.
//!
//! Owned by the command dispatcher and passed into subsystems explicitly;
//! `cleanup()` is idempotent and safe to call from the signal handler and
//! the normal exit path concurrently.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Context as _;

use rev_config::ReverieConfig;
use rev_context::ContextCaches;
use rev_embeddings::EmbeddingEngine;
use rev_store::VectorStore;

/// Per-project database directory under the user data dir.
#[must_use]
pub fn project_db_dir(project_root: &Path) -> PathBuf {
    let key = rev_core::hash::record_id(&[&project_root.to_string_lossy()]);
    rev_config::data_dir().join("projects").join(key).join("db")
}

/// Root holding every per-project database directory.
#[must_use]
pub fn projects_dir() -> PathBuf {
    rev_config::data_dir().join("projects")
}

pub struct AppContext {
    pub config: ReverieConfig,
    pub project_root: PathBuf,
    pub store: VectorStore,
    pub embedder: EmbeddingEngine,
    pub caches: ContextCaches,
    cleaning_up: AtomicBool,
}

impl AppContext {
    /// Initialize config, the project store, and the embedding model.
    ///
    /// # Errors
    ///
    /// Fails when configuration cannot be loaded, the database directory is
    /// unusable, or the embedding model cannot be initialized.
    pub async fn init(project_root: PathBuf, verbose: bool) -> anyhow::Result<Self> {
        let config = ReverieConfig::load(Some(&project_root))
            .context("failed to load configuration")?;

        let db_dir = project_db_dir(&project_root);
        tokio::fs::create_dir_all(&db_dir)
            .await
            .with_context(|| format!("failed to create {}", db_dir.display()))?;
        let store = VectorStore::connect(&db_dir)
            .await
            .context("failed to open the vector database")?;

        let embedder = EmbeddingEngine::init(verbose)
            .await
            .context("failed to initialize the embedding model")?;

        Ok(Self {
            config,
            project_root,
            store,
            embedder,
            caches: ContextCaches::new(),
            cleaning_up: AtomicBool::new(false),
        })
    }

    /// Release caches. Safe to call more than once; later calls are no-ops.
    pub fn cleanup(&self) {
        if self.cleaning_up.swap(true, Ordering::SeqCst) {
            return;
        }
        self.caches.clear();
        tracing::debug!("application context cleaned up");
    }
}

/// Resolve the project root from an optional `--directory` flag.
///
/// # Errors
///
/// Fails when the directory does not exist.
pub fn resolve_project_root(directory: Option<&str>) -> anyhow::Result<PathBuf> {
    let root = match directory {
        Some(dir) => PathBuf::from(dir),
        None => std::env::current_dir().context("failed to read current directory")?,
    };
    let root = std::fs::canonicalize(&root)
        .with_context(|| format!("invalid directory '{}'", root.display()))?;
    anyhow::ensure!(root.is_dir(), "'{}' is not a directory", root.display());
    Ok(root)
}
