//! Batched `git check-ignore` with a per-process verdict cache.
//!
//! One subprocess call filters a whole batch of candidate paths; verdicts
//! are cached so repeated indexing runs in the same process skip the
//! subprocess entirely for known paths.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Mutex;

use tokio::io::AsyncWriteExt;

use crate::error::IndexError;

/// Cached gitignore verdicts for one repository.
#[derive(Debug, Default)]
pub struct GitignoreCache {
    verdicts: Mutex<HashMap<PathBuf, bool>>,
}

impl GitignoreCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Partition `paths` into ignored verdicts, consulting the cache first
    /// and asking `git check-ignore --stdin` only for unknown paths.
    ///
    /// Paths are relative to `repo_root`. Returns the set of ignored paths.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Git`] when git cannot be spawned. A repository
    /// without git history yields no ignored paths.
    pub async fn ignored_paths(
        &self,
        repo_root: &Path,
        paths: &[PathBuf],
    ) -> Result<HashSet<PathBuf>, IndexError> {
        let mut ignored = HashSet::new();
        let mut unknown = Vec::new();
        {
            let verdicts = self
                .verdicts
                .lock()
                .map_err(|_| IndexError::Git("gitignore cache poisoned".to_string()))?;
            for path in paths {
                match verdicts.get(path) {
                    Some(true) => {
                        ignored.insert(path.clone());
                    }
                    Some(false) => {}
                    None => unknown.push(path.clone()),
                }
            }
        }

        if unknown.is_empty() {
            return Ok(ignored);
        }

        let freshly_ignored = check_ignore_batch(repo_root, &unknown).await?;

        let mut verdicts = self
            .verdicts
            .lock()
            .map_err(|_| IndexError::Git("gitignore cache poisoned".to_string()))?;
        for path in unknown {
            let is_ignored = freshly_ignored.contains(&path);
            verdicts.insert(path.clone(), is_ignored);
            if is_ignored {
                ignored.insert(path);
            }
        }
        Ok(ignored)
    }
}

/// One `git check-ignore --stdin` invocation over a batch of paths.
async fn check_ignore_batch(
    repo_root: &Path,
    paths: &[PathBuf],
) -> Result<HashSet<PathBuf>, IndexError> {
    let mut child = tokio::process::Command::new("git")
        .arg("-C")
        .arg(repo_root)
        .args(["check-ignore", "--stdin", "-z"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| IndexError::Git(format!("failed to spawn git check-ignore: {e}")))?;

    let mut input = Vec::new();
    for path in paths {
        input.extend_from_slice(path.to_string_lossy().as_bytes());
        input.push(0);
    }

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(&input)
            .await
            .map_err(|e| IndexError::Git(format!("failed to write to git check-ignore: {e}")))?;
        drop(stdin);
    }

    let output = child
        .wait_with_output()
        .await
        .map_err(|e| IndexError::Git(format!("git check-ignore did not finish: {e}")))?;

    // Exit code 1 means "nothing is ignored"; 128 means not a git repository.
    // Both leave indexing unfiltered rather than failing the run.
    let mut ignored = HashSet::new();
    for chunk in output.stdout.split(|b| *b == 0) {
        if chunk.is_empty() {
            continue;
        }
        ignored.insert(PathBuf::from(String::from_utf8_lossy(chunk).to_string()));
    }
    Ok(ignored)
}
