//! Project directory-structure record.
//!
//! One record per project (`id = "__project_structure__"`) carries a textual
//! tree rendering used as a weak similarity signal by the code retriever.

use std::path::Path;

use chrono::Utc;

use rev_core::hash::content_hash;
use rev_core::record::{FileRecord, PROJECT_STRUCTURE_ID, RecordKind};
use rev_embeddings::{Embedder, MAX_EMBED_CHARS_CODE, truncate_for_embedding};
use rev_store::{TableKind, VectorStore, sql_quote};

use crate::error::IndexError;

/// Directories never rendered into the tree.
const SKIP_DIRS: &[&str] = &["node_modules", "dist", "build", ".git", "coverage", "vendor"];

/// Render a sorted directory tree up to `max_depth` levels.
///
/// Hidden directories and the usual dependency/output directories are
/// skipped. With `include_files` unset only directories appear.
#[must_use]
pub fn render_tree(root: &Path, max_depth: usize, include_files: bool) -> String {
    let mut out = String::new();
    let root_name = root
        .file_name()
        .map_or_else(|| root.display().to_string(), |n| n.to_string_lossy().to_string());
    out.push_str(&root_name);
    out.push('\n');
    render_level(root, 1, max_depth, include_files, &mut out);
    out
}

fn render_level(dir: &Path, depth: usize, max_depth: usize, include_files: bool, out: &mut String) {
    if depth > max_depth {
        return;
    }
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };

    let mut names: Vec<(bool, String)> = entries
        .filter_map(Result::ok)
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().to_string();
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            if is_dir {
                if name.starts_with('.') || SKIP_DIRS.contains(&name.as_str()) {
                    return None;
                }
                Some((true, name))
            } else if include_files && !name.starts_with('.') {
                Some((false, name))
            } else {
                None
            }
        })
        .collect();
    // Directories first, then lexicographic.
    names.sort_by(|a, b| (!a.0, &a.1).cmp(&(!b.0, &b.1)));

    for (is_dir, name) in names {
        for _ in 0..depth {
            out.push_str("  ");
        }
        out.push_str(&name);
        if is_dir {
            out.push('/');
            out.push('\n');
            render_level(&dir.join(&name), depth + 1, max_depth, include_files, out);
        } else {
            out.push('\n');
        }
    }
}

/// Render and persist the project-structure record.
///
/// The previous record for the project is deleted first; a missing prior
/// record is not an error.
///
/// # Errors
///
/// Returns [`IndexError::Store`] or [`IndexError::Embedding`] when the
/// record cannot be written.
pub async fn write_structure_record<E: Embedder>(
    store: &VectorStore,
    embedder: &E,
    project_root: &Path,
    max_depth: usize,
    include_files: bool,
) -> Result<(), IndexError> {
    let root = project_root.to_path_buf();
    let tree = tokio::task::spawn_blocking(move || render_tree(&root, max_depth, include_files))
        .await
        .map_err(|e| IndexError::Git(format!("tree rendering task failed: {e}")))?;

    if tree.trim().is_empty() {
        return Ok(());
    }

    let embedding = embedder
        .embed_one(truncate_for_embedding(&tree, MAX_EMBED_CHARS_CODE))
        .await?;

    let project_path = project_root.to_string_lossy().to_string();
    store
        .delete_where(
            TableKind::Files,
            &format!(
                "project_path = '{}' AND id = '{}'",
                sql_quote(&project_path),
                PROJECT_STRUCTURE_ID
            ),
        )
        .await?;

    let record = FileRecord {
        id: PROJECT_STRUCTURE_ID.to_string(),
        project_path: project_path.clone(),
        path: project_path,
        content_hash: content_hash(&tree),
        content: tree,
        language: "plaintext".to_string(),
        last_modified: Utc::now().to_rfc3339(),
        record_type: RecordKind::DirectoryStructure.as_str().to_string(),
        embedding,
    };
    store.upsert_files(&[record]).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(root: &Path) {
        for dir in ["src/handlers", "docs", "node_modules/pkg", ".hidden"] {
            std::fs::create_dir_all(root.join(dir)).unwrap();
        }
        std::fs::write(root.join("src/main.rs"), "fn main() {}").unwrap();
        std::fs::write(root.join("README.md"), "# Demo").unwrap();
    }

    #[test]
    fn tree_skips_dependency_and_hidden_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        fixture(tmp.path());

        let tree = render_tree(tmp.path(), 3, false);
        assert!(tree.contains("src/"));
        assert!(tree.contains("handlers/"));
        assert!(tree.contains("docs/"));
        assert!(!tree.contains("node_modules"));
        assert!(!tree.contains(".hidden"));
        assert!(!tree.contains("main.rs"));
    }

    #[test]
    fn tree_depth_limit() {
        let tmp = tempfile::tempdir().unwrap();
        fixture(tmp.path());

        let tree = render_tree(tmp.path(), 1, false);
        assert!(tree.contains("src/"));
        assert!(!tree.contains("handlers/"));
    }

    #[test]
    fn tree_includes_files_when_asked() {
        let tmp = tempfile::tempdir().unwrap();
        fixture(tmp.path());

        let tree = render_tree(tmp.path(), 2, true);
        assert!(tree.contains("main.rs"));
        assert!(tree.contains("README.md"));
    }

    #[test]
    fn directories_sort_before_files() {
        let tmp = tempfile::tempdir().unwrap();
        fixture(tmp.path());

        let tree = render_tree(tmp.path(), 1, true);
        let dirs_at = tree.find("src/").unwrap();
        let files_at = tree.find("README.md").unwrap();
        assert!(dirs_at < files_at);
    }
}
