//! Git subprocess boundary.
//!
//! All invocations go through argv (never a shell), and any string that is
//! rendered into a shell-visible context passes through [`sh_quote`], which
//! produces a single POSIX-safe argument preserving the input byte-for-byte.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use crate::error::ReviewError;

/// POSIX single-quote escaping: wrap in `'...'`, replacing each embedded
/// `'` with `'\''`. The result is always exactly one shell word.
#[must_use]
pub fn sh_quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for ch in value.chars() {
        if ch == '\'' {
            quoted.push_str("'\\''");
        } else {
            quoted.push(ch);
        }
    }
    quoted.push('\'');
    quoted
}

/// One changed file in a branch diff.
#[derive(Debug, Clone)]
pub struct ChangedFile {
    /// Path relative to the repository root.
    pub path: PathBuf,
    /// Unified diff hunk for this file.
    pub diff: String,
}

async fn run_git(repo: &Path, args: &[&str], operation: &'static str) -> Result<String, ReviewError> {
    tracing::debug!(
        command = %format!("git {}", args.iter().map(|a| sh_quote(a)).collect::<Vec<_>>().join(" ")),
        "running git"
    );

    let output = tokio::process::Command::new("git")
        .arg("-C")
        .arg(repo)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| ReviewError::Git {
            operation,
            message: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(ReviewError::Git {
            operation,
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Repository root containing `path`.
///
/// # Errors
///
/// Returns [`ReviewError::NotARepository`] outside a work tree.
pub async fn repo_root(path: &Path) -> Result<PathBuf, ReviewError> {
    let dir = if path.is_dir() {
        path
    } else {
        path.parent().unwrap_or(path)
    };
    run_git(dir, &["rev-parse", "--show-toplevel"], "rev-parse")
        .await
        .map(|out| PathBuf::from(out.trim()))
        .map_err(|_| ReviewError::NotARepository(path.display().to_string()))
}

/// Whether `name` resolves to a known ref, fetching once if it does not.
///
/// # Errors
///
/// Returns [`ReviewError::UnknownBranch`] when the ref stays unresolved.
pub async fn resolve_branch(repo: &Path, name: &str) -> Result<(), ReviewError> {
    if show_ref_exists(repo, name).await {
        return Ok(());
    }
    // One fetch attempt for branches that only exist on the remote.
    let _ = run_git(repo, &["fetch", "--quiet"], "fetch").await;
    if show_ref_exists(repo, name).await {
        return Ok(());
    }
    Err(ReviewError::UnknownBranch(name.to_string()))
}

async fn show_ref_exists(repo: &Path, name: &str) -> bool {
    run_git(repo, &["show-ref", "--verify", "--quiet", &format!("refs/heads/{name}")], "show-ref")
        .await
        .is_ok()
        || run_git(
            repo,
            &["show-ref", "--verify", "--quiet", &format!("refs/remotes/origin/{name}")],
            "show-ref",
        )
        .await
        .is_ok()
}

/// Names of files changed between `base...HEAD`.
///
/// # Errors
///
/// Returns [`ReviewError::Git`] when the diff fails.
pub async fn changed_file_names(repo: &Path, base: &str) -> Result<Vec<PathBuf>, ReviewError> {
    let range = format!("{base}...HEAD");
    let out = run_git(repo, &["diff", "--name-only", &range], "diff").await?;
    Ok(out
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(PathBuf::from)
        .collect())
}

/// Per-file diffs between `base...HEAD`.
///
/// # Errors
///
/// Returns [`ReviewError::Git`] when the diff fails.
pub async fn changed_files(repo: &Path, base: &str) -> Result<Vec<ChangedFile>, ReviewError> {
    let range = format!("{base}...HEAD");
    let out = run_git(repo, &["diff", &range], "diff").await?;
    Ok(split_diff_by_file(&out))
}

/// File content at a ref, for files deleted or moved on the branch.
///
/// # Errors
///
/// Returns [`ReviewError::Git`] when the object is missing.
pub async fn show_file_at(repo: &Path, reference: &str, path: &Path) -> Result<String, ReviewError> {
    let spec = format!("{reference}:{}", path.display());
    run_git(repo, &["show", &spec], "show").await
}

/// Split one unified diff into per-file sections.
fn split_diff_by_file(diff: &str) -> Vec<ChangedFile> {
    let mut files = Vec::new();
    let mut current_path: Option<PathBuf> = None;
    let mut current_lines: Vec<&str> = Vec::new();

    let flush = |path: Option<PathBuf>, lines: &mut Vec<&str>, out: &mut Vec<ChangedFile>| {
        if let Some(path) = path {
            out.push(ChangedFile {
                path,
                diff: lines.join("\n"),
            });
        }
        lines.clear();
    };

    for line in diff.lines() {
        if let Some(rest) = line.strip_prefix("diff --git ") {
            flush(current_path.take(), &mut current_lines, &mut files);
            // "a/src/x.rs b/src/x.rs" — take the b-side path.
            current_path = rest
                .rsplit(" b/")
                .next()
                .map(PathBuf::from);
        }
        current_lines.push(line);
    }
    flush(current_path, &mut current_lines, &mut files);
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("plain", "'plain'")]
    #[case("it's", r"'it'\''s'")]
    #[case("a;b|c&d`e", "'a;b|c&d`e'")]
    #[case("$(rm -rf /)", "'$(rm -rf /)'")]
    #[case("", "''")]
    fn quoting_produces_single_safe_argument(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(sh_quote(input), expected);
    }

    #[test]
    fn quoting_round_trips_through_a_shell() {
        // Feed the quoted form back through sh and compare byte-for-byte.
        let tricky = r#"a'b"c;d|e&f`g$(h)"#;
        let quoted = sh_quote(tricky);
        let output = std::process::Command::new("sh")
            .arg("-c")
            .arg(format!("printf %s {quoted}"))
            .output()
            .expect("sh should run");
        assert_eq!(String::from_utf8_lossy(&output.stdout), tricky);
    }

    #[test]
    fn diff_splits_per_file() {
        let diff = "diff --git a/src/a.rs b/src/a.rs\nindex 1..2 100644\n--- a/src/a.rs\n+++ b/src/a.rs\n@@ -1 +1 @@\n-old\n+new\ndiff --git a/docs/b.md b/docs/b.md\n--- a/docs/b.md\n+++ b/docs/b.md\n@@ -0,0 +1 @@\n+added\n";
        let files = split_diff_by_file(diff);
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].path, PathBuf::from("src/a.rs"));
        assert!(files[0].diff.contains("+new"));
        assert_eq!(files[1].path, PathBuf::from("docs/b.md"));
        assert!(files[1].diff.contains("+added"));
    }

    #[test]
    fn empty_diff_yields_no_files() {
        assert!(split_diff_by_file("").is_empty());
    }

    #[tokio::test]
    async fn repo_root_outside_repository_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let err = repo_root(tmp.path()).await.unwrap_err();
        assert!(matches!(err, ReviewError::NotARepository(_)));
    }

    #[tokio::test]
    async fn changed_files_between_commits() {
        let tmp = tempfile::tempdir().unwrap();
        let repo = tmp.path();
        let git = |args: &[&str]| {
            let args = args.iter().map(ToString::to_string).collect::<Vec<_>>();
            let repo = repo.to_path_buf();
            async move {
                tokio::process::Command::new("git")
                    .arg("-C")
                    .arg(&repo)
                    .args(&args)
                    .env("GIT_AUTHOR_NAME", "t")
                    .env("GIT_AUTHOR_EMAIL", "t@example.com")
                    .env("GIT_COMMITTER_NAME", "t")
                    .env("GIT_COMMITTER_EMAIL", "t@example.com")
                    .output()
                    .await
                    .map(|o| o.status.success())
                    .unwrap_or(false)
            }
        };

        if !git(&["init", "--quiet", "-b", "main"]).await {
            eprintln!("SKIP: git unavailable");
            return;
        }
        std::fs::write(repo.join("a.txt"), "one\n").unwrap();
        assert!(git(&["add", "."]).await);
        assert!(git(&["commit", "--quiet", "-m", "first"]).await);
        assert!(git(&["checkout", "--quiet", "-b", "feature"]).await);
        std::fs::write(repo.join("a.txt"), "two\n").unwrap();
        std::fs::write(repo.join("b.txt"), "new\n").unwrap();
        assert!(git(&["add", "."]).await);
        assert!(git(&["commit", "--quiet", "-m", "second"]).await);

        let names = changed_file_names(repo, "main").await.unwrap();
        assert_eq!(names.len(), 2);

        let files = changed_files(repo, "main").await.unwrap();
        assert_eq!(files.len(), 2);
        let a = files.iter().find(|f| f.path == Path::new("a.txt")).unwrap();
        assert!(a.diff.contains("+two"));

        let original = show_file_at(repo, "main", Path::new("a.txt")).await.unwrap();
        assert_eq!(original, "one\n");
    }
}
