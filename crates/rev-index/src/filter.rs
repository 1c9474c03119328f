//! File acceptance pipeline for the indexer.
//!
//! A file is indexed only when every stage accepts it: size cap, binary
//! extension set, skipped directory components, basename skip-list, regex
//! skip patterns, and user-supplied exclude globs. Gitignore filtering is a
//! separate batched stage (see [`crate::gitignore`]).

use std::path::Path;
use std::sync::LazyLock;

use globset::{Glob, GlobSet, GlobSetBuilder};
use regex::Regex;

use crate::error::IndexError;

/// Files larger than this are never indexed.
pub const MAX_FILE_SIZE: u64 = 1024 * 1024;

/// Documentation files get a larger cap before chunking.
pub const MAX_DOC_SIZE: u64 = 5 * 1024 * 1024;

/// Extensions that mark a file as binary.
const BINARY_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "ico", "svg", "webp", "pdf", "zip", "tar", "gz", "bz2", "7z",
    "exe", "dll", "so", "dylib", "a", "o", "wasm", "class", "jar", "woff", "woff2", "ttf", "eot",
    "otf", "mp3", "mp4", "avi", "mov", "webm", "sqlite", "db", "bin", "dat", "lock",
];

/// Directory components that are never traversed.
const SKIP_DIRS: &[&str] = &["node_modules", "dist", "build", ".git", "coverage", "vendor"];

/// Lock, manifest, and tooling-config basenames that carry no review signal.
const SKIP_BASENAMES: &[&str] = &[
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "Cargo.lock",
    "composer.lock",
    "Gemfile.lock",
    "poetry.lock",
    "go.sum",
    ".DS_Store",
    ".gitattributes",
    ".editorconfig",
    ".prettierignore",
    ".eslintignore",
    ".npmignore",
    ".dockerignore",
];

/// Filename patterns that are skipped: minified bundles, type declaration
/// files, dotfile run-control configs, and generated tool configs.
static SKIP_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\.min\.(js|css)$",
        r"\.d\.ts$",
        r"^\..*rc$",
        r"^\..*rc\.(js|cjs|json|ya?ml)$",
        r"\.config\.(js|cjs|mjs|ts)$",
        r"\.snap$",
        r"\.map$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("skip pattern must compile"))
    .collect()
});

/// Default extensions indexed when the caller supplies no patterns.
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    "ts", "tsx", "js", "jsx", "mjs", "cjs", "py", "rs", "go", "java", "kt", "rb", "php", "c", "h",
    "cc", "cpp", "hpp", "cs", "swift", "scala", "vue", "svelte", "sql", "sh", "md", "markdown",
    "mdx",
];

/// Why a file was rejected. Only used for progress reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExcludeReason {
    TooLarge,
    BinaryExtension,
    SkippedDirectory,
    SkippedBasename,
    SkipPattern,
    UserExclude,
    UnmatchedExtension,
    Gitignored,
}

/// Compiled user exclusion globs, matched with `dot` semantics.
#[derive(Debug)]
pub struct ExcludeGlobs {
    set: GlobSet,
    empty: bool,
}

impl ExcludeGlobs {
    /// Compile user-supplied glob patterns.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::InvalidPattern`] for a malformed glob.
    pub fn compile(patterns: &[String]) -> Result<Self, IndexError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = Glob::new(pattern)
                .map_err(|e| IndexError::InvalidPattern(format!("{pattern}: {e}")))?;
            builder.add(glob);
        }
        let set = builder
            .build()
            .map_err(|e| IndexError::InvalidPattern(e.to_string()))?;
        Ok(Self {
            set,
            empty: patterns.is_empty(),
        })
    }

    /// Whether `rel_path` matches any exclusion glob.
    #[must_use]
    pub fn matches(&self, rel_path: &Path) -> bool {
        !self.empty && self.set.is_match(rel_path)
    }
}

/// Run the static acceptance stages (everything except gitignore).
///
/// `rel_path` is the path relative to the project root; `size` the on-disk
/// byte size. Returns `Some(reason)` when the file must be skipped.
#[must_use]
pub fn exclusion_reason(
    rel_path: &Path,
    size: u64,
    excludes: &ExcludeGlobs,
) -> Option<ExcludeReason> {
    let is_doc = rev_core::language::is_documentation_file(rel_path);
    let cap = if is_doc { MAX_DOC_SIZE } else { MAX_FILE_SIZE };
    if size > cap {
        return Some(ExcludeReason::TooLarge);
    }

    let extension = rel_path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    if let Some(ext) = &extension
        && BINARY_EXTENSIONS.contains(&ext.as_str())
    {
        return Some(ExcludeReason::BinaryExtension);
    }

    for component in rel_path.components() {
        if let std::path::Component::Normal(name) = component
            && let Some(name) = name.to_str()
            && SKIP_DIRS.contains(&name)
        {
            return Some(ExcludeReason::SkippedDirectory);
        }
    }

    let basename = rel_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    if SKIP_BASENAMES.contains(&basename) {
        return Some(ExcludeReason::SkippedBasename);
    }
    if SKIP_PATTERNS.iter().any(|p| p.is_match(basename)) {
        return Some(ExcludeReason::SkipPattern);
    }

    if excludes.matches(rel_path) {
        return Some(ExcludeReason::UserExclude);
    }

    None
}

/// Whether a file matches the default indexable extension set.
#[must_use]
pub fn has_default_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            let lower = ext.to_ascii_lowercase();
            DEFAULT_EXTENSIONS.contains(&lower.as_str())
        })
}
