//! Language detection and path classification helpers.

use std::path::Path;

/// Map a file extension to a language name, or `None` for unknown.
#[must_use]
pub fn language_from_extension(ext: &str) -> Option<&'static str> {
    let language = match ext.to_ascii_lowercase().as_str() {
        "ts" | "mts" | "cts" => "typescript",
        "tsx" => "typescriptreact",
        "js" | "mjs" | "cjs" => "javascript",
        "jsx" => "javascriptreact",
        "py" | "pyi" => "python",
        "rs" => "rust",
        "go" => "go",
        "java" => "java",
        "kt" | "kts" => "kotlin",
        "rb" => "ruby",
        "php" => "php",
        "c" | "h" => "c",
        "cc" | "cpp" | "cxx" | "hpp" => "cpp",
        "cs" => "csharp",
        "swift" => "swift",
        "scala" => "scala",
        "sh" | "bash" => "shell",
        "sql" => "sql",
        "yaml" | "yml" => "yaml",
        "json" => "json",
        "toml" => "toml",
        "md" | "markdown" | "mdx" => "markdown",
        "html" | "htm" => "html",
        "css" => "css",
        "scss" | "sass" => "scss",
        "vue" => "vue",
        "svelte" => "svelte",
        _ => return None,
    };
    Some(language)
}

/// Language for a path, defaulting to `"plaintext"`.
#[must_use]
pub fn language_for_path(path: &Path) -> &'static str {
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(language_from_extension)
        .unwrap_or("plaintext")
}

/// Whether a path is a markdown documentation file.
#[must_use]
pub fn is_documentation_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| matches!(e.to_ascii_lowercase().as_str(), "md" | "markdown" | "mdx"))
}

/// Whether a path looks like a test file.
///
/// Recognized markers: `.test.`, `.spec.` in the filename, or a
/// `__tests__/` path component.
#[must_use]
pub fn is_test_path(path: &str) -> bool {
    let normalized = path.replace('\\', "/");
    if normalized.contains("__tests__/") {
        return true;
    }
    normalized
        .rsplit('/')
        .next()
        .is_some_and(|name| name.contains(".test.") || name.contains(".spec."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("tsx", Some("typescriptreact"))]
    #[case("py", Some("python"))]
    #[case("rs", Some("rust"))]
    #[case("md", Some("markdown"))]
    #[case("exe", None)]
    fn extension_mapping(#[case] ext: &str, #[case] expected: Option<&str>) {
        assert_eq!(language_from_extension(ext), expected);
    }

    #[test]
    fn unknown_extension_defaults_to_plaintext() {
        assert_eq!(language_for_path(Path::new("data.bin")), "plaintext");
        assert_eq!(language_for_path(Path::new("Makefile")), "plaintext");
    }

    #[test]
    fn documentation_detection() {
        assert!(is_documentation_file(Path::new("docs/guide.md")));
        assert!(is_documentation_file(Path::new("README.MD")));
        assert!(!is_documentation_file(Path::new("src/main.rs")));
    }

    #[rstest]
    #[case("src/app.test.ts", true)]
    #[case("src/app.spec.js", true)]
    #[case("src/__tests__/app.ts", true)]
    #[case("src/app.ts", false)]
    #[case("src/testing/helpers.ts", false)]
    fn test_path_detection(#[case] path: &str, #[case] expected: bool) {
        assert_eq!(is_test_path(path), expected);
    }
}
