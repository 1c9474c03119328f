//! Context classification for code under review and candidate documents.
//!
//! Code classification is purely keyword-driven. Document classification
//! first short-circuits on generic filenames (README and friends), then runs
//! the zero-shot classifier over the title, headings, and leading chunk
//! bodies; any classifier failure degrades to keyword extraction with an
//! unknown area. Document results are cached per absolute path with
//! coalescing so concurrent lookups share one classification.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex};

use regex::Regex;
use tokio::sync::OnceCell;

use rev_core::context::{Area, ContextTag, KEYWORD_VOCABULARY};
use rev_embeddings::Embedder;

use crate::zero_shot::{self, DOMAINS, TECHNOLOGIES};

/// Filenames that mark a document as general-purpose onboarding material.
static GENERIC_DOC_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(README|RUNBOOK|CONTRIBUTING|CHANGELOG|LICENSE|SETUP|INSTALL)(\.md|\.markdown|\.mdx)?$")
        .expect("generic doc pattern must compile")
});

/// Confidence floor for zero-shot labels.
const ZERO_SHOT_THRESHOLD: f64 = 0.5;

/// Leading chunk-body characters fed to the classifier.
const CHUNK_SAMPLE_CHARS: usize = 200;

/// Whether a document basename marks generic onboarding material.
#[must_use]
pub fn is_generic_doc_name(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| GENERIC_DOC_PATTERN.is_match(name))
}

/// Keywords from the fixed vocabulary present in `text`, deduplicated,
/// vocabulary order preserved.
#[must_use]
pub fn extract_keywords(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    KEYWORD_VOCABULARY
        .iter()
        .filter(|keyword| lower.contains(*keyword))
        .map(|keyword| (*keyword).to_string())
        .collect()
}

/// Infer a context tag for source code.
#[must_use]
pub fn infer_from_code(content: &str, language: &str) -> ContextTag {
    let keywords = extract_keywords(content);

    let (area, dominant_tech) = match language {
        "typescript" | "typescriptreact" | "javascript" | "javascriptreact" | "vue" | "svelte" => {
            infer_js_ts(content)
        }
        "python" => infer_python(content),
        _ => (Area::General, Vec::new()),
    };

    ContextTag {
        area,
        dominant_tech,
        is_readme_style: false,
        keywords,
    }
}

fn infer_js_ts(content: &str) -> (Area, Vec<String>) {
    let mut tech = Vec::new();

    if content.contains("from 'react'")
        || content.contains("from \"react\"")
        || content.contains("require('react')")
        || content.contains("require(\"react\")")
    {
        tech.push("React".to_string());
    }
    if content.contains("@angular/") {
        tech.push("Angular".to_string());
    }
    if content.contains("from 'vue'") || content.contains("from \"vue\"") {
        tech.push("Vue".to_string());
    }
    if !tech.is_empty() {
        return (Area::Frontend, tech);
    }

    let has_express = content.contains("require('express')")
        || content.contains("require(\"express\")")
        || content.contains("from 'express'")
        || content.contains("from \"express\"");
    let has_http_server =
        content.contains("http.createServer") || content.contains("createServer(");
    if has_express || has_http_server {
        let mut tech = vec!["Node.js".to_string()];
        if has_express {
            tech.push("Express".to_string());
        }
        return (Area::Backend, tech);
    }

    (Area::GeneralJsTs, Vec::new())
}

fn infer_python(content: &str) -> (Area, Vec<String>) {
    if content.contains("from django") || content.contains("import django") {
        return (Area::Backend, vec!["Django".to_string()]);
    }
    if content.contains("from flask") || content.contains("import flask") {
        return (Area::Backend, vec!["Flask".to_string()]);
    }
    if content.contains("from fastapi") || content.contains("import fastapi") {
        return (Area::Backend, vec!["FastAPI".to_string()]);
    }
    (Area::GeneralPython, Vec::new())
}

/// Map a winning domain label to an area, noting readme-style guides.
fn area_for_domain(label: &str) -> (Area, bool) {
    if label.contains("frontend") {
        (Area::Frontend, false)
    } else if label.contains("backend") {
        (Area::Backend, false)
    } else if label.contains("devops") {
        (Area::DevOps, false)
    } else if label.contains("tooling") {
        (Area::ToolingInternal, false)
    } else if label.contains("getting started") || label.contains("setup") {
        (Area::General, true)
    } else {
        (Area::Unknown, false)
    }
}

/// Infer a context tag for a markdown document.
///
/// `chunks` are `(heading, body)` pairs from the chunker.
pub async fn infer_from_document<E: Embedder>(
    embedder: &E,
    path: &Path,
    h1: &str,
    chunks: &[(String, String)],
) -> ContextTag {
    if h1.trim().is_empty() && chunks.iter().all(|(h, b)| h.trim().is_empty() && b.trim().is_empty())
    {
        return ContextTag::for_area(Area::Unknown);
    }

    if is_generic_doc_name(path) {
        return ContextTag {
            area: Area::General,
            dominant_tech: Vec::new(),
            is_readme_style: true,
            keywords: Vec::new(),
        };
    }

    let mut sample = String::from(h1);
    for (heading, body) in chunks {
        sample.push('\n');
        sample.push_str(heading);
        sample.push('\n');
        let body_sample: String = body.chars().take(CHUNK_SAMPLE_CHARS).collect();
        sample.push_str(&body_sample);
    }

    let domains = zero_shot::classify(embedder, &sample, DOMAINS, ZERO_SHOT_THRESHOLD).await;
    let technologies =
        zero_shot::classify(embedder, &sample, TECHNOLOGIES, ZERO_SHOT_THRESHOLD).await;

    let mut tag = match (domains, technologies) {
        (Ok(domains), Ok(technologies)) => {
            let (area, is_readme_style, confident) = domains.first().map_or(
                (Area::Unknown, false, false),
                |top| {
                    let (area, readme) = area_for_domain(&top.label);
                    (area, readme, top.score >= 0.6)
                },
            );
            let tag = ContextTag {
                area,
                dominant_tech: technologies.into_iter().map(|s| s.label).collect(),
                is_readme_style,
                keywords: extract_keywords(&sample),
            };
            apply_path_hints(tag, path, confident)
        }
        (domains, technologies) => {
            if let Err(error) = domains.as_ref().and(technologies.as_ref()) {
                tracing::warn!(path = %path.display(), %error, "zero-shot classification failed, using keywords");
            }
            let tag = ContextTag {
                area: Area::Unknown,
                dominant_tech: Vec::new(),
                is_readme_style: false,
                keywords: extract_keywords(&sample),
            };
            apply_path_hints(tag, path, false)
        }
    };

    tag.dominant_tech.truncate(3);
    tag
}

/// Path hints override weak classifications.
fn apply_path_hints(mut tag: ContextTag, path: &Path, confident: bool) -> ContextTag {
    let normalized = path.to_string_lossy().replace('\\', "/");
    if !confident
        && (normalized.contains("/tools/") || normalized.contains("/scripts/"))
    {
        tag.area = Area::ToolingInternal;
    }
    tag
}

/// Per-process document context cache with in-flight coalescing.
///
/// The map holds one `OnceCell` per resolved document path; concurrent
/// callers share the first caller's in-flight classification instead of
/// racing duplicate classifier calls.
#[derive(Debug, Default)]
pub struct DocumentContextCache {
    cells: Mutex<HashMap<PathBuf, Arc<OnceCell<ContextTag>>>>,
}

impl DocumentContextCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached context for `path`, computing it at most once per process.
    pub async fn get_or_infer<F, Fut>(&self, path: &Path, infer: F) -> ContextTag
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ContextTag>,
    {
        let cell = {
            let mut cells = match self.cells.lock() {
                Ok(cells) => cells,
                Err(poisoned) => poisoned.into_inner(),
            };
            Arc::clone(cells.entry(path.to_path_buf()).or_default())
        };
        cell.get_or_init(infer).await.clone()
    }

    /// Drop all cached contexts.
    pub fn clear(&self) {
        if let Ok(mut cells) = self.cells.lock() {
            cells.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn react_imports_mean_frontend() {
        let tag = infer_from_code("import React from 'react';\nfunction Button() {}", "typescriptreact");
        assert_eq!(tag.area, Area::Frontend);
        assert_eq!(tag.dominant_tech, vec!["React".to_string()]);
    }

    #[test]
    fn express_means_node_backend() {
        let tag = infer_from_code(
            "const express = require('express');\nconst app = express();",
            "javascript",
        );
        assert_eq!(tag.area, Area::Backend);
        assert!(tag.dominant_tech.contains(&"Node.js".to_string()));
        assert!(tag.dominant_tech.contains(&"Express".to_string()));
    }

    #[test]
    fn plain_js_is_general() {
        let tag = infer_from_code("const add = (a, b) => a + b;", "javascript");
        assert_eq!(tag.area, Area::GeneralJsTs);
        assert!(tag.dominant_tech.is_empty());
    }

    #[test]
    fn django_imports_mean_backend() {
        let tag = infer_from_code("from django.db import models", "python");
        assert_eq!(tag.area, Area::Backend);
        assert_eq!(tag.dominant_tech, vec!["Django".to_string()]);
    }

    #[test]
    fn plain_python_is_general_python() {
        let tag = infer_from_code("def add(a, b):\n    return a + b", "python");
        assert_eq!(tag.area, Area::GeneralPython);
    }

    #[test]
    fn keywords_come_from_vocabulary_in_order() {
        let keywords = extract_keywords("the service hits an endpoint in the api");
        assert_eq!(keywords, vec!["api", "service", "endpoint"]);
    }

    #[rstest]
    #[case("README.md", true)]
    #[case("readme.md", true)]
    #[case("CONTRIBUTING", true)]
    #[case("CHANGELOG.md", true)]
    #[case("RUNBOOK.md", true)]
    #[case("react-guide.md", false)]
    #[case("docs.md", false)]
    fn generic_doc_names(#[case] name: &str, #[case] expected: bool) {
        assert_eq!(is_generic_doc_name(Path::new(name)), expected);
    }

    #[test]
    fn generic_name_nested_in_docs_still_matches() {
        assert!(is_generic_doc_name(Path::new("docs/setup/README.md")));
    }

    #[tokio::test]
    async fn document_cache_computes_once_per_path() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let cache = DocumentContextCache::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let tag = cache
                .get_or_infer(Path::new("/repo/docs/guide.md"), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    ContextTag::for_area(Area::Frontend)
                })
                .await;
            assert_eq!(tag.area, Area::Frontend);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // A different path classifies independently.
        cache
            .get_or_infer(Path::new("/repo/docs/other.md"), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                ContextTag::for_area(Area::Backend)
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
