//! Context tags attached to code under review and candidate documents.

use serde::{Deserialize, Serialize};

/// Broad functional area inferred for a piece of code or a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Area {
    Frontend,
    Backend,
    DevOps,
    ToolingInternal,
    GeneralJsTs,
    GeneralPython,
    General,
    Unknown,
}

impl Area {
    /// Areas too vague to support an area-match bonus or penalty.
    #[must_use]
    pub const fn is_generic(self) -> bool {
        matches!(self, Self::General | Self::Unknown)
    }

    /// Human-readable label for prompts and output.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Frontend => "frontend",
            Self::Backend => "backend",
            Self::DevOps => "devops",
            Self::ToolingInternal => "internal tooling",
            Self::GeneralJsTs => "JavaScript/TypeScript",
            Self::GeneralPython => "Python",
            Self::General => "general",
            Self::Unknown => "unknown",
        }
    }
}

/// Classifier output: `{area, dominant_tech, is_readme_style, keywords}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextTag {
    pub area: Area,
    /// Ordered set of short technology names (e.g. "React", "Express").
    pub dominant_tech: Vec<String>,
    /// Whether the source is general-purpose onboarding material.
    pub is_readme_style: bool,
    /// Small deduplicated keyword list drawn from [`KEYWORD_VOCABULARY`].
    pub keywords: Vec<String>,
}

impl ContextTag {
    /// A tag with the given area and nothing else.
    #[must_use]
    pub const fn for_area(area: Area) -> Self {
        Self {
            area,
            dominant_tech: Vec::new(),
            is_readme_style: false,
            keywords: Vec::new(),
        }
    }

    /// Case-insensitive technology overlap with another tag.
    #[must_use]
    pub fn shares_tech_with(&self, other: &Self) -> bool {
        self.dominant_tech.iter().any(|mine| {
            other
                .dominant_tech
                .iter()
                .any(|theirs| mine.eq_ignore_ascii_case(theirs))
        })
    }
}

impl Default for ContextTag {
    fn default() -> Self {
        Self::for_area(Area::Unknown)
    }
}

/// Fixed vocabulary the keyword extractor draws from.
pub const KEYWORD_VOCABULARY: &[&str] = &[
    "api",
    "component",
    "class",
    "function",
    "props",
    "hook",
    "service",
    "endpoint",
    "route",
    "handler",
    "middleware",
    "model",
    "schema",
    "query",
    "mutation",
    "test",
    "config",
    "auth",
    "cache",
    "queue",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generic_areas() {
        assert!(Area::General.is_generic());
        assert!(Area::Unknown.is_generic());
        assert!(!Area::Frontend.is_generic());
        assert!(!Area::GeneralJsTs.is_generic());
    }

    #[test]
    fn tech_overlap_is_case_insensitive() {
        let a = ContextTag {
            dominant_tech: vec!["React".to_string()],
            ..ContextTag::for_area(Area::Frontend)
        };
        let b = ContextTag {
            dominant_tech: vec!["react".to_string(), "Vite".to_string()],
            ..ContextTag::for_area(Area::Frontend)
        };
        assert!(a.shares_tech_with(&b));
        assert!(b.shares_tech_with(&a));
    }

    #[test]
    fn no_overlap_without_shared_tech() {
        let a = ContextTag {
            dominant_tech: vec!["Django".to_string()],
            ..ContextTag::for_area(Area::Backend)
        };
        let b = ContextTag::for_area(Area::Backend);
        assert!(!a.shares_tech_with(&b));
    }
}
