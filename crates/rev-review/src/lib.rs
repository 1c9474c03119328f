//! # rev-review
//!
//! Review orchestration for Reverie: the three-channel retrieval fan-out,
//! prompt assembly, the LLM boundary, response parsing, the git subprocess
//! boundary, and PR-history ingestion.

pub mod comments;
pub mod error;
pub mod git;
pub mod llm;
pub mod orchestrator;
pub mod parse;
pub mod pr_review;
pub mod prompt;

pub use error::ReviewError;
pub use git::{ChangedFile, sh_quote};
pub use llm::{AnthropicClient, Completion, CompletionRequest, LlmClient};
pub use orchestrator::{FileReview, GatheredContext, Orchestrator, PinnedDoc, ReviewFile};
pub use parse::{ReviewIssue, ReviewReport, parse_review_response};
pub use pr_review::{BranchReview, MergedContext};
