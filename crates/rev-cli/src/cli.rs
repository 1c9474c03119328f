//! Command-line definition for the `rvw` binary.

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Output rendering for review results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Markdown,
}

/// Top-level CLI parser for the `rvw` binary.
#[derive(Debug, Parser)]
#[command(name = "rvw", version, about = "Reverie - retrieval-augmented code review")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Quiet mode (suppress non-essential output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose mode (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Review a file, a set of files, or a branch diff
    Analyze(AnalyzeArgs),

    /// Manage project embeddings
    #[command(subcommand)]
    Embeddings(EmbeddingsCommands),

    /// Manage historical PR review comments
    #[command(subcommand, name = "pr-history")]
    PrHistory(PrHistoryCommands),
}

#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    /// Single file to review
    #[arg(short, long, conflicts_with_all = ["files", "diff_with"])]
    pub file: Option<String>,

    /// Glob patterns of files to review
    #[arg(long, num_args = 1.., conflicts_with = "diff_with")]
    pub files: Vec<String>,

    /// Review files changed relative to this branch
    #[arg(long)]
    pub diff_with: Option<String>,

    /// Project directory (defaults to the current directory)
    #[arg(short, long)]
    pub directory: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Model override
    #[arg(short, long)]
    pub model: Option<String>,

    /// Sampling temperature override
    #[arg(short, long)]
    pub temperature: Option<f64>,

    /// Response token budget override
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Similarity threshold for code examples
    #[arg(long)]
    pub similarity_threshold: Option<f64>,

    /// Maximum code examples in the prompt
    #[arg(long)]
    pub max_examples: Option<usize>,

    /// Parallel review workers for multi-file modes
    #[arg(short, long)]
    pub concurrency: Option<usize>,

    /// Pin a document into the guideline channel ("Title:path")
    #[arg(long = "doc", value_name = "TITLE:PATH")]
    pub docs: Vec<String>,
}

#[derive(Debug, Subcommand)]
pub enum EmbeddingsCommands {
    /// Index the project into the vector store
    Generate(GenerateArgs),

    /// Remove one project's embeddings
    Clear {
        /// Project directory (defaults to the current directory)
        #[arg(short, long)]
        directory: Option<String>,
    },

    /// Remove embeddings for every project
    ClearAll,

    /// Show table counts and indexed projects
    Stats {
        /// Project directory (defaults to the current directory)
        #[arg(short, long)]
        directory: Option<String>,
    },
}

#[derive(Debug, Args)]
pub struct GenerateArgs {
    /// Project directory (defaults to the current directory)
    #[arg(short, long)]
    pub directory: Option<String>,

    /// Explicit file globs instead of the default extension set
    #[arg(long, num_args = 1..)]
    pub files: Vec<String>,

    /// Parallel file processors
    #[arg(short, long)]
    pub concurrency: Option<usize>,

    /// Exclude globs
    #[arg(short, long, num_args = 1..)]
    pub exclude: Vec<String>,

    /// File of exclude globs, one per line
    #[arg(long)]
    pub exclude_file: Option<String>,

    /// Do not consult git check-ignore
    #[arg(long)]
    pub no_gitignore: bool,

    /// Truncate code files to this many lines
    #[arg(long)]
    pub max_lines: Option<usize>,
}

#[derive(Debug, Subcommand)]
pub enum PrHistoryCommands {
    /// Fetch and index historical review comments
    Analyze(PrHistoryArgs),

    /// Show ingestion progress
    Status {
        /// Repository as OWNER/REPO
        #[arg(short, long)]
        repository: String,
    },

    /// Remove ingested comments and progress
    Clear {
        /// Repository as OWNER/REPO
        #[arg(short, long)]
        repository: String,

        /// Also remove persisted progress state
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Args)]
pub struct PrHistoryArgs {
    /// Repository as OWNER/REPO
    #[arg(short, long)]
    pub repository: String,

    /// GitHub token override (defaults to GITHUB_TOKEN / GH_TOKEN)
    #[arg(long)]
    pub token: Option<String>,

    /// Keep comments created at or after this ISO-8601 instant
    #[arg(long)]
    pub since: Option<String>,

    /// Keep comments created at or before this ISO-8601 instant
    #[arg(long)]
    pub until: Option<String>,

    /// Stop after this many comments
    #[arg(long)]
    pub limit: Option<usize>,

    /// Resume from the last completed page
    #[arg(long)]
    pub resume: bool,

    /// Project directory the comments should be scoped to
    #[arg(short, long)]
    pub directory: Option<String>,
}
