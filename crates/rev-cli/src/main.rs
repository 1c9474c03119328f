use clap::Parser;

mod cli;
mod commands;
mod context;
mod output;
mod progress;

/// Hard deadline for cleanup after a termination signal.
const SHUTDOWN_GRACE: std::time::Duration = std::time::Duration::from_secs(10);

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("rvw error: {error:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let parsed = cli::Cli::parse();
    init_tracing(parsed.quiet, parsed.verbose)?;

    // Commands that never touch the store or the model.
    match &parsed.command {
        cli::Commands::Embeddings(cli::EmbeddingsCommands::Clear { directory }) => {
            return commands::embeddings::clear(directory.as_deref()).await;
        }
        cli::Commands::Embeddings(cli::EmbeddingsCommands::ClearAll) => {
            return commands::embeddings::clear_all().await;
        }
        cli::Commands::Embeddings(cli::EmbeddingsCommands::Stats { directory }) => {
            return commands::embeddings::stats(directory.as_deref()).await;
        }
        _ => {}
    }

    let directory = command_directory(&parsed.command);
    let project_root = context::resolve_project_root(directory)?;
    let ctx = context::AppContext::init(project_root, parsed.verbose).await?;

    let work = dispatch(&parsed, &ctx);
    tokio::pin!(work);

    let result = tokio::select! {
        result = &mut work => result,
        () = shutdown_signal() => {
            tracing::warn!("termination signal received, cleaning up");
            let cleanup = async { ctx.cleanup() };
            if tokio::time::timeout(SHUTDOWN_GRACE, cleanup).await.is_err() {
                tracing::error!("cleanup exceeded its deadline, forcing exit");
            }
            std::process::exit(1);
        }
    };

    ctx.cleanup();
    result
}

async fn dispatch(parsed: &cli::Cli, ctx: &context::AppContext) -> anyhow::Result<()> {
    match &parsed.command {
        cli::Commands::Analyze(args) => commands::analyze::handle(args, ctx, parsed.quiet).await,
        cli::Commands::Embeddings(cli::EmbeddingsCommands::Generate(args)) => {
            commands::embeddings::generate(args, ctx, parsed.quiet).await
        }
        cli::Commands::Embeddings(_) => unreachable!("handled before context init"),
        cli::Commands::PrHistory(cli::PrHistoryCommands::Analyze(args)) => {
            commands::pr_history::analyze(args, ctx, parsed.quiet).await
        }
        cli::Commands::PrHistory(cli::PrHistoryCommands::Status { repository }) => {
            commands::pr_history::status(repository, ctx).await
        }
        cli::Commands::PrHistory(cli::PrHistoryCommands::Clear { repository, force }) => {
            commands::pr_history::clear(repository, *force, ctx).await
        }
    }
}

/// The `--directory` flag of whichever subcommand is running.
fn command_directory(command: &cli::Commands) -> Option<&str> {
    match command {
        cli::Commands::Analyze(args) => args.directory.as_deref(),
        cli::Commands::Embeddings(cli::EmbeddingsCommands::Generate(args)) => {
            args.directory.as_deref()
        }
        cli::Commands::PrHistory(cli::PrHistoryCommands::Analyze(args)) => {
            args.directory.as_deref()
        }
        cli::Commands::Embeddings(_) | cli::Commands::PrHistory(_) => None,
    }
}

fn init_tracing(quiet: bool, verbose: bool) -> anyhow::Result<()> {
    let debug_env = std::env::var("DEBUG").is_ok_and(|v| !v.is_empty())
        || std::env::var("VERBOSE").is_ok_and(|v| !v.is_empty());
    let level = if quiet {
        "error"
    } else if verbose || debug_env {
        "debug"
    } else {
        "warn"
    };

    let filter = tracing_subscriber::EnvFilter::try_from_env("REVERIE_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(())
}

/// Resolves when SIGINT or SIGTERM arrives.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(signal) => signal,
            Err(error) => {
                tracing::warn!(%error, "failed to install SIGTERM handler");
                let _ = ctrl_c.await;
                return;
            }
        };
        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}
