//! CLI for depforward.
//!
//! Sanitizes and forwards bot-opened dependency update pull requests from
//! forks to the upstream project.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use depforward::{RunConfig, RunSummary, Runner, RunnerError, DEFAULT_CONCURRENCY};
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Forward dependency update pull requests from forks to upstream.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// GitHub Personal Access Token.
    #[arg(long, env = "GITHUB_TOKEN")]
    token: String,

    /// Login of the account that owns the forks.
    #[arg(long, env = "GITHUB_USER")]
    user: String,

    /// The upstream organization forks are derived from.
    #[arg(long)]
    upstream_org: String,

    /// Compute statuses and actions without executing them.
    #[arg(long)]
    dry_run: bool,

    /// Request recreation when a pull request reports no checks at all.
    #[arg(long)]
    recreate_missing_checks: bool,

    /// Number of concurrent workers.
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Label that identifies managed pull requests.
    #[arg(long)]
    managed_label: Option<String>,

    /// Script to run on pull requests with failing checks.
    #[arg(long)]
    script: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let args = Args::parse();

    match run(args).await {
        Ok(summary) => {
            print_summary(&summary);
            if summary.has_failures() {
                ExitCode::from(1)
            } else {
                ExitCode::from(0)
            }
        }
        Err(e) => {
            error!(error = %e, "Critical failure");
            ExitCode::from(2)
        }
    }
}

/// Initializes tracing with environment filter support.
///
/// Compact single-line output, filterable at runtime via `RUST_LOG`
/// (defaults to "info").
fn init_tracing() {
    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

/// Main execution logic.
async fn run(args: Args) -> Result<RunSummary, RunnerError> {
    let mut config = RunConfig::new(args.user, args.upstream_org, args.token)
        .with_dry_run(args.dry_run)
        .with_recreate_missing(args.recreate_missing_checks)
        .with_concurrency(args.concurrency)
        .with_update_script(args.script);
    if let Some(label) = args.managed_label {
        config = config.with_managed_label(label);
    }

    let runner = Runner::new(config)?;

    // Ctrl-C cancels the run between queue drains; in-flight handles finish.
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing in-flight pull requests");
            signal_cancel.cancel();
        }
    });

    runner.run(cancel).await
}

/// Prints the final run summary.
fn print_summary(summary: &RunSummary) {
    println!("\nSummary:");
    println!(
        "  Mode: {}",
        if summary.dry_run { "Dry Run" } else { "Live" }
    );
    println!("  Forks discovered: {}", summary.forks_discovered);
    println!("  PRs processed: {}", summary.prs_processed);
    println!("  PRs failed: {}", summary.prs_failed);
    println!(
        "  Recreations requested: {}",
        summary.recreations_requested
    );
    println!("  Update scripts run: {}", summary.scripts_run);
    println!("  Submitted upstream: {}", summary.upstream_submitted);
}
