//! land-stack - Land a stack of commits as individual pull requests

mod cli;

use anyhow::Result;
use clap::Parser;
use cli::LandOptions;
use cli::style::Stylize;
use land_stack::error::{EXIT_FAILURE, Error};
use land_stack::types::MergeMode;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Land a stack of local commits as individual, sequentially merged pull requests
#[derive(Parser, Debug)]
#[command(name = "land-stack", version, about, long_about = None)]
#[allow(clippy::struct_excessive_bools)]
struct Cli {
    /// Commits to land, in order (default: every commit ahead of the base)
    #[arg(value_name = "COMMIT")]
    commits: Vec<String>,

    /// Base branch the PRs target
    #[arg(long, value_name = "BRANCH")]
    base: Option<String>,

    /// Remote temp branches are pushed to
    #[arg(long, value_name = "REMOTE")]
    remote: Option<String>,

    /// Remote that owns the base branch
    #[arg(long, value_name = "REMOTE")]
    upstream_remote: Option<String>,

    /// Temp branch prefix (default: your GitHub login, else "dev/")
    #[arg(long)]
    prefix: Option<String>,

    /// Open PRs as drafts (requires --no-merge)
    #[arg(long)]
    draft: bool,

    /// Open the PR but do not merge it
    #[arg(long, conflicts_with = "auto_merge")]
    no_merge: bool,

    /// Enable auto-merge on the PR instead of waiting for it
    #[arg(long)]
    auto_merge: bool,

    /// Open every PR up front, each based on the previous one
    #[arg(long)]
    chain: bool,

    /// Print what would be done without doing it
    #[arg(long)]
    dry_run: bool,

    /// Force-push temp branches
    #[arg(short, long)]
    force: bool,

    /// Seconds between mergeability checks
    #[arg(long, value_name = "SECS")]
    poll_interval: Option<u64>,

    /// Maximum number of mergeability checks per PR
    #[arg(long, value_name = "N")]
    max_polls: Option<u32>,

    /// Show the plan and ask before landing
    #[arg(long)]
    confirm: bool,

    /// Log debug output
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only print errors
    #[arg(short, long)]
    quiet: bool,

    /// Run as if started in this directory
    #[arg(short = 'C', long, value_name = "DIR", default_value = ".")]
    path: PathBuf,
}

impl Cli {
    fn merge_mode(&self) -> MergeMode {
        if self.no_merge {
            MergeMode::NoMerge
        } else if self.auto_merge {
            MergeMode::AutoMerge
        } else {
            MergeMode::Merge
        }
    }

    fn into_options(self) -> (PathBuf, LandOptions) {
        let merge_mode = self.merge_mode();
        let options = LandOptions {
            base: self.base,
            remote: self.remote,
            upstream_remote: self.upstream_remote,
            prefix: self.prefix,
            draft: self.draft,
            merge_mode,
            chain: self.chain,
            dry_run: self.dry_run,
            force: self.force,
            poll_interval: self.poll_interval,
            max_polls: self.max_polls,
            confirm: self.confirm,
            quiet: self.quiet,
            commits: self.commits,
        };
        (self.path, options)
    }
}

/// `-v` enables debug logs for this crate; `RUST_LOG` wins when set
fn init_logging(verbose: bool) {
    let default = if verbose { "land_stack=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let (path, options) = cli.into_options();
    cli::run_land(&path, options).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            anstream::eprintln!("{} {err:#}", "error:".error());
            let code = err
                .downcast_ref::<Error>()
                .map_or(EXIT_FAILURE, Error::exit_code);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}
