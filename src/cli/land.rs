//! Land command - turn the stack into PRs and merge them in order

use crate::cli::CliProgress;
use crate::cli::context::CommandContext;
use crate::cli::style::{CHECK, Stylize, arrow, hyperlink};
use anstream::println;
use dialoguer::Confirm;
use land_stack::config::LandConfig;
use land_stack::error::{Error, Result};
use land_stack::land::{Lander, LandingOutcome, PrOutcome};
use land_stack::stack;
use land_stack::types::{LandingMode, LandingPlan, MergeMode};
use std::path::Path;

/// Options for the land command
#[derive(Debug, Clone, Default)]
#[allow(clippy::struct_excessive_bools)]
pub struct LandOptions {
    /// Base branch override
    pub base: Option<String>,
    /// Fork remote override
    pub remote: Option<String>,
    /// Upstream remote override
    pub upstream_remote: Option<String>,
    /// Branch prefix override
    pub prefix: Option<String>,
    /// Open PRs as drafts
    pub draft: bool,
    /// What to do with each PR
    pub merge_mode: MergeMode,
    /// Chain PRs instead of landing one at a time
    pub chain: bool,
    /// Print operations instead of running them
    pub dry_run: bool,
    /// Force-push temp branches
    pub force: bool,
    /// Seconds between mergeability polls
    pub poll_interval: Option<u64>,
    /// Maximum mergeability polls
    pub max_polls: Option<u32>,
    /// Preview the plan and prompt before landing
    pub confirm: bool,
    /// Suppress progress output
    pub quiet: bool,
    /// Explicit commits to land
    pub commits: Vec<String>,
}

/// Run the land command
pub async fn run_land(path: &Path, options: LandOptions) -> Result<()> {
    let ctx = CommandContext::new(path, &options).await?;
    let config = &ctx.config;

    if options.confirm && !config.dry_run {
        let plan = match stack::enumerate(
            ctx.git.as_ref(),
            &config.upstream_ref(),
            &config.explicit_commits,
        ) {
            Ok(plan) => plan,
            Err(Error::EmptyStack) => {
                report_empty(config);
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        print_plan(config, &plan);
        if !Confirm::new()
            .with_prompt("Proceed?")
            .default(true)
            .interact()
            .map_err(|e| Error::Internal(format!("Failed to read confirmation: {e}")))?
        {
            println!("{}", "Aborted".muted());
            return Ok(());
        }
        println!();
    }

    if !options.quiet {
        println!(
            "{} {} {} {}",
            "Landing onto".emphasis(),
            config.upstream_ref().accent(),
            format!("as {}", ctx.upstream.slug()).muted(),
            format!("({}, {})", config.landing_mode, config.merge_mode).muted()
        );
    }

    let progress = if options.quiet {
        CliProgress::quiet()
    } else {
        CliProgress::new()
    };
    let lander = Lander::new(ctx.git.as_ref(), ctx.platform.as_ref(), config)
        .with_fork(&ctx.fork)
        .with_progress(&progress);

    match lander.run().await {
        Ok(outcome) => {
            if !options.quiet {
                print_summary(config, &outcome);
            }
            Ok(())
        }
        Err(Error::EmptyStack) => {
            if !options.quiet {
                report_empty(config);
            }
            Ok(())
        }
        Err(e) => Err(e),
    }
}

fn report_empty(config: &LandConfig) {
    println!(
        "{}",
        format!("Nothing to land: no commits ahead of {}", config.upstream_ref()).muted()
    );
}

/// Print the plan for --confirm
fn print_plan(config: &LandConfig, plan: &LandingPlan) {
    println!("{}:", "Landing plan".emphasis());
    println!();
    for commit in &plan.commits {
        println!(
            "  {} {} {}",
            arrow(),
            commit.short_id().accent(),
            commit.title
        );
    }
    println!();

    let what = match (config.landing_mode, config.merge_mode) {
        (_, MergeMode::NoMerge) => "open PRs and leave them for review",
        (_, MergeMode::AutoMerge) => "open PRs and enable auto-merge",
        (LandingMode::Sequential, MergeMode::Merge) => "open and merge one PR at a time",
        (LandingMode::Chained, MergeMode::Merge) => "open a chain of PRs and merge bottom-up",
    };
    println!(
        "  Will {what} against {} using branches under {}",
        config.base.accent(),
        config.prefix.accent()
    );
    println!();
}

/// Print the end-of-run summary
fn print_summary(config: &LandConfig, outcome: &LandingOutcome) {
    println!();
    for landed in &outcome.landed {
        let label = format!("#{}", landed.pr.number);
        let state = match landed.outcome {
            PrOutcome::Merged { .. } => "merged".success(),
            PrOutcome::AutoMerge => "auto-merge enabled".accent(),
            PrOutcome::Open => "open".warn(),
        };
        println!(
            "  {} {} {} {}",
            hyperlink(&label, &landed.pr.html_url).accent(),
            landed.commit.title,
            format!("({state})").muted(),
            landed.pr.html_url.muted()
        );
    }

    for commit in &outcome.skipped {
        println!(
            "  {} {}",
            commit.short_id().muted(),
            format!("already on {}", config.base).muted()
        );
    }
    for pr in &outcome.open_from_earlier {
        println!(
            "  {} {}",
            "Still open from an earlier run:".warn(),
            hyperlink(&format!("#{}", pr.number), &pr.html_url)
        );
    }

    println!();
    if config.dry_run {
        println!("{}", "Dry run complete".muted());
    } else {
        println!(
            "{} {} PR(s), {} merged",
            format!("{CHECK} Done:").success(),
            outcome.landed.len().accent(),
            outcome.merged_count().accent()
        );
    }
}
