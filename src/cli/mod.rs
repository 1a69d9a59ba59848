//! CLI command implementations

mod context;
mod land;
pub mod style;

pub use land::{LandOptions, run_land};

use anstream::println;
use async_trait::async_trait;
use indicatif::ProgressBar;
use land_stack::land::{Phase, ProgressCallback};
use land_stack::types::{CommitRecord, PullRequest};
use std::sync::Mutex;
use std::time::Duration;
use style::{Stylize, check, hyperlink, spinner_style};

/// Progress callback that prints to the terminal
///
/// Waiting for mergeability shows a spinner; everything else is a line.
pub struct CliProgress {
    quiet: bool,
    spinner: Mutex<Option<ProgressBar>>,
    last_pr: Mutex<Option<u64>>,
}

impl CliProgress {
    /// Print progress lines
    pub const fn new() -> Self {
        Self {
            quiet: false,
            spinner: Mutex::new(None),
            last_pr: Mutex::new(None),
        }
    }

    /// Print nothing
    pub const fn quiet() -> Self {
        Self {
            quiet: true,
            spinner: Mutex::new(None),
            last_pr: Mutex::new(None),
        }
    }

    fn start_spinner(&self, message: String) {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(spinner_style());
        spinner.set_message(message);
        spinner.enable_steady_tick(Duration::from_millis(80));
        if let Ok(mut slot) = self.spinner.lock() {
            *slot = Some(spinner);
        }
    }

    fn finish_spinner(&self, message: Option<String>) {
        let spinner = self.spinner.lock().ok().and_then(|mut slot| slot.take());
        if let Some(spinner) = spinner {
            match message {
                Some(message) => spinner.finish_with_message(message),
                None => spinner.finish_and_clear(),
            }
        }
    }
}

impl Default for CliProgress {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProgressCallback for CliProgress {
    async fn on_phase(&self, _iteration: usize, phase: Phase) {
        if self.quiet {
            return;
        }
        match phase {
            Phase::AwaitingMergeable => {
                let pr = self.last_pr.lock().ok().and_then(|n| *n);
                let what = pr.map_or_else(|| "PR".to_string(), |n| format!("PR #{n}"));
                self.start_spinner(format!("Waiting for {what} to become mergeable..."));
            }
            Phase::Merging => {
                let pr = self.last_pr.lock().ok().and_then(|n| *n);
                let what = pr.map_or_else(|| "PR".to_string(), |n| format!("PR #{n}"));
                self.finish_spinner(Some(format!("{} {what} is mergeable", check())));
            }
            Phase::Syncing => {
                println!("{}", "Syncing with upstream...".muted());
            }
            Phase::Aborted => {
                self.finish_spinner(None);
            }
            _ => {}
        }
    }

    async fn on_commit(&self, iteration: usize, commit: &CommitRecord) {
        if self.quiet {
            return;
        }
        println!(
            "{} {} {}",
            format!("[{iteration}]").emphasis(),
            commit.short_id().accent(),
            commit.title
        );
    }

    async fn on_pr_created(&self, _commit: &CommitRecord, pr: &PullRequest) {
        if let Ok(mut last) = self.last_pr.lock() {
            *last = Some(pr.number);
        }
        if self.quiet {
            return;
        }
        let label = format!("PR #{}", pr.number);
        println!(
            "  {} Opened {} {}",
            check(),
            hyperlink(&label, &pr.html_url).accent(),
            pr.html_url.muted()
        );
    }

    async fn on_merged(&self, pr: &PullRequest, sha: Option<&str>) {
        if self.quiet {
            return;
        }
        let sha = sha.map_or_else(String::new, |s| format!(" as {}", &s[..s.len().min(7)]));
        println!("  {} Merged PR #{}{}", check(), pr.number, sha.muted());
    }

    async fn on_message(&self, message: &str) {
        if !self.quiet {
            println!("  {}", message.muted());
        }
    }
}
