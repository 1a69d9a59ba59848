//! Platform services for pull request operations
//!
//! The orchestrator only reaches the hosting provider through
//! [`PlatformService`].

mod detection;
mod dry_run;
mod factory;
mod github;

pub use detection::{detect_platform, parse_repo_info};
pub use dry_run::DryRunPlatform;
pub use factory::create_platform_service;
pub use github::GitHubService;

use crate::config::RetryPolicy;
use crate::error::Result;
use crate::types::{MergeResult, PlatformConfig, PrStatus, PullRequest};
use async_trait::async_trait;
use tracing::debug;

/// Outcome of waiting for a PR to become mergeable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeWait {
    /// Mergeable with passing checks
    Ready,
    /// Can never become mergeable without intervention
    Blocked(String),
    /// Still not ready after the last allowed poll
    TimedOut {
        /// Number of polls performed
        attempts: u32,
        /// Last provider state seen, if any
        last_state: Option<String>,
    },
}

/// Platform service trait for PR operations
///
/// Every method is a single request against remote state; nothing is
/// cached between calls.
#[async_trait]
pub trait PlatformService: Send + Sync {
    /// Find an existing open PR for a head branch
    async fn find_existing_pr(&self, head_branch: &str) -> Result<Option<PullRequest>>;

    /// Create a new PR with explicit body and draft options.
    ///
    /// `head` is the branch name on the fork; implementations qualify it
    /// with the fork owner when the fork is a different repository.
    async fn create_pr_with_options(
        &self,
        head: &str,
        base: &str,
        title: &str,
        body: Option<&str>,
        draft: bool,
    ) -> Result<PullRequest>;

    /// Update the base branch of an existing PR
    async fn update_pr_base(&self, pr_number: u64, new_base: &str) -> Result<PullRequest>;

    /// Current mergeability and CI status of a PR
    async fn get_status(&self, pr_number: u64) -> Result<PrStatus>;

    /// Squash-merge a PR using exactly the given commit title and message
    async fn merge_pr(&self, pr_number: u64, title: &str, message: &str) -> Result<MergeResult>;

    /// Turn on provider auto-merge (squash) with the given commit title and message
    async fn enable_auto_merge(&self, pr: &PullRequest, title: &str, message: &str) -> Result<()>;

    /// Get the platform configuration
    fn config(&self) -> &PlatformConfig;

    /// Poll [`get_status`](Self::get_status) until the PR is ready, blocked,
    /// or the policy runs out
    ///
    /// This is the only place a run waits. Unknown mergeability and pending
    /// checks keep polling; failed checks and conflicts stop immediately.
    async fn wait_until_mergeable(&self, pr_number: u64, policy: &RetryPolicy) -> Result<MergeWait> {
        let mut last_state = None;
        for attempt in 0..policy.max_attempts {
            let status = self.get_status(pr_number).await?;
            debug!(pr_number, attempt, ?status, "polled PR status");

            if let Some(reason) = status.blocking_reason() {
                return Ok(MergeWait::Blocked(reason));
            }
            if status.is_ready() {
                return Ok(MergeWait::Ready);
            }
            last_state = status.detail;

            if attempt + 1 < policy.max_attempts {
                tokio::time::sleep(policy.delay_after(attempt)).await;
            }
        }

        Ok(MergeWait::TimedOut {
            attempts: policy.max_attempts,
            last_state,
        })
    }
}
