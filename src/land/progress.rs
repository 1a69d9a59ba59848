//! Progress reporting for landing runs

use crate::types::{CommitRecord, PullRequest};
use async_trait::async_trait;
use std::fmt;

/// Where a run is in the landing state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing started yet
    Idle,
    /// Fetching and rebasing onto the upstream base
    Syncing,
    /// Picking the next commit and copying it onto a temp branch
    Isolating,
    /// Pushing the temp branch and opening its PR
    Publishing,
    /// Polling the PR until it can be merged
    AwaitingMergeable,
    /// Merging (or enabling auto-merge)
    Merging,
    /// Deleting the merged temp branch
    CleaningUp,
    /// Every commit handled
    Done,
    /// A fatal error stopped the run; rollback follows
    Aborted,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Syncing => "syncing",
            Self::Isolating => "isolating",
            Self::Publishing => "publishing",
            Self::AwaitingMergeable => "awaiting mergeable",
            Self::Merging => "merging",
            Self::CleaningUp => "cleaning up",
            Self::Done => "done",
            Self::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Callback for user-facing progress
///
/// The orchestrator calls these in order; implementations must not fail.
#[async_trait]
pub trait ProgressCallback: Send + Sync {
    /// A new phase was entered. `iteration` is 1-based.
    async fn on_phase(&self, iteration: usize, phase: Phase);

    /// The commit for this iteration was picked
    async fn on_commit(&self, iteration: usize, commit: &CommitRecord);

    /// A PR was opened for a commit
    async fn on_pr_created(&self, commit: &CommitRecord, pr: &PullRequest);

    /// A PR was merged
    async fn on_merged(&self, pr: &PullRequest, sha: Option<&str>);

    /// Free-form status message
    async fn on_message(&self, message: &str);
}

/// Progress callback that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgress;

#[async_trait]
impl ProgressCallback for NoopProgress {
    async fn on_phase(&self, _iteration: usize, _phase: Phase) {}
    async fn on_commit(&self, _iteration: usize, _commit: &CommitRecord) {}
    async fn on_pr_created(&self, _commit: &CommitRecord, _pr: &PullRequest) {}
    async fn on_merged(&self, _pr: &PullRequest, _sha: Option<&str>) {}
    async fn on_message(&self, _message: &str) {}
}
