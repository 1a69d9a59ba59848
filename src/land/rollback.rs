//! Restoring the repository after a failed run

use super::{Phase, Run};
use crate::error::Error;
use std::fmt;
use tracing::{debug, warn};

/// What a failed run did to clean up, and what it could not
#[derive(Debug)]
pub struct AbortReport {
    /// Iteration that failed (1-based, 0 if none had started)
    pub iteration: usize,
    /// Commit being landed when the run failed
    pub commit: Option<String>,
    /// The error that stopped the run
    pub cause: Error,
    /// Rollback steps that were performed
    pub rollback_actions: Vec<String>,
    /// Artifacts intentionally or unavoidably left in place
    pub left_behind: Vec<String>,
}

impl fmt::Display for AbortReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.cause)?;
        match (self.iteration, &self.commit) {
            (0, _) => {}
            (n, Some(commit)) => write!(f, "\n  while landing commit {n} ({commit})")?,
            (n, None) => write!(f, "\n  during iteration {n}")?,
        }
        for action in &self.rollback_actions {
            write!(f, "\n  rolled back: {action}")?;
        }
        for item in &self.left_behind {
            write!(f, "\n  left behind: {item}")?;
        }
        Ok(())
    }
}

/// Undo the failed iteration
///
/// Aborts an in-progress rebase, restores the original branch to its
/// starting tip and deletes unmerged temp branches. A PR that timed out
/// waiting for mergeability is kept with its branch so it can be inspected.
/// Merged PRs are never touched.
pub(crate) async fn rollback(run: &mut Run<'_>, cause: Error) -> AbortReport {
    debug!(iteration = run.iteration, error = %cause, "rolling back");
    run.enter(Phase::Aborted).await;

    let git = run.git;
    let remote = run.config.remote.as_str();
    let mut actions = Vec::new();
    let mut left_behind = Vec::new();

    match git.abort_rebase() {
        Ok(()) => {
            if let Error::RebaseConflict { ref onto, .. } = cause {
                actions.push(format!("aborted rebase onto {onto}"));
            }
        }
        Err(e) => {
            warn!(error = %e, "failed to abort rebase");
            left_behind.push(format!("rebase in progress ({e})"));
        }
    }

    let original = &run.state.original_branch;
    let tip = &run.state.original_tip;
    let restored = git
        .checkout(original)
        .and_then(|()| git.hard_reset(tip));
    match restored {
        Ok(()) => actions.push(format!("reset {original} to {}", &tip[..tip.len().min(7)])),
        Err(e) => {
            warn!(branch = %original, error = %e, "failed to restore original branch");
            left_behind.push(format!("{original} not restored to {tip}: {e}"));
        }
    }

    let keep_prs = matches!(cause, Error::MergeabilityTimeout { .. });
    for branch in run.live.drain(..) {
        if keep_prs && let Some(ref pr) = branch.pr {
            left_behind.push(format!(
                "{remote}/{} with PR #{} ({})",
                branch.name, pr.number, pr.html_url
            ));
            continue;
        }

        if branch.pushed {
            match git.delete_branch(Some(remote), &branch.name) {
                Ok(()) => {
                    let closes = branch
                        .pr
                        .as_ref()
                        .map(|pr| format!(" (PR #{} closes with it)", pr.number))
                        .unwrap_or_default();
                    actions.push(format!("deleted {remote}/{}{closes}", branch.name));
                }
                Err(e) => {
                    warn!(branch = %branch.name, error = %e, "failed to delete remote temp branch");
                    left_behind.push(format!("{remote}/{} ({e})", branch.name));
                }
            }
        }

        match git.delete_branch(None, &branch.name) {
            Ok(()) => actions.push(format!("deleted local branch {}", branch.name)),
            Err(e) => {
                warn!(branch = %branch.name, error = %e, "failed to delete local temp branch");
                left_behind.push(format!("local branch {} ({e})", branch.name));
            }
        }
    }

    AbortReport {
        iteration: run.iteration,
        commit: run.current.as_ref().map(ToString::to_string),
        cause,
        rollback_actions: actions,
        left_behind,
    }
}
