//! Version control gateway
//!
//! The orchestrator only talks to git through [`GitOps`]. [`GitRepo`]
//! drives the `git` CLI; [`DryRunGit`] wraps it so mutating and network
//! operations are printed instead of executed.

mod dry_run;
mod git;

pub use dry_run::DryRunGit;
pub use git::GitRepo;

use crate::error::{Error, Result};
use crate::types::GitRemote;

/// Synchronous git operations used while landing a stack
///
/// Errors are classified so callers can tell conflicts
/// ([`Error::GitConflict`]) from remote failures ([`Error::GitRemote`]) and
/// missing refs ([`Error::GitNotFound`]).
pub trait GitOps: Send + Sync {
    // =========================================================================
    // Read-only (local)
    // =========================================================================

    /// Name of the checked-out branch
    fn current_branch(&self) -> Result<String>;

    /// Full hash of HEAD
    fn head_commit(&self) -> Result<String>;

    /// Resolve any revision to a full commit hash
    fn resolve_commit(&self, rev: &str) -> Result<String>;

    /// Best common ancestor of two revisions
    fn merge_base(&self, a: &str, b: &str) -> Result<String>;

    /// Commits in `base..tip`, oldest first
    fn rev_list(&self, base: &str, tip: &str) -> Result<Vec<String>>;

    /// Raw commit message
    fn commit_message(&self, commit: &str) -> Result<String>;

    /// Parent hashes of a commit
    fn commit_parents(&self, commit: &str) -> Result<Vec<String>>;

    /// Whether the working tree has no uncommitted changes
    fn is_clean(&self) -> Result<bool>;

    /// Configured remotes
    fn remotes(&self) -> Result<Vec<GitRemote>>;

    /// URL of a configured remote
    fn remote_url(&self, name: &str) -> Result<String> {
        self.remotes()?
            .into_iter()
            .find(|r| r.name == name)
            .map(|r| r.url)
            .ok_or_else(|| Error::RemoteNotFound(name.to_string()))
    }

    /// Whether a local branch exists
    fn branch_exists(&self, name: &str) -> Result<bool>;

    /// Branch names under `refs/remotes/<remote>/` starting with `prefix`
    ///
    /// Local view of the remote as of the last fetch, for when the network
    /// must not be touched.
    fn tracking_branches(&self, remote: &str, prefix: &str) -> Result<Vec<String>>;

    // =========================================================================
    // Network (read-only)
    // =========================================================================

    /// Branch names on `remote` starting with `prefix`
    fn remote_branches(&self, remote: &str, prefix: &str) -> Result<Vec<String>>;

    // =========================================================================
    // Mutating
    // =========================================================================

    /// Fetch one ref from a remote
    fn fetch(&self, remote: &str, refspec: &str) -> Result<()>;

    /// Rebase the checked-out branch onto `onto`
    fn rebase(&self, onto: &str) -> Result<()>;

    /// Abort an in-progress rebase (no-op when none is in progress)
    fn abort_rebase(&self) -> Result<()>;

    /// Create (or move) a local branch to point at `from_ref`
    fn create_branch(&self, name: &str, from_ref: &str) -> Result<()>;

    /// Make `branch` carry exactly the changes of `commit` on top of its tip
    fn reset_to_commit(&self, branch: &str, commit: &str) -> Result<()>;

    /// Push a local branch to a remote branch of the same name
    fn push(&self, remote: &str, branch: &str, force: bool) -> Result<()>;

    /// Delete a branch on a remote (`Some`) or locally (`None`)
    fn delete_branch(&self, remote: Option<&str>, name: &str) -> Result<()>;

    /// Check out a branch
    fn checkout(&self, branch: &str) -> Result<()>;

    /// Hard-reset the checked-out branch to a commit
    fn hard_reset(&self, commit: &str) -> Result<()>;
}
