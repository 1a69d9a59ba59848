//! Dry-run wrapper: local reads pass through, everything else is printed

use super::GitOps;
use crate::error::Result;
use crate::types::GitRemote;
use std::sync::Mutex;

/// Wraps a [`GitOps`] so no mutating or network call reaches git
///
/// Each skipped operation is printed as `[dry-run] would run: git ...` and
/// recorded; [`operations`](Self::operations) returns them in order.
/// Branches "created" during the dry run are remembered so later reads see
/// them.
pub struct DryRunGit<G> {
    inner: G,
    quiet: bool,
    operations: Mutex<Vec<String>>,
    branches: Mutex<Vec<(String, String)>>,
}

impl<G: GitOps> DryRunGit<G> {
    /// Wrap a gateway
    pub const fn new(inner: G) -> Self {
        Self {
            inner,
            quiet: false,
            operations: Mutex::new(Vec::new()),
            branches: Mutex::new(Vec::new()),
        }
    }

    /// Record operations without printing them
    #[must_use]
    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    /// Operations that would have run, in order
    pub fn operations(&self) -> Vec<String> {
        self.operations
            .lock()
            .map(|ops| ops.clone())
            .unwrap_or_default()
    }

    /// Access the wrapped gateway
    pub const fn inner(&self) -> &G {
        &self.inner
    }

    fn record(&self, command: String) {
        if !self.quiet {
            anstream::println!("[dry-run] would run: {command}");
        }
        if let Ok(mut ops) = self.operations.lock() {
            ops.push(command);
        }
    }

    fn simulated_branch(&self, name: &str) -> Option<String> {
        self.branches.lock().ok().and_then(|branches| {
            branches
                .iter()
                .rev()
                .find(|(branch, _)| branch == name)
                .map(|(_, target)| target.clone())
        })
    }
}

impl<G: GitOps> GitOps for DryRunGit<G> {
    fn current_branch(&self) -> Result<String> {
        self.inner.current_branch()
    }

    fn head_commit(&self) -> Result<String> {
        self.inner.head_commit()
    }

    fn resolve_commit(&self, rev: &str) -> Result<String> {
        if let Some(target) = self.simulated_branch(rev) {
            return Ok(target);
        }
        self.inner.resolve_commit(rev)
    }

    fn merge_base(&self, a: &str, b: &str) -> Result<String> {
        self.inner.merge_base(a, b)
    }

    fn rev_list(&self, base: &str, tip: &str) -> Result<Vec<String>> {
        self.inner.rev_list(base, tip)
    }

    fn commit_message(&self, commit: &str) -> Result<String> {
        self.inner.commit_message(commit)
    }

    fn commit_parents(&self, commit: &str) -> Result<Vec<String>> {
        self.inner.commit_parents(commit)
    }

    fn is_clean(&self) -> Result<bool> {
        self.inner.is_clean()
    }

    fn remotes(&self) -> Result<Vec<GitRemote>> {
        self.inner.remotes()
    }

    fn branch_exists(&self, name: &str) -> Result<bool> {
        if self.simulated_branch(name).is_some() {
            return Ok(true);
        }
        self.inner.branch_exists(name)
    }

    fn tracking_branches(&self, remote: &str, prefix: &str) -> Result<Vec<String>> {
        self.inner.tracking_branches(remote, prefix)
    }

    fn remote_branches(&self, remote: &str, prefix: &str) -> Result<Vec<String>> {
        // ls-remote would hit the network; the last fetch is good enough
        self.inner.tracking_branches(remote, prefix)
    }

    fn fetch(&self, remote: &str, refspec: &str) -> Result<()> {
        self.record(format!("git fetch {remote} {refspec}"));
        Ok(())
    }

    fn rebase(&self, onto: &str) -> Result<()> {
        self.record(format!("git rebase {onto}"));
        Ok(())
    }

    fn abort_rebase(&self) -> Result<()> {
        Ok(())
    }

    fn create_branch(&self, name: &str, from_ref: &str) -> Result<()> {
        self.record(format!("git branch -f {name} {from_ref}"));
        let target = self
            .resolve_commit(from_ref)
            .unwrap_or_else(|_| from_ref.to_string());
        if let Ok(mut branches) = self.branches.lock() {
            branches.push((name.to_string(), target));
        }
        Ok(())
    }

    fn reset_to_commit(&self, branch: &str, commit: &str) -> Result<()> {
        self.record(format!("git cherry-pick {commit} (onto {branch})"));
        if let Ok(mut branches) = self.branches.lock() {
            branches.push((branch.to_string(), commit.to_string()));
        }
        Ok(())
    }

    fn push(&self, remote: &str, branch: &str, force: bool) -> Result<()> {
        let force = if force { " --force" } else { "" };
        self.record(format!("git push{force} {remote} {branch}"));
        Ok(())
    }

    fn delete_branch(&self, remote: Option<&str>, name: &str) -> Result<()> {
        match remote {
            Some(remote) => self.record(format!("git push {remote} --delete {name}")),
            None => self.record(format!("git branch -D {name}")),
        }
        Ok(())
    }

    fn checkout(&self, branch: &str) -> Result<()> {
        self.record(format!("git checkout {branch}"));
        Ok(())
    }

    fn hard_reset(&self, commit: &str) -> Result<()> {
        self.record(format!("git reset --hard {commit}"));
        Ok(())
    }
}
