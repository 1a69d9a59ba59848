//! Landing orchestrator
//!
//! Drives the state machine that turns a stack of local commits into pull
//! requests and merges them in order:
//! 1. Sync - fetch the upstream base and rebase the stack onto it
//! 2. Isolate - copy one commit onto a fresh temp branch
//! 3. Publish - push the branch and open a PR with the commit's message
//! 4. Merge - wait for mergeability, squash-merge, delete the branch
//!
//! Any fatal error triggers a rollback that restores the original branch
//! and removes unmerged temp branches; see [`AbortReport`].

mod chained;
mod progress;
mod rollback;
mod sequential;

pub use progress::{NoopProgress, Phase, ProgressCallback};
pub use rollback::AbortReport;

use crate::config::LandConfig;
use crate::error::{Error, Result};
use crate::naming::{BranchNamer, branch_stem};
use crate::platform::{MergeWait, PlatformService};
use crate::repo::GitOps;
use crate::stack;
use crate::types::{
    CommitRecord, LandingMode, LandingPlan, MergeMode, PlatformConfig, PullRequest, RunState,
    TempBranch,
};
use async_trait::async_trait;
use tracing::{debug, warn};

/// What happened to one commit's PR
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrOutcome {
    /// Squash-merged into the base branch
    Merged {
        /// Merge commit, when the provider reported one
        sha: Option<String>,
    },
    /// Provider auto-merge enabled; merges once checks pass
    AutoMerge,
    /// Left open
    Open,
}

/// A commit that got a PR during the run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LandedCommit {
    /// The commit as published
    pub commit: CommitRecord,
    /// Temp branch carrying it
    pub branch: String,
    /// Its pull request
    pub pr: PullRequest,
    /// Final state of the PR
    pub outcome: PrOutcome,
}

/// Summary of a successful run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LandingOutcome {
    /// Commits that got a PR, in landing order
    pub landed: Vec<LandedCommit>,
    /// Explicit commits that were already on the base branch
    pub skipped: Vec<CommitRecord>,
    /// Leftover temp branches from interrupted runs that were deleted
    pub swept_branches: Vec<String>,
    /// Leftover temp branches kept because they still have an open PR
    pub open_from_earlier: Vec<PullRequest>,
}

impl LandingOutcome {
    /// Number of PRs merged during the run
    pub fn merged_count(&self) -> usize {
        self.landed
            .iter()
            .filter(|l| matches!(l.outcome, PrOutcome::Merged { .. }))
            .count()
    }
}

/// One way of landing a plan
#[async_trait]
pub(crate) trait LandingStrategy: Send + Sync {
    async fn land(&self, run: &mut Run<'_>) -> Result<()>;
}

/// Strategy implementing a landing mode
pub(crate) fn strategy_for(mode: LandingMode) -> Box<dyn LandingStrategy> {
    match mode {
        LandingMode::Sequential => Box::new(sequential::Sequential),
        LandingMode::Chained => Box::new(chained::Chained),
    }
}

/// Lands a stack using the given gateways
pub struct Lander<'a> {
    git: &'a dyn GitOps,
    platform: &'a dyn PlatformService,
    config: &'a LandConfig,
    fork: Option<&'a PlatformConfig>,
    progress: &'a dyn ProgressCallback,
}

impl<'a> Lander<'a> {
    /// Create a lander; PRs go to `platform`, branches to `config.remote`
    pub fn new(
        git: &'a dyn GitOps,
        platform: &'a dyn PlatformService,
        config: &'a LandConfig,
    ) -> Self {
        Self {
            git,
            platform,
            config,
            fork: None,
            progress: &NoopProgress,
        }
    }

    /// Report progress to `progress`
    #[must_use]
    pub fn with_progress(mut self, progress: &'a dyn ProgressCallback) -> Self {
        self.progress = progress;
        self
    }

    /// Repository behind `config.remote`, when it is not the PR repository
    #[must_use]
    pub const fn with_fork(mut self, fork: &'a PlatformConfig) -> Self {
        self.fork = Some(fork);
        self
    }

    /// Land the stack
    ///
    /// Returns [`Error::EmptyStack`] when nothing is ahead of the base, and
    /// rejects invalid flag combinations before touching anything. Failures
    /// after the first mutation come back as [`Error::Aborted`].
    pub async fn run(&self) -> Result<LandingOutcome> {
        self.config.validate()?;

        if !self.git.is_clean()? {
            return Err(Error::DirtyWorkingCopy);
        }

        let state = RunState {
            original_branch: self.git.current_branch()?,
            original_tip: self.git.head_commit()?,
        };
        debug!(branch = %state.original_branch, tip = %state.original_tip, "captured run state");

        let plan = self.initial_plan()?;
        self.check_plan(&plan)?;

        let first = plan.oldest().ok_or(Error::EmptyStack)?;
        let stem = branch_stem(&state.original_branch, &self.config.base, first);
        let run_prefix = format!("{}{stem}-", self.config.prefix);
        let under_prefix = self.git.remote_branches(&self.config.remote, &run_prefix)?;
        let namer = BranchNamer::new(&self.config.prefix, &stem, &under_prefix);
        let ours: Vec<String> = under_prefix
            .iter()
            .filter(|name| namer.is_run_branch(name))
            .cloned()
            .collect();
        debug!(
            run_prefix,
            ours = ours.len(),
            foreign = under_prefix.len() - ours.len(),
            "probed fork branches"
        );

        let mut run = Run {
            git: self.git,
            platform: self.platform,
            config: self.config,
            progress: self.progress,
            namer,
            state,
            initial: plan,
            phase: Phase::Idle,
            iteration: 0,
            current: None,
            live: Vec::new(),
            outcome: LandingOutcome::default(),
        };

        if !self.config.dry_run {
            run.sweep_dangling(&ours).await;
        }

        let strategy = strategy_for(self.config.landing_mode);
        match strategy.land(&mut run).await {
            Ok(()) => {
                run.enter(Phase::Done).await;
                Ok(run.outcome)
            }
            Err(cause) => {
                let report = rollback::rollback(&mut run, cause).await;
                Err(Error::Aborted(Box::new(report)))
            }
        }
    }

    /// Enumerate the stack before anything is mutated
    fn initial_plan(&self) -> Result<LandingPlan> {
        let upstream_ref = self.config.upstream_ref();
        if self.git.resolve_commit(&upstream_ref).is_err() {
            debug!(upstream_ref, "upstream base not fetched yet");
            self.git
                .fetch(&self.config.upstream_remote, &self.config.base)?;
        }

        let plan = stack::enumerate(self.git, &upstream_ref, &self.config.explicit_commits)?;
        if self.config.explicit_commits.is_empty() {
            return Ok(plan);
        }

        let on_stack = match stack::enumerate(self.git, &upstream_ref, &[]) {
            Ok(stack) => stack.commits,
            Err(Error::EmptyStack) => Vec::new(),
            Err(e) => return Err(e),
        };
        for commit in &plan.commits {
            if !on_stack.iter().any(|c| c.id == commit.id) {
                return Err(Error::GitNotFound(format!(
                    "{} is not between {upstream_ref} and HEAD",
                    commit.short_id()
                )));
            }
        }
        Ok(plan)
    }

    /// Reject plans the chosen modes cannot handle
    fn check_plan(&self, plan: &LandingPlan) -> Result<()> {
        let config = self.config;
        if config.landing_mode == LandingMode::Sequential
            && config.merge_mode != MergeMode::Merge
            && plan.len() != 1
        {
            return Err(Error::InvalidFlagCombination(format!(
                "--{} lands a single commit, but {} commits are ahead of {} (use --chain for stacks)",
                config.merge_mode,
                plan.len(),
                config.upstream_ref()
            )));
        }

        // Auto-merge on a chained PR squashes it into the temp branch below,
        // not into the base branch.
        if config.landing_mode == LandingMode::Chained
            && config.merge_mode == MergeMode::AutoMerge
            && plan.len() > 1
        {
            return Err(Error::InvalidFlagCombination(format!(
                "--auto-merge with --chain would merge each of the {} PRs into the branch below it \
                 instead of {} (use --chain alone to merge bottom-up)",
                plan.len(),
                config.base
            )));
        }

        if config.landing_mode == LandingMode::Chained
            && let Some(fork) = self.fork
            && !fork.same_repo(self.platform.config())
        {
            return Err(Error::InvalidFlagCombination(format!(
                "--chain needs branches in {} itself, but {} points at {}",
                self.platform.config().slug(),
                config.remote,
                fork.slug()
            )));
        }
        Ok(())
    }
}

/// State of one run, shared by the strategies and rollback
pub(crate) struct Run<'a> {
    pub(crate) git: &'a dyn GitOps,
    pub(crate) platform: &'a dyn PlatformService,
    pub(crate) config: &'a LandConfig,
    pub(crate) progress: &'a dyn ProgressCallback,
    pub(crate) namer: BranchNamer,
    pub(crate) state: RunState,
    /// Plan enumerated before the first sync
    pub(crate) initial: LandingPlan,
    pub(crate) phase: Phase,
    /// 1-based; 0 before the first iteration
    pub(crate) iteration: usize,
    /// Commit of the current iteration
    pub(crate) current: Option<CommitRecord>,
    /// Temp branches created and not yet merged, oldest first
    pub(crate) live: Vec<TempBranch>,
    pub(crate) outcome: LandingOutcome,
}

impl Run<'_> {
    pub(crate) async fn enter(&mut self, phase: Phase) {
        debug!(iteration = self.iteration, %phase, "entering phase");
        self.phase = phase;
        self.progress.on_phase(self.iteration, phase).await;
    }

    /// Start the next iteration with `commit`
    pub(crate) async fn begin(&mut self, iteration: usize, commit: &CommitRecord) {
        self.iteration = iteration;
        self.current = Some(commit.clone());
        self.progress.on_commit(iteration, commit).await;
    }

    /// Fetch the upstream base and rebase the checked-out branch onto it
    pub(crate) fn sync(&self) -> Result<()> {
        let onto = self.config.upstream_ref();
        self.git
            .fetch(&self.config.upstream_remote, &self.config.base)?;
        self.git.rebase(&onto).map_err(|e| match e {
            Error::GitConflict(message) => Error::RebaseConflict { onto, message },
            other => other,
        })
    }

    /// Re-read the stack; `None` once nothing is left
    pub(crate) fn enumerate(&self) -> Result<Option<LandingPlan>> {
        match stack::enumerate(self.git, &self.config.upstream_ref(), &[]) {
            Ok(plan) => Ok(Some(plan)),
            Err(Error::EmptyStack) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Create a temp branch from `parent` carrying `commit` and push it
    ///
    /// Returns the index of the branch in `live`.
    pub(crate) fn publish(&mut self, commit: &CommitRecord, parent: &str) -> Result<usize> {
        let git = self.git;
        let name = self
            .namer
            .claim(commit, |n| git.branch_exists(n).unwrap_or(false));
        debug!(branch = %name, commit = %commit.short_id(), parent, "isolating commit");

        self.git.create_branch(&name, parent)?;
        self.live
            .push(TempBranch::new(name.clone(), parent.to_string(), commit.clone()));
        let index = self.live.len() - 1;

        self.git.reset_to_commit(&name, &commit.id)?;
        self.push(index, self.config.force)?;
        Ok(index)
    }

    /// Push a live branch; run-owned rewrites pass `force`
    pub(crate) fn push(&mut self, index: usize, force: bool) -> Result<()> {
        let name = self.live[index].name.clone();
        self.git
            .push(&self.config.remote, &name, force)
            .map_err(|e| Error::PublishFailure {
                branch: name,
                message: e.to_string(),
            })?;
        self.live[index].pushed = true;
        Ok(())
    }

    /// Open the PR for a live branch against `base`
    pub(crate) async fn open_pr(&mut self, index: usize, base: &str) -> Result<PullRequest> {
        let branch = &self.live[index];
        let body = (!branch.commit.body.is_empty()).then_some(branch.commit.body.as_str());
        let pr = self
            .platform
            .create_pr_with_options(
                &branch.name,
                base,
                &branch.commit.title,
                body,
                self.config.draft,
            )
            .await
            .map_err(|e| Error::PrCreationFailure {
                branch: branch.name.clone(),
                message: e.to_string(),
            })?;

        self.progress.on_pr_created(&branch.commit, &pr).await;
        self.live[index].pr = Some(pr.clone());
        Ok(pr)
    }

    fn live_pr(&self, index: usize) -> Result<PullRequest> {
        self.live[index]
            .pr
            .clone()
            .ok_or_else(|| Error::Internal(format!("{} has no PR", self.live[index].name)))
    }

    /// Wait until the branch's PR is mergeable, then squash-merge it with the
    /// commit's own title and body
    pub(crate) async fn merge(&mut self, index: usize) -> Result<Option<String>> {
        let pr = self.live_pr(index)?;

        self.enter(Phase::AwaitingMergeable).await;
        match self
            .platform
            .wait_until_mergeable(pr.number, &self.config.retry)
            .await?
        {
            MergeWait::Ready => {}
            MergeWait::Blocked(reason) => {
                return Err(Error::MergeFailure {
                    pr_number: pr.number,
                    message: reason,
                });
            }
            MergeWait::TimedOut { attempts, last_state } => {
                debug!(pr_number = pr.number, ?last_state, "gave up waiting");
                return Err(Error::MergeabilityTimeout {
                    pr_number: pr.number,
                    attempts,
                });
            }
        }

        self.enter(Phase::Merging).await;
        let commit = &self.live[index].commit;
        let result = self
            .platform
            .merge_pr(pr.number, &commit.title, &commit.body)
            .await
            .map_err(|e| Error::MergeFailure {
                pr_number: pr.number,
                message: e.to_string(),
            })?;

        if !result.merged {
            return Err(Error::MergeFailure {
                pr_number: pr.number,
                message: result
                    .message
                    .unwrap_or_else(|| "provider did not merge the PR".to_string()),
            });
        }

        self.progress.on_merged(&pr, result.sha.as_deref()).await;
        Ok(result.sha)
    }

    /// Hand the branch's PR to provider auto-merge
    pub(crate) async fn enable_auto_merge(&mut self, index: usize) -> Result<()> {
        let pr = self.live_pr(index)?;
        let commit = &self.live[index].commit;
        self.platform
            .enable_auto_merge(&pr, &commit.title, &commit.body)
            .await
            .map_err(|e| Error::MergeFailure {
                pr_number: pr.number,
                message: e.to_string(),
            })
    }

    /// Move a live branch into the outcome
    pub(crate) fn settle(&mut self, index: usize, outcome: PrOutcome) -> Result<TempBranch> {
        let pr = self.live_pr(index)?;
        let branch = self.live.remove(index);
        self.outcome.landed.push(LandedCommit {
            commit: branch.commit.clone(),
            branch: branch.name.clone(),
            pr,
            outcome,
        });
        Ok(branch)
    }

    /// Delete a merged temp branch on the fork and locally
    ///
    /// The merge already happened, so failures only warn.
    pub(crate) async fn delete_merged_branch(&self, name: &str) {
        if let Err(e) = self.git.delete_branch(Some(&self.config.remote), name) {
            warn!(branch = name, error = %e, "failed to delete remote temp branch");
            self.progress
                .on_message(&format!("could not delete {}/{name}: {e}", self.config.remote))
                .await;
        }
        if let Err(e) = self.git.delete_branch(None, name) {
            warn!(branch = name, error = %e, "failed to delete local temp branch");
        }
    }

    /// Remove temp branches left by interrupted runs
    ///
    /// `existing` holds only names this run could have produced
    /// (`<prefix><stem>-N` or `<prefix><stem>-N-<id>`); one without an open
    /// PR belongs to nobody. Branches that still have a PR are kept and
    /// reported.
    pub(crate) async fn sweep_dangling(&mut self, existing: &[String]) {
        for name in existing {
            match self.platform.find_existing_pr(name).await {
                Ok(Some(pr)) => {
                    debug!(branch = %name, pr_number = pr.number, "keeping branch with open PR");
                    self.outcome.open_from_earlier.push(pr);
                }
                Ok(None) => {
                    debug!(branch = %name, "deleting dangling temp branch");
                    match self.git.delete_branch(Some(&self.config.remote), name) {
                        Ok(()) => {
                            if self.git.branch_exists(name).unwrap_or(false)
                                && let Err(e) = self.git.delete_branch(None, name)
                            {
                                warn!(
                                    branch = %name,
                                    error = %e,
                                    "failed to delete local copy of dangling branch"
                                );
                            }
                            self.progress
                                .on_message(&format!(
                                    "deleted leftover branch {}/{name}",
                                    self.config.remote
                                ))
                                .await;
                            self.outcome.swept_branches.push(name.clone());
                        }
                        Err(e) => {
                            warn!(branch = %name, error = %e, "failed to delete dangling branch");
                        }
                    }
                }
                Err(e) => {
                    warn!(branch = %name, error = %e, "could not look up PR for branch");
                }
            }
        }
    }
}
