//! Sequential landing: one PR at a time, rebasing between merges

use super::{LandingStrategy, Phase, PrOutcome, Run};
use crate::error::Result;
use crate::types::{CommitRecord, LandingPlan, MergeMode};
use async_trait::async_trait;
use std::collections::VecDeque;
use tracing::debug;

/// Lands the oldest commit, re-syncs, and repeats until the stack is empty
pub(crate) struct Sequential;

#[async_trait]
impl LandingStrategy for Sequential {
    async fn land(&self, run: &mut Run<'_>) -> Result<()> {
        let config = run.config;
        let upstream_ref = config.upstream_ref();
        let mut explicit: VecDeque<CommitRecord> = if config.explicit_commits.is_empty() {
            VecDeque::new()
        } else {
            run.initial.commits.iter().cloned().collect()
        };
        let explicit_mode = !explicit.is_empty();
        let mut iteration = 0;
        // Landed commits still at the front of the stack, and the stack size
        // when the last one was landed
        let mut lingering = 0;
        let mut landed_from: Option<usize> = None;

        loop {
            iteration += 1;
            run.iteration = iteration;
            run.enter(Phase::Syncing).await;
            run.sync()?;

            run.enter(Phase::Isolating).await;
            let Some(plan) = run.enumerate()? else {
                debug!("stack is empty");
                break;
            };

            if let Some(before) = landed_from.take() {
                lingering = lingering_after_landing(lingering, before, plan.len());
            }
            let next = if explicit_mode {
                next_explicit(run, &plan, &mut explicit).await
            } else {
                plan.commits.get(lingering).cloned()
            };
            let Some(commit) = next else {
                break;
            };

            run.begin(iteration, &commit).await;

            run.enter(Phase::Publishing).await;
            let index = run.publish(&commit, &upstream_ref)?;
            run.open_pr(index, &config.base).await?;

            match config.merge_mode {
                MergeMode::NoMerge => {
                    run.settle(index, PrOutcome::Open)?;
                    break;
                }
                MergeMode::AutoMerge => {
                    run.enter(Phase::Merging).await;
                    run.enable_auto_merge(index).await?;
                    run.settle(index, PrOutcome::AutoMerge)?;
                    break;
                }
                MergeMode::Merge => {
                    let sha = run.merge(index).await?;
                    landed_from = Some(plan.len());
                    run.enter(Phase::CleaningUp).await;
                    let branch = run.settle(index, PrOutcome::Merged { sha })?;
                    run.delete_merged_branch(&branch.name).await;
                }
            }
            run.current = None;
        }

        Ok(())
    }
}

/// Landed commits left at the front of the stack after the next sync
///
/// A landed commit normally vanishes in the rebase, shrinking the stack by
/// one. When it does not (dry runs, or an upstream squash whose patch
/// differs from the local one) it stays in front of the unlanded commits.
/// Commits are never matched by message, so repeated titles land separately.
fn lingering_after_landing(lingering: usize, len_before: usize, len_after: usize) -> usize {
    let dropped = len_before.saturating_sub(len_after);
    (lingering + 1).saturating_sub(dropped)
}

/// Next explicitly requested commit still on the stack
///
/// Ids change with every rebase, so requested commits are found by message.
/// One that is gone has already reached the base and is skipped.
async fn next_explicit(
    run: &mut Run<'_>,
    plan: &LandingPlan,
    explicit: &mut VecDeque<CommitRecord>,
) -> Option<CommitRecord> {
    while let Some(wanted) = explicit.pop_front() {
        if let Some(found) = plan.find_by_message(&wanted) {
            return Some(found.clone());
        }
        debug!(commit = %wanted, "requested commit already landed");
        run.progress
            .on_message(&format!("{wanted} is already on {}, skipping", run.config.base))
            .await;
        run.outcome.skipped.push(wanted);
    }
    None
}
