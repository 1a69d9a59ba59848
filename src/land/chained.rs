//! Chained landing: every commit gets a PR up front, each based on the
//! previous commit's branch

use super::{LandingStrategy, Phase, PrOutcome, Run};
use crate::error::Result;
use crate::types::{CommitRecord, MergeMode};
use async_trait::async_trait;
use tracing::debug;

/// Opens the whole stack as a chain of PRs, then merges bottom-up
pub(crate) struct Chained;

#[async_trait]
impl LandingStrategy for Chained {
    async fn land(&self, run: &mut Run<'_>) -> Result<()> {
        let config = run.config;
        let upstream_ref = config.upstream_ref();

        run.enter(Phase::Syncing).await;
        run.sync()?;

        run.enter(Phase::Isolating).await;
        let Some(plan) = run.enumerate()? else {
            debug!("stack is empty after sync");
            return Ok(());
        };
        let commits = select_commits(run, &plan.commits).await;

        let mut parent = upstream_ref.clone();
        let mut pr_base = config.base.clone();
        for (i, commit) in commits.iter().enumerate() {
            run.begin(i + 1, commit).await;
            run.enter(Phase::Publishing).await;
            let index = run.publish(commit, &parent)?;
            run.open_pr(index, &pr_base).await?;

            parent.clone_from(&run.live[index].name);
            pr_base.clone_from(&run.live[index].name);
        }

        match config.merge_mode {
            MergeMode::NoMerge => {
                while !run.live.is_empty() {
                    run.settle(0, PrOutcome::Open)?;
                }
            }
            MergeMode::AutoMerge => {
                run.enter(Phase::Merging).await;
                for index in 0..run.live.len() {
                    run.enable_auto_merge(index).await?;
                }
                while !run.live.is_empty() {
                    run.settle(0, PrOutcome::AutoMerge)?;
                }
            }
            MergeMode::Merge => {
                let mut iteration = 0;
                while !run.live.is_empty() {
                    iteration += 1;
                    let commit = run.live[0].commit.clone();
                    run.begin(iteration, &commit).await;

                    let sha = run.merge(0).await?;
                    run.enter(Phase::CleaningUp).await;
                    let merged = run.settle(0, PrOutcome::Merged { sha })?;

                    // The next PR is based on the merged branch; move it onto
                    // the base before that branch disappears.
                    if !run.live.is_empty() {
                        rebuild_on_base(run, 0).await?;
                    }
                    run.delete_merged_branch(&merged.name).await;
                }

                run.enter(Phase::Syncing).await;
                run.sync()?;
            }
        }

        Ok(())
    }
}

/// Commits to chain: the explicit ones in caller order, or the whole stack
async fn select_commits(run: &mut Run<'_>, stack: &[CommitRecord]) -> Vec<CommitRecord> {
    if run.config.explicit_commits.is_empty() {
        return stack.to_vec();
    }

    let mut selected = Vec::new();
    for wanted in run.initial.commits.clone() {
        if let Some(found) = stack.iter().find(|c| c.same_message(&wanted)) {
            selected.push(found.clone());
        } else {
            run.progress
                .on_message(&format!("{wanted} is already on {}, skipping", run.config.base))
                .await;
            run.outcome.skipped.push(wanted);
        }
    }
    selected
}

/// Recreate a live branch on the freshly fetched base and retarget its PR
async fn rebuild_on_base(run: &mut Run<'_>, index: usize) -> Result<()> {
    let config = run.config;
    let upstream_ref = config.upstream_ref();
    let branch = run.live[index].clone();
    debug!(branch = %branch.name, "rebuilding on updated base");

    run.enter(Phase::Syncing).await;
    run.git.fetch(&config.upstream_remote, &config.base)?;

    run.enter(Phase::Isolating).await;
    run.git.create_branch(&branch.name, &upstream_ref)?;
    run.git.reset_to_commit(&branch.name, &branch.commit.id)?;
    run.live[index].parent.clone_from(&upstream_ref);

    run.enter(Phase::Publishing).await;
    run.push(index, true)?;

    if let Some(ref pr) = branch.pr {
        let updated = run.platform.update_pr_base(pr.number, &config.base).await?;
        if let Some(ref mut live_pr) = run.live[index].pr {
            live_pr.base_ref = updated.base_ref;
        }
    }
    Ok(())
}
