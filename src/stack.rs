//! Stack inspection - which local commits still need to land
//!
//! Commit records are read fresh from git every time; after a rebase every
//! id is different, so callers re-enumerate rather than patch a plan.

use crate::error::{Error, Result};
use crate::repo::GitOps;
use crate::types::{CommitRecord, LandingPlan};
use tracing::debug;

/// Split a raw commit message into title and body
///
/// The title is the first line, trimmed. The body is everything after the
/// separator blank line(s), with trailing newlines removed and nothing else
/// touched, so it can be handed to the merge verbatim.
pub fn parse_commit_message(message: &str) -> (String, String) {
    let (first, rest) = message.split_once('\n').unwrap_or((message, ""));
    let title = first.trim().to_string();

    let mut body = rest;
    while let Some(line_end) = body.find('\n') {
        if body[..line_end].trim().is_empty() {
            body = &body[line_end + 1..];
        } else {
            break;
        }
    }
    if body.trim().is_empty() {
        return (title, String::new());
    }

    let body = body.trim_end_matches(['\n', '\r']).to_string();
    (title, body)
}

/// Read one commit into a record
pub fn read_commit(git: &dyn GitOps, id: &str, position: usize) -> Result<CommitRecord> {
    let message = git.commit_message(id)?;
    let (title, body) = parse_commit_message(&message);
    Ok(CommitRecord {
        id: id.to_string(),
        title,
        body,
        position,
    })
}

/// List the commits to land, oldest first
///
/// With `explicit` ids, each is resolved and kept in the caller's order.
/// Otherwise the commits reachable from HEAD but not from `base_ref` are
/// returned in ancestry order. Fails with [`Error::EmptyStack`] when
/// nothing qualifies.
pub fn enumerate(git: &dyn GitOps, base_ref: &str, explicit: &[String]) -> Result<LandingPlan> {
    let ids = if explicit.is_empty() {
        stack_commits(git, base_ref)?
    } else {
        explicit
            .iter()
            .map(|rev| git.resolve_commit(rev))
            .collect::<Result<Vec<_>>>()?
    };

    if ids.is_empty() {
        debug!(base_ref, "no commits ahead of base");
        return Err(Error::EmptyStack);
    }

    let commits = ids
        .iter()
        .enumerate()
        .map(|(position, id)| read_commit(git, id, position))
        .collect::<Result<Vec<_>>>()?;

    debug!(base_ref, count = commits.len(), "enumerated stack");
    Ok(LandingPlan::new(commits))
}

/// Commits in `merge-base(HEAD, base)..HEAD`, rejecting merge commits
fn stack_commits(git: &dyn GitOps, base_ref: &str) -> Result<Vec<String>> {
    let merge_base = git.merge_base("HEAD", base_ref)?;
    let ids = git.rev_list(&merge_base, "HEAD")?;

    for id in &ids {
        if git.commit_parents(id)?.len() > 1 {
            return Err(Error::NonLinearStack(id[..id.len().min(7)].to_string()));
        }
    }

    Ok(ids)
}
