//! Core types for land-stack

use serde::{Deserialize, Serialize};

/// A local commit captured at enumeration time
///
/// Commit ids are rewritten by every rebase, so a record is only valid
/// until the next sync. Re-enumerate instead of patching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    /// Full commit hash
    pub id: String,
    /// First line of the commit message, trimmed
    pub title: String,
    /// Remaining message lines, verbatim (blank lines included)
    pub body: String,
    /// Position within the stack (0 = oldest)
    pub position: usize,
}

impl CommitRecord {
    /// Abbreviated commit id for display
    pub fn short_id(&self) -> &str {
        &self.id[..self.id.len().min(7)]
    }

    /// Whether two records carry the same message
    ///
    /// Used to recognise a commit across rebases, where its id changes
    /// but its message does not.
    pub fn same_message(&self, other: &Self) -> bool {
        self.title == other.title && self.body == other.body
    }
}

impl std::fmt::Display for CommitRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.short_id(), self.title)
    }
}

/// Commits not yet on the base branch, oldest first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LandingPlan {
    /// Commits in landing order
    pub commits: Vec<CommitRecord>,
}

impl LandingPlan {
    /// Create a plan, renumbering positions to match the given order
    pub fn new(mut commits: Vec<CommitRecord>) -> Self {
        for (position, commit) in commits.iter_mut().enumerate() {
            commit.position = position;
        }
        Self { commits }
    }

    /// Number of commits in the plan
    pub fn len(&self) -> usize {
        self.commits.len()
    }

    /// Whether the plan has no commits
    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    /// Oldest commit in the plan
    pub fn oldest(&self) -> Option<&CommitRecord> {
        self.commits.first()
    }

    /// Find a commit by message (ids do not survive a rebase)
    pub fn find_by_message(&self, record: &CommitRecord) -> Option<&CommitRecord> {
        self.commits.iter().find(|c| c.same_message(record))
    }
}

/// A temporary branch created for one commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempBranch {
    /// Branch name (same locally and on the fork remote)
    pub name: String,
    /// Ref the branch was created from
    pub parent: String,
    /// Commit carried by the branch
    pub commit: CommitRecord,
    /// Whether the branch was pushed to the fork remote
    pub pushed: bool,
    /// Pull request opened for the branch, if any
    pub pr: Option<PullRequest>,
}

impl TempBranch {
    /// Create a branch record that has not been pushed yet
    pub const fn new(name: String, parent: String, commit: CommitRecord) -> Self {
        Self {
            name,
            parent,
            commit,
            pushed: false,
            pr: None,
        }
    }
}

/// Workspace state captured before any mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunState {
    /// Branch checked out when the run started
    pub original_branch: String,
    /// Tip commit of that branch when the run started
    pub original_tip: String,
}

/// A pull request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    /// PR number
    pub number: u64,
    /// Web URL for the PR
    pub html_url: String,
    /// Base branch name
    pub base_ref: String,
    /// Head branch name
    pub head_ref: String,
    /// PR title
    pub title: String,
    /// GraphQL node ID (used for mutations)
    pub node_id: Option<String>,
    /// Whether PR is a draft
    pub is_draft: bool,
}

/// A git remote
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitRemote {
    /// Remote name (e.g., "origin")
    pub name: String,
    /// Remote URL
    pub url: String,
}

/// Detected platform type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Platform {
    /// GitHub or GitHub Enterprise
    GitHub,
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GitHub => write!(f, "GitHub"),
        }
    }
}

/// Platform configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformConfig {
    /// Platform type
    pub platform: Platform,
    /// Repository owner (user or organization)
    pub owner: String,
    /// Repository name
    pub repo: String,
    /// Custom host (None for github.com)
    pub host: Option<String>,
}

impl PlatformConfig {
    /// `owner/repo` slug
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    /// Whether both configs point at the same repository
    pub fn same_repo(&self, other: &Self) -> bool {
        self.host == other.host
            && self.owner.eq_ignore_ascii_case(&other.owner)
            && self.repo.eq_ignore_ascii_case(&other.repo)
    }
}

// =============================================================================
// Merge-related types
// =============================================================================

/// Provider-reported mergeability of a PR
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mergeability {
    /// Head can be merged into base
    Mergeable,
    /// Head cannot be merged (conflicts)
    Blocked,
    /// Provider is still computing, or waiting on something that may resolve
    Unknown,
}

/// Aggregate status of CI checks on the PR head
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksStatus {
    /// All checks passed (or none configured)
    Passed,
    /// At least one check has not completed
    Pending,
    /// At least one check failed
    Failed,
}

/// Combined PR status snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrStatus {
    /// Mergeability as reported by the provider
    pub mergeability: Mergeability,
    /// CI check aggregate
    pub checks: ChecksStatus,
    /// Raw provider state, for messages (e.g. "blocked", "behind")
    pub detail: Option<String>,
}

impl PrStatus {
    /// Whether the PR can be merged now
    pub fn is_ready(&self) -> bool {
        self.mergeability == Mergeability::Mergeable && self.checks == ChecksStatus::Passed
    }

    /// Reason the PR can never become mergeable without intervention
    pub fn blocking_reason(&self) -> Option<String> {
        if self.checks == ChecksStatus::Failed {
            return Some("CI checks failed".to_string());
        }
        if self.mergeability == Mergeability::Blocked {
            return Some("Has merge conflicts".to_string());
        }
        None
    }
}

/// Result of a merge operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeResult {
    /// Whether the merge was successful
    pub merged: bool,
    /// The SHA of the merge commit (if successful)
    pub sha: Option<String>,
    /// Message from the merge operation (especially on failure)
    pub message: Option<String>,
}

/// What to do with each PR once it is open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeMode {
    /// Wait for mergeability and squash-merge
    #[default]
    Merge,
    /// Hand merging to the provider's auto-merge
    AutoMerge,
    /// Leave the PR open
    NoMerge,
}

impl std::fmt::Display for MergeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Merge => write!(f, "merge"),
            Self::AutoMerge => write!(f, "auto-merge"),
            Self::NoMerge => write!(f, "no-merge"),
        }
    }
}

/// How PRs of a multi-commit stack relate to each other
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LandingMode {
    /// One PR at a time against the base branch, rebasing in between
    #[default]
    Sequential,
    /// All PRs opened up front, each based on the previous one's branch
    Chained,
}

impl std::fmt::Display for LandingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sequential => write!(f, "sequential"),
            Self::Chained => write!(f, "chained"),
        }
    }
}
