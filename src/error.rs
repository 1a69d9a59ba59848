//! Error types for land-stack

use crate::land::AbortReport;
use thiserror::Error;

/// Exit code for an empty stack or a completed run
pub const EXIT_SUCCESS: i32 = 0;
/// Exit code for failures outside the categories below (auth, config, local git)
pub const EXIT_FAILURE: i32 = 1;
/// Exit code for rejected flag combinations (matches clap's usage error code)
pub const EXIT_INVALID_FLAGS: i32 = 2;
/// Exit code when rebasing onto the upstream base hits a conflict
pub const EXIT_REBASE_CONFLICT: i32 = 3;
/// Exit code for push, pull request, merge, and hosting API failures
pub const EXIT_REMOTE_FAILURE: i32 = 4;

/// Errors that can occur while landing a stack
#[derive(Error, Debug)]
pub enum Error {
    /// No local commits ahead of the base branch
    #[error("no commits to land")]
    EmptyStack,

    /// Rebasing onto the upstream base failed with conflicts
    #[error("rebase onto {onto} failed: {message}")]
    RebaseConflict {
        /// Ref the branch was being rebased onto
        onto: String,
        /// Output from git
        message: String,
    },

    /// Pushing a temporary branch was rejected
    #[error("failed to push {branch}: {message}")]
    PublishFailure {
        /// Temporary branch name
        branch: String,
        /// Output from git
        message: String,
    },

    /// Opening the pull request failed
    #[error("failed to create pull request for {branch}: {message}")]
    PrCreationFailure {
        /// Head branch of the pull request
        branch: String,
        /// Error from the hosting API
        message: String,
    },

    /// The pull request never became mergeable within the retry policy
    #[error("PR #{pr_number} was not mergeable after {attempts} attempt(s)")]
    MergeabilityTimeout {
        /// Pull request number
        pr_number: u64,
        /// Number of status polls performed
        attempts: u32,
    },

    /// Merging (or enabling auto-merge) failed
    #[error("failed to merge PR #{pr_number}: {message}")]
    MergeFailure {
        /// Pull request number
        pr_number: u64,
        /// Reason reported by the hosting API or status check
        message: String,
    },

    /// Flags that cannot be used together (or not with this stack)
    #[error("invalid flag combination: {0}")]
    InvalidFlagCombination(String),

    /// A fatal condition was hit mid-run and rollback was performed
    #[error("{0}")]
    Aborted(Box<AbortReport>),

    /// Working copy has uncommitted changes
    #[error("working tree is dirty, stash or commit your changes first")]
    DirtyWorkingCopy,

    /// A merge commit was found between the base and HEAD
    #[error("stack is not linear: {0} is a merge commit")]
    NonLinearStack(String),

    /// Git reported a conflict outside of a rebase (e.g. cherry-pick)
    #[error("git conflict: {0}")]
    GitConflict(String),

    /// Git could not reach the remote or the remote rejected the operation
    #[error("git remote error: {0}")]
    GitRemote(String),

    /// A ref, commit, or branch does not exist
    #[error("not found: {0}")]
    GitNotFound(String),

    /// Any other git failure
    #[error("git error: {0}")]
    Git(String),

    /// Remote not configured in the repository
    #[error("remote not found: {0}")]
    RemoteNotFound(String),

    /// Remote URL does not point at a supported host
    #[error("no supported remotes found (GitHub)")]
    NoSupportedRemotes,

    /// Authentication failure
    #[error("authentication failed: {0}")]
    Auth(String),

    /// GitHub API error
    #[error("GitHub API error: {0}")]
    GitHubApi(String),

    /// Generic platform error
    #[error("platform error: {0}")]
    Platform(String),

    /// Configuration file could not be read or parsed
    #[error("config error: {0}")]
    Config(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Process exit code for this error
    ///
    /// Aborted runs report the code of the condition that caused the abort.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::EmptyStack => EXIT_SUCCESS,
            Self::InvalidFlagCombination(_) => EXIT_INVALID_FLAGS,
            Self::RebaseConflict { .. } => EXIT_REBASE_CONFLICT,
            Self::PublishFailure { .. }
            | Self::PrCreationFailure { .. }
            | Self::MergeabilityTimeout { .. }
            | Self::MergeFailure { .. }
            | Self::GitRemote(_)
            | Self::GitHubApi(_)
            | Self::Platform(_) => EXIT_REMOTE_FAILURE,
            Self::Aborted(report) => report.cause.exit_code(),
            _ => EXIT_FAILURE,
        }
    }

    /// Whether this error is the benign "nothing to do" signal
    pub const fn is_empty_stack(&self) -> bool {
        matches!(self, Self::EmptyStack)
    }
}

impl From<octocrab::Error> for Error {
    fn from(err: octocrab::Error) -> Self {
        Self::GitHubApi(err.to_string())
    }
}

/// Result type alias for land-stack operations
pub type Result<T> = std::result::Result<T, Error>;
