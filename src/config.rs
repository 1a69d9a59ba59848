//! Run configuration and the optional per-repository defaults file.
//!
//! `LandConfig` is assembled once at startup from built-in defaults, the
//! defaults file in `<git-dir>/land-stack/config.toml`, and CLI flags (in
//! increasing precedence). It is then passed by reference everywhere.

use crate::error::{Error, Result};
use crate::types::{LandingMode, MergeMode};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Directory name for land-stack metadata within the git dir.
const CONFIG_DIR: &str = "land-stack";

/// Filename for the defaults file.
const CONFIG_FILE: &str = "config.toml";

/// Default base branch
pub const DEFAULT_BASE: &str = "main";
/// Default fork remote
pub const DEFAULT_REMOTE: &str = "origin";
/// Default upstream remote
pub const DEFAULT_UPSTREAM_REMOTE: &str = "upstream";
/// Fallback branch prefix when the GitHub login is unavailable
pub const DEFAULT_PREFIX: &str = "dev/";

/// Bounded polling schedule for mergeability checks
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of status polls
    pub max_attempts: u32,
    /// Delay before the second poll
    pub interval: Duration,
    /// Multiplier applied to the delay after each poll (1.0 = fixed)
    pub backoff: f64,
    /// Upper bound for the delay
    pub max_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 60,
            interval: Duration::from_secs(10),
            backoff: 1.0,
            max_interval: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the given (0-based) attempt
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = self.backoff.max(1.0).powi(i32::try_from(attempt).unwrap_or(i32::MAX));
        let secs = self.interval.as_secs_f64() * factor;
        if !secs.is_finite() || secs > self.max_interval.as_secs_f64() {
            return self.max_interval.max(self.interval);
        }
        Duration::from_secs_f64(secs)
    }
}

/// Immutable configuration for one landing run
#[derive(Debug, Clone, PartialEq)]
#[allow(clippy::struct_excessive_bools)]
pub struct LandConfig {
    /// Protected base branch the PRs target
    pub base: String,
    /// Fork remote temp branches are pushed to
    pub remote: String,
    /// Remote that owns the base branch
    pub upstream_remote: String,
    /// Temp branch prefix (always ends with `/`)
    pub prefix: String,
    /// Open PRs as drafts
    pub draft: bool,
    /// What to do once a PR is open
    pub merge_mode: MergeMode,
    /// Sequential or chained PRs
    pub landing_mode: LandingMode,
    /// Print operations instead of running them
    pub dry_run: bool,
    /// Force-push temp branches on their first push
    pub force: bool,
    /// Mergeability polling schedule
    pub retry: RetryPolicy,
    /// Commits given on the command line, in caller order
    pub explicit_commits: Vec<String>,
}

impl Default for LandConfig {
    fn default() -> Self {
        Self {
            base: DEFAULT_BASE.to_string(),
            remote: DEFAULT_REMOTE.to_string(),
            upstream_remote: DEFAULT_UPSTREAM_REMOTE.to_string(),
            prefix: DEFAULT_PREFIX.to_string(),
            draft: false,
            merge_mode: MergeMode::Merge,
            landing_mode: LandingMode::Sequential,
            dry_run: false,
            force: false,
            retry: RetryPolicy::default(),
            explicit_commits: Vec::new(),
        }
    }
}

impl LandConfig {
    /// Remote-tracking ref of the upstream base, e.g. `upstream/main`
    pub fn upstream_ref(&self) -> String {
        format!("{}/{}", self.upstream_remote, self.base)
    }

    /// Apply defaults from a file; only keys present in the file are used
    #[must_use]
    pub fn with_file_defaults(mut self, file: &FileConfig) -> Self {
        if let Some(ref base) = file.base {
            self.base.clone_from(base);
        }
        if let Some(ref remote) = file.remote {
            self.remote.clone_from(remote);
        }
        if let Some(ref upstream) = file.upstream_remote {
            self.upstream_remote.clone_from(upstream);
        }
        if let Some(ref prefix) = file.prefix {
            self.prefix = normalize_prefix(prefix);
        }
        if let Some(secs) = file.poll_interval_secs {
            self.retry.interval = Duration::from_secs(secs);
        }
        if let Some(max) = file.max_polls {
            self.retry.max_attempts = max;
        }
        if let Some(backoff) = file.backoff {
            self.retry.backoff = backoff;
        }
        self
    }

    /// Reject flag combinations that are invalid regardless of the stack
    pub fn validate(&self) -> Result<()> {
        if self.draft && self.merge_mode != MergeMode::NoMerge {
            return Err(Error::InvalidFlagCombination(
                "--draft requires --no-merge (draft PRs cannot be merged)".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::InvalidFlagCombination(
                "--max-polls must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Ensure a non-empty prefix ends with a slash
pub fn normalize_prefix(prefix: &str) -> String {
    if prefix.is_empty() || prefix.ends_with('/') {
        prefix.to_string()
    } else {
        format!("{prefix}/")
    }
}

/// Contents of `config.toml`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Base branch
    pub base: Option<String>,
    /// Fork remote
    pub remote: Option<String>,
    /// Upstream remote
    pub upstream_remote: Option<String>,
    /// Temp branch prefix
    pub prefix: Option<String>,
    /// Seconds between mergeability polls
    pub poll_interval_secs: Option<u64>,
    /// Maximum mergeability polls
    pub max_polls: Option<u32>,
    /// Backoff multiplier between polls
    pub backoff: Option<f64>,
}

/// Resolve the git dir, handling worktree indirection.
///
/// In linked worktrees `.git` is a plain file of the form
/// `gitdir: <path>`; its target is the real git dir.
///
/// Falls back to `<root>/.git` if resolution fails.
pub(crate) fn resolve_git_dir(workspace_root: &Path) -> PathBuf {
    let git_path = workspace_root.join(".git");

    if git_path.is_file() {
        if let Ok(contents) = fs::read_to_string(&git_path)
            && let Some(target) = contents.trim().strip_prefix("gitdir:")
        {
            let target = PathBuf::from(target.trim());
            let target = if target.is_relative() {
                workspace_root.join(target)
            } else {
                target
            };
            if target.is_dir() {
                return fs::canonicalize(&target).unwrap_or(target);
            }
        }
        // Pointer file exists but is invalid/unreadable - return as-is to surface error
        return git_path;
    }

    git_path
}

/// Get path to the defaults file.
pub fn config_path(workspace_root: &Path) -> PathBuf {
    resolve_git_dir(workspace_root)
        .join(CONFIG_DIR)
        .join(CONFIG_FILE)
}

/// Load the defaults file.
///
/// Returns an empty `FileConfig` if the file doesn't exist.
pub fn load_file_config(workspace_root: &Path) -> Result<FileConfig> {
    let path = config_path(workspace_root);

    if !path.exists() {
        return Ok(FileConfig::default());
    }

    let content = fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;

    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("failed to parse {}: {e}", path.display())))
}
