//! Dry-run platform: no network, every request is printed and answered locally

use super::PlatformService;
use crate::error::Result;
use crate::types::{
    ChecksStatus, MergeResult, Mergeability, PlatformConfig, PrStatus, PullRequest,
};
use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Stands in for a hosting provider during `--dry-run`
///
/// PRs get synthetic numbers, are always ready, and always merge. Nothing
/// is sent anywhere.
pub struct DryRunPlatform {
    config: PlatformConfig,
    next_number: AtomicU64,
    quiet: bool,
    operations: Mutex<Vec<String>>,
}

impl DryRunPlatform {
    /// Create a dry-run platform for a repository
    pub const fn new(config: PlatformConfig) -> Self {
        Self {
            config,
            next_number: AtomicU64::new(1),
            quiet: false,
            operations: Mutex::new(Vec::new()),
        }
    }

    /// Record operations without printing them
    #[must_use]
    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    /// Requests that would have been sent, in order
    pub fn operations(&self) -> Vec<String> {
        self.operations
            .lock()
            .map(|ops| ops.clone())
            .unwrap_or_default()
    }

    fn record(&self, operation: String) {
        if !self.quiet {
            anstream::println!("[dry-run] would {operation}");
        }
        if let Ok(mut ops) = self.operations.lock() {
            ops.push(operation);
        }
    }
}

#[async_trait]
impl PlatformService for DryRunPlatform {
    async fn find_existing_pr(&self, _head_branch: &str) -> Result<Option<PullRequest>> {
        Ok(None)
    }

    async fn create_pr_with_options(
        &self,
        head: &str,
        base: &str,
        title: &str,
        _body: Option<&str>,
        draft: bool,
    ) -> Result<PullRequest> {
        let number = self.next_number.fetch_add(1, Ordering::Relaxed);
        let kind = if draft { "draft PR" } else { "PR" };
        self.record(format!(
            "open {kind} {head} -> {base} on {}: {title}",
            self.config.slug()
        ));
        Ok(PullRequest {
            number,
            html_url: format!("(dry-run PR {number})"),
            base_ref: base.to_string(),
            head_ref: head.to_string(),
            title: title.to_string(),
            node_id: None,
            is_draft: draft,
        })
    }

    async fn update_pr_base(&self, pr_number: u64, new_base: &str) -> Result<PullRequest> {
        self.record(format!("retarget PR #{pr_number} onto {new_base}"));
        Ok(PullRequest {
            number: pr_number,
            html_url: format!("(dry-run PR {pr_number})"),
            base_ref: new_base.to_string(),
            head_ref: String::new(),
            title: String::new(),
            node_id: None,
            is_draft: false,
        })
    }

    async fn get_status(&self, _pr_number: u64) -> Result<PrStatus> {
        Ok(PrStatus {
            mergeability: Mergeability::Mergeable,
            checks: ChecksStatus::Passed,
            detail: Some("clean".to_string()),
        })
    }

    async fn merge_pr(&self, pr_number: u64, title: &str, _message: &str) -> Result<MergeResult> {
        self.record(format!("squash-merge PR #{pr_number} as \"{title}\""));
        Ok(MergeResult {
            merged: true,
            sha: None,
            message: None,
        })
    }

    async fn enable_auto_merge(&self, pr: &PullRequest, title: &str, _message: &str) -> Result<()> {
        self.record(format!(
            "enable auto-merge on PR #{} as \"{title}\"",
            pr.number
        ));
        Ok(())
    }

    fn config(&self) -> &PlatformConfig {
        &self.config
    }
}
