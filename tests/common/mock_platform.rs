//! In-memory GitHub stand-in
//!
//! Every trait call is appended to one ordered log; the accessors below
//! filter it by kind.

#![allow(dead_code)]

use async_trait::async_trait;
use land_stack::error::{Error, Result};
use land_stack::platform::PlatformService;
use land_stack::types::{
    ChecksStatus, MergeResult, Mergeability, PlatformConfig, PrStatus, PullRequest,
};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Arguments of one PR creation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatePrCall {
    pub head: String,
    pub base: String,
    pub title: String,
    pub body: Option<String>,
    pub draft: bool,
}

/// Arguments of one base change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateBaseCall {
    pub pr_number: u64,
    pub new_base: String,
}

/// Arguments of a squash merge, immediate or queued
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergePrCall {
    pub pr_number: u64,
    pub title: String,
    pub message: String,
}

/// Trait operations that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    FindPr,
    CreatePr,
    UpdateBase,
    MergePr,
    AutoMerge,
}

#[derive(Debug, Clone)]
enum Call {
    FindPr(String),
    CreatePr(CreatePrCall),
    UpdateBase(UpdateBaseCall),
    Status(u64),
    MergePr(MergePrCall),
    AutoMerge(MergePrCall),
}

#[derive(Debug, Clone)]
struct Failure {
    message: String,
    /// First call of this op that fails (1-based)
    from: usize,
}

type MergeHook = Box<dyn Fn(&PullRequest, &str, &str) + Send + Sync>;

/// Platform double with numbered PRs, scripted statuses and a merge hook
///
/// Statuses default to [`ready_status`]. The merge hook lets a mock
/// repository apply the squash upstream when a merge succeeds.
pub struct MockPlatformService {
    config: PlatformConfig,
    next_number: AtomicU64,
    open: Mutex<HashMap<u64, PullRequest>>,
    existing: Mutex<HashMap<String, Option<PullRequest>>>,
    statuses: Mutex<HashMap<u64, VecDeque<PrStatus>>>,
    fallback_status: Mutex<PrStatus>,
    merge_results: Mutex<HashMap<u64, MergeResult>>,
    merge_hook: Mutex<Option<MergeHook>>,
    log: Mutex<Vec<Call>>,
    failures: Mutex<HashMap<Op, Failure>>,
}

/// Mergeable, CI green
pub fn ready_status() -> PrStatus {
    PrStatus {
        mergeability: Mergeability::Mergeable,
        checks: ChecksStatus::Passed,
        detail: Some("clean".to_string()),
    }
}

/// Mergeability not computed yet
pub fn unknown_status() -> PrStatus {
    PrStatus {
        mergeability: Mergeability::Unknown,
        checks: ChecksStatus::Pending,
        detail: Some("unknown".to_string()),
    }
}

/// Mergeable but CI red
pub fn failed_checks_status() -> PrStatus {
    PrStatus {
        mergeability: Mergeability::Mergeable,
        checks: ChecksStatus::Failed,
        detail: Some("unstable".to_string()),
    }
}

impl MockPlatformService {
    pub fn with_config(config: PlatformConfig) -> Self {
        Self {
            config,
            next_number: AtomicU64::new(1),
            open: Mutex::new(HashMap::new()),
            existing: Mutex::new(HashMap::new()),
            statuses: Mutex::new(HashMap::new()),
            fallback_status: Mutex::new(ready_status()),
            merge_results: Mutex::new(HashMap::new()),
            merge_hook: Mutex::new(None),
            log: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Make every call of `op` fail with `msg`
    pub fn fail_on(&self, op: Op, msg: &str) {
        self.fail_on_from(op, 1, msg);
    }

    /// Make the `nth` and later calls of `op` fail with `msg` (1-based)
    pub fn fail_on_from(&self, op: Op, nth: usize, msg: &str) {
        self.failures.lock().unwrap().insert(
            op,
            Failure {
                message: msg.to_string(),
                from: nth,
            },
        );
    }

    /// Pretend a PR already exists (or explicitly not) for `branch`
    pub fn set_find_pr_response(&self, branch: &str, pr: Option<PullRequest>) {
        self.existing
            .lock()
            .unwrap()
            .insert(branch.to_string(), pr);
    }

    /// Queue statuses for successive polls of one PR
    ///
    /// Polls past the end of the queue see the fallback status.
    pub fn script_status(&self, pr_number: u64, statuses: Vec<PrStatus>) {
        self.statuses
            .lock()
            .unwrap()
            .insert(pr_number, statuses.into());
    }

    pub fn set_default_status(&self, status: PrStatus) {
        *self.fallback_status.lock().unwrap() = status;
    }

    pub fn set_merge_response(&self, pr_number: u64, result: MergeResult) {
        self.merge_results
            .lock()
            .unwrap()
            .insert(pr_number, result);
    }

    /// Run `hook(pr, title, message)` after each successful merge
    pub fn on_merge(&self, hook: impl Fn(&PullRequest, &str, &str) + Send + Sync + 'static) {
        *self.merge_hook.lock().unwrap() = Some(Box::new(hook));
    }

    fn record(&self, call: Call) {
        self.log.lock().unwrap().push(call);
    }

    fn select<T>(&self, pick: impl Fn(&Call) -> Option<T>) -> Vec<T> {
        self.log.lock().unwrap().iter().filter_map(pick).collect()
    }

    /// Error for the `count`th call of `op`, if one was injected
    fn injected(&self, op: Op, count: usize) -> Result<()> {
        match self.failures.lock().unwrap().get(&op) {
            Some(failure) if count >= failure.from => {
                Err(Error::Platform(failure.message.clone()))
            }
            _ => Ok(()),
        }
    }

    /// Branches looked up, in order
    pub fn lookups(&self) -> Vec<String> {
        self.select(|c| match c {
            Call::FindPr(branch) => Some(branch.clone()),
            _ => None,
        })
    }

    pub fn created(&self) -> Vec<CreatePrCall> {
        self.select(|c| match c {
            Call::CreatePr(call) => Some(call.clone()),
            _ => None,
        })
    }

    pub fn retargets(&self) -> Vec<UpdateBaseCall> {
        self.select(|c| match c {
            Call::UpdateBase(call) => Some(call.clone()),
            _ => None,
        })
    }

    /// PR numbers whose status was polled, in order
    pub fn status_polls(&self) -> Vec<u64> {
        self.select(|c| match c {
            Call::Status(number) => Some(*number),
            _ => None,
        })
    }

    pub fn merges(&self) -> Vec<MergePrCall> {
        self.select(|c| match c {
            Call::MergePr(call) => Some(call.clone()),
            _ => None,
        })
    }

    pub fn auto_merges(&self) -> Vec<MergePrCall> {
        self.select(|c| match c {
            Call::AutoMerge(call) => Some(call.clone()),
            _ => None,
        })
    }

    pub fn merge_call_count(&self) -> usize {
        self.merges().len()
    }

    /// Every recorded trait call
    pub fn total_calls(&self) -> usize {
        self.log.lock().unwrap().len()
    }

    pub fn assert_create_pr_called(&self, head: &str, base: &str) {
        let created = self.created();
        assert!(
            created.iter().any(|c| c.head == head && c.base == base),
            "no PR opened from {head} onto {base}; opened: {created:?}"
        );
    }

    pub fn assert_update_base_called(&self, pr_number: u64, new_base: &str) {
        let retargets = self.retargets();
        assert!(
            retargets
                .iter()
                .any(|c| c.pr_number == pr_number && c.new_base == new_base),
            "#{pr_number} never retargeted to {new_base}; retargets: {retargets:?}"
        );
    }

    pub fn assert_merge_called(&self, pr_number: u64) {
        let merges = self.merges();
        assert!(
            merges.iter().any(|c| c.pr_number == pr_number),
            "#{pr_number} was not merged; merges: {merges:?}"
        );
    }

    pub fn assert_merge_not_called(&self, pr_number: u64) {
        let merges = self.merges();
        assert!(
            merges.iter().all(|c| c.pr_number != pr_number),
            "#{pr_number} should not have been merged; merges: {merges:?}"
        );
    }

    fn calls_of(&self, op: Op) -> usize {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|c| {
                matches!(
                    (op, c),
                    (Op::FindPr, Call::FindPr(_))
                        | (Op::CreatePr, Call::CreatePr(_))
                        | (Op::UpdateBase, Call::UpdateBase(_))
                        | (Op::MergePr, Call::MergePr(_))
                        | (Op::AutoMerge, Call::AutoMerge(_))
                )
            })
            .count()
    }
}

#[async_trait]
impl PlatformService for MockPlatformService {
    async fn find_existing_pr(&self, head_branch: &str) -> Result<Option<PullRequest>> {
        self.record(Call::FindPr(head_branch.to_string()));
        self.injected(Op::FindPr, self.calls_of(Op::FindPr))?;

        let existing = self.existing.lock().unwrap();
        Ok(existing.get(head_branch).cloned().flatten())
    }

    async fn create_pr_with_options(
        &self,
        head: &str,
        base: &str,
        title: &str,
        body: Option<&str>,
        draft: bool,
    ) -> Result<PullRequest> {
        self.record(Call::CreatePr(CreatePrCall {
            head: head.to_string(),
            base: base.to_string(),
            title: title.to_string(),
            body: body.map(ToString::to_string),
            draft,
        }));
        self.injected(Op::CreatePr, self.calls_of(Op::CreatePr))?;

        let number = self.next_number.fetch_add(1, Ordering::SeqCst);
        let pr = PullRequest {
            number,
            html_url: format!("https://github.com/acme/widgets/pull/{number}"),
            base_ref: base.to_string(),
            head_ref: head.to_string(),
            title: title.to_string(),
            node_id: Some(format!("PR_node_{number}")),
            is_draft: draft,
        };
        self.open.lock().unwrap().insert(number, pr.clone());
        Ok(pr)
    }

    async fn update_pr_base(&self, pr_number: u64, new_base: &str) -> Result<PullRequest> {
        self.record(Call::UpdateBase(UpdateBaseCall {
            pr_number,
            new_base: new_base.to_string(),
        }));
        self.injected(Op::UpdateBase, self.calls_of(Op::UpdateBase))?;

        let mut open = self.open.lock().unwrap();
        let pr = open
            .get_mut(&pr_number)
            .ok_or_else(|| Error::Platform(format!("no PR #{pr_number}")))?;
        pr.base_ref = new_base.to_string();
        Ok(pr.clone())
    }

    async fn get_status(&self, pr_number: u64) -> Result<PrStatus> {
        self.record(Call::Status(pr_number));

        let queued = self
            .statuses
            .lock()
            .unwrap()
            .get_mut(&pr_number)
            .and_then(VecDeque::pop_front);
        Ok(queued.unwrap_or_else(|| self.fallback_status.lock().unwrap().clone()))
    }

    async fn merge_pr(&self, pr_number: u64, title: &str, message: &str) -> Result<MergeResult> {
        self.record(Call::MergePr(MergePrCall {
            pr_number,
            title: title.to_string(),
            message: message.to_string(),
        }));
        self.injected(Op::MergePr, self.calls_of(Op::MergePr))?;

        let result = self
            .merge_results
            .lock()
            .unwrap()
            .get(&pr_number)
            .cloned()
            .unwrap_or(MergeResult {
                merged: true,
                sha: Some(format!("merged_sha_{pr_number}")),
                message: None,
            });

        if result.merged {
            let pr = self.open.lock().unwrap().get(&pr_number).cloned();
            if let (Some(pr), Some(hook)) = (pr, self.merge_hook.lock().unwrap().as_ref()) {
                hook(&pr, title, message);
            }
        }
        Ok(result)
    }

    async fn enable_auto_merge(&self, pr: &PullRequest, title: &str, message: &str) -> Result<()> {
        self.record(Call::AutoMerge(MergePrCall {
            pr_number: pr.number,
            title: title.to_string(),
            message: message.to_string(),
        }));
        self.injected(Op::AutoMerge, self.calls_of(Op::AutoMerge))
    }

    fn config(&self) -> &PlatformConfig {
        &self.config
    }
}
