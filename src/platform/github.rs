//! Pull requests on github.com and GitHub Enterprise, via octocrab

use crate::error::{Error, Result};
use crate::platform::PlatformService;
use crate::types::{
    ChecksStatus, MergeResult, Mergeability, Platform, PlatformConfig, PrStatus, PullRequest,
};
use async_trait::async_trait;
use octocrab::Octocrab;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

// enablePullRequestAutoMerge payload

#[derive(Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnableAutoMergeData {
    enable_pull_request_auto_merge: EnableAutoMergePayload,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnableAutoMergePayload {
    pull_request: GraphQlPullRequest,
}

#[derive(Deserialize)]
struct GraphQlPullRequest {
    number: u64,
}

enum CiReply<T> {
    Found(T),
    Absent,
    Unavailable,
}

#[derive(Deserialize)]
struct CombinedStatus {
    state: String,
    total_count: u32,
}

#[derive(Deserialize)]
struct CheckRunList {
    check_runs: Vec<CheckRun>,
}

#[derive(Deserialize)]
struct CheckRun {
    name: Option<String>,
    status: String,
    conclusion: Option<String>,
}

/// [`PlatformService`] backed by the GitHub REST and GraphQL APIs
pub struct GitHubService {
    client: Octocrab,
    config: PlatformConfig,
    /// Owner of the fork that holds head branches, when it differs from `config.owner`
    fork_owner: Option<String>,
    /// Status and check-run endpoints are called directly with reqwest
    token: String,
    http_client: Client,
    /// API base URL for raw requests, e.g. `https://api.github.com`
    api_base: String,
}

impl GitHubService {
    /// Create a new GitHub service for the repository PRs are opened against
    pub fn new(token: &str, owner: String, repo: String, host: Option<String>) -> Result<Self> {
        let api_base = host.as_ref().map_or_else(
            || "https://api.github.com".to_string(),
            |h| format!("https://{h}/api/v3"),
        );
        let config = PlatformConfig {
            platform: Platform::GitHub,
            owner,
            repo,
            host,
        };
        Self::with_api_base(token, config, &api_base)
    }

    /// Create a service talking to an explicit API base URL
    pub fn with_api_base(token: &str, config: PlatformConfig, api_base: &str) -> Result<Self> {
        let api_base = api_base.trim_end_matches('/').to_string();
        let client = Octocrab::builder()
            .personal_token(token.to_string())
            .base_uri(api_base.as_str())
            .map_err(|e| Error::GitHubApi(e.to_string()))?
            .build()
            .map_err(|e| Error::GitHubApi(e.to_string()))?;

        let http_client = Client::builder()
            .user_agent("land-stack")
            .build()
            .map_err(|e| Error::GitHubApi(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            client,
            config,
            fork_owner: None,
            token: token.to_string(),
            http_client,
            api_base,
        })
    }

    /// Head branches live in `owner`'s fork
    #[must_use]
    pub fn with_fork_owner(mut self, owner: &str) -> Self {
        if !owner.eq_ignore_ascii_case(&self.config.owner) {
            self.fork_owner = Some(owner.to_string());
        }
        self
    }

    /// Login of the authenticated user
    pub async fn current_user_login(&self) -> Result<String> {
        let user = self.client.current().user().await?;
        Ok(user.login)
    }

    /// `owner:branch` for cross-fork heads, plain branch otherwise
    fn qualify_head(&self, head: &str) -> String {
        self.fork_owner
            .as_ref()
            .map_or_else(|| head.to_string(), |owner| format!("{owner}:{head}"))
    }

    /// GET a CI endpoint
    ///
    /// 404 means the endpoint has nothing for this commit. Any other failure
    /// leaves the CI state unknown.
    async fn get_ci<T: DeserializeOwned>(&self, url: &str) -> Result<CiReply<T>> {
        let response = self
            .http_client
            .get(url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .send()
            .await
            .map_err(|e| Error::GitHubApi(format!("GET {url}: {e}")))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!(url, "no CI data at endpoint");
            return Ok(CiReply::Absent);
        }
        if !status.is_success() {
            warn!(%status, url, "CI endpoint unavailable, checks stay pending");
            return Ok(CiReply::Unavailable);
        }
        let body = response
            .json()
            .await
            .map_err(|e| Error::GitHubApi(format!("unreadable CI response from {url}: {e}")))?;
        Ok(CiReply::Found(body))
    }

    /// CI verdict for `sha`, folding the combined commit status together
    /// with the check runs reported by GitHub Actions
    pub async fn check_ci_status(&self, sha: &str) -> Result<ChecksStatus> {
        let status_url = self.commit_url(sha, "status");
        let statuses = match self.get_ci::<CombinedStatus>(&status_url).await? {
            CiReply::Found(combined) => summarize_commit_status(&combined),
            CiReply::Absent => ChecksStatus::Passed,
            CiReply::Unavailable => ChecksStatus::Pending,
        };
        let runs_url = self.commit_url(sha, "check-runs");
        let runs = match self.get_ci::<CheckRunList>(&runs_url).await? {
            CiReply::Found(listing) => summarize_check_runs(&listing.check_runs),
            CiReply::Absent => ChecksStatus::Passed,
            CiReply::Unavailable => ChecksStatus::Pending,
        };

        debug!(sha, ?statuses, ?runs, "ci verdict");
        Ok(combine_checks(statuses, runs))
    }

    fn commit_url(&self, sha: &str, leaf: &str) -> String {
        format!(
            "{}/repos/{}/{}/commits/{sha}/{leaf}",
            self.api_base, self.config.owner, self.config.repo
        )
    }

    async fn node_id(&self, pr: &PullRequest) -> Result<String> {
        if let Some(ref id) = pr.node_id {
            return Ok(id.clone());
        }
        let fetched = self
            .client
            .pulls(&self.config.owner, &self.config.repo)
            .get(pr.number)
            .await?;
        fetched
            .node_id
            .ok_or_else(|| Error::GitHubApi("PR missing node_id for GraphQL mutation".to_string()))
    }
}

/// An empty status list means no external CI is wired up
fn summarize_commit_status(combined: &CombinedStatus) -> ChecksStatus {
    if combined.total_count == 0 {
        return ChecksStatus::Passed;
    }
    match combined.state.as_str() {
        "success" => ChecksStatus::Passed,
        "pending" => ChecksStatus::Pending,
        _ => ChecksStatus::Failed,
    }
}

/// A completed run must conclude success, neutral or skipped
fn summarize_check_runs(runs: &[CheckRun]) -> ChecksStatus {
    runs.iter().fold(ChecksStatus::Passed, |verdict, run| {
        let this = if run.status != "completed" {
            ChecksStatus::Pending
        } else if matches!(
            run.conclusion.as_deref(),
            Some("success" | "neutral" | "skipped")
        ) {
            ChecksStatus::Passed
        } else {
            debug!(
                run = run.name.as_deref().unwrap_or("?"),
                conclusion = ?run.conclusion,
                "check run did not pass"
            );
            ChecksStatus::Failed
        };
        combine_checks(verdict, this)
    })
}

/// Failed beats pending beats passed
pub(crate) fn combine_checks(a: ChecksStatus, b: ChecksStatus) -> ChecksStatus {
    match (a, b) {
        (ChecksStatus::Failed, _) | (_, ChecksStatus::Failed) => ChecksStatus::Failed,
        (ChecksStatus::Pending, _) | (_, ChecksStatus::Pending) => ChecksStatus::Pending,
        _ => ChecksStatus::Passed,
    }
}

/// Map GitHub's `mergeable` / `mergeable_state` pair onto [`Mergeability`]
///
/// `mergeable` is `null` while GitHub computes it. `dirty` means conflicts.
/// `blocked`, `behind` and `draft` may still resolve, so they stay unknown.
pub(crate) fn classify_mergeability(mergeable: Option<bool>, state: Option<&str>) -> Mergeability {
    match (mergeable, state) {
        (Some(false), _) | (_, Some("dirty")) => Mergeability::Blocked,
        (Some(true), Some("clean" | "unstable" | "has_hooks")) => Mergeability::Mergeable,
        _ => Mergeability::Unknown,
    }
}

/// Keep only the fields the lander reads
fn pr_from_octocrab(pr: &octocrab::models::pulls::PullRequest) -> PullRequest {
    PullRequest {
        number: pr.number,
        html_url: pr
            .html_url
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default(),
        base_ref: pr.base.ref_field.clone(),
        head_ref: pr.head.ref_field.clone(),
        title: pr.title.as_deref().unwrap_or_default().to_string(),
        node_id: pr.node_id.clone(),
        is_draft: pr.draft.unwrap_or(false),
    }
}

#[async_trait]
impl PlatformService for GitHubService {
    async fn find_existing_pr(&self, head_branch: &str) -> Result<Option<PullRequest>> {
        debug!(head_branch, "looking up open PR");
        let owner = self.fork_owner.as_ref().unwrap_or(&self.config.owner);
        let head = format!("{owner}:{head_branch}");

        let prs = self
            .client
            .pulls(&self.config.owner, &self.config.repo)
            .list()
            .head(head)
            .state(octocrab::params::State::Open)
            .send()
            .await?;

        let found = prs.items.first().map(pr_from_octocrab);
        debug!(head_branch, pr = ?found.as_ref().map(|pr| pr.number), "open PR lookup");
        Ok(found)
    }

    async fn create_pr_with_options(
        &self,
        head: &str,
        base: &str,
        title: &str,
        body: Option<&str>,
        draft: bool,
    ) -> Result<PullRequest> {
        let head = self.qualify_head(head);
        let pulls = self.client.pulls(&self.config.owner, &self.config.repo);
        let request = pulls.create(title, &head, base).draft(draft);
        let request = match body {
            Some(text) => request.body(text),
            None => request,
        };

        let opened = pr_from_octocrab(&request.send().await?);
        debug!(head, base, draft, pr = opened.number, "opened PR");
        Ok(opened)
    }

    async fn update_pr_base(&self, pr_number: u64, new_base: &str) -> Result<PullRequest> {
        let pr = self
            .client
            .pulls(&self.config.owner, &self.config.repo)
            .update(pr_number)
            .base(new_base)
            .send()
            .await?;

        debug!(pr_number, new_base, "retargeted PR");
        Ok(pr_from_octocrab(&pr))
    }

    async fn get_status(&self, pr_number: u64) -> Result<PrStatus> {
        let pr = self
            .client
            .pulls(&self.config.owner, &self.config.repo)
            .get(pr_number)
            .await?;

        // mergeable_state is a non-exhaustive enum; go through its wire name
        let state = pr
            .mergeable_state
            .as_ref()
            .and_then(|s| serde_json::to_value(s).ok())
            .and_then(|v| v.as_str().map(ToString::to_string));

        let mergeability = classify_mergeability(pr.mergeable, state.as_deref());
        let checks = self.check_ci_status(&pr.head.sha).await?;

        let status = PrStatus {
            mergeability,
            checks,
            detail: state,
        };
        debug!(pr_number, ?status, "polled PR");
        Ok(status)
    }

    async fn merge_pr(&self, pr_number: u64, title: &str, message: &str) -> Result<MergeResult> {
        let response = self
            .client
            .pulls(&self.config.owner, &self.config.repo)
            .merge(pr_number)
            .method(octocrab::params::pulls::MergeMethod::Squash)
            .title(title)
            .message(message)
            .send()
            .await
            .map_err(|e| Error::GitHubApi(format!("Merge failed: {e}")))?;

        debug!(pr_number, merged = response.merged, sha = ?response.sha, "squash merge");
        Ok(MergeResult {
            merged: response.merged,
            sha: response.sha,
            message: response.message,
        })
    }

    async fn enable_auto_merge(&self, pr: &PullRequest, title: &str, message: &str) -> Result<()> {
        let node_id = self.node_id(pr).await?;

        let response: GraphQlResponse<EnableAutoMergeData> = self
            .client
            .graphql(&serde_json::json!({
                "query": r"
                    mutation EnablePullRequestAutoMerge($pullRequestId: ID!, $headline: String, $body: String) {
                        enablePullRequestAutoMerge(input: {
                            pullRequestId: $pullRequestId,
                            mergeMethod: SQUASH,
                            commitHeadline: $headline,
                            commitBody: $body
                        }) {
                            pullRequest {
                                number
                            }
                        }
                    }
                ",
                "variables": {
                    "pullRequestId": node_id,
                    "headline": title,
                    "body": message
                }
            }))
            .await
            .map_err(|e| Error::GitHubApi(format!("auto-merge request failed: {e}")))?;

        let errors = response.errors.unwrap_or_default();
        if !errors.is_empty() {
            let joined = errors
                .into_iter()
                .map(|e| e.message)
                .collect::<Vec<_>>()
                .join(", ");
            return Err(Error::GitHubApi(format!("GraphQL error: {joined}")));
        }

        let queued = response
            .data
            .ok_or_else(|| Error::GitHubApi("GraphQL response carried no data".to_string()))?;
        debug!(
            pr = queued.enable_pull_request_auto_merge.pull_request.number,
            "queued for auto-merge"
        );
        Ok(())
    }

    fn config(&self) -> &PlatformConfig {
        &self.config
    }
}
