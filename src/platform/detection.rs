//! Platform detection from remote URLs

use crate::error::{Error, Result};
use crate::types::{Platform, PlatformConfig};
use regex::Regex;
use std::env;
use std::sync::LazyLock;
use url::Url;

/// scp-like syntax: `git@host:owner/repo.git`
static SCP_LIKE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[\w.-]+@)?([\w.-]+):/?([\w.-]+)/([\w.-]+?)(?:\.git)?/*$")
        .expect("valid regex")
});

/// Split a remote URL into host, owner and repo
fn split_remote_url(url: &str) -> Option<(String, String, String)> {
    let url = url.trim();

    if let Ok(parsed) = Url::parse(url)
        && parsed.has_host()
    {
        let host = parsed.host_str()?.to_lowercase();
        let mut segments = parsed
            .path_segments()?
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();
        if segments.len() < 2 {
            return None;
        }
        let repo = segments.pop()?;
        let owner = segments.pop()?;
        let repo = repo.strip_suffix(".git").unwrap_or(repo);
        return Some((host, owner.to_string(), repo.to_string()));
    }

    let caps = SCP_LIKE.captures(url)?;
    Some((
        caps[1].to_lowercase(),
        caps[2].to_string(),
        caps[3].to_string(),
    ))
}

fn is_github_host(host: &str) -> bool {
    if host == "github.com" || host == "www.github.com" {
        return true;
    }
    if let Ok(gh_host) = env::var("GH_HOST")
        && gh_host.eq_ignore_ascii_case(host)
    {
        return true;
    }
    host.split('.').any(|label| label == "github")
}

/// Detect the hosting platform of a remote URL
pub fn detect_platform(url: &str) -> Option<Platform> {
    let (host, _, _) = split_remote_url(url)?;
    is_github_host(&host).then_some(Platform::GitHub)
}

/// Parse a remote URL into a [`PlatformConfig`]
pub fn parse_repo_info(url: &str) -> Result<PlatformConfig> {
    let (host, owner, repo) = split_remote_url(url).ok_or(Error::NoSupportedRemotes)?;
    if !is_github_host(&host) {
        return Err(Error::NoSupportedRemotes);
    }

    let host = match host.as_str() {
        "github.com" | "www.github.com" => None,
        _ => Some(host),
    };

    Ok(PlatformConfig {
        platform: Platform::GitHub,
        owner,
        repo,
        host,
    })
}
