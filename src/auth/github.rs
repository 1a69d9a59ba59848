//! GitHub token discovery

use super::AuthSource;
use crate::error::{Error, Result};
use std::env;
use tokio::process::Command;
use tracing::debug;

/// Environment variables checked for a token, in order
const TOKEN_VARS: [&str; 2] = ["GITHUB_TOKEN", "GH_TOKEN"];

/// Resolved GitHub credentials
#[derive(Debug, Clone)]
pub struct GitHubAuthConfig {
    /// API token
    pub token: String,
    /// Where the token came from
    pub source: AuthSource,
    /// Enterprise host, `None` for github.com
    pub host: Option<String>,
}

/// First non-empty token among [`TOKEN_VARS`]
fn token_from_env(lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
    TOKEN_VARS
        .iter()
        .filter_map(|var| lookup(var))
        .map(|token| token.trim().to_string())
        .find(|token| !token.is_empty())
}

/// Ask the `gh` CLI for its token
async fn token_from_gh(host: Option<&str>) -> Option<String> {
    let mut cmd = Command::new("gh");
    cmd.args(["auth", "token"]);
    if let Some(host) = host {
        cmd.args(["--hostname", host]);
    }

    let output = cmd.output().await.ok()?;
    if !output.status.success() {
        debug!(status = %output.status, "gh auth token failed");
        return None;
    }

    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!token.is_empty()).then_some(token)
}

/// Find a GitHub token
///
/// Checks `GITHUB_TOKEN`, then `GH_TOKEN`, then `gh auth token`.
pub async fn get_github_auth(host: Option<&str>) -> Result<GitHubAuthConfig> {
    let host = host.map(ToString::to_string);

    if let Some(token) = token_from_env(|var| env::var(var).ok()) {
        debug!("using GitHub token from environment");
        return Ok(GitHubAuthConfig {
            token,
            source: AuthSource::EnvVar,
            host,
        });
    }

    if let Some(token) = token_from_gh(host.as_deref()).await {
        debug!("using GitHub token from gh CLI");
        return Ok(GitHubAuthConfig {
            token,
            source: AuthSource::Cli,
            host,
        });
    }

    Err(Error::Auth(
        "no GitHub token found: set GITHUB_TOKEN (or GH_TOKEN), or run `gh auth login`"
            .to_string(),
    ))
}
