//! Shared setup for the land command
//!
//! Resolves remotes, platform, credentials and configuration once, so the
//! orchestrator receives everything explicitly.

use crate::cli::land::LandOptions;
use land_stack::auth::get_github_auth;
use land_stack::config::{
    DEFAULT_PREFIX, LandConfig, load_file_config, normalize_prefix,
};
use land_stack::error::{Error, Result};
use land_stack::platform::{
    GitHubService, PlatformService, create_platform_service, parse_repo_info,
};
use land_stack::repo::{DryRunGit, GitOps, GitRepo};
use land_stack::types::{LandingMode, PlatformConfig};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Everything a landing run needs
///
/// Built once; the config is immutable afterwards.
pub struct CommandContext {
    /// Git gateway (dry-run wrapped when requested)
    pub git: Box<dyn GitOps>,
    /// Resolved run configuration
    pub config: LandConfig,
    /// Repository PRs are opened against
    pub upstream: PlatformConfig,
    /// Repository temp branches are pushed to
    pub fork: PlatformConfig,
    /// Platform service (GitHub, or dry-run)
    pub platform: Box<dyn PlatformService>,
}

impl CommandContext {
    /// Create a new command context
    ///
    /// - Open the repository
    /// - Merge built-in defaults, the config file and CLI flags
    /// - Detect the platform of both remotes
    /// - Find credentials (skipped for dry runs) and the branch prefix
    pub async fn new(path: &Path, options: &LandOptions) -> Result<Self> {
        let repo = GitRepo::open(path)?;
        let file = load_file_config(repo.workdir())?;
        let mut config = LandConfig::default().with_file_defaults(&file);
        let prefix_configured = options.prefix.is_some() || file.prefix.is_some();
        apply_options(&mut config, options);

        let fork_url = repo.remote_url(&config.remote)?;
        let fork = parse_repo_info(&fork_url)?;

        let upstream_url = match repo.remote_url(&config.upstream_remote) {
            Ok(url) => url,
            // Pushing straight to the upstream repository needs no second remote
            Err(Error::RemoteNotFound(_))
                if options.upstream_remote.is_none() && file.upstream_remote.is_none() =>
            {
                debug!(remote = %config.remote, "no upstream remote, using fork remote");
                config.upstream_remote.clone_from(&config.remote);
                fork_url.clone()
            }
            Err(e) => return Err(e),
        };
        let upstream = parse_repo_info(&upstream_url)?;
        debug!(upstream = %upstream.slug(), fork = %fork.slug(), "detected repositories");

        let token = if config.dry_run {
            None
        } else {
            Some(get_github_auth(upstream.host.as_deref()).await?.token)
        };

        if !prefix_configured {
            config.prefix = default_prefix(&upstream, token.as_deref()).await;
        }
        config.validate()?;

        let platform = create_platform_service(&upstream, &fork, token.as_deref(), options.quiet)?;

        let git: Box<dyn GitOps> = if config.dry_run {
            let git = DryRunGit::new(repo);
            Box::new(if options.quiet { git.quiet() } else { git })
        } else {
            Box::new(repo)
        };

        Ok(Self {
            git,
            config,
            upstream,
            fork,
            platform,
        })
    }
}

/// Overlay CLI flags on a config
fn apply_options(config: &mut LandConfig, options: &LandOptions) {
    if let Some(ref base) = options.base {
        config.base.clone_from(base);
    }
    if let Some(ref remote) = options.remote {
        config.remote.clone_from(remote);
    }
    if let Some(ref upstream) = options.upstream_remote {
        config.upstream_remote.clone_from(upstream);
    }
    if let Some(ref prefix) = options.prefix {
        config.prefix = normalize_prefix(prefix);
    }
    if let Some(secs) = options.poll_interval {
        config.retry.interval = Duration::from_secs(secs);
    }
    if let Some(max) = options.max_polls {
        config.retry.max_attempts = max;
    }
    config.draft = options.draft;
    config.merge_mode = options.merge_mode;
    config.landing_mode = if options.chain {
        LandingMode::Chained
    } else {
        LandingMode::Sequential
    };
    config.dry_run = options.dry_run;
    config.force = options.force;
    config.explicit_commits.clone_from(&options.commits);
}

/// `<github login>/`, or `dev/` when the login cannot be fetched
async fn default_prefix(upstream: &PlatformConfig, token: Option<&str>) -> String {
    let Some(token) = token else {
        return DEFAULT_PREFIX.to_string();
    };

    let login = match GitHubService::new(
        token,
        upstream.owner.clone(),
        upstream.repo.clone(),
        upstream.host.clone(),
    ) {
        Ok(service) => service.current_user_login().await,
        Err(e) => Err(e),
    };

    match login {
        Ok(login) if !login.is_empty() => normalize_prefix(&login),
        Ok(_) => DEFAULT_PREFIX.to_string(),
        Err(e) => {
            debug!(error = %e, "could not fetch GitHub login, using default prefix");
            DEFAULT_PREFIX.to_string()
        }
    }
}
