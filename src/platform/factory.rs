//! Platform service factory

use crate::error::Result;
use crate::platform::{DryRunPlatform, GitHubService, PlatformService};
use crate::types::{Platform, PlatformConfig};
use tracing::debug;

/// Create the platform service for a run
///
/// `upstream` is the repository PRs are opened against, `fork` the one
/// temp branches are pushed to. With `token` absent (dry runs) a
/// [`DryRunPlatform`] is returned and nothing touches the network; `quiet`
/// keeps it from printing the requests it skips.
pub fn create_platform_service(
    upstream: &PlatformConfig,
    fork: &PlatformConfig,
    token: Option<&str>,
    quiet: bool,
) -> Result<Box<dyn PlatformService>> {
    let Some(token) = token else {
        debug!(repo = %upstream.slug(), quiet, "using dry-run platform");
        let platform = DryRunPlatform::new(upstream.clone());
        return Ok(Box::new(if quiet { platform.quiet() } else { platform }));
    };

    match upstream.platform {
        Platform::GitHub => {
            debug!(repo = %upstream.slug(), fork = %fork.slug(), "using GitHub platform");
            let service = GitHubService::new(
                token,
                upstream.owner.clone(),
                upstream.repo.clone(),
                upstream.host.clone(),
            )?
            .with_fork_owner(&fork.owner);
            Ok(Box::new(service))
        }
    }
}
