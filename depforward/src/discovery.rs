//! Fork enumeration.
//!
//! Lists repositories owned by the invoking account and keeps those that are
//! forks of the upstream organization's project. Listings do not carry fork
//! ancestry, so each candidate is verified with one concurrent repository
//! fetch; the fan-out is joined before harvesting begins.

use futures::stream::{self, StreamExt};
use thiserror::Error;
use tracing::{info, info_span, warn, Instrument};

use crate::config::RunConfig;
use crate::host::{ForkRepo, HostClient, HostError};

/// Concurrent ancestry checks in flight. Fork counts are small and each
/// check is a single lightweight call, so this is effectively unbounded.
const VERIFY_FANOUT: usize = 16;

/// Errors that can occur during fork enumeration.
///
/// Failing to list the account's repositories is fatal to the whole run;
/// a failed ancestry check only skips that candidate.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// GitHub API error while listing repositories.
    #[error(transparent)]
    Host(#[from] HostError),
}

/// Enumerates verified forks of the upstream organization.
pub async fn discover_forks(
    host: &dyn HostClient,
    config: &RunConfig,
) -> Result<Vec<ForkRepo>, DiscoveryError> {
    let span = info_span!(
        "discover",
        login = %config.login(),
        upstream = %config.upstream_org()
    );

    async {
        info!("Listing repositories");
        let repos = host.list_owned_repos(config.login()).await?;
        let candidates: Vec<ForkRepo> = repos.into_iter().filter(|repo| repo.is_fork).collect();

        let forks: Vec<ForkRepo> = stream::iter(candidates)
            .map(|candidate| verify_fork(host, candidate, config.upstream_org()))
            .buffer_unordered(VERIFY_FANOUT)
            .filter_map(|fork| async move { fork })
            .collect()
            .await;

        info!(count = forks.len(), "Found forks");
        Ok(forks)
    }
    .instrument(span)
    .await
}

/// Fetches a candidate's full record and keeps it if its parent belongs to
/// the upstream organization. Lookup failures skip the candidate.
async fn verify_fork(
    host: &dyn HostClient,
    candidate: ForkRepo,
    upstream_org: &str,
) -> Option<ForkRepo> {
    let repo = match host.get_repo(&candidate.owner, &candidate.name).await {
        Ok(repo) => repo,
        Err(e) => {
            warn!(
                repo = %format!("{}/{}", candidate.owner, candidate.name),
                error = %e,
                "Failed to fetch repository, skipping"
            );
            return None;
        }
    };
    match repo.parent_owner.as_deref() {
        Some(parent) if parent == upstream_org => Some(repo),
        _ => None,
    }
}
