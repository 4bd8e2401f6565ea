//! Pull request harvesting.
//!
//! For each verified fork, lists open pull requests and keeps those carrying
//! the managed-dependency label, producing the handles the worker pool
//! consumes.

use tracing::debug;

use crate::config::RunConfig;
use crate::handle::PullRequestHandle;
use crate::host::{ForkRepo, HostClient, HostError};

/// Lists a fork's open pull requests and builds handles for the managed ones.
pub async fn harvest_fork(
    host: &dyn HostClient,
    fork: &ForkRepo,
    config: &RunConfig,
) -> Result<Vec<PullRequestHandle>, HostError> {
    let pulls = host.list_open_pulls(&fork.owner, &fork.name).await?;
    let handles: Vec<PullRequestHandle> = pulls
        .into_iter()
        .filter(|pull| pull.labels.iter().any(|l| l == config.managed_label()))
        .map(|pull| PullRequestHandle::from_summary(&fork.owner, &fork.name, pull, config.dry_run()))
        .collect();
    debug!(
        repo = %format!("{}/{}", fork.owner, fork.name),
        count = handles.len(),
        "Harvested managed pull requests"
    );
    Ok(handles)
}
