//! Pull request handles and label persistence.
//!
//! A handle is built fresh from the harvester's listing each run and owned
//! exclusively by the worker processing it. Its label set is the only durable
//! state this tool keeps; every mutation is written through to the platform
//! immediately unless dry-run is enabled.

use std::fmt;

use crate::host::{HostClient, HostError, PullSummary};
use crate::rate_limit::{ensure_write_quota, with_secondary_retry};

/// One managed pull request on a fork, as processed by a single worker.
#[derive(Debug, Clone)]
pub struct PullRequestHandle {
    /// Login of the account owning the fork.
    pub owner: String,
    /// Fork repository name.
    pub repo: String,
    /// Pull request number.
    pub number: u64,
    /// Web URL of the pull request.
    pub url: String,
    /// Pull request title, reused when forwarding upstream.
    pub title: String,
    /// Head branch name.
    pub head_ref: String,
    /// Head commit id.
    pub head_sha: String,
    /// Head label in `owner:branch` form.
    pub head_label: String,
    /// Current label set.
    pub labels: Vec<String>,
    /// Mergeability tri-state; `None` until the platform has computed it.
    pub mergeable: Option<bool>,
    /// Inherited from the run configuration; suppresses label write-through.
    pub dry_run: bool,
}

impl PullRequestHandle {
    /// Builds a handle from a listed pull request.
    pub fn from_summary(owner: &str, repo: &str, pull: PullSummary, dry_run: bool) -> Self {
        Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            number: pull.number,
            url: pull.url,
            title: pull.title,
            head_ref: pull.head_ref,
            head_sha: pull.head_sha,
            head_label: pull.head_label,
            labels: pull.labels,
            mergeable: pull.mergeable,
            dry_run,
        }
    }

    /// Returns whether the given label is currently present.
    pub fn has_label(&self, name: &str) -> bool {
        self.labels.iter().any(|label| label == name)
    }
}

impl fmt::Display for PullRequestHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.owner, self.repo, self.number)
    }
}

/// Adds a label and writes the new set through to the platform.
///
/// No-op if the label is already present. Under dry-run only the in-memory
/// set is updated, so the intended end state still shows up in reports.
pub async fn add_label(
    host: &dyn HostClient,
    pr: &mut PullRequestHandle,
    name: &str,
) -> Result<(), HostError> {
    if pr.has_label(name) {
        return Ok(());
    }
    let mut labels = pr.labels.clone();
    labels.push(name.to_string());
    write_labels(host, pr, labels).await
}

/// Removes a label and writes the new set through to the platform.
///
/// No-op if the label is absent.
pub async fn remove_label(
    host: &dyn HostClient,
    pr: &mut PullRequestHandle,
    name: &str,
) -> Result<(), HostError> {
    if !pr.has_label(name) {
        return Ok(());
    }
    let labels: Vec<String> = pr
        .labels
        .iter()
        .filter(|label| label.as_str() != name)
        .cloned()
        .collect();
    write_labels(host, pr, labels).await
}

async fn write_labels(
    host: &dyn HostClient,
    pr: &mut PullRequestHandle,
    labels: Vec<String>,
) -> Result<(), HostError> {
    if !pr.dry_run {
        ensure_write_quota(host).await?;
        with_secondary_retry(|| host.replace_labels(&pr.owner, &pr.repo, pr.number, &labels))
            .await?;
    }
    pr.labels = labels;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_handle() -> PullRequestHandle {
        PullRequestHandle {
            owner: "alice".to_string(),
            repo: "foo".to_string(),
            number: 42,
            url: "https://github.com/alice/foo/pull/42".to_string(),
            title: "Bump serde from 1.0 to 1.1".to_string(),
            head_ref: "dependabot/cargo/serde-1.1".to_string(),
            head_sha: "abc123".to_string(),
            head_label: "alice:dependabot/cargo/serde-1.1".to_string(),
            labels: vec!["dependencies".to_string()],
            mergeable: Some(true),
            dry_run: false,
        }
    }

    #[test]
    fn displays_as_owner_repo_number() {
        assert_eq!(sample_handle().to_string(), "alice/foo#42");
    }

    #[test]
    fn has_label_matches_exactly() {
        let pr = sample_handle();
        assert!(pr.has_label("dependencies"));
        assert!(!pr.has_label("needs rebase"));
        assert!(!pr.has_label("dependencie"));
    }
}
