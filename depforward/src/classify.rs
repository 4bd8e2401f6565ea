//! Pull request status classification.
//!
//! Derives exactly one lifecycle status per pull request per run from three
//! independent signals, checked in strict priority order: an existing
//! upstream copy short-circuits everything, a non-mergeable pull request is
//! never checked for CI, and only a mergeable one without a pending rebase
//! reaches the combined-status check. Nothing is cached across runs.

use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info_span, Instrument};

use crate::config::RunConfig;
use crate::handle::PullRequestHandle;
use crate::host::{HostClient, HostError, PullState};

/// Lifecycle status of a managed pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// An equivalent pull request is already open or merged upstream.
    WaitingForUpstream,
    /// The pull request has conflicts and must be recreated.
    NotMergeable,
    /// Mergeable again while the rebase marker is still set; the marker can
    /// be cleared.
    Mergeable,
    /// No CI statuses have been reported for the head commit.
    MissingChecks,
    /// At least one check failed.
    FailedChecks,
    /// Checks are still running.
    PendingChecks,
    /// All checks succeeded; ready to forward upstream.
    ChecksOk,
}

impl Status {
    /// Returns the status as a string for log lines.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WaitingForUpstream => "waiting-for-upstream",
            Self::NotMergeable => "not-mergeable",
            Self::Mergeable => "mergeable",
            Self::MissingChecks => "missing-checks",
            Self::FailedChecks => "failed-checks",
            Self::PendingChecks => "pending-checks",
            Self::ChecksOk => "checks-ok",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur during classification.
#[derive(Debug, Error)]
pub enum ClassifyError {
    /// GitHub API error.
    #[error(transparent)]
    Host(#[from] HostError),

    /// The mergeability tri-state never resolved within the poll deadline.
    #[error("mergeability of {url} did not resolve before the deadline")]
    MergeabilityUnknown { url: String },

    /// The platform reported a combined status this tool does not know.
    #[error("unknown combined status state: {state}")]
    UnknownCombinedState { state: String },
}

/// Backoff schedule for the mergeability poll.
///
/// The platform computes mergeability asynchronously; we re-fetch with
/// exponentially growing delays until the tri-state resolves or the
/// wall-clock deadline passes. Driven by the tokio clock, so tests run it
/// under a paused clock without real sleeping.
#[derive(Debug, Clone, Copy)]
pub struct PollSchedule {
    /// Delay before the first re-fetch.
    pub initial_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Total wall-clock time allowed for the poll.
    pub deadline: Duration,
}

impl Default for PollSchedule {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(4),
            deadline: Duration::from_secs(10),
        }
    }
}

/// An equivalent pull request found in the upstream repository.
#[derive(Debug, Clone)]
pub struct UpstreamMatch {
    /// Web URL of the upstream pull request.
    pub url: String,
    /// Whether the upstream pull request is still open (false means merged).
    pub open: bool,
}

/// Searches the upstream repository for a pull request with the same head
/// label. Merged closed requests win over open ones; an open match only
/// counts when it is unambiguous (exactly one).
pub async fn find_upstream_match(
    host: &dyn HostClient,
    pr: &PullRequestHandle,
    upstream_org: &str,
) -> Result<Option<UpstreamMatch>, HostError> {
    let closed = host
        .list_pulls_by_head(upstream_org, &pr.repo, &pr.head_label, PullState::Closed)
        .await?;
    for candidate in closed {
        if host
            .is_merged(upstream_org, &pr.repo, candidate.number)
            .await?
        {
            return Ok(Some(UpstreamMatch {
                url: candidate.url,
                open: false,
            }));
        }
    }

    let open = host
        .list_pulls_by_head(upstream_org, &pr.repo, &pr.head_label, PullState::Open)
        .await?;
    if open.len() == 1 {
        return Ok(Some(UpstreamMatch {
            url: open[0].url.clone(),
            open: true,
        }));
    }
    Ok(None)
}

/// Polls the mergeability tri-state until it resolves.
async fn resolve_mergeable(
    host: &dyn HostClient,
    pr: &mut PullRequestHandle,
    schedule: PollSchedule,
) -> Result<bool, ClassifyError> {
    let deadline = Instant::now() + schedule.deadline;
    let mut delay = schedule.initial_delay;
    loop {
        if let Some(mergeable) = pr.mergeable {
            return Ok(mergeable);
        }
        if Instant::now() + delay > deadline {
            return Err(ClassifyError::MergeabilityUnknown {
                url: pr.url.clone(),
            });
        }
        tokio::time::sleep(delay).await;
        delay = (delay * 2).min(schedule.max_delay);
        pr.mergeable = host.mergeable(&pr.owner, &pr.repo, pr.number).await?;
    }
}

/// Classifies a pull request into its current lifecycle status.
pub async fn classify(
    host: &dyn HostClient,
    pr: &mut PullRequestHandle,
    config: &RunConfig,
    schedule: PollSchedule,
) -> Result<Status, ClassifyError> {
    let span = info_span!("classify", pr = %pr);

    async {
        // Once forwarded, no further action is ever taken.
        if let Some(upstream) = find_upstream_match(host, pr, config.upstream_org()).await? {
            debug!(url = %upstream.url, open = upstream.open, "Upstream copy exists");
            return Ok(Status::WaitingForUpstream);
        }

        if !resolve_mergeable(host, pr, schedule).await? {
            return Ok(Status::NotMergeable);
        }
        if pr.has_label(config.rebase_label()) {
            return Ok(Status::Mergeable);
        }

        let combined = host
            .combined_status(&pr.owner, &pr.repo, &pr.head_sha)
            .await?;
        if combined.total_count == 0 {
            return Ok(Status::MissingChecks);
        }
        match combined.state.as_str() {
            "failure" => Ok(Status::FailedChecks),
            "pending" => Ok(Status::PendingChecks),
            "success" => Ok(Status::ChecksOk),
            state => Err(ClassifyError::UnknownCombinedState {
                state: state.to_string(),
            }),
        }
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_are_stable() {
        assert_eq!(Status::WaitingForUpstream.as_str(), "waiting-for-upstream");
        assert_eq!(Status::NotMergeable.as_str(), "not-mergeable");
        assert_eq!(Status::Mergeable.as_str(), "mergeable");
        assert_eq!(Status::MissingChecks.as_str(), "missing-checks");
        assert_eq!(Status::FailedChecks.as_str(), "failed-checks");
        assert_eq!(Status::PendingChecks.as_str(), "pending-checks");
        assert_eq!(Status::ChecksOk.as_str(), "checks-ok");
    }

    #[test]
    fn default_schedule_fits_inside_its_deadline() {
        let schedule = PollSchedule::default();
        assert!(schedule.initial_delay <= schedule.max_delay);
        assert!(schedule.max_delay < schedule.deadline);
    }
}
