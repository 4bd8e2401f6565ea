//! Status transitions and their side effects.
//!
//! The mapping from status to action is a pure function ([`plan`]) so the
//! intended action can be reported even when nothing is executed. The
//! executor ([`execute`]) performs the side effects: recreation comments,
//! marker label updates, the external update script and upstream submission.
//! Every label mutation is an idempotent set operation, and everything
//! externally visible is suppressed under dry-run.

use std::process::Stdio;

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, info_span, Instrument};

use crate::classify::{find_upstream_match, Status};
use crate::config::RunConfig;
use crate::handle::{add_label, remove_label, PullRequestHandle};
use crate::host::{HostClient, HostError, NewPull};
use crate::rate_limit::{ensure_write_quota, with_secondary_retry};

/// Comment that asks the dependency bot to recreate a pull request.
const RECREATE_COMMAND: &str = "@dependabot recreate";

/// Errors that can occur while executing a transition.
#[derive(Debug, Error)]
pub enum TransitionError {
    /// GitHub API error.
    #[error(transparent)]
    Host(#[from] HostError),

    /// The update script could not be spawned.
    #[error("failed to run update script: {0}")]
    Spawn(#[from] std::io::Error),

    /// The update script exited non-zero.
    #[error("update script exited with {code:?}\nstdout: {stdout}\nstderr: {stderr}")]
    Script {
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },
}

/// The single side-effecting action a status maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Log only.
    None,
    /// Ask the bot to recreate the pull request and set the rebase marker.
    RequestRecreate,
    /// The rebase completed; clear the rebase marker.
    ClearRebaseMarker,
    /// Invoke the external update script.
    RunUpdateScript,
    /// Forward the pull request upstream and set the upstream marker.
    SubmitUpstream,
}

impl Action {
    /// Returns the action as a string for log lines.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::RequestRecreate => "request-recreate",
            Self::ClearRebaseMarker => "clear-rebase-marker",
            Self::RunUpdateScript => "run-update-script",
            Self::SubmitUpstream => "submit-upstream",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps a status to the action to execute. Pure; no side effects.
pub fn plan(status: Status, pr: &PullRequestHandle, config: &RunConfig) -> Action {
    match status {
        Status::WaitingForUpstream | Status::PendingChecks => Action::None,
        Status::NotMergeable => {
            if pr.has_label(config.rebase_label()) {
                // Recreation already requested on an earlier run.
                Action::None
            } else {
                Action::RequestRecreate
            }
        }
        Status::Mergeable => Action::ClearRebaseMarker,
        Status::MissingChecks => {
            if config.recreate_missing() && !pr.has_label(config.rebase_label()) {
                Action::RequestRecreate
            } else {
                Action::None
            }
        }
        Status::FailedChecks => Action::RunUpdateScript,
        Status::ChecksOk => Action::SubmitUpstream,
    }
}

/// Executes the planned action against the pull request.
pub async fn execute(
    host: &dyn HostClient,
    pr: &mut PullRequestHandle,
    action: Action,
    config: &RunConfig,
) -> Result<(), TransitionError> {
    let span = info_span!("execute", pr = %pr, action = %action);

    async {
        match action {
            Action::None => Ok(()),
            Action::RequestRecreate => request_recreate(host, pr, config).await,
            Action::ClearRebaseMarker => {
                remove_label(host, pr, config.rebase_label()).await?;
                Ok(())
            }
            Action::RunUpdateScript => run_update_script(pr, config).await,
            Action::SubmitUpstream => submit_upstream(host, pr, config).await,
        }
    }
    .instrument(span)
    .await
}

/// Posts the recreation comment, then sets the rebase marker.
async fn request_recreate(
    host: &dyn HostClient,
    pr: &mut PullRequestHandle,
    config: &RunConfig,
) -> Result<(), TransitionError> {
    if !pr.dry_run {
        ensure_write_quota(host).await?;
        with_secondary_retry(|| {
            host.create_comment(&pr.owner, &pr.repo, pr.number, RECREATE_COMMAND)
        })
        .await?;
    }
    add_label(host, pr, config.rebase_label()).await?;
    info!(pr = %pr, "Requested recreation");
    Ok(())
}

/// Runs the configured update script with the pull request identity in its
/// environment. Skipped under dry-run or when no script is configured.
async fn run_update_script(
    pr: &PullRequestHandle,
    config: &RunConfig,
) -> Result<(), TransitionError> {
    let Some(script) = config.update_script() else {
        debug!(pr = %pr, "No update script configured");
        return Ok(());
    };
    if pr.dry_run {
        return Ok(());
    }

    let output = Command::new(script)
        .env("GITHUB_OWNER", &pr.owner)
        .env("GITHUB_REPOSITORY", &pr.repo)
        .env("GITHUB_BRANCH", &pr.head_ref)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(TransitionError::Script {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    info!(pr = %pr, "Update script succeeded");
    Ok(())
}

/// Forwards the pull request to the upstream repository, then sets the
/// upstream marker. An already-open matching upstream pull request is reused
/// rather than duplicated.
async fn submit_upstream(
    host: &dyn HostClient,
    pr: &mut PullRequestHandle,
    config: &RunConfig,
) -> Result<(), TransitionError> {
    if !pr.dry_run {
        match find_upstream_match(host, pr, config.upstream_org()).await? {
            Some(existing) => {
                info!(pr = %pr, url = %existing.url, "Upstream pull request already exists");
            }
            None => {
                let upstream = host.get_repo(config.upstream_org(), &pr.repo).await?;
                ensure_write_quota(host).await?;
                let new_pull = NewPull {
                    title: pr.title.clone(),
                    head: pr.head_label.clone(),
                    base: upstream.default_branch,
                    body: format!("Forwarded from {}.", pr.url),
                };
                let url = with_secondary_retry(|| {
                    host.create_pull(config.upstream_org(), &pr.repo, new_pull.clone())
                })
                .await?;
                info!(pr = %pr, url = %url, "Submitted upstream");
            }
        }
    }
    add_label(host, pr, config.upstream_label()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> RunConfig {
        RunConfig::new(
            "alice".to_string(),
            "upstream-org".to_string(),
            "token".to_string(),
        )
    }

    fn handle_with_labels(labels: &[&str]) -> PullRequestHandle {
        PullRequestHandle {
            owner: "alice".to_string(),
            repo: "foo".to_string(),
            number: 7,
            url: "https://github.com/alice/foo/pull/7".to_string(),
            title: "Bump tokio from 1.0 to 1.1".to_string(),
            head_ref: "dependabot/cargo/tokio-1.1".to_string(),
            head_sha: "abc123".to_string(),
            head_label: "alice:dependabot/cargo/tokio-1.1".to_string(),
            labels: labels.iter().map(|l| l.to_string()).collect(),
            mergeable: Some(false),
            dry_run: false,
        }
    }

    #[test]
    fn waiting_and_pending_plan_nothing() {
        let config = sample_config();
        let pr = handle_with_labels(&["dependencies"]);
        assert_eq!(
            plan(Status::WaitingForUpstream, &pr, &config),
            Action::None
        );
        assert_eq!(plan(Status::PendingChecks, &pr, &config), Action::None);
    }

    #[test]
    fn not_mergeable_requests_recreation_once() {
        let config = sample_config();
        let fresh = handle_with_labels(&["dependencies"]);
        assert_eq!(
            plan(Status::NotMergeable, &fresh, &config),
            Action::RequestRecreate
        );

        let marked = handle_with_labels(&["dependencies", "needs rebase"]);
        assert_eq!(plan(Status::NotMergeable, &marked, &config), Action::None);
    }

    #[test]
    fn mergeable_clears_the_marker() {
        let config = sample_config();
        let marked = handle_with_labels(&["dependencies", "needs rebase"]);
        assert_eq!(
            plan(Status::Mergeable, &marked, &config),
            Action::ClearRebaseMarker
        );
    }

    #[test]
    fn missing_checks_honors_the_recreate_option() {
        let pr = handle_with_labels(&["dependencies"]);

        let report_only = sample_config();
        assert_eq!(plan(Status::MissingChecks, &pr, &report_only), Action::None);

        let recreate = sample_config().with_recreate_missing(true);
        assert_eq!(
            plan(Status::MissingChecks, &pr, &recreate),
            Action::RequestRecreate
        );

        let marked = handle_with_labels(&["dependencies", "needs rebase"]);
        assert_eq!(plan(Status::MissingChecks, &marked, &recreate), Action::None);
    }

    #[test]
    fn check_outcomes_map_to_script_and_submission() {
        let config = sample_config();
        let pr = handle_with_labels(&["dependencies"]);
        assert_eq!(
            plan(Status::FailedChecks, &pr, &config),
            Action::RunUpdateScript
        );
        assert_eq!(plan(Status::ChecksOk, &pr, &config), Action::SubmitUpstream);
    }
}
