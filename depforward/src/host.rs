//! Hosting-platform client seam.
//!
//! The platform API is an external collaborator. Every capability this tool
//! consumes is gathered behind the [`HostClient`] trait so the classifier,
//! transition engine and runner can be exercised against an in-memory fake.
//! [`GithubHost`] is the thin production implementation over octocrab.

use async_trait::async_trait;
use octocrab::models::Repository;
use octocrab::params;
use octocrab::Octocrab;
use serde::Deserialize;
use thiserror::Error;

use crate::rate_limit::RateLimitInfo;

/// Seconds to wait out a secondary rate limit when the platform does not
/// report a `Retry-After` interval.
const DEFAULT_SECONDARY_RETRY_SECS: u64 = 60;

/// Errors from the hosting platform.
#[derive(Debug, Error)]
pub enum HostError {
    /// GitHub API error.
    #[error("GitHub API error: {0}")]
    Api(#[source] octocrab::Error),

    /// A `429` or secondary rate limit response.
    #[error("secondary rate limit hit, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
}

impl HostError {
    /// Returns the wait interval when the error is a retryable rate limit.
    #[must_use]
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            Self::Api(_) => None,
        }
    }
}

impl From<octocrab::Error> for HostError {
    fn from(error: octocrab::Error) -> Self {
        if let octocrab::Error::GitHub { source, .. } = &error {
            let secondary = source.status_code == 429
                || (source.status_code == 403 && source.message.contains("secondary rate limit"));
            if secondary {
                return Self::RateLimited {
                    retry_after_secs: DEFAULT_SECONDARY_RETRY_SECS,
                };
            }
        }
        Self::Api(error)
    }
}

/// Pull request state filter for listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullState {
    Open,
    Closed,
}

/// A repository owned by the invoking account, with fork ancestry.
#[derive(Debug, Clone)]
pub struct ForkRepo {
    /// Repository owner login.
    pub owner: String,
    /// Repository name.
    pub name: String,
    /// Whether the repository is a fork.
    pub is_fork: bool,
    /// Owner of the repository this fork was derived from, when known.
    /// Only populated by [`HostClient::get_repo`]; listings omit it.
    pub parent_owner: Option<String>,
    /// Default branch name.
    pub default_branch: String,
}

/// A pull request as returned by listings.
#[derive(Debug, Clone)]
pub struct PullSummary {
    /// Pull request number.
    pub number: u64,
    /// Web URL of the pull request.
    pub url: String,
    /// Pull request title.
    pub title: String,
    /// Head branch name.
    pub head_ref: String,
    /// Head commit id.
    pub head_sha: String,
    /// Head label in `owner:branch` form, used for cross-repository matching.
    pub head_label: String,
    /// Current label set.
    pub labels: Vec<String>,
    /// Mergeability tri-state; `None` while the platform is still computing it.
    pub mergeable: Option<bool>,
}

/// Aggregate CI result for a commit across all reporting checks.
#[derive(Debug, Clone, Deserialize)]
pub struct CombinedStatus {
    /// Aggregate state: `success`, `failure` or `pending`.
    pub state: String,
    /// Number of individual statuses reported for the commit.
    pub total_count: u64,
}

/// Request to open a pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPull {
    pub title: String,
    /// Head in `owner:branch` form.
    pub head: String,
    /// Base branch in the target repository.
    pub base: String,
    pub body: String,
}

/// The platform capabilities consumed by this tool.
#[async_trait]
pub trait HostClient: Send + Sync {
    /// Lists repositories owned by the given account.
    async fn list_owned_repos(&self, login: &str) -> Result<Vec<ForkRepo>, HostError>;

    /// Fetches a single repository, including its fork parent.
    async fn get_repo(&self, owner: &str, name: &str) -> Result<ForkRepo, HostError>;

    /// Lists open pull requests in a repository.
    async fn list_open_pulls(&self, owner: &str, repo: &str) -> Result<Vec<PullSummary>, HostError>;

    /// Lists pull requests filtered by head label and state.
    async fn list_pulls_by_head(
        &self,
        owner: &str,
        repo: &str,
        head_label: &str,
        state: PullState,
    ) -> Result<Vec<PullSummary>, HostError>;

    /// Returns whether a pull request has been merged.
    async fn is_merged(&self, owner: &str, repo: &str, number: u64) -> Result<bool, HostError>;

    /// Fetches the current mergeability tri-state of a pull request.
    async fn mergeable(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> Result<Option<bool>, HostError>;

    /// Fetches the combined commit status for a SHA.
    async fn combined_status(
        &self,
        owner: &str,
        repo: &str,
        sha: &str,
    ) -> Result<CombinedStatus, HostError>;

    /// Creates an issue comment on a pull request.
    async fn create_comment(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        body: &str,
    ) -> Result<(), HostError>;

    /// Replaces the full label set of a pull request.
    async fn replace_labels(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        labels: &[String],
    ) -> Result<(), HostError>;

    /// Opens a pull request and returns its web URL.
    async fn create_pull(&self, owner: &str, repo: &str, pull: NewPull)
        -> Result<String, HostError>;

    /// Returns the core API rate limit state.
    async fn core_rate_limit(&self) -> Result<RateLimitInfo, HostError>;
}

/// Production [`HostClient`] backed by octocrab.
pub struct GithubHost {
    octocrab: Octocrab,
}

impl GithubHost {
    /// Wraps an authenticated octocrab client.
    pub fn new(octocrab: Octocrab) -> Self {
        Self { octocrab }
    }
}

fn repo_from_model(repo: Repository) -> ForkRepo {
    let parent_owner = repo
        .source
        .as_ref()
        .and_then(|source| source.owner.as_ref())
        .map(|owner| owner.login.clone());
    ForkRepo {
        owner: repo
            .owner
            .map(|owner| owner.login)
            .unwrap_or_default(),
        name: repo.name,
        is_fork: repo.fork.unwrap_or(false),
        parent_owner,
        default_branch: repo.default_branch.unwrap_or_else(|| "main".to_string()),
    }
}

fn pull_from_model(pr: octocrab::models::pulls::PullRequest) -> PullSummary {
    let head_owner = pr
        .head
        .user
        .as_ref()
        .map(|user| user.login.clone())
        .unwrap_or_default();
    let head_label = pr
        .head
        .label
        .clone()
        .unwrap_or_else(|| format!("{}:{}", head_owner, pr.head.ref_field));
    PullSummary {
        number: pr.number,
        url: pr
            .html_url
            .as_ref()
            .map(|url| url.to_string())
            .unwrap_or_default(),
        title: pr.title.clone().unwrap_or_default(),
        head_ref: pr.head.ref_field.clone(),
        head_sha: pr.head.sha.clone(),
        head_label,
        labels: pr
            .labels
            .unwrap_or_default()
            .into_iter()
            .map(|label| label.name)
            .collect(),
        mergeable: pr.mergeable,
    }
}

#[async_trait]
impl HostClient for GithubHost {
    async fn list_owned_repos(&self, _login: &str) -> Result<Vec<ForkRepo>, HostError> {
        let page = self
            .octocrab
            .current()
            .list_repos_for_authenticated_user()
            .type_("owner")
            .per_page(50)
            .send()
            .await?;
        let repos = self.octocrab.all_pages(page).await?;
        Ok(repos.into_iter().map(repo_from_model).collect())
    }

    async fn get_repo(&self, owner: &str, name: &str) -> Result<ForkRepo, HostError> {
        let repo = self.octocrab.repos(owner, name).get().await?;
        Ok(repo_from_model(repo))
    }

    async fn list_open_pulls(&self, owner: &str, repo: &str) -> Result<Vec<PullSummary>, HostError> {
        let page = self
            .octocrab
            .pulls(owner, repo)
            .list()
            .state(params::State::Open)
            .per_page(50)
            .send()
            .await?;
        let pulls = self.octocrab.all_pages(page).await?;
        Ok(pulls.into_iter().map(pull_from_model).collect())
    }

    async fn list_pulls_by_head(
        &self,
        owner: &str,
        repo: &str,
        head_label: &str,
        state: PullState,
    ) -> Result<Vec<PullSummary>, HostError> {
        let state = match state {
            PullState::Open => params::State::Open,
            PullState::Closed => params::State::Closed,
        };
        let page = self
            .octocrab
            .pulls(owner, repo)
            .list()
            .state(state)
            .head(head_label)
            .per_page(50)
            .send()
            .await?;
        let pulls = self.octocrab.all_pages(page).await?;
        Ok(pulls.into_iter().map(pull_from_model).collect())
    }

    async fn is_merged(&self, owner: &str, repo: &str, number: u64) -> Result<bool, HostError> {
        Ok(self.octocrab.pulls(owner, repo).is_merged(number).await?)
    }

    async fn mergeable(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> Result<Option<bool>, HostError> {
        let pr = self.octocrab.pulls(owner, repo).get(number).await?;
        Ok(pr.mergeable)
    }

    async fn combined_status(
        &self,
        owner: &str,
        repo: &str,
        sha: &str,
    ) -> Result<CombinedStatus, HostError> {
        let route = format!("/repos/{owner}/{repo}/commits/{sha}/status");
        let status: CombinedStatus = self.octocrab.get(route, None::<&()>).await?;
        Ok(status)
    }

    async fn create_comment(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        body: &str,
    ) -> Result<(), HostError> {
        self.octocrab
            .issues(owner, repo)
            .create_comment(number, body)
            .await?;
        Ok(())
    }

    async fn replace_labels(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        labels: &[String],
    ) -> Result<(), HostError> {
        self.octocrab
            .issues(owner, repo)
            .replace_all_labels(number, labels)
            .await?;
        Ok(())
    }

    async fn create_pull(
        &self,
        owner: &str,
        repo: &str,
        pull: NewPull,
    ) -> Result<String, HostError> {
        let created = self
            .octocrab
            .pulls(owner, repo)
            .create(&pull.title, &pull.head, &pull.base)
            .body(&pull.body)
            .send()
            .await?;
        let url = created
            .html_url
            .as_ref()
            .map(|url| url.to_string())
            .unwrap_or_else(|| format!("https://github.com/{owner}/{repo}/pull/{}", created.number));
        Ok(url)
    }

    async fn core_rate_limit(&self) -> Result<RateLimitInfo, HostError> {
        let rate_limit = self.octocrab.ratelimit().get().await?;
        let core = &rate_limit.resources.core;
        Ok(RateLimitInfo {
            remaining: core.remaining as u32,
            reset: core.reset,
            limit: core.limit as u32,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_errors_carry_a_retry_interval() {
        let limited = HostError::RateLimited {
            retry_after_secs: 30,
        };
        assert_eq!(limited.retry_after(), Some(30));
    }
}
