//! Shepherds bot-opened dependency update pull requests on forks through
//! recreation, update and CI checks until they are forwarded as pull requests
//! against the upstream project.
//!
//! The only persisted state is a pair of reserved labels on each pull
//! request: a rebase marker while recreation is pending and an upstream
//! marker once forwarded. The tool is meant to run repeatedly (e.g. on a
//! schedule); every run recomputes each pull request's status from scratch.

pub mod classify;
pub mod config;
pub mod discovery;
pub mod handle;
pub mod harvest;
pub mod host;
pub mod rate_limit;
pub mod runner;
pub mod summary;
pub mod transition;

pub use classify::{classify, ClassifyError, PollSchedule, Status, UpstreamMatch};
pub use config::{
    RunConfig, DEFAULT_CONCURRENCY, DEFAULT_MANAGED_LABEL, DEFAULT_REBASE_LABEL,
    DEFAULT_UPSTREAM_LABEL,
};
pub use discovery::{discover_forks, DiscoveryError};
pub use handle::{add_label, remove_label, PullRequestHandle};
pub use harvest::harvest_fork;
pub use host::{
    CombinedStatus, ForkRepo, GithubHost, HostClient, HostError, NewPull, PullState, PullSummary,
};
pub use rate_limit::{
    ensure_write_quota, wait_for_retry_after, wait_if_needed, with_secondary_retry, RateLimitInfo,
};
pub use runner::{Runner, RunnerError};
pub use summary::{ProcessingResult, RunSummary};
pub use transition::{execute, plan, Action, TransitionError};
