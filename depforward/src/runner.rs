//! Run orchestration.
//!
//! One run is a producer → bounded queue → worker pool → join pipeline: the
//! fork enumerator and harvester feed pull request handles into a bounded
//! channel, a fixed pool of workers drains it running classify → plan →
//! execute per handle, and the runner joins all workers before returning.
//! Errors are isolated to the handle they occurred on; only discovery-phase
//! failures abort the run.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::classify::{classify, PollSchedule};
use crate::config::RunConfig;
use crate::discovery::{discover_forks, DiscoveryError};
use crate::handle::PullRequestHandle;
use crate::harvest::harvest_fork;
use crate::host::{GithubHost, HostClient};
use crate::summary::{ProcessingResult, RunSummary};
use crate::transition::{execute, plan};

/// Errors that abort a whole run.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// GitHub API client initialization errors.
    #[error(transparent)]
    Octocrab(#[from] octocrab::Error),

    /// Fork enumeration errors.
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
}

/// Shared receiving end of the pull request queue.
type HandleQueue = Arc<Mutex<mpsc::Receiver<PullRequestHandle>>>;

/// Orchestrates a full forwarding run.
pub struct Runner {
    config: RunConfig,
    host: Arc<dyn HostClient>,
    schedule: PollSchedule,
}

impl Runner {
    /// Builds a runner with an octocrab-backed host client.
    pub fn new(config: RunConfig) -> Result<Self, RunnerError> {
        let octocrab = octocrab::Octocrab::builder()
            .personal_token(config.token().to_string())
            .build()?;
        Ok(Self::with_host(config, Arc::new(GithubHost::new(octocrab))))
    }

    /// Builds a runner over an arbitrary host client.
    pub fn with_host(config: RunConfig, host: Arc<dyn HostClient>) -> Self {
        Self {
            config,
            host,
            schedule: PollSchedule::default(),
        }
    }

    /// Overrides the mergeability poll schedule.
    pub fn with_poll_schedule(mut self, schedule: PollSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    /// Executes one full run: enumerate forks, harvest managed pull requests,
    /// process them through the worker pool and return the summary.
    pub async fn run(&self, cancel: CancellationToken) -> Result<RunSummary, RunnerError> {
        let mut summary = RunSummary::new(self.config.dry_run());

        let forks = discover_forks(self.host.as_ref(), &self.config).await?;
        summary.forks_discovered = forks.len();

        let (tx, rx) = mpsc::channel(self.config.concurrency() * 2);
        let queue: HandleQueue = Arc::new(Mutex::new(rx));

        let mut workers = JoinSet::new();
        for _ in 0..self.config.concurrency() {
            workers.spawn(worker_loop(
                Arc::clone(&self.host),
                self.config.clone(),
                self.schedule,
                Arc::clone(&queue),
                cancel.clone(),
            ));
        }

        // Producer: harvest every fork and push qualifying handles. A failed
        // listing skips that fork and the run continues.
        for fork in &forks {
            if cancel.is_cancelled() {
                break;
            }
            match harvest_fork(self.host.as_ref(), fork, &self.config).await {
                Ok(handles) => {
                    for handle in handles {
                        tokio::select! {
                            _ = cancel.cancelled() => break,
                            sent = tx.send(handle) => {
                                if sent.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!(
                        repo = %format!("{}/{}", fork.owner, fork.name),
                        error = %e,
                        "Failed to list pull requests, skipping fork"
                    );
                }
            }
        }
        drop(tx);

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(results) => {
                    for result in &results {
                        summary.record_result(result);
                    }
                }
                Err(e) => {
                    error!(error = %e, "Worker task failed");
                }
            }
        }

        Ok(summary)
    }
}

/// One worker: drain handles from the shared queue until it closes or the
/// run is cancelled, processing each to completion before taking the next.
async fn worker_loop(
    host: Arc<dyn HostClient>,
    config: RunConfig,
    schedule: PollSchedule,
    queue: HandleQueue,
    cancel: CancellationToken,
) -> Vec<ProcessingResult> {
    let mut results = Vec::new();
    loop {
        let next = {
            let mut rx = queue.lock().await;
            tokio::select! {
                _ = cancel.cancelled() => None,
                handle = rx.recv() => handle,
            }
        };
        let Some(pr) = next else { break };
        results.push(process_one(host.as_ref(), &config, schedule, pr).await);
    }
    results
}

/// Classify → plan → execute for one handle, with errors confined to it.
async fn process_one(
    host: &dyn HostClient,
    config: &RunConfig,
    schedule: PollSchedule,
    mut pr: PullRequestHandle,
) -> ProcessingResult {
    let identity = pr.to_string();
    let status = match classify(host, &mut pr, config, schedule).await {
        Ok(status) => status,
        Err(e) => {
            error!(pr = %identity, error = %e, "Classification failed");
            return ProcessingResult::Failed {
                pr: identity,
                error: e.to_string(),
            };
        }
    };

    let action = plan(status, &pr, config);
    match execute(host, &mut pr, action, config).await {
        Ok(()) => {
            info!(pr = %identity, status = %status, action = %action, "Processed");
            ProcessingResult::Processed {
                pr: identity,
                status,
                action,
            }
        }
        Err(e) => {
            error!(pr = %identity, status = %status, error = %e, "Transition failed");
            ProcessingResult::Failed {
                pr: identity,
                error: e.to_string(),
            }
        }
    }
}
