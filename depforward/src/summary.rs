//! Run outcome types.

use crate::classify::Status;
use crate::transition::Action;

/// Outcome of processing a single pull request.
#[derive(Debug, Clone)]
pub enum ProcessingResult {
    /// Classification and the planned action both completed.
    Processed {
        /// Pull request identity (`owner/repo#number`).
        pr: String,
        /// Status computed for this run.
        status: Status,
        /// Action that was planned (and executed unless dry-run).
        action: Action,
    },

    /// The pull request was skipped this run.
    Failed {
        /// Pull request identity (`owner/repo#number`).
        pr: String,
        /// Error message.
        error: String,
    },
}

/// Summary of a complete run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Number of verified forks.
    pub forks_discovered: usize,

    /// Number of managed pull requests processed.
    pub prs_processed: usize,

    /// Number of pull requests skipped with an error.
    pub prs_failed: usize,

    /// Number of recreation requests posted.
    pub recreations_requested: usize,

    /// Number of update script invocations.
    pub scripts_run: usize,

    /// Number of pull requests forwarded upstream.
    pub upstream_submitted: usize,

    /// Whether this was a dry run.
    pub dry_run: bool,
}

impl RunSummary {
    /// Creates a new empty summary.
    #[must_use]
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Default::default()
        }
    }

    /// Updates the summary with a processing result.
    pub fn record_result(&mut self, result: &ProcessingResult) {
        match result {
            ProcessingResult::Processed { action, .. } => {
                self.prs_processed += 1;
                match action {
                    Action::RequestRecreate => self.recreations_requested += 1,
                    Action::RunUpdateScript => self.scripts_run += 1,
                    Action::SubmitUpstream => self.upstream_submitted += 1,
                    Action::None | Action::ClearRebaseMarker => {}
                }
            }
            ProcessingResult::Failed { .. } => self.prs_failed += 1,
        }
    }

    /// Returns true if any pull request failed this run.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.prs_failed > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_actions_per_category() {
        let mut summary = RunSummary::new(false);

        summary.record_result(&ProcessingResult::Processed {
            pr: "alice/foo#42".to_string(),
            status: Status::ChecksOk,
            action: Action::SubmitUpstream,
        });
        summary.record_result(&ProcessingResult::Processed {
            pr: "alice/foo#7".to_string(),
            status: Status::NotMergeable,
            action: Action::RequestRecreate,
        });
        summary.record_result(&ProcessingResult::Failed {
            pr: "alice/bar#3".to_string(),
            error: "boom".to_string(),
        });

        assert_eq!(summary.prs_processed, 2);
        assert_eq!(summary.prs_failed, 1);
        assert_eq!(summary.upstream_submitted, 1);
        assert_eq!(summary.recreations_requested, 1);
        assert_eq!(summary.scripts_run, 0);
        assert!(summary.has_failures());
    }
}
