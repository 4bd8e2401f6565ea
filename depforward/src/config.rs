//! Run configuration.
//!
//! One immutable value constructed by the CLI layer and passed explicitly
//! into the classifier, transition engine and runner. There is no ambient
//! process-wide state.

use std::path::PathBuf;

/// Label that marks a pull request as managed by the dependency bot.
pub const DEFAULT_MANAGED_LABEL: &str = "dependencies";

/// Label set while a pull request recreation is pending.
pub const DEFAULT_REBASE_LABEL: &str = "needs rebase";

/// Label set once a pull request has been forwarded upstream.
pub const DEFAULT_UPSTREAM_LABEL: &str = "upstream pr";

/// Default number of concurrent workers.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Configuration for a single run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Login of the account that owns the forks.
    login: String,
    /// Organization the forks are derived from and forwarded to.
    upstream_org: String,
    /// GitHub token used for API calls.
    token: String,
    /// Whether to compute actions without executing them.
    dry_run: bool,
    /// Whether to request recreation when a PR reports no checks at all.
    recreate_missing: bool,
    /// Number of concurrent workers draining the PR queue.
    concurrency: usize,
    /// Label that identifies managed pull requests.
    managed_label: String,
    /// Reserved label: recreation pending.
    rebase_label: String,
    /// Reserved label: forwarded upstream.
    upstream_label: String,
    /// Script invoked on pull requests with failing checks.
    update_script: Option<PathBuf>,
}

impl RunConfig {
    /// Creates a configuration with default labels and concurrency.
    pub fn new(login: String, upstream_org: String, token: String) -> Self {
        Self {
            login,
            upstream_org,
            token,
            dry_run: false,
            recreate_missing: false,
            concurrency: DEFAULT_CONCURRENCY,
            managed_label: DEFAULT_MANAGED_LABEL.to_string(),
            rebase_label: DEFAULT_REBASE_LABEL.to_string(),
            upstream_label: DEFAULT_UPSTREAM_LABEL.to_string(),
            update_script: None,
        }
    }

    /// Enables or disables dry-run mode.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Enables recreation of pull requests whose checks never reported.
    pub fn with_recreate_missing(mut self, recreate_missing: bool) -> Self {
        self.recreate_missing = recreate_missing;
        self
    }

    /// Sets the worker pool size.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Overrides the label that identifies managed pull requests.
    pub fn with_managed_label(mut self, label: String) -> Self {
        self.managed_label = label;
        self
    }

    /// Overrides the rebase marker label.
    pub fn with_rebase_label(mut self, label: String) -> Self {
        self.rebase_label = label;
        self
    }

    /// Overrides the upstream marker label.
    pub fn with_upstream_label(mut self, label: String) -> Self {
        self.upstream_label = label;
        self
    }

    /// Sets the update script invoked on failing checks.
    pub fn with_update_script(mut self, script: Option<PathBuf>) -> Self {
        self.update_script = script;
        self
    }

    /// Returns the login of the fork-owning account.
    pub fn login(&self) -> &str {
        &self.login
    }

    /// Returns the upstream organization name.
    pub fn upstream_org(&self) -> &str {
        &self.upstream_org
    }

    /// Returns the configured GitHub token.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Returns whether dry-run mode is enabled.
    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    /// Returns whether missing checks trigger recreation.
    pub fn recreate_missing(&self) -> bool {
        self.recreate_missing
    }

    /// Returns the worker pool size.
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Returns the label that identifies managed pull requests.
    pub fn managed_label(&self) -> &str {
        &self.managed_label
    }

    /// Returns the rebase marker label.
    pub fn rebase_label(&self) -> &str {
        &self.rebase_label
    }

    /// Returns the upstream marker label.
    pub fn upstream_label(&self) -> &str {
        &self.upstream_label
    }

    /// Returns the update script path, if configured.
    pub fn update_script(&self) -> Option<&std::path::Path> {
        self.update_script.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> RunConfig {
        RunConfig::new(
            "bot-account".to_string(),
            "upstream-org".to_string(),
            "token".to_string(),
        )
    }

    #[test]
    fn defaults_match_reserved_labels() {
        let config = sample_config();
        assert_eq!(config.managed_label(), "dependencies");
        assert_eq!(config.rebase_label(), "needs rebase");
        assert_eq!(config.upstream_label(), "upstream pr");
        assert_eq!(config.concurrency(), 4);
        assert!(!config.dry_run());
        assert!(!config.recreate_missing());
        assert!(config.update_script().is_none());
    }

    #[test]
    fn concurrency_is_clamped_to_at_least_one() {
        let config = sample_config().with_concurrency(0);
        assert_eq!(config.concurrency(), 1);
    }
}
