//! GitHub API rate limit guards.
//!
//! The classifier alone issues several API calls per pull request, so
//! mutating calls check remaining core quota first and sleep out the reset
//! window when it runs low. Secondary rate limits are handled by waiting out
//! the `Retry-After` interval the platform reports.

use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

use crate::host::{HostClient, HostError};

/// Maximum time to wait for a rate limit reset (1 hour).
const MAX_WAIT_SECS: u64 = 3600;

/// Minimum remaining requests before proactively waiting.
const MIN_REMAINING_THRESHOLD: u32 = 5;

/// Rate limit state for the core API resource.
#[derive(Debug, Clone)]
pub struct RateLimitInfo {
    /// Requests remaining in the current window.
    pub remaining: u32,
    /// Unix timestamp when the rate limit resets.
    pub reset: u64,
    /// Total requests allowed per window.
    pub limit: u32,
}

/// Waits if the rate limit is low, returning true if we waited.
pub async fn wait_if_needed(info: &RateLimitInfo) -> bool {
    if info.remaining >= MIN_REMAINING_THRESHOLD {
        return false;
    }

    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    if info.reset <= now {
        return false;
    }

    let wait_secs = info.reset - now;
    if wait_secs > MAX_WAIT_SECS {
        warn!(
            wait_secs,
            max_wait = MAX_WAIT_SECS,
            "Rate limit reset too far in future, capping wait time"
        );
    }

    let actual_wait = wait_secs.min(MAX_WAIT_SECS);
    info!(
        remaining = info.remaining,
        wait_secs = actual_wait,
        "Rate limit low, waiting for reset"
    );

    tokio::time::sleep(Duration::from_secs(actual_wait)).await;
    true
}

/// Waits out a secondary rate limit using the reported `Retry-After` value.
pub async fn wait_for_retry_after(retry_after_secs: u64) {
    let actual_wait = retry_after_secs.min(MAX_WAIT_SECS);
    info!(
        retry_after = retry_after_secs,
        actual_wait, "Received Retry-After header, waiting"
    );
    tokio::time::sleep(Duration::from_secs(actual_wait)).await;
}

/// Ensures sufficient core quota before a mutating API call.
///
/// # Errors
///
/// Returns an error if the rate limit lookup itself fails.
pub async fn ensure_write_quota(host: &dyn HostClient) -> Result<(), HostError> {
    let info = host.core_rate_limit().await?;
    wait_if_needed(&info).await;
    Ok(())
}

/// Runs a platform call, waiting out a secondary rate limit and retrying
/// exactly once when the call reports one.
///
/// # Errors
///
/// Returns the original error for anything other than a secondary limit,
/// and the retry's error if the retry fails too.
pub async fn with_secondary_retry<T, F, Fut>(mut op: F) -> Result<T, HostError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, HostError>>,
{
    match op().await {
        Err(e) => match e.retry_after() {
            Some(retry_after_secs) => {
                wait_for_retry_after(retry_after_secs).await;
                op().await
            }
            None => Err(e),
        },
        ok => ok,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn no_wait_with_plenty_of_quota() {
        let info = RateLimitInfo {
            remaining: 100,
            reset: 0,
            limit: 5000,
        };
        assert!(!wait_if_needed(&info).await);
    }

    #[tokio::test(start_paused = true)]
    async fn secondary_retry_waits_and_retries_once() {
        let mut calls = 0u32;
        let result = with_secondary_retry(|| {
            calls += 1;
            let attempt = calls;
            async move {
                if attempt == 1 {
                    Err(HostError::RateLimited {
                        retry_after_secs: 2,
                    })
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls, 2);
    }

    #[tokio::test]
    async fn secondary_retry_leaves_successful_calls_alone() {
        let mut calls = 0u32;
        let result: Result<u32, HostError> = with_secondary_retry(|| {
            calls += 1;
            async { Ok(7) }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn no_wait_when_reset_already_passed() {
        let info = RateLimitInfo {
            remaining: 1,
            reset: 0,
            limit: 5000,
        };
        assert!(!wait_if_needed(&info).await);
    }
}
