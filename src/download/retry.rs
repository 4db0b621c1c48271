//! Whole-operation retry for single-file downloads.
//!
//! A failed download is repeated from scratch up to [`RetryPolicy::max_attempts`]
//! times. There is no backoff: the optional fixed delay defaults to zero.
//!
//! # Example
//!
//! ```
//! use dirdl_core::download::{DownloadError, RetryDecision, RetryPolicy};
//!
//! let policy = RetryPolicy::default();
//! let error = DownloadError::http_status("https://example.org/files/Game.zip", 503);
//!
//! match policy.should_retry(&error, 1) {
//!     RetryDecision::Retry { delay, attempt } => {
//!         println!("Retrying in {:?} (attempt {})", delay, attempt);
//!     }
//!     RetryDecision::DoNotRetry { reason } => {
//!         println!("Not retrying: {}", reason);
//!     }
//! }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info, instrument};

use super::client::FileDownloader;
use super::error::DownloadError;
use super::progress::ProgressCallback;

/// Default number of attempts per file (including the first).
pub const DEFAULT_ATTEMPTS: u32 = 3;

/// Decision on whether to retry a failed download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the download after the specified delay.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// Which attempt number this will be (1-indexed, so first retry is attempt 2).
        attempt: u32,
    },

    /// Do not retry the download.
    DoNotRetry {
        /// Human-readable reason why retry is not attempted.
        reason: String,
    },
}

/// How many times a download is attempted and how long to pause in between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_ATTEMPTS,
            delay: Duration::ZERO,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy; `max_attempts` is raised to at least 1.
    #[must_use]
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Creates a policy with a custom `max_attempts` and no delay.
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO)
    }

    /// Returns the maximum number of attempts configured.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the pause between attempts.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Determines whether to retry after `attempt` (1-indexed) failed.
    #[must_use]
    pub fn should_retry(&self, error: &DownloadError, attempt: u32) -> RetryDecision {
        if !error.is_retryable() {
            return RetryDecision::DoNotRetry {
                reason: "files already extracted, only cleanup failed".to_string(),
            };
        }

        if attempt >= self.max_attempts {
            debug!(attempt, max = self.max_attempts, "max attempts reached");
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.max_attempts),
            };
        }

        RetryDecision::Retry {
            delay: self.delay,
            attempt: attempt + 1,
        }
    }
}

/// Downloads a file, repeating the whole operation on failure.
///
/// Every attempt receives `on_progress`, so a retried transfer emits its
/// snapshots again starting from zero.
///
/// # Returns
///
/// - `Ok((PathBuf, u32))` - Path and the attempt that succeeded
/// - `Err((DownloadError, u32))` - Last error and total attempt count
///
/// # Errors
///
/// Returns the last attempt's error once the policy stops retrying.
#[instrument(skip(downloader, target_dir, on_progress, policy), fields(url = %url))]
pub async fn download_with_retry(
    downloader: &dyn FileDownloader,
    url: &str,
    target_dir: &Path,
    on_progress: Option<&ProgressCallback>,
    policy: &RetryPolicy,
) -> Result<(PathBuf, u32), (DownloadError, u32)> {
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        debug!(attempt, "attempting download");

        match downloader.download_file(url, target_dir, on_progress).await {
            Ok(path) => return Ok((path, attempt)),
            Err(e) => match policy.should_retry(&e, attempt) {
                RetryDecision::Retry {
                    delay,
                    attempt: next_attempt,
                } => {
                    info!(
                        url = %url,
                        attempt = next_attempt,
                        max_attempts = policy.max_attempts(),
                        error = %e,
                        "retrying download"
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                RetryDecision::DoNotRetry { reason } => {
                    debug!(url = %url, %reason, "not retrying download");
                    return Err((e, attempt));
                }
            },
        }
    }
}
