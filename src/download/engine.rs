//! Bulk download scheduler with bounded concurrency.
//!
//! The [`DownloadEngine`] fans a batch of [`DownloadJob`]s out over a
//! semaphore-limited set of Tokio tasks. Each job runs the single-file
//! download with its own retry loop and reports exactly one [`JobResult`] on
//! the result stream, in completion order.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use dirdl_core::download::{DownloadEngine, DownloadJob, HttpClient, RetryPolicy};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = DownloadEngine::new(4, RetryPolicy::default(), Arc::new(HttpClient::new()))?;
//! let jobs = vec![DownloadJob::new("https://example.org/files/SNES/Game.zip", "./roms/SNES")];
//!
//! let mut results = engine.run_batch(jobs);
//! while let Some(result) = results.recv().await {
//!     println!("{} -> {}", result.label, if result.is_success() { "OK" } else { "FAILED" });
//! }
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{Semaphore, mpsc};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::client::FileDownloader;
use super::error::DownloadError;
use super::filename::filename_from_url;
use super::progress::ProgressCallback;
use super::retry::{RetryPolicy, download_with_retry};

/// Minimum allowed concurrency value.
pub const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
pub const MAX_CONCURRENCY: usize = 100;

/// Default concurrency if not specified.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Error type for download engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },

    /// Semaphore was closed unexpectedly.
    #[error("semaphore closed unexpectedly")]
    SemaphoreClosed,
}

/// One file to fetch into one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadJob {
    /// Absolute URL of the file.
    pub url: String,
    /// Directory the file lands in.
    pub target_dir: PathBuf,
}

impl DownloadJob {
    /// Creates a job.
    pub fn new(url: impl Into<String>, target_dir: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            target_dir: target_dir.into(),
        }
    }

    /// File name shown to users; the raw URL when it cannot be parsed.
    #[must_use]
    pub fn label(&self) -> String {
        Url::parse(&self.url).map_or_else(|_| self.url.clone(), |url| filename_from_url(&url))
    }
}

/// Outcome of one job.
#[derive(Debug)]
pub struct JobResult {
    /// The job this result belongs to.
    pub job: DownloadJob,
    /// Display name of the job.
    pub label: String,
    /// Attempts made, including the final one.
    pub attempts: u32,
    /// Local path on success, the last attempt's error on failure.
    pub result: Result<PathBuf, DownloadError>,
}

impl JobResult {
    fn new(job: DownloadJob, attempts: u32, result: Result<PathBuf, DownloadError>) -> Self {
        Self {
            label: job.label(),
            job,
            attempts,
            result,
        }
    }

    /// Whether the job succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// The error of a failed job.
    #[must_use]
    pub fn error(&self) -> Option<&DownloadError> {
        self.result.as_ref().err()
    }
}

/// Aggregate counts for a finished batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchStats {
    completed: usize,
    failed: usize,
}

impl BatchStats {
    /// Creates a new stats tracker with zero counts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of successfully completed downloads.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.completed
    }

    /// Returns the number of failed downloads.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed
    }

    /// Returns the total number of jobs processed (completed + failed).
    #[must_use]
    pub fn total(&self) -> usize {
        self.completed + self.failed
    }

    /// Counts one result.
    pub fn record(&mut self, result: &JobResult) {
        if result.is_success() {
            self.completed += 1;
        } else {
            self.failed += 1;
        }
    }
}

/// Download engine for concurrent file downloads with retry support.
///
/// The engine uses a semaphore to limit the number of jobs in flight. A
/// job holds its permit for all of its attempts and releases it when the
/// job settles, including when the job's task panics.
///
/// Jobs acquire permits in submission order; results arrive in completion
/// order. There is no cancellation: a batch runs until every job settles.
pub struct DownloadEngine {
    semaphore: Arc<Semaphore>,
    concurrency: usize,
    retry_policy: RetryPolicy,
    downloader: Arc<dyn FileDownloader>,
    on_progress: Option<ProgressCallback>,
}

impl std::fmt::Debug for DownloadEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadEngine")
            .field("concurrency", &self.concurrency)
            .field("retry_policy", &self.retry_policy)
            .field("has_progress", &self.on_progress.is_some())
            .finish_non_exhaustive()
    }
}

impl DownloadEngine {
    /// Creates a new download engine.
    ///
    /// # Arguments
    ///
    /// * `concurrency` - Maximum simultaneous jobs (1-100)
    /// * `retry_policy` - Attempts per job
    /// * `downloader` - Performs each single-file download
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConcurrency`] if concurrency is outside 1-100.
    #[instrument(level = "debug", skip(retry_policy, downloader))]
    pub fn new(
        concurrency: usize,
        retry_policy: RetryPolicy,
        downloader: Arc<dyn FileDownloader>,
    ) -> Result<Self, EngineError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(EngineError::InvalidConcurrency { value: concurrency });
        }

        debug!(
            concurrency,
            max_attempts = retry_policy.max_attempts(),
            "creating download engine"
        );

        Ok(Self {
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            retry_policy,
            downloader,
            on_progress: None,
        })
    }

    /// Sets a progress callback passed to every job's transfers.
    ///
    /// The callback is invoked from several tasks at once.
    #[must_use]
    pub fn with_progress(mut self, on_progress: ProgressCallback) -> Self {
        self.on_progress = Some(on_progress);
        self
    }

    /// Returns the configured concurrency limit.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Returns the configured retry policy.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Starts a batch and returns its result stream.
    ///
    /// The stream yields exactly one [`JobResult`] per job and closes once
    /// every job has settled. Must be called from within a Tokio runtime.
    pub fn run_batch(&self, jobs: Vec<DownloadJob>) -> mpsc::Receiver<JobResult> {
        let (tx, rx) = mpsc::channel(jobs.len().max(1));
        let semaphore = Arc::clone(&self.semaphore);
        let downloader = Arc::clone(&self.downloader);
        let policy = self.retry_policy.clone();
        let on_progress = self.on_progress.clone();

        info!(
            total = jobs.len(),
            concurrency = self.concurrency,
            "starting batch"
        );

        tokio::spawn(async move {
            for job in jobs {
                debug!(url = %job.url, "admitting job");

                // Blocks here if at the concurrency limit
                let permit = match Arc::clone(&semaphore).acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        let error = DownloadError::interrupted(
                            job.url.clone(),
                            EngineError::SemaphoreClosed.to_string(),
                        );
                        let _ = tx.send(JobResult::new(job, 0, Err(error))).await;
                        continue;
                    }
                };

                let tx = tx.clone();
                let downloader = Arc::clone(&downloader);
                let policy = policy.clone();
                let on_progress = on_progress.clone();

                tokio::spawn(async move {
                    // Permit is dropped when this block exits (RAII)
                    let _permit = permit;

                    let work_job = job.clone();
                    let work = tokio::spawn(async move {
                        let outcome = download_with_retry(
                            downloader.as_ref(),
                            &work_job.url,
                            &work_job.target_dir,
                            on_progress.as_ref(),
                            &policy,
                        )
                        .await;
                        match outcome {
                            Ok((path, attempts)) => (attempts, Ok(path)),
                            Err((e, attempts)) => (attempts, Err(e)),
                        }
                    });

                    let result = match work.await {
                        Ok((attempts, result)) => JobResult::new(job, attempts, result),
                        Err(e) => {
                            warn!(url = %job.url, error = %e, "download task panicked");
                            let error = DownloadError::interrupted(job.url.clone(), e.to_string());
                            JobResult::new(job, 0, Err(error))
                        }
                    };

                    match &result.result {
                        Ok(path) => {
                            info!(url = %result.job.url, path = %path.display(), "download completed");
                        }
                        Err(e) => warn!(
                            url = %result.job.url,
                            error = %e,
                            attempts = result.attempts,
                            "download failed after all attempts"
                        ),
                    }

                    if tx.send(result).await.is_err() {
                        debug!("result receiver dropped");
                    }
                });
            }
        });

        rx
    }

    /// Runs a batch to completion, returning results in completion order.
    pub async fn run_batch_collect(&self, jobs: Vec<DownloadJob>) -> (Vec<JobResult>, BatchStats) {
        let mut rx = self.run_batch(jobs);
        let mut results = Vec::new();
        let mut stats = BatchStats::new();

        while let Some(result) = rx.recv().await {
            stats.record(&result);
            results.push(result);
        }

        info!(
            completed = stats.completed(),
            failed = stats.failed(),
            total = stats.total(),
            "batch complete"
        );
        (results, stats)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::path::Path;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::download::Progress;

    /// Records how many calls run at once; URLs containing "fail" always
    /// fail, "panic" panics, "slow" sleeps longer.
    #[derive(Default)]
    struct FakeDownloader {
        active: AtomicUsize,
        max_active: AtomicUsize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl FileDownloader for FakeDownloader {
        async fn download_file(
            &self,
            url: &str,
            target_dir: &Path,
            on_progress: Option<&ProgressCallback>,
        ) -> Result<PathBuf, DownloadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now, Ordering::SeqCst);

            let pause = if url.contains("slow") { 150 } else { 20 };
            tokio::time::sleep(Duration::from_millis(pause)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);

            assert!(!url.contains("panic"), "simulated crash");
            if let Some(callback) = on_progress {
                callback(&Progress {
                    bytes_done: 1,
                    bytes_total: 1,
                    current_file: url.to_string(),
                    eta: "--".to_string(),
                    is_done: true,
                    error: None,
                });
            }
            if url.contains("fail") {
                Err(DownloadError::timeout(url))
            } else {
                Ok(target_dir.join(url.rsplit('/').next().unwrap()))
            }
        }
    }

    fn engine_with(
        concurrency: usize,
        attempts: u32,
        downloader: &Arc<FakeDownloader>,
    ) -> DownloadEngine {
        let downloader: Arc<dyn FileDownloader> = Arc::clone(downloader) as Arc<dyn FileDownloader>;
        DownloadEngine::new(concurrency, RetryPolicy::with_max_attempts(attempts), downloader)
            .unwrap()
    }

    fn jobs(urls: &[&str]) -> Vec<DownloadJob> {
        urls.iter().map(|url| DownloadJob::new(*url, "/tmp/out")).collect()
    }

    #[test]
    fn test_engine_new_invalid_concurrency_zero() {
        let result = DownloadEngine::new(
            0,
            RetryPolicy::default(),
            Arc::new(FakeDownloader::default()),
        );
        assert!(matches!(
            result,
            Err(EngineError::InvalidConcurrency { value: 0 })
        ));
    }

    #[test]
    fn test_engine_new_invalid_concurrency_too_high() {
        let result = DownloadEngine::new(
            101,
            RetryPolicy::default(),
            Arc::new(FakeDownloader::default()),
        );
        assert!(matches!(
            result,
            Err(EngineError::InvalidConcurrency { value: 101 })
        ));
    }

    #[test]
    fn test_engine_new_keeps_settings() {
        let engine = DownloadEngine::new(
            MAX_CONCURRENCY,
            RetryPolicy::with_max_attempts(5),
            Arc::new(FakeDownloader::default()),
        )
        .unwrap();
        assert_eq!(engine.concurrency(), MAX_CONCURRENCY);
        assert_eq!(engine.retry_policy().max_attempts(), 5);
    }

    #[test]
    fn test_engine_error_display() {
        let msg = EngineError::InvalidConcurrency { value: 0 }.to_string();
        assert!(msg.contains('0'), "Expected value in: {msg}");
        assert!(msg.contains("100"), "Expected max in: {msg}");
    }

    #[test]
    fn test_job_label_uses_file_name() {
        let job = DownloadJob::new("https://x/files/SNES/Super%20Game.zip", "/tmp");
        assert_eq!(job.label(), "Super Game.zip");
        assert_eq!(DownloadJob::new("not a url", "/tmp").label(), "not a url");
    }

    #[tokio::test]
    async fn test_run_batch_bounds_concurrency() {
        let downloader = Arc::new(FakeDownloader::default());
        let engine = engine_with(3, 1, &downloader);
        let urls: Vec<String> = (0..10).map(|i| format!("https://x/f{i}.bin")).collect();
        let url_refs: Vec<&str> = urls.iter().map(String::as_str).collect();

        let (results, stats) = engine.run_batch_collect(jobs(&url_refs)).await;

        assert_eq!(results.len(), 10);
        assert_eq!(stats.completed(), 10);
        let max = downloader.max_active.load(Ordering::SeqCst);
        assert!(max <= 3, "Expected at most 3 concurrent jobs, saw {max}");
        assert!(max >= 2, "Expected jobs to overlap, saw {max}");
    }

    #[tokio::test]
    async fn test_run_batch_retry_exhaustion() {
        let downloader = Arc::new(FakeDownloader::default());
        let engine = engine_with(2, 3, &downloader);

        let (results, stats) = engine
            .run_batch_collect(jobs(&["https://x/fail.bin"]))
            .await;

        assert_eq!(results.len(), 1);
        assert_eq!(stats.failed(), 1);
        assert_eq!(downloader.calls.load(Ordering::SeqCst), 3);
        assert_eq!(results[0].attempts, 3);
        assert!(matches!(
            results[0].error(),
            Some(DownloadError::Timeout { .. })
        ));
    }

    #[tokio::test]
    async fn test_run_batch_failure_does_not_affect_siblings() {
        let downloader = Arc::new(FakeDownloader::default());
        let engine = engine_with(4, 2, &downloader);

        let (results, stats) = engine
            .run_batch_collect(jobs(&[
                "https://x/a.bin",
                "https://x/fail.bin",
                "https://x/b.bin",
            ]))
            .await;

        assert_eq!(results.len(), 3);
        assert_eq!(stats.completed(), 2);
        assert_eq!(stats.failed(), 1);
        assert_eq!(stats.total(), 3);
    }

    #[tokio::test]
    async fn test_run_batch_results_in_completion_order() {
        let downloader = Arc::new(FakeDownloader::default());
        let engine = engine_with(2, 1, &downloader);

        let (results, _) = engine
            .run_batch_collect(jobs(&["https://x/slow.bin", "https://x/quick.bin"]))
            .await;

        let labels: Vec<&str> = results.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["quick.bin", "slow.bin"]);
    }

    #[tokio::test]
    async fn test_run_batch_panicking_job_still_reports() {
        let downloader = Arc::new(FakeDownloader::default());
        let engine = engine_with(1, 1, &downloader);

        let (results, stats) = engine
            .run_batch_collect(jobs(&["https://x/panic.bin", "https://x/ok.bin"]))
            .await;

        assert_eq!(results.len(), 2);
        assert_eq!(stats.failed(), 1);
        assert_eq!(stats.completed(), 1);
        let crashed = results.iter().find(|r| r.label == "panic.bin").unwrap();
        assert!(matches!(
            crashed.error(),
            Some(DownloadError::Interrupted { .. })
        ));
    }

    #[tokio::test]
    async fn test_run_batch_empty_closes_stream() {
        let downloader = Arc::new(FakeDownloader::default());
        let engine = engine_with(2, 1, &downloader);

        let (results, stats) = engine.run_batch_collect(Vec::new()).await;
        assert!(results.is_empty());
        assert_eq!(stats, BatchStats::new());
    }

    #[tokio::test]
    async fn test_run_batch_forwards_progress() {
        let downloader = Arc::new(FakeDownloader::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let engine = engine_with(2, 1, &downloader).with_progress(Arc::new(move |p: &Progress| {
            sink.lock().unwrap().push(p.current_file.clone());
        }));

        engine
            .run_batch_collect(jobs(&["https://x/a.bin", "https://x/b.bin"]))
            .await;

        let mut seen = seen.lock().unwrap().clone();
        seen.sort();
        assert_eq!(seen, vec!["https://x/a.bin", "https://x/b.bin"]);
    }
}
