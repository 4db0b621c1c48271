//! HTTP download engine for streaming files to disk.
//!
//! This module provides functionality for downloading files from HTTP/HTTPS URLs
//! with streaming support to handle large files efficiently.
//!
//! # Features
//!
//! - Streaming downloads (memory-efficient for large files)
//! - Per-chunk progress snapshots with ETA
//! - Skip of files already present with non-zero size
//! - In-place extraction of ZIP archives
//! - Whole-operation retry and a bounded-concurrency batch scheduler
//!
//! # Example
//!
//! ```no_run
//! use dirdl_core::download::HttpClient;
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::new();
//! let file_path = client
//!     .download_file_with_retry("https://example.org/files/N64/Game.zip", Path::new("./N64"), None, 3)
//!     .await?;
//! println!("Downloaded: {}", file_path.display());
//! # Ok(())
//! # }
//! ```

mod client;
mod constants;
mod engine;
mod error;
mod filename;
mod progress;
mod retry;

pub use client::{FileDownloader, HttpClient, default_client_builder};
pub use constants::{CONNECT_TIMEOUT_SECS, PLACEHOLDER_FILENAME};
pub use engine::{
    BatchStats, DEFAULT_CONCURRENCY, DownloadEngine, DownloadJob, EngineError, JobResult,
    MAX_CONCURRENCY, MIN_CONCURRENCY,
};
pub use error::{DownloadError, FailureKind};
pub use progress::{Progress, ProgressCallback};
pub use retry::{DEFAULT_ATTEMPTS, RetryDecision, RetryPolicy, download_with_retry};
