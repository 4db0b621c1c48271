//! dirdl Core Library
//!
//! This library provides the core functionality for the `dirdl` tool, which
//! mirrors files listed on auto-generated HTTP directory index pages into a
//! local folder tree, sorted by the system folder they were listed under.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`listing`] - Directory index scraping into [`FileEntry`] values
//! - [`download`] - Streaming single-file downloads, retry, and the bulk scheduler
//! - [`archive`] - In-place ZIP extraction with archive-slip protection
//! - [`category`] - Mapping file URLs to per-system folder labels
//! - [`format`] - Human-readable byte counts and ETAs

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod archive;
pub mod category;
pub mod download;
pub mod format;
pub mod listing;

// Re-export commonly used types
pub use archive::{ExtractError, extract_in_place};
pub use category::{UNKNOWN_LABEL, classify};
pub use download::{
    BatchStats, DEFAULT_ATTEMPTS, DEFAULT_CONCURRENCY, DownloadEngine, DownloadError,
    DownloadJob, EngineError, FailureKind, FileDownloader, HttpClient, JobResult, Progress,
    ProgressCallback, RetryPolicy,
};
pub use format::{calculate_eta, format_bytes};
pub use listing::{FileEntry, IndexClient, ListingError};
