//! Error types for the download module.
//!
//! Every variant carries the URL or path it refers to so that log lines and
//! batch results stay meaningful without extra context.

use std::path::PathBuf;

use thiserror::Error;

use crate::archive::ExtractError;

/// How a failure should be presented to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Network or server trouble; trying again later may succeed.
    Transient,
    /// The URL or the remote content is unusable as given.
    Input,
    /// The local environment needs attention (permissions, disk space).
    Environment,
}

impl FailureKind {
    /// Short advice shown next to a failed download.
    #[must_use]
    pub fn hint(self) -> &'static str {
        match self {
            Self::Transient => "try again later",
            Self::Input => "check the URL",
            Self::Environment => "check permissions and free disk space",
        }
    }
}

/// Errors that can occur while downloading a single file.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level error (DNS resolution, connection refused, TLS errors,
    /// or a body read that failed mid-stream).
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Connection establishment timed out.
    #[error("timeout downloading {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// The server answered with something other than 200 OK.
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// File system error (create directory, create file, write).
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The provided URL is malformed or invalid.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The file downloaded but extracting it failed.
    #[error(transparent)]
    Extract(#[from] ExtractError),

    /// The task running the transfer stopped before producing a result.
    #[error("download of {target} was interrupted: {reason}")]
    Interrupted {
        /// URL or path the task was working on.
        target: String,
        /// Why the task stopped.
        reason: String,
    },
}

impl DownloadError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates an interrupted-task error.
    pub fn interrupted(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Interrupted {
            target: target.into(),
            reason: reason.into(),
        }
    }

    /// Whether the retry loop should make another attempt.
    ///
    /// Everything except a failed archive cleanup is repeated; the cleanup
    /// case already left the extracted files on disk. See
    /// [`failure_kind`](Self::failure_kind) for how to report the error.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Extract(inner) => inner.is_retryable(),
            _ => true,
        }
    }

    /// Whether the error points at the local environment (permissions, disk
    /// space) rather than the network or the input.
    #[must_use]
    pub fn is_filesystem(&self) -> bool {
        matches!(
            self,
            Self::Io { .. } | Self::Extract(ExtractError::Io { .. } | ExtractError::Cleanup { .. })
        )
    }

    /// Classifies the error for the user once retries are exhausted.
    ///
    /// A corrupt archive counts as transient since a fresh download may fix it.
    #[must_use]
    pub fn failure_kind(&self) -> FailureKind {
        if self.is_filesystem() {
            FailureKind::Environment
        } else if matches!(self, Self::InvalidUrl { .. }) {
            FailureKind::Input
        } else {
            FailureKind::Transient
        }
    }
}

// No From<reqwest::Error> / From<std::io::Error>: those sources lack the
// url/path context the variants require. ExtractError already carries its path.
