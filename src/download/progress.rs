//! Progress snapshots emitted while a single file transfers.

use std::sync::Arc;
use std::time::Instant;

use crate::format::{ETA_UNKNOWN, calculate_eta};

/// Progress callback for download operations.
///
/// Invoked synchronously from the transfer loop, possibly from several
/// concurrent jobs at once; implementations must return quickly.
pub type ProgressCallback = Arc<dyn Fn(&Progress) + Send + Sync>;

/// A point-in-time view of one transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    /// Bytes written so far. Never decreases within one transfer.
    pub bytes_done: u64,
    /// Expected size, or 0 when the server sent no content length.
    pub bytes_total: u64,
    /// URL of the file being transferred.
    pub current_file: String,
    /// Formatted time remaining, or [`ETA_UNKNOWN`].
    pub eta: String,
    /// Set on the terminal success snapshot.
    pub is_done: bool,
    /// Set on the terminal failure snapshot.
    pub error: Option<String>,
}

impl Progress {
    fn new(current_file: &str) -> Self {
        Self {
            bytes_done: 0,
            bytes_total: 0,
            current_file: current_file.to_string(),
            eta: ETA_UNKNOWN.to_string(),
            is_done: false,
            error: None,
        }
    }

    /// Completed fraction in `0.0..=1.0`, when the total is known.
    #[must_use]
    pub fn fraction(&self) -> Option<f64> {
        if self.bytes_total == 0 {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        let ratio = self.bytes_done as f64 / self.bytes_total as f64;
        Some(ratio.min(1.0))
    }

    /// Whether this is the last snapshot of the transfer.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.is_done || self.error.is_some()
    }
}

/// Owns the running snapshot for one transfer and forwards it to the
/// caller's callback. A missing callback is a no-op sink.
pub(crate) struct ProgressReporter<'a> {
    callback: Option<&'a ProgressCallback>,
    snapshot: Progress,
    started: Instant,
}

impl<'a> ProgressReporter<'a> {
    pub(crate) fn new(current_file: &str, callback: Option<&'a ProgressCallback>) -> Self {
        Self {
            callback,
            snapshot: Progress::new(current_file),
            started: Instant::now(),
        }
    }

    pub(crate) fn set_total(&mut self, total: u64) {
        self.snapshot.bytes_total = total;
    }

    /// Records a written chunk and emits a fresh snapshot.
    pub(crate) fn advance(&mut self, written: u64) {
        let snapshot = &mut self.snapshot;
        snapshot.bytes_done = snapshot.bytes_done.saturating_add(written);
        if snapshot.bytes_total > 0 {
            snapshot.bytes_done = snapshot.bytes_done.min(snapshot.bytes_total);
        }
        snapshot.eta = calculate_eta(
            snapshot.bytes_done,
            snapshot.bytes_total,
            self.started.elapsed(),
        );
        self.emit();
    }

    /// Reports a file that is already on disk as fully transferred.
    pub(crate) fn already_complete(&mut self, size: u64) {
        self.snapshot.bytes_total = size;
        self.snapshot.bytes_done = size;
        self.finish();
    }

    pub(crate) fn finish(&mut self) {
        self.snapshot.is_done = true;
        self.snapshot.eta = ETA_UNKNOWN.to_string();
        self.emit();
    }

    /// Emits a failure snapshot unless a terminal snapshot went out already.
    pub(crate) fn fail(&mut self, error: &impl std::fmt::Display) {
        if self.snapshot.is_terminal() {
            return;
        }
        self.snapshot.error = Some(error.to_string());
        self.emit();
    }

    pub(crate) fn bytes_done(&self) -> u64 {
        self.snapshot.bytes_done
    }

    fn emit(&self) {
        if let Some(callback) = self.callback {
            callback(&self.snapshot);
        }
    }
}
