//! Constants for the download module.

/// Default HTTP connect timeout (30 seconds).
///
/// Only connection setup is bounded; an open transfer may run indefinitely.
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Filename used when a URL has no usable last path segment.
pub const PLACEHOLDER_FILENAME: &str = "download.bin";

/// Idle pooled connections kept per host.
pub(crate) const POOL_MAX_IDLE_PER_HOST: usize = 100;
