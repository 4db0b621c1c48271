//! Human-readable byte counts and transfer ETA estimation.

use std::time::Duration;

/// Sentinel returned by [`calculate_eta`] when no estimate is possible.
pub const ETA_UNKNOWN: &str = "--";

const SIZE_UNITS: [&str; 9] = ["Bytes", "KB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"];

const UNIT_STEP: f64 = 1024.0;

/// Formats a byte count using binary (1024) units.
///
/// ```
/// use dirdl_core::format::format_bytes;
///
/// assert_eq!(format_bytes(1536, 2), "1.50 KB");
/// assert_eq!(format_bytes(0, 2), "0 Bytes");
/// ```
#[must_use]
pub fn format_bytes(bytes: u64, decimals: usize) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    #[allow(clippy::cast_precision_loss)]
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= UNIT_STEP && unit < SIZE_UNITS.len() - 1 {
        value /= UNIT_STEP;
        unit += 1;
    }

    format!("{value:.decimals$} {}", SIZE_UNITS[unit])
}

/// Linearly extrapolates the remaining transfer time.
///
/// Returns `None` when nothing has been transferred yet, the total is
/// unknown, or the transfer is already complete.
#[must_use]
pub fn estimate_remaining(current: u64, total: u64, elapsed: Duration) -> Option<Duration> {
    if current == 0 || total == 0 || current >= total {
        return None;
    }

    #[allow(clippy::cast_precision_loss)]
    let ratio = current as f64 / total as f64;
    let projected_total = elapsed.as_secs_f64() / ratio;
    let remaining = (projected_total - elapsed.as_secs_f64()).max(0.0);
    Some(Duration::from_secs_f64(remaining))
}

/// Formats the estimated time remaining as e.g. `1h 2m 5s`, or [`ETA_UNKNOWN`].
#[must_use]
pub fn calculate_eta(current: u64, total: u64, elapsed: Duration) -> String {
    match estimate_remaining(current, total, elapsed) {
        Some(remaining) => format_duration(remaining),
        None => ETA_UNKNOWN.to_string(),
    }
}

fn format_duration(remaining: Duration) -> String {
    let secs = remaining.as_secs();
    let mins = secs / 60;
    let hours = mins / 60;

    let mut parts = Vec::with_capacity(3);
    if hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if mins % 60 > 0 {
        parts.push(format!("{}m", mins % 60));
    }
    if secs % 60 > 0 || parts.is_empty() {
        parts.push(format!("{}s", secs % 60));
    }
    parts.join(" ")
}
