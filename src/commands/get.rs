//! Get command handler: download individual files with a progress bar.

use std::sync::Arc;

use anyhow::{Result, bail};
use dirdl_core::{HttpClient, Progress, ProgressCallback, format_bytes};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info};

use crate::app_config::FileConfig;
use crate::cli::GetArgs;

const BAR_TEMPLATE: &str = "{bar:40.cyan/blue} {msg}";

pub async fn run_get_command(
    args: &GetArgs,
    config: &FileConfig,
    client: &HttpClient,
    quiet: bool,
) -> Result<()> {
    let output_dir = config.resolve_output_dir(args.output_dir.as_deref());
    let attempts = config.resolve_retries(args.retries);
    let mut failed = 0usize;

    for url in &args.urls {
        let bar = new_bar(quiet);
        let callback = bar_callback(bar.clone());

        let result = client
            .download_file_with_retry(url, &output_dir, Some(&callback), attempts)
            .await;
        bar.finish_and_clear();

        match result {
            Ok(path) => {
                info!(url = %url, path = %path.display(), "saved");
                println!("Saved {}", path.display());
            }
            Err(e) => {
                error!(url = %url, error = %e, "download failed");
                println!("FAILED {url}: {e} ({})", e.failure_kind().hint());
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{failed} of {} downloads failed", args.urls.len());
    }
    Ok(())
}

fn new_bar(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template(BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar
}

fn bar_callback(bar: ProgressBar) -> ProgressCallback {
    Arc::new(move |progress: &Progress| {
        if progress.bytes_total > 0 {
            bar.set_length(progress.bytes_total);
        }
        bar.set_position(progress.bytes_done);
        bar.set_message(progress_label(progress));
    })
}

/// `done / total (pct%) ETA` line shown next to the bar.
pub(crate) fn progress_label(progress: &Progress) -> String {
    let done = format_bytes(progress.bytes_done, 2);
    match progress.fraction() {
        Some(fraction) => format!(
            "{done} / {} ({:.0}%) ETA {}",
            format_bytes(progress.bytes_total, 2),
            fraction * 100.0,
            progress.eta
        ),
        None => format!("{done} / ? ETA {}", progress.eta),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(done: u64, total: u64) -> Progress {
        Progress {
            bytes_done: done,
            bytes_total: total,
            current_file: "https://x/a.zip".to_string(),
            eta: "12s".to_string(),
            is_done: false,
            error: None,
        }
    }

    #[test]
    fn test_progress_label_with_total() {
        let label = progress_label(&snapshot(512, 2048));
        assert_eq!(label, "512.00 Bytes / 2.00 KB (25%) ETA 12s");
    }

    #[test]
    fn test_progress_label_without_total() {
        let label = progress_label(&snapshot(1536, 0));
        assert_eq!(label, "1.50 KB / ? ETA 12s");
    }

    #[test]
    fn test_bar_callback_tracks_position() {
        let bar = ProgressBar::hidden();
        let callback = bar_callback(bar.clone());
        callback(&snapshot(10, 40));
        assert_eq!(bar.position(), 10);
        assert_eq!(bar.length(), Some(40));
    }
}
