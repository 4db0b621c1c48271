//! Fetch command handler: bulk download of an index page.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use dirdl_core::download::RetryPolicy;
use dirdl_core::listing::normalize_index_url;
use dirdl_core::{
    BatchStats, DownloadEngine, DownloadJob, FileEntry, HttpClient, IndexClient, JobResult,
    UNKNOWN_LABEL, classify,
};
use tracing::{debug, info};
use url::Url;

use super::list::select_entries;
use crate::app_config::FileConfig;
use crate::cli::FetchArgs;

pub async fn run_fetch_command(
    args: &FetchArgs,
    config: &FileConfig,
    index: &IndexClient,
    client: &HttpClient,
) -> Result<()> {
    let root = normalize_index_url(&args.url)
        .with_context(|| format!("Invalid index URL '{}'", args.url))?;
    let entries = index
        .list(root.as_str())
        .await
        .with_context(|| format!("Failed to list '{root}'"))?;

    let selected = select_entries(&entries, args.filter.as_deref(), true);
    if selected.is_empty() {
        println!("No files matched on {root}");
        return Ok(());
    }

    let classify_root = match args.root.as_deref() {
        Some(raw) => {
            normalize_index_url(raw).with_context(|| format!("Invalid root URL '{raw}'"))?
        }
        None => parent_directory(&root),
    };
    debug!(root = %classify_root, "system folders derived relative to root");

    let output_dir = config.resolve_output_dir(args.output_dir.as_deref());
    let jobs = plan_jobs(
        classify_root.as_str(),
        &selected,
        &output_dir,
        config.group_by_system(args.flat),
    );
    let total = jobs.len();

    let policy = RetryPolicy::with_max_attempts(config.resolve_retries(args.retries));
    let engine = DownloadEngine::new(
        config.resolve_concurrency(args.concurrency),
        policy,
        Arc::new(client.clone()),
    )?;
    info!(
        total,
        concurrency = engine.concurrency(),
        attempts = engine.retry_policy().max_attempts(),
        output_dir = %output_dir.display(),
        "queued downloads"
    );

    let mut results = engine.run_batch(jobs);
    let mut stats = BatchStats::new();
    while let Some(result) = results.recv().await {
        stats.record(&result);
        println!("{}", render_result(&result, stats.total(), total));
    }

    println!(
        "Done: {} succeeded, {} failed",
        stats.completed(),
        stats.failed()
    );
    if stats.failed() > 0 {
        bail!("{} of {total} downloads failed", stats.failed());
    }
    Ok(())
}

/// The directory above `index`, or `index` itself at the top level.
pub(crate) fn parent_directory(index: &Url) -> Url {
    let dir = if index.path().ends_with('/') {
        index.clone()
    } else {
        index.join("./").unwrap_or_else(|_| index.clone())
    };
    dir.join("../").unwrap_or(dir)
}

/// One job per file, routed into `<output_dir>/<system>/` when grouping.
/// Files with no recognisable system stay in `output_dir`.
pub(crate) fn plan_jobs(
    root_url: &str,
    entries: &[&FileEntry],
    output_dir: &Path,
    group_by_system: bool,
) -> Vec<DownloadJob> {
    entries
        .iter()
        .map(|entry| {
            let label = if group_by_system {
                classify(root_url, &entry.url)
            } else {
                UNKNOWN_LABEL.to_string()
            };
            let target_dir = if label == UNKNOWN_LABEL {
                output_dir.to_path_buf()
            } else {
                output_dir.join(label)
            };
            debug!(url = %entry.url, target = %target_dir.display(), "planned job");
            DownloadJob::new(entry.url.clone(), target_dir)
        })
        .collect()
}

/// `[n/N] (pct%) OK|FAILED name` line for one settled job, with advice on failure.
pub(crate) fn render_result(result: &JobResult, done: usize, total: usize) -> String {
    let pct = if total == 0 { 100 } else { done * 100 / total };
    match result.error() {
        None => format!("[{done}/{total}] ({pct}%) OK {}", result.label),
        Some(e) => format!(
            "[{done}/{total}] ({pct}%) FAILED {} after {} attempt(s): {e} ({})",
            result.label,
            result.attempts,
            e.failure_kind().hint()
        ),
    }
}
