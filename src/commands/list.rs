//! List command handler: show the entries of one index page.

use anyhow::{Context, Result};
use dirdl_core::{FileEntry, IndexClient};

use crate::cli::ListArgs;

pub async fn run_list_command(args: &ListArgs, client: &IndexClient) -> Result<()> {
    let entries = client
        .list(&args.url)
        .await
        .with_context(|| format!("Failed to list '{}'", args.url))?;

    let shown = select_entries(&entries, args.filter.as_deref(), args.files_only);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&shown)?);
        return Ok(());
    }

    for entry in &shown {
        println!("{}", render_entry(entry));
    }
    println!("Showing {} of {} entries", shown.len(), entries.len());
    Ok(())
}

/// Entries whose name contains `filter` (case-insensitive), optionally
/// without directories. An empty filter matches everything.
pub(crate) fn select_entries<'a>(
    entries: &'a [FileEntry],
    filter: Option<&str>,
    files_only: bool,
) -> Vec<&'a FileEntry> {
    let needle = filter.map(str::to_lowercase).unwrap_or_default();
    entries
        .iter()
        .filter(|entry| !(files_only && entry.is_dir))
        .filter(|entry| needle.is_empty() || entry.name.to_lowercase().contains(&needle))
        .collect()
}

fn render_entry(entry: &FileEntry) -> String {
    let tag = if entry.is_dir { "[DIR]" } else { "[FILE]" };
    format!("{tag:<6} {}  {}", entry.name, entry.url)
}
