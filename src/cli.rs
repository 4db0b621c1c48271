//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

/// Mirror files from HTTP directory index pages.
///
/// dirdl lists the files on an auto-generated index page and downloads
/// them into per-system folders, unpacking ZIP archives as they land.
#[derive(Parser, Debug)]
#[command(name = "dirdl")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show the entries of a directory index page
    List(ListArgs),
    /// Download individual files
    Get(GetArgs),
    /// Download every matching file listed on an index page
    Fetch(FetchArgs),
}

#[derive(ClapArgs, Debug)]
pub struct ListArgs {
    /// Index page URL (https:// is assumed when no scheme is given)
    pub url: String,

    /// Only show entries whose name contains this text (case-insensitive)
    #[arg(short, long)]
    pub filter: Option<String>,

    /// Hide directories
    #[arg(long)]
    pub files_only: bool,

    /// Print entries as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(ClapArgs, Debug)]
pub struct GetArgs {
    /// File URLs to download
    #[arg(required = true)]
    pub urls: Vec<String>,

    /// Directory to save files into
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Attempts per file (1-10)
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..=10))]
    pub retries: Option<u32>,
}

#[derive(ClapArgs, Debug)]
pub struct FetchArgs {
    /// Index page URL (https:// is assumed when no scheme is given)
    pub url: String,

    /// Directory to save files into
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Only download files whose name contains this text (case-insensitive)
    #[arg(short, long)]
    pub filter: Option<String>,

    /// Maximum concurrent downloads (1-100)
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub concurrency: Option<u8>,

    /// Attempts per file (1-10)
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..=10))]
    pub retries: Option<u32>,

    /// URL the system folder is derived from (default: parent of the index URL)
    #[arg(long)]
    pub root: Option<String>,

    /// Save every file directly in the output directory
    #[arg(long)]
    pub flat: bool,
}
