//! Command-line definition.

use clap::{ArgGroup, Parser};

/// Download archived snapshots from the Wayback Machine (archive.org).
#[derive(Debug, Parser)]
#[command(name = "waybackup")]
#[command(about = "Download from the Wayback Machine (archive.org)")]
#[command(version)]
#[command(group = ArgGroup::new("mode").required(true).multiple(false))]
pub struct Cli {
    /// URL (with subdir/subdomain) to download
    #[arg(short, long)]
    pub url: String,

    /// Download snapshots of all timestamps
    #[arg(short, long, group = "mode")]
    pub all: bool,

    /// Download the latest version of each file in the range
    #[arg(short, long, group = "mode")]
    pub last: bool,

    /// Download the earliest version of each file in the range
    #[arg(short, long, group = "mode")]
    pub first: bool,

    /// Save a page to the Wayback Machine
    #[arg(short, long, group = "mode")]
    pub save: bool,

    /// Search only for the explicitly given URL (no wildcard)
    #[arg(short, long)]
    pub explicit: bool,

    /// Range in years to search back from now
    #[arg(short, long)]
    pub range: Option<u32>,

    /// Start timestamp, format YYYYMMDDhhmmss
    #[arg(long)]
    pub start: Option<String>,

    /// End timestamp, format YYYYMMDDhhmmss
    #[arg(long)]
    pub end: Option<String>,

    /// Limit the number of snapshots queried from the CDX API
    #[arg(long)]
    pub limit: Option<u64>,

    /// Comma-separated list of filetypes to include (e.g. 'jpg,css,js')
    #[arg(long)]
    pub filetype: Option<String>,

    /// Comma-separated list of HTTP status codes to include (e.g. '200,301')
    #[arg(long)]
    pub statuscode: Option<String>,

    /// Output folder, defaults to ./waybackup_snapshots
    #[arg(short, long)]
    pub output: Option<String>,

    /// Folder for job metadata files (cdx, db, csv), defaults to the output folder
    #[arg(long)]
    pub metadata: Option<String>,

    /// Enable verbose/debug output
    #[arg(short, long)]
    pub verbose: bool,

    /// Write the run log to a file next to the job metadata
    #[arg(long)]
    pub log: bool,

    /// Show a progress bar
    #[arg(long)]
    pub progress: bool,

    /// Do not follow redirects by archive.org
    #[arg(long)]
    pub no_redirect: bool,

    /// Retry failed downloads (number of additional attempts)
    #[arg(long, default_value_t = 0)]
    pub retry: u32,

    /// Number of workers (simultaneous downloads)
    #[arg(long, default_value_t = 1)]
    pub workers: u32,

    /// Delay between downloads in seconds, per worker
    #[arg(long, default_value_t = 0)]
    pub delay: u64,

    /// Reset the job metadata (deletes .cdx/.db/.csv) before starting
    #[arg(long)]
    pub reset: bool,

    /// Retain all job metadata after completion
    #[arg(long)]
    pub keep: bool,
}
