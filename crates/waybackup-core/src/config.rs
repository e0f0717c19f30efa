//! Job configuration.
//!
//! A [`BackupConfig`] is built once by the composition root and passed
//! through immutably; components never reach for process-global state.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;

/// Which subset of snapshots per origin URL to retain after filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Every snapshot in the queried window.
    #[default]
    All,
    /// Only the newest snapshot of each origin URL.
    Last,
    /// Only the oldest snapshot of each origin URL.
    First,
}

impl Mode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Last => "last",
            Self::First => "first",
        }
    }

    /// Whether the output tree carries a per-snapshot timestamp layer.
    pub const fn timestamped_layout(self) -> bool {
        matches!(self, Self::All)
    }

    /// Whether phase C prunes rows per origin URL at all.
    pub const fn filters(self) -> bool {
        !matches!(self, Self::All)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            "last" => Ok(Self::Last),
            "first" => Ok(Self::First),
            other => Err(ConfigError::UnknownMode(other.to_string())),
        }
    }
}

/// Configuration errors surfaced while deriving a job from user input.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown mode: {0}")]
    UnknownMode(String),

    #[error("timestamp must be 14 digits (YYYYMMDDhhmmss), got: {0}")]
    BadTimestamp(String),
}

/// The immutable description of one backup job.
///
/// Everything that influences which snapshots are fetched and where they
/// land. The job key is derived from the query-shaping subset of these
/// fields, so the same invocation correlates with the same store row across
/// runs.
#[derive(Debug, Clone)]
pub struct BackupConfig {
    /// Origin URL to download snapshots for.
    pub url: String,
    pub mode: Mode,
    /// Query only the explicitly given URL, without the `/*` wildcard.
    pub explicit: bool,
    /// Time window as "years back from now".
    pub range_years: Option<u32>,
    /// Explicit window start, 14-digit.
    pub start: Option<String>,
    /// Explicit window end, 14-digit.
    pub end: Option<String>,
    /// Cap on the number of CDX rows queried.
    pub limit: Option<u64>,
    /// File-extension filter (lowercased, no dots).
    pub filetypes: Vec<String>,
    /// Status-code filter.
    pub statuscodes: Vec<String>,
    /// Root of the output tree.
    pub output: PathBuf,
    /// Directory holding the job metadata (index file, store, result file).
    pub metadata: PathBuf,
    /// Do not follow archive.org redirects.
    pub no_redirect: bool,
    /// Extra outer download attempts per snapshot.
    pub retry: u32,
    /// Number of concurrent download workers.
    pub workers: u32,
    /// Seconds to pause between downloads, per worker.
    pub delay_secs: u64,
    /// Retain metadata files after the run.
    pub keep: bool,
    /// Drop metadata files before the run starts.
    pub reset: bool,
}

impl BackupConfig {
    /// Stable fingerprint of the request, used to correlate the job row in
    /// the persistent store with a specific invocation.
    pub fn job_key(&self) -> String {
        [
            self.url.clone(),
            self.mode.as_str().to_string(),
            self.explicit.to_string(),
            opt_string(self.range_years.as_ref()),
            opt_string(self.start.as_ref()),
            opt_string(self.end.as_ref()),
            opt_string(self.limit.as_ref()),
            self.filetypes.join(","),
            self.statuscodes.join(","),
        ]
        .join("|")
    }

    /// Validate the explicit window bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for ts in [&self.start, &self.end].into_iter().flatten() {
            if ts.len() != 14 || !ts.bytes().all(|b| b.is_ascii_digit()) {
                return Err(ConfigError::BadTimestamp(ts.clone()));
            }
        }
        Ok(())
    }
}

fn opt_string<T: ToString>(value: Option<&T>) -> String {
    value.map_or_else(|| "none".to_string(), ToString::to_string)
}

/// Per-job metadata file locations, derived from the configuration.
///
/// The store and the index file live side-by-side in the metadata directory
/// under a name derived from the origin URL.
#[derive(Debug, Clone)]
pub struct JobPaths {
    /// Raw CDX response stream.
    pub cdx_file: PathBuf,
    /// SQLite store.
    pub db_file: PathBuf,
    /// Terminal-result projection, re-ingestible on resume.
    pub csv_file: PathBuf,
    /// Optional run log.
    pub log_file: PathBuf,
}

impl JobPaths {
    pub fn derive(config: &BackupConfig) -> Self {
        let base = format!("waybackup_{}", sanitize_filename(&config.url));
        Self {
            cdx_file: config.metadata.join(format!("{base}.cdx")),
            db_file: config.metadata.join(format!("{base}.db")),
            csv_file: config.metadata.join(format!("{base}.csv")),
            log_file: config.metadata.join(format!("{base}.log")),
        }
    }
}

/// Reduce a URL to something safe as a file-name stem: scheme dropped,
/// every byte outside `[A-Za-z0-9._-]` replaced with a dot.
pub fn sanitize_filename(url: &str) -> String {
    let rest = match url.find("://") {
        Some(pos) => &url[pos + 3..],
        None => url,
    };
    rest.trim_matches('/')
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '.'
            }
        })
        .collect()
}

/// Default output directory when none is given.
pub fn default_output_dir(cwd: &Path) -> PathBuf {
    cwd.join("waybackup_snapshots")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> BackupConfig {
        BackupConfig {
            url: "https://example.com/a".to_string(),
            mode: Mode::Last,
            explicit: false,
            range_years: None,
            start: Some("20200101000000".to_string()),
            end: None,
            limit: Some(100),
            filetypes: vec!["css".to_string(), "js".to_string()],
            statuscodes: vec!["200".to_string()],
            output: PathBuf::from("/tmp/out"),
            metadata: PathBuf::from("/tmp/meta"),
            no_redirect: false,
            retry: 0,
            workers: 1,
            delay_secs: 0,
            keep: false,
            reset: false,
        }
    }

    #[test]
    fn job_key_is_stable_and_sensitive_to_query_shape() {
        let a = config();
        let b = config();
        assert_eq!(a.job_key(), b.job_key());

        let mut c = config();
        c.mode = Mode::First;
        assert_ne!(a.job_key(), c.job_key());

        let mut d = config();
        d.limit = None;
        assert_ne!(a.job_key(), d.job_key());

        // output location does not shape the query
        let mut e = config();
        e.output = PathBuf::from("/elsewhere");
        assert_eq!(a.job_key(), e.job_key());
    }

    #[test]
    fn validate_rejects_short_timestamps() {
        let mut c = config();
        c.start = Some("2020".to_string());
        assert!(matches!(c.validate(), Err(ConfigError::BadTimestamp(_))));

        c.start = Some("20200101000000".to_string());
        assert!(c.validate().is_ok());
    }

    #[test]
    fn paths_derive_from_sanitized_url() {
        let paths = JobPaths::derive(&config());
        assert_eq!(
            paths.cdx_file,
            PathBuf::from("/tmp/meta/waybackup_example.com.a.cdx")
        );
        assert_eq!(
            paths.db_file,
            PathBuf::from("/tmp/meta/waybackup_example.com.a.db")
        );
    }

    #[test]
    fn mode_parses_and_prints() {
        assert_eq!("last".parse::<Mode>().unwrap(), Mode::Last);
        assert_eq!(Mode::First.to_string(), "first");
        assert!("save".parse::<Mode>().is_err());
        assert!(Mode::All.timestamped_layout());
        assert!(!Mode::Last.timestamped_layout());
    }
}
