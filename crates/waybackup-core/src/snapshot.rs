//! Snapshot row model.
//!
//! A snapshot is a single archived capture of an origin URL at a specific
//! timestamp. Rows live in the persistent store; the variants of their
//! `response` column double as the work-queue state machine:
//!
//! - `NULL` - pending, claimable by a worker
//! - `"LOCK"` - leased by a worker for the duration of one download
//! - anything else - terminal (an HTTP status as string)

use serde::{Deserialize, Serialize};

/// Lease marker written into the `response` column while a worker owns a row.
///
/// Only ever present during a run; the supervisor resets leftover `LOCK`
/// rows to `NULL` at startup so crashed runs reprocess them.
pub const RESPONSE_LOCK: &str = "LOCK";

/// Sentinel recorded in the `file` column when the output path exceeds the
/// Windows path-length limit and the body is not written.
pub const NT_PATH_SENTINEL: &str = "NT PATH TOO LONG TO SAVE FILE";

/// Build the canonical archive URL that retrieves the raw archived bytes.
pub fn archive_url(timestamp: &str, url_origin: &str) -> String {
    format!("https://web.archive.org/web/{timestamp}id_/{url_origin}")
}

/// A snapshot row as stored in the snapshot table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    /// Monotonic internal id, assigned by the store at insert.
    pub scid: i64,
    /// Dense 1..N sequence assigned once after filtering; display only.
    pub counter: Option<i64>,
    /// 14-digit capture timestamp, `YYYYMMDDhhmmss`.
    pub timestamp: String,
    /// The original URL as archived.
    pub url_origin: String,
    /// Canonical archive URL (unique across the table).
    pub url_archive: String,
    /// Set when the archive answered with a redirect chain.
    pub redirect_url: Option<String>,
    /// Timestamp parsed out of the redirect target, if any.
    pub redirect_timestamp: Option<String>,
    /// Terminal state: HTTP status as string, `LOCK` while leased, or `NULL`.
    pub response: Option<String>,
    /// Absolute path of the downloaded artifact, or an error sentinel.
    pub file: Option<String>,
}

/// A row parsed out of the CDX index, ready for batch insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSnapshot {
    pub timestamp: String,
    pub url_origin: String,
    pub url_archive: String,
    /// Pre-marked terminal state for statuscodes known not to yield content
    /// (301, 404), so workers skip them but the export still lists them.
    pub response: Option<String>,
}

impl NewSnapshot {
    /// Build an insertable row from the CDX fields, pre-marking 301/404.
    pub fn from_cdx(timestamp: String, original: String, statuscode: &str) -> Self {
        let response = match statuscode {
            "301" | "404" => Some(statuscode.to_string()),
            _ => None,
        };
        Self {
            url_archive: archive_url(&timestamp, &original),
            timestamp,
            url_origin: original,
            response,
        }
    }
}

/// Column updates a worker commits for a claimed row.
///
/// `None` fields keep whatever the row already holds; this matters for the
/// redirect columns, which are written incrementally during the hop chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotUpdate {
    pub redirect_url: Option<String>,
    pub redirect_timestamp: Option<String>,
    pub response: Option<String>,
    pub file: Option<String>,
}

/// One line of a prior result file, merged into a fresh store so a job
/// resumes even after the database was deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorResult {
    pub timestamp: String,
    pub url_archive: String,
    pub url_origin: String,
    pub redirect_url: Option<String>,
    pub redirect_timestamp: Option<String>,
    pub response: Option<String>,
    pub file: Option<String>,
}
